use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::offer::Offer;

pub const DATASPACE_PROTOCOL: &str = "dataspace-protocol-http";
pub const EDC_ID_OPERAND: &str = "https://w3id.org/edc/v0.0.1/ns/id";
pub const EDC_TYPE_OPERAND: &str = "https://w3id.org/edc/v0.0.1/ns/type";
pub const DIGITAL_TWIN_REGISTRY_TYPE: &str = "data.core.digitalTwinRegistry";

/// Single server side filter criterion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub operand_left: String,
    pub operator: String,
    pub operand_right: String,
}

impl Criterion {
    pub fn id_equals(asset_id: impl Into<String>) -> Criterion {
        Criterion {
            operand_left: EDC_ID_OPERAND.to_string(),
            operator: "=".to_string(),
            operand_right: asset_id.into(),
        }
    }

    pub fn type_equals(asset_type: impl Into<String>) -> Criterion {
        Criterion {
            operand_left: EDC_TYPE_OPERAND.to_string(),
            operator: "=".to_string(),
            operand_right: asset_type.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub offset: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_expression: Vec<Criterion>,
}

/// Catalog query sent to the local connector, forwarded to `provider_url`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRequest {
    #[serde(rename = "@context")]
    pub context: Value,
    pub protocol: String,
    pub provider_url: String,
    pub query_spec: QuerySpec,
}

impl CatalogRequest {
    pub fn new(provider_url: impl Into<String>, offset: u32, limit: u32) -> CatalogRequest {
        CatalogRequest {
            context: Value::Object(Default::default()),
            protocol: DATASPACE_PROTOCOL.to_string(),
            provider_url: provider_url.into(),
            query_spec: QuerySpec {
                offset,
                limit,
                filter_expression: vec![],
            },
        }
    }

    pub fn with_filter(mut self, criterion: Criterion) -> CatalogRequest {
        self.query_spec.filter_expression.push(criterion);
        self
    }
}

/// Extracts offers from a DCAT catalog returned by a connector.
///
/// Datasets and policies may come either as a single object or as an array,
/// and keys may be compacted (`dcat:dataset`) or not (`dataset`).
pub fn offers_from_catalog(catalog: &Value, provider_url: &str) -> Vec<Offer> {
    let connector_id = field(
        catalog,
        &["dspace:participantId", "edc:participantId", "participantId"],
    )
    .and_then(Value::as_str)
    .map(str::to_string);

    let datasets = field(catalog, &["dcat:dataset", "dataset"])
        .map(as_list)
        .unwrap_or_default();

    let mut offers = Vec::new();
    for dataset in datasets {
        let asset_id = match field(dataset, &["@id", "id", "edc:id"]).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => continue,
        };
        let asset_type = field(dataset, &["dct:type", "type", "edc:type", EDC_TYPE_OPERAND])
            .and_then(|t| t.as_str().or_else(|| t.get("@id").and_then(Value::as_str)))
            .map(str::to_string);

        let policies = field(dataset, &["odrl:hasPolicy", "hasPolicy"])
            .map(as_list)
            .unwrap_or_default();

        for policy in policies {
            let offer_id = match field(policy, &["@id", "id"]).and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => continue,
            };
            offers.push(Offer {
                offer_id,
                asset_id: asset_id.clone(),
                connector_id: connector_id.clone(),
                provider_url: Some(provider_url.to_string()),
                asset_type: asset_type.clone(),
                policy: Some(policy.clone()),
            });
        }
    }
    offers
}

fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| value.get(*name))
}

fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => vec![],
        other => vec![other],
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_request_with_filter_serializes_query_spec() {
        let request = CatalogRequest::new("https://p.example/api/v1/dsp", 0, 10)
            .with_filter(Criterion::id_equals("a1"));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["protocol"], "dataspace-protocol-http");
        assert_eq!(json["providerUrl"], "https://p.example/api/v1/dsp");
        assert_eq!(json["querySpec"]["limit"], 10);
        assert_eq!(
            json["querySpec"]["filterExpression"][0],
            json!({
                "operandLeft": "https://w3id.org/edc/v0.0.1/ns/id",
                "operator": "=",
                "operandRight": "a1"
            })
        );
    }

    #[test]
    fn test_catalog_request_without_filter_omits_expression() {
        let json = serde_json::to_value(CatalogRequest::new("u", 5, 20)).unwrap();
        assert!(json["querySpec"].get("filterExpression").is_none());
        assert_eq!(json["@context"], json!({}));
    }

    #[test]
    fn test_offers_from_catalog_single_and_array_forms() {
        let catalog = json!({
            "dspace:participantId": "BPNL000000000001",
            "dcat:dataset": [
                {
                    "@id": "a1",
                    "dct:type": {"@id": "data.core.digitalTwinRegistry"},
                    "odrl:hasPolicy": {"@id": "o1"}
                },
                {
                    "@id": "a2",
                    "odrl:hasPolicy": [{"@id": "o2"}, {"@id": "o3"}]
                },
                {"odrl:hasPolicy": {"@id": "ignored"}}
            ]
        });

        let offers = offers_from_catalog(&catalog, "https://p.example");
        let ids = offers
            .iter()
            .map(|o| (o.asset_id.as_str(), o.offer_id.as_str()))
            .collect::<Vec<_>>();

        assert_eq!(ids, vec![("a1", "o1"), ("a2", "o2"), ("a2", "o3")]);
        assert_eq!(offers[0].asset_type.as_deref(), Some(DIGITAL_TWIN_REGISTRY_TYPE));
        assert_eq!(offers[1].connector_id.as_deref(), Some("BPNL000000000001"));
        assert_eq!(offers[2].provider_url.as_deref(), Some("https://p.example"));
    }

    #[test]
    fn test_offers_from_empty_catalog() {
        assert!(offers_from_catalog(&json!({}), "u").is_empty());
        assert!(offers_from_catalog(&json!({"dataset": null}), "u").is_empty());
    }
}
