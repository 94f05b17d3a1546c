use serde::{Deserialize, Serialize};

pub const PART_INSTANCE_ID: &str = "partInstanceId";
pub const MANUFACTURER_PART_ID: &str = "manufacturerPartId";
pub const MANUFACTURER_ID: &str = "manufacturerId";

pub const SUBMODEL_INTERFACE: &str = "SUBMODEL-3.0";
pub const ENDPOINT_PROTOCOL: &str = "HTTP";
pub const ENDPOINT_PROTOCOL_VERSION: &str = "1.1";
pub const SUBMODEL_PATH_SUFFIX: &str = "/submodel?content=value&extent=WithBLOBValue";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpecificAssetId {
    pub name: String,
    pub value: String,
}

impl SpecificAssetId {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> SpecificAssetId {
        SpecificAssetId {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Composite business key identifying a twin in the registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessIdentifiers {
    pub part_instance_id: String,
    pub manufacturer_part_id: String,
    pub manufacturer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_identifier: Option<SpecificAssetId>,
}

impl BusinessIdentifiers {
    /// Lookup key set in fixed order: part instance, manufacturer part,
    /// manufacturer, optional extra identifier.
    pub fn specific_asset_ids(&self) -> Vec<SpecificAssetId> {
        let mut ids = vec![
            SpecificAssetId::new(PART_INSTANCE_ID, &self.part_instance_id),
            SpecificAssetId::new(MANUFACTURER_PART_ID, &self.manufacturer_part_id),
            SpecificAssetId::new(MANUFACTURER_ID, &self.manufacturer_id),
        ];
        if let Some(extra) = &self.optional_identifier {
            ids.push(extra.clone());
        }
        ids
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticId {
    #[serde(rename = "type")]
    pub reference_type: String,
    pub keys: Vec<SemanticKey>,
}

impl SemanticId {
    pub fn global(value: impl Into<String>) -> SemanticId {
        SemanticId {
            reference_type: "ExternalReference".to_string(),
            keys: vec![SemanticKey {
                key_type: "GlobalReference".to_string(),
                value: value.into(),
            }],
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.keys.first().map(|k| k.value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolInformation {
    pub href: String,
    pub endpoint_protocol: String,
    pub endpoint_protocol_version: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprotocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprotocol_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprotocol_body_encoding: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub interface: String,
    pub protocol_information: ProtocolInformation,
}

impl Endpoint {
    pub fn http(address: impl Into<String>) -> Endpoint {
        Endpoint {
            interface: SUBMODEL_INTERFACE.to_string(),
            protocol_information: ProtocolInformation {
                href: address.into(),
                endpoint_protocol: ENDPOINT_PROTOCOL.to_string(),
                endpoint_protocol_version: vec![ENDPOINT_PROTOCOL_VERSION.to_string()],
                subprotocol: None,
                subprotocol_body: None,
                subprotocol_body_encoding: None,
            },
        }
    }

    /// Asset id and connector address from `id=<asset>;dspEndpoint=<url>`.
    pub fn dsp_target(&self) -> Option<(String, String)> {
        parse_subprotocol_body(self.protocol_information.subprotocol_body.as_deref()?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmodelDescriptor {
    pub id: String,
    pub id_short: String,
    pub semantic_id: SemanticId,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellDescriptor {
    pub id: String,
    #[serde(default)]
    pub id_short: Option<String>,
    #[serde(default)]
    pub global_asset_id: Option<String>,
    #[serde(default)]
    pub specific_asset_ids: Vec<SpecificAssetId>,
    #[serde(default)]
    pub submodel_descriptors: Vec<SubmodelDescriptor>,
}

/// Parses `key=value;key=value` sub-protocol bodies.
pub fn parse_subprotocol_body(body: &str) -> Option<(String, String)> {
    let mut asset_id = None;
    let mut endpoint = None;
    for part in body.split(';') {
        let (key, value) = match part.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        match key.trim() {
            "id" => asset_id = Some(value.trim().to_string()),
            "dspEndpoint" => endpoint = Some(value.trim().to_string()),
            _ => {}
        }
    }
    Some((asset_id?, endpoint?))
}
