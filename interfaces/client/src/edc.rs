//! Bindings for the consumer connector management API and provider data planes.
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use dsx_model::catalog::DATASPACE_PROTOCOL;
use dsx_model::{CatalogRequest, EdrDataAddress, EdrEntry, NegotiationState};

use crate::api::{ConnectorApi, DataPlane, NegotiationKind, NegotiationRequest};
use crate::web::{with_query, QueryParamsBuilder, WebAuth, WebClient};
use crate::{ApiError, Result};

const CATALOG_REQUEST: &str = "v2/catalog/request";
const CONTRACT_NEGOTIATIONS: &str = "v2/contractnegotiations";
const EDRS: &str = "edrs";

const STATE_KEYS: [&str; 3] = ["state", "edc:state", "https://w3id.org/edc/v0.0.1/ns/state"];

#[derive(Deserialize)]
struct IdResponse {
    #[serde(rename = "@id", alias = "id")]
    id: String,
}

#[derive(Clone, Debug)]
pub struct EdcClient {
    client: WebClient,
}

impl EdcClient {
    pub fn new(client: WebClient) -> EdcClient {
        EdcClient { client }
    }

    /// Client of the management api at `base_url`, authenticated with api key.
    pub fn with_api_key(base_url: &str, header: &str, api_key: Option<&str>) -> Result<EdcClient> {
        let mut builder = WebClient::builder().base_url(base_url);
        if let Some(api_key) = api_key {
            builder = builder.auth(WebAuth::Header {
                name: header.to_string(),
                value: api_key.to_string(),
            });
        }
        Ok(EdcClient::new(builder.build()?))
    }
}

#[async_trait]
impl ConnectorApi for EdcClient {
    async fn query_catalog(&self, request: &CatalogRequest) -> Result<Value> {
        log::debug!(
            "Querying catalog of [{}], offset {}, limit {}.",
            request.provider_url,
            request.query_spec.offset,
            request.query_spec.limit
        );
        self.client
            .post(CATALOG_REQUEST)?
            .send_json(request)
            .json()
            .await
    }

    async fn initiate_negotiation(&self, request: &NegotiationRequest) -> Result<String> {
        let path = match request.kind {
            NegotiationKind::Contract => CONTRACT_NEGOTIATIONS,
            NegotiationKind::Edr => EDRS,
        };
        let response: IdResponse = self
            .client
            .post(path)?
            .send_json(&negotiation_body(request))
            .json()
            .await?;
        Ok(response.id)
    }

    async fn negotiation_state(&self, negotiation_id: &str) -> Result<NegotiationState> {
        let request = self
            .client
            .get(&format!("{}/{}", CONTRACT_NEGOTIATIONS, segment(negotiation_id)))?;
        let url = request.url().to_string();
        let response: Value = request.json().await?;

        STATE_KEYS
            .iter()
            .find_map(|key| response.get(*key).and_then(Value::as_str))
            .map(NegotiationState::from)
            .ok_or_else(|| ApiError::Decode {
                url,
                msg: "missing negotiation state".to_string(),
            })
    }

    async fn lookup_edrs(&self, asset_id: &str) -> Result<Vec<EdrEntry>> {
        let query = QueryParamsBuilder::new()
            .put("assetId", Some(asset_id))
            .build();
        self.client.get(&with_query(EDRS, query))?.json().await
    }

    async fn edr_data_address(&self, transfer_process_id: &str) -> Result<Option<EdrDataAddress>> {
        self.client
            .get(&format!("{}/{}", EDRS, segment(transfer_process_id)))?
            .optional_json()
            .await
    }

    async fn refresh_edr(&self, transfer_process_id: &str) -> Result<EdrDataAddress> {
        self.client
            .post(&format!("{}/{}/refresh", EDRS, segment(transfer_process_id)))?
            .json()
            .await
    }
}

/// Negotiation initiate request in connector management api format.
pub fn negotiation_body(request: &NegotiationRequest) -> Value {
    json!({
        "@context": { "odrl": "http://www.w3.org/ns/odrl/2/" },
        "@type": "NegotiationInitiateRequestDto",
        "connectorAddress": request.provider_url,
        "protocol": DATASPACE_PROTOCOL,
        "connectorId": request.connector_id,
        "providerId": request.connector_id,
        "offer": {
            "offerId": request.offer_id,
            "assetId": request.asset_id,
            "policy": {
                "@type": "odrl:Set",
                "odrl:permission": request.action.to_odrl_permission(&request.asset_id),
                "odrl:prohibition": [],
                "odrl:obligation": [],
                "odrl:target": request.asset_id,
            }
        },
        "callbackAddresses": [],
        "privateProperties": request.extensible_properties,
    })
}

fn segment(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes()).collect()
}

/// Plain http access to provider data planes, authorized per request with
/// the EDR credential.
#[derive(Clone, Debug)]
pub struct HttpDataPlane {
    client: WebClient,
}

impl HttpDataPlane {
    pub fn new() -> Result<HttpDataPlane> {
        Ok(HttpDataPlane {
            client: WebClient::builder().build()?,
        })
    }
}

#[async_trait]
impl DataPlane for HttpDataPlane {
    async fn fetch(&self, url: &str, authorization: &str) -> Result<Value> {
        let body = self
            .client
            .get(url)?
            .header("Authorization", authorization)
            .body()
            .await?;
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}
