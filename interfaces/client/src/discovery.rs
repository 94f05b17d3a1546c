use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::api::{BpnDiscovery, ConnectorDiscovery};
use crate::web::WebClient;
use crate::Result;

const BPN_DISCOVERY_SEARCH: &str = "api/administration/connectors/bpnDiscovery/search";
const MANUFACTURER_PART_ID_TYPE: &str = "manufacturerPartId";

#[derive(Deserialize)]
struct BpnSearchResponse {
    #[serde(default)]
    bpns: Vec<BpnEntry>,
}

#[derive(Deserialize)]
struct BpnEntry {
    value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectorEntry {
    bpn: String,
    #[serde(default)]
    connector_endpoint: Vec<String>,
}

/// Resolves business partner numbers owning a manufacturer part id.
#[derive(Clone, Debug)]
pub struct HttpBpnDiscovery {
    client: WebClient,
}

impl HttpBpnDiscovery {
    pub fn new(client: WebClient) -> HttpBpnDiscovery {
        HttpBpnDiscovery { client }
    }
}

#[async_trait]
impl BpnDiscovery for HttpBpnDiscovery {
    async fn search(&self, manufacturer_part_id: &str) -> Result<Vec<String>> {
        let body = json!({
            "searchFilter": [{
                "type": MANUFACTURER_PART_ID_TYPE,
                "keys": [manufacturer_part_id],
            }]
        });
        let response: BpnSearchResponse = self
            .client
            .post(BPN_DISCOVERY_SEARCH)?
            .send_json(&body)
            .json()
            .await?;

        let mut bpns = Vec::new();
        for entry in response.bpns {
            if !bpns.contains(&entry.value) {
                bpns.push(entry.value);
            }
        }
        log::debug!("BPN discovery for [{}] found {:?}.", manufacturer_part_id, bpns);
        Ok(bpns)
    }
}

#[derive(Clone, Debug)]
pub struct HttpConnectorDiscovery {
    client: WebClient,
}

impl HttpConnectorDiscovery {
    pub fn new(client: WebClient) -> HttpConnectorDiscovery {
        HttpConnectorDiscovery { client }
    }
}

#[async_trait]
impl ConnectorDiscovery for HttpConnectorDiscovery {
    async fn connectors(&self, bpn: &str) -> Result<Vec<String>> {
        let entries: Vec<ConnectorEntry> = self
            .client
            .post("")?
            .send_json(&[bpn])
            .json()
            .await?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.bpn == bpn)
            .flat_map(|entry| entry.connector_endpoint)
            .collect())
    }
}
