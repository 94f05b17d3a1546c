use serde::{Deserialize, Serialize};

use crate::policy::UsagePolicy;

pub const DEFAULT_DOWNLOAD_FORMAT: &str = "json";

/// Negotiable unit of data published in a connector catalog.
///
/// Immutable once discovered; batch operations key their results
/// by `asset_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub offer_id: String,
    pub asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<serde_json::Value>,
}

impl Offer {
    pub fn new(offer_id: impl Into<String>, asset_id: impl Into<String>) -> Offer {
        Offer {
            offer_id: offer_id.into(),
            asset_id: asset_id.into(),
            connector_id: None,
            provider_url: None,
            asset_type: None,
            policy: None,
        }
    }

    pub fn with_connector(mut self, connector_id: impl Into<String>, provider_url: impl Into<String>) -> Offer {
        self.connector_id = Some(connector_id.into());
        self.provider_url = Some(provider_url.into());
        self
    }
}

/// Consumer side request to subscribe to (and optionally download) offers
/// of a single provider connector.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerRequest {
    pub connector_id: String,
    pub provider_url: String,
    pub offers: Vec<Offer>,
    #[serde(default)]
    pub usage_policies: Vec<UsagePolicy>,
    #[serde(default = "default_download_format")]
    pub download_data_as: String,
}

impl ConsumerRequest {
    /// Provider url without trailing slash.
    pub fn recipient_url(&self) -> &str {
        remove_last_slash(&self.provider_url)
    }
}

fn default_download_format() -> String {
    DEFAULT_DOWNLOAD_FORMAT.to_string()
}

pub fn remove_last_slash(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}
