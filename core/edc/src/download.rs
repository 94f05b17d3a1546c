use serde_json::Value;
use std::sync::Arc;

use dsx_client::DataPlane;
use dsx_model::EdrToken;

use crate::error::DownloadError;

/// Fetches asset payloads through the provider data plane.
pub struct DataDownloadExecutor {
    data_plane: Arc<dyn DataPlane>,
}

impl DataDownloadExecutor {
    pub fn new(data_plane: Arc<dyn DataPlane>) -> DataDownloadExecutor {
        DataDownloadExecutor { data_plane }
    }

    /// Downloads asset of a `NEGOTIATED` token in the requested format.
    ///
    /// Tokens in any other state are rejected without contacting the data plane.
    pub async fn download(&self, token: &EdrToken, format: &str) -> Result<Value, DownloadError> {
        if !token.is_negotiated() {
            return Err(DownloadError::NotNegotiated {
                asset_id: token.asset_id.clone(),
                state: token.state.clone(),
            });
        }

        let url = download_url(&token.endpoint, format);
        log::debug!("Downloading asset [{}] from [{}].", token.asset_id, url);
        let payload = self.data_plane.fetch(&url, &token.authorization).await?;
        log::info!("Downloaded asset [{}].", token.asset_id);
        Ok(payload)
    }
}

fn download_url(endpoint: &str, format: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{}{}type={}", endpoint, separator, format)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{data_address, edr_entry, FakeDataPlane};
    use serde_json::json;

    fn token(state: &str) -> EdrToken {
        EdrToken::new(
            &edr_entry(Some("ag"), Some("tp"), "a1", state),
            "tp",
            data_address("https://p.example/data", "secret"),
        )
    }

    #[test]
    fn test_download_url() {
        assert_eq!(
            download_url("https://p.example/data", "json"),
            "https://p.example/data?type=json"
        );
        assert_eq!(
            download_url("https://p.example/data?x=1", "csv"),
            "https://p.example/data?x=1&type=csv"
        );
    }

    #[tokio::test]
    async fn test_download_uses_token_credentials() {
        let data_plane = Arc::new(
            FakeDataPlane::new().with_payload("https://p.example/data?type=json", json!({"k": 1})),
        );
        let executor = DataDownloadExecutor::new(data_plane.clone());

        let payload = executor.download(&token("NEGOTIATED"), "json").await.unwrap();

        assert_eq!(payload, json!({"k": 1}));
        assert_eq!(
            data_plane.calls(),
            vec![("https://p.example/data?type=json".to_string(), "secret".to_string())]
        );
    }

    #[tokio::test]
    async fn test_not_negotiated_token_is_rejected_before_any_call() {
        let data_plane = Arc::new(FakeDataPlane::new());
        let executor = DataDownloadExecutor::new(data_plane.clone());

        let err = executor.download(&token("AGREED"), "json").await.unwrap_err();

        assert!(matches!(err, DownloadError::NotNegotiated { .. }));
        assert!(data_plane.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_body() {
        let data_plane = Arc::new(FakeDataPlane::new().with_failure(
            "https://p.example/data?type=json",
            403,
            "policy violated",
        ));
        let err = DataDownloadExecutor::new(data_plane)
            .download(&token("NEGOTIATED"), "json")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Unable to download subscribed data offer because: policy violated"
        );
    }
}
