//! Bindings for the digital twin registry (AAS v3 REST).
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use dsx_model::{ShellDescriptor, SpecificAssetId, SubmodelDescriptor};

use crate::api::TwinRegistry;
use crate::web::{with_query, QueryParamsBuilder, WebAuth, WebClient};
use crate::{ApiError, Result};

const LOOKUP_SHELLS: &str = "lookup/shells";
const SHELL_DESCRIPTORS: &str = "shell-descriptors";

/// Registry identifiers travel base64url encoded in paths and queries.
pub fn encode_id(id: &str) -> String {
    base64::encode_config(id, base64::URL_SAFE_NO_PAD)
}

#[derive(Clone, Debug)]
pub struct HttpTwinRegistry {
    client: WebClient,
}

impl HttpTwinRegistry {
    pub fn new(client: WebClient) -> HttpTwinRegistry {
        HttpTwinRegistry { client }
    }

    pub fn connect(base_url: &str, api_root: &str, auth: Option<WebAuth>) -> Result<HttpTwinRegistry> {
        let mut builder = WebClient::builder().base_url(base_url).api_root(api_root);
        if let Some(auth) = auth {
            builder = builder.auth(auth);
        }
        Ok(HttpTwinRegistry::new(builder.build()?))
    }

    /// Collects every page of a registry list by following `paging_metadata.cursor`.
    async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page_path = match &cursor {
                Some(cursor) => with_query(path, cursor_query(cursor)),
                None => path.to_string(),
            };
            let request = self.client.get(&page_path)?;
            let url = request.url().to_string();
            let (page, next) = paged(&url, request.json().await?)?;
            items.extend(page);

            match next {
                Some(next) if cursor.as_ref() != Some(&next) => cursor = Some(next),
                Some(next) => {
                    log::warn!("Registry repeated cursor [{}] at [{}], stopping.", next, url);
                    return Ok(items);
                }
                None => return Ok(items),
            }
        }
    }

    fn submodels_path(shell_id: &str) -> String {
        format!(
            "{}/{}/submodel-descriptors",
            SHELL_DESCRIPTORS,
            encode_id(shell_id)
        )
    }
}

#[async_trait]
impl TwinRegistry for HttpTwinRegistry {
    async fn lookup_shells(&self, asset_ids: &[SpecificAssetId]) -> Result<Vec<String>> {
        // the query builder is not Send, it must be gone before the first await
        let path = {
            let mut query = QueryParamsBuilder::new();
            for asset_id in asset_ids {
                let json = serde_json::to_string(asset_id).map_err(|e| ApiError::Decode {
                    url: LOOKUP_SHELLS.to_string(),
                    msg: e.to_string(),
                })?;
                query = query.put("assetIds", Some(encode_id(&json)));
            }
            with_query(LOOKUP_SHELLS, query.build())
        };
        self.get_all(&path).await
    }

    async fn create_shell(&self, shell: &ShellDescriptor) -> Result<ShellDescriptor> {
        self.client
            .post(SHELL_DESCRIPTORS)?
            .send_json(shell)
            .json()
            .await
    }

    async fn list_submodels(&self, shell_id: &str) -> Result<Vec<SubmodelDescriptor>> {
        self.get_all(&Self::submodels_path(shell_id)).await
    }

    async fn create_submodel(
        &self,
        shell_id: &str,
        submodel: &SubmodelDescriptor,
    ) -> Result<SubmodelDescriptor> {
        self.client
            .post(&Self::submodels_path(shell_id))?
            .send_json(submodel)
            .json()
            .await
    }
}

fn cursor_query(cursor: &str) -> String {
    QueryParamsBuilder::new().put("cursor", Some(cursor)).build()
}

/// Registry lists come either wrapped in `{"paging_metadata": {...}, "result": [...]}`
/// or bare. Returns the page items and the cursor of the next page, if any.
fn paged<T: DeserializeOwned>(url: &str, response: Value) -> Result<(Vec<T>, Option<String>)> {
    let (items, cursor) = match response {
        Value::Object(mut map) => {
            let cursor = map
                .get("paging_metadata")
                .and_then(|meta| meta.get("cursor"))
                .and_then(Value::as_str)
                .filter(|cursor| !cursor.is_empty())
                .map(str::to_string);
            (map.remove("result").unwrap_or(Value::Array(vec![])), cursor)
        }
        other => (other, None),
    };
    let items = serde_json::from_value(items).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        msg: e.to_string(),
    })?;
    Ok((items, cursor))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_id_is_url_safe() {
        assert_eq!(encode_id("urn:uuid:1"), "dXJuOnV1aWQ6MQ");
        assert_eq!(encode_id("???"), "Pz8_");
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_lookup_future_is_send() {
        let registry = HttpTwinRegistry::connect("http://localhost:4243", "/api/v3.0", None).unwrap();
        let ids = [SpecificAssetId::new("partInstanceId", "P1")];
        let lookup = registry.lookup_shells(&ids);
        assert_send(&lookup);
    }

    #[test]
    fn test_paged_accepts_wrapped_and_bare_lists() {
        let (wrapped, cursor): (Vec<String>, _) =
            paged("u", json!({"paging_metadata": {}, "result": ["s1", "s2"]})).unwrap();
        assert_eq!(wrapped, vec!["s1", "s2"]);
        assert_eq!(cursor, None);

        let (bare, cursor): (Vec<String>, _) = paged("u", json!(["s1"])).unwrap();
        assert_eq!(bare, vec!["s1"]);
        assert_eq!(cursor, None);

        let (empty, _): (Vec<String>, _) = paged("u", json!({})).unwrap();
        assert!(empty.is_empty());

        assert!(paged::<String>("u", json!({"result": [1]})).is_err());
    }

    #[test]
    fn test_paged_reads_next_cursor() {
        let (items, cursor): (Vec<String>, _) = paged(
            "u",
            json!({"paging_metadata": {"cursor": "c2"}, "result": ["s1"]}),
        )
        .unwrap();
        assert_eq!(items, vec!["s1"]);
        assert_eq!(cursor.as_deref(), Some("c2"));

        let (_, cursor): (Vec<String>, _) =
            paged("u", json!({"paging_metadata": {"cursor": ""}, "result": []})).unwrap();
        assert_eq!(cursor, None);
    }

    #[test]
    fn test_cursor_is_appended_to_existing_query() {
        assert_eq!(
            with_query("lookup/shells?assetIds=abc", cursor_query("c2=")),
            "lookup/shells?assetIds=abc&cursor=c2%3D"
        );
    }
}
