use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::edr::EdrEntry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Success,
    Failed,
}

/// Per item outcome of a batch operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edr: Option<EdrEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    pub fn success() -> ItemResult {
        ItemResult {
            status: ItemStatus::Success,
            data: None,
            edr: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> ItemResult {
        ItemResult {
            status: ItemStatus::Failed,
            data: None,
            edr: None,
            error: Some(error.into()),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> ItemResult {
        self.data = Some(data);
        self
    }

    pub fn with_edr(mut self, edr: Option<EdrEntry>) -> ItemResult {
        self.edr = edr;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }
}

/// Batch results keyed by asset id (or row key); one entry per requested item.
pub type BatchResult = HashMap<String, ItemResult>;

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_serialization_omits_empty_fields() {
        assert_eq!(
            serde_json::to_value(ItemResult::success().with_data(json!({"k": 1}))).unwrap(),
            json!({"status": "SUCCESS", "data": {"k": 1}})
        );
        assert_eq!(
            serde_json::to_value(ItemResult::failed("boom")).unwrap(),
            json!({"status": "FAILED", "error": "boom"})
        );
    }
}
