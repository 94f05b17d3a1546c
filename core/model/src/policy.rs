use serde::{Deserialize, Serialize};
use serde_json::json;

pub const ODRL_USE_ACTION: &str = "USE";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsagePolicyType {
    Duration,
    Role,
    Purpose,
    Custom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    Restricted,
    Unrestricted,
}

/// Usage policy chosen by the consumer for a negotiation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePolicy {
    #[serde(rename = "type")]
    pub policy_type: UsagePolicyType,
    pub type_of_access: AccessType,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub duration_unit: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConstraint {
    pub left_operand: String,
    pub operator: String,
    pub right_operand: String,
}

/// ODRL action with its constraints, attached to every negotiation of a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: String,
    pub constraints: Vec<PolicyConstraint>,
}

impl Default for ActionRequest {
    fn default() -> Self {
        ActionRequest {
            action: ODRL_USE_ACTION.to_string(),
            constraints: vec![],
        }
    }
}

impl ActionRequest {
    /// Only restricted policies with a value produce constraints.
    pub fn from_usage_policies(policies: &[UsagePolicy]) -> ActionRequest {
        let constraints = policies
            .iter()
            .filter(|policy| policy.type_of_access == AccessType::Restricted)
            .filter_map(|policy| {
                let value = policy.value.as_deref()?.trim();
                if value.is_empty() {
                    return None;
                }
                Some(match policy.policy_type {
                    UsagePolicyType::Duration => PolicyConstraint {
                        left_operand: "cx-policy:ContractDuration".to_string(),
                        operator: "odrl:eq".to_string(),
                        right_operand: match &policy.duration_unit {
                            Some(unit) => format!("{} {}", value, unit),
                            None => value.to_string(),
                        },
                    },
                    UsagePolicyType::Role => PolicyConstraint {
                        left_operand: "cx-policy:Role".to_string(),
                        operator: "odrl:eq".to_string(),
                        right_operand: value.to_string(),
                    },
                    UsagePolicyType::Purpose => PolicyConstraint {
                        left_operand: "cx-policy:UsagePurpose".to_string(),
                        operator: "odrl:eq".to_string(),
                        right_operand: value.to_string(),
                    },
                    UsagePolicyType::Custom => PolicyConstraint {
                        left_operand: "cx-policy:Custom".to_string(),
                        operator: "odrl:eq".to_string(),
                        right_operand: value.to_string(),
                    },
                })
            })
            .collect();

        ActionRequest {
            action: ODRL_USE_ACTION.to_string(),
            constraints,
        }
    }

    /// ODRL permission block for the given asset.
    pub fn to_odrl_permission(&self, asset_id: &str) -> serde_json::Value {
        let constraints = self
            .constraints
            .iter()
            .map(|c| {
                json!({
                    "@type": "Constraint",
                    "odrl:leftOperand": c.left_operand,
                    "odrl:operator": { "@id": c.operator },
                    "odrl:rightOperand": c.right_operand,
                })
            })
            .collect::<Vec<_>>();

        let constraint = match constraints.len() {
            0 => serde_json::Value::Null,
            1 => constraints[0].clone(),
            _ => json!({ "@type": "LogicalConstraint", "odrl:and": constraints }),
        };

        let mut permission = json!({
            "odrl:target": asset_id,
            "odrl:action": { "odrl:type": self.action },
        });
        if !constraint.is_null() {
            permission["odrl:constraint"] = constraint;
        }
        permission
    }
}
