use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{AsRefStr, Display, EnumString};

/// Negotiation state as reported by the remote connector.
///
/// The connector state machine is externally owned and open ended, so unknown
/// states are preserved verbatim in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NegotiationState {
    Requested,
    Agreed,
    Finalized,
    Negotiated,
    Terminated,
    Other(String),
}

impl NegotiationState {
    /// Only `NEGOTIATED` and `TERMINATED` end the polling of a negotiation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Negotiated | NegotiationState::Terminated)
    }

    pub fn is_negotiated(&self) -> bool {
        *self == NegotiationState::Negotiated
    }

    pub fn as_str(&self) -> &str {
        match self {
            NegotiationState::Requested => "REQUESTED",
            NegotiationState::Agreed => "AGREED",
            NegotiationState::Finalized => "FINALIZED",
            NegotiationState::Negotiated => "NEGOTIATED",
            NegotiationState::Terminated => "TERMINATED",
            NegotiationState::Other(state) => state,
        }
    }
}

impl From<&str> for NegotiationState {
    fn from(state: &str) -> Self {
        // Connectors may send namespaced values, e.g. `edc:NEGOTIATED`.
        let bare = state.rsplit(':').next().unwrap_or(state).trim();
        match bare.to_ascii_uppercase().as_str() {
            "REQUESTED" => NegotiationState::Requested,
            "AGREED" => NegotiationState::Agreed,
            "FINALIZED" => NegotiationState::Finalized,
            "NEGOTIATED" => NegotiationState::Negotiated,
            "TERMINATED" => NegotiationState::Terminated,
            _ => NegotiationState::Other(state.to_string()),
        }
    }
}

impl From<String> for NegotiationState {
    fn from(state: String) -> Self {
        NegotiationState::from(state.as_str())
    }
}

impl From<NegotiationState> for String {
    fn from(state: NegotiationState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded for one negotiation attempt.
///
/// `Terminated` is kept apart from `Negotiated`: both end the polling loop,
/// but only `Negotiated` counts as success.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum NegotiationStatus {
    #[strum(serialize = "PENDING")]
    #[serde(rename = "PENDING")]
    Pending,
    #[strum(serialize = "NEGOTIATED")]
    #[serde(rename = "NEGOTIATED")]
    Negotiated,
    #[strum(serialize = "TERMINATED")]
    #[serde(rename = "TERMINATED")]
    Terminated,
    #[strum(serialize = "Failed:Timeout")]
    #[serde(rename = "Failed:Timeout")]
    FailedTimeout,
    #[strum(serialize = "Failed:Exception")]
    #[serde(rename = "Failed:Exception")]
    FailedException,
}

impl NegotiationStatus {
    pub fn is_success(&self) -> bool {
        *self == NegotiationStatus::Negotiated
    }

    /// Status for the last state observed once polling has stopped.
    pub fn from_final_state(state: &NegotiationState) -> NegotiationStatus {
        match state {
            NegotiationState::Negotiated => NegotiationStatus::Negotiated,
            NegotiationState::Terminated => NegotiationStatus::Terminated,
            _ => NegotiationStatus::FailedTimeout,
        }
    }
}

/// Audit row written once per negotiation attempt, never updated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractNegotiationRecord {
    pub id: String,
    pub process_id: String,
    pub connector_id: String,
    pub offer_id: String,
    pub contract_negotiation_id: Option<String>,
    pub status: NegotiationStatus,
    pub remote_state: Option<String>,
    pub error: Option<String>,
    pub timestamp: NaiveDateTime,
}
