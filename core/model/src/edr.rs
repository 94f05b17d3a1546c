use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::negotiation::NegotiationState;

/// EDR entry as listed by the consumer connector for an asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdrEntry {
    #[serde(default, alias = "tx:agreementId", alias = "edc:agreementId")]
    pub agreement_id: Option<String>,
    #[serde(default, alias = "tx:transferProcessId", alias = "edc:transferProcessId")]
    pub transfer_process_id: Option<String>,
    #[serde(alias = "edc:assetId", alias = "tx:assetId")]
    pub asset_id: String,
    #[serde(default, alias = "edc:providerId", alias = "tx:providerId")]
    pub provider_id: Option<String>,
    #[serde(alias = "tx:edrState", alias = "edc:edrState")]
    pub edr_state: NegotiationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EdrStateError {
    #[error(
        "There is valid contract agreement exist for {asset_id} but initiate data transfer is not \
         completed and no EDR token available, download is not possible"
    )]
    Inconsistent { asset_id: String },
    #[error(
        "Time out!! to get 'NEGOTIATED' EDC EDR status to download data, the current status is '{state}'"
    )]
    NotNegotiated {
        asset_id: String,
        state: NegotiationState,
    },
}

impl EdrEntry {
    /// Checks that a token can be fetched for this entry and returns its
    /// transfer process id.
    ///
    /// An agreement without transfer process is reported before the state
    /// check, it is never treated as success.
    pub fn verify(&self) -> Result<&str, EdrStateError> {
        let transfer_process_id = self
            .transfer_process_id
            .as_deref()
            .filter(|id| !id.trim().is_empty());
        let has_agreement = self
            .agreement_id
            .as_deref()
            .map(|id| !id.trim().is_empty())
            .unwrap_or(false);

        match transfer_process_id {
            None if has_agreement => Err(EdrStateError::Inconsistent {
                asset_id: self.asset_id.clone(),
            }),
            Some(id) if self.edr_state.is_negotiated() => Ok(id),
            _ => Err(EdrStateError::NotNegotiated {
                asset_id: self.asset_id.clone(),
                state: self.edr_state.clone(),
            }),
        }
    }
}

/// Credential bundle returned by the connector for a transfer process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdrDataAddress {
    #[serde(
        rename = "authorization",
        alias = "edc:authorization",
        alias = "https://w3id.org/edc/v0.0.1/ns/authorization"
    )]
    pub authorization: String,
    #[serde(
        rename = "endpoint",
        alias = "edc:endpoint",
        alias = "https://w3id.org/edc/v0.0.1/ns/endpoint"
    )]
    pub endpoint: String,
    #[serde(
        default,
        rename = "refreshToken",
        alias = "tx-auth:refreshToken",
        alias = "https://w3id.org/tractusx/auth/refreshToken"
    )]
    pub refresh_token: Option<String>,
    #[serde(
        default,
        rename = "refreshEndpoint",
        alias = "tx-auth:refreshEndpoint",
        alias = "https://w3id.org/tractusx/auth/refreshEndpoint"
    )]
    pub refresh_endpoint: Option<String>,
    #[serde(
        default,
        rename = "audience",
        alias = "tx-auth:audience",
        alias = "https://w3id.org/tractusx/auth/audience"
    )]
    pub audience: Option<String>,
    #[serde(
        default,
        rename = "expiresIn",
        alias = "tx-auth:expiresIn",
        alias = "https://w3id.org/tractusx/auth/expiresIn"
    )]
    pub expires_in: Option<String>,
}

/// Access credential for downloading one asset through one transfer process.
///
/// Only usable while `state` is `NEGOTIATED`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdrToken {
    pub transfer_process_id: String,
    pub asset_id: String,
    pub agreement_id: Option<String>,
    pub provider_id: Option<String>,
    pub state: NegotiationState,
    pub authorization: String,
    pub endpoint: String,
    pub refresh_token: Option<String>,
    pub refresh_endpoint: Option<String>,
    pub audience: Option<String>,
    /// Lifetime in seconds, counted from the moment the token was fetched.
    pub expires_in: Option<u64>,
}

impl EdrToken {
    pub fn new(entry: &EdrEntry, transfer_process_id: &str, address: EdrDataAddress) -> EdrToken {
        EdrToken {
            transfer_process_id: transfer_process_id.to_string(),
            asset_id: entry.asset_id.clone(),
            agreement_id: entry.agreement_id.clone(),
            provider_id: entry.provider_id.clone(),
            state: entry.edr_state.clone(),
            authorization: address.authorization,
            endpoint: address.endpoint,
            refresh_token: address.refresh_token,
            refresh_endpoint: address.refresh_endpoint,
            audience: address.audience,
            expires_in: address
                .expires_in
                .as_deref()
                .and_then(|s| s.trim().parse::<u64>().ok()),
        }
    }

    /// Replaces credential fields after a refresh, keeping identity and state.
    pub fn refreshed(&self, address: EdrDataAddress) -> EdrToken {
        EdrToken {
            transfer_process_id: self.transfer_process_id.clone(),
            asset_id: self.asset_id.clone(),
            agreement_id: self.agreement_id.clone(),
            provider_id: self.provider_id.clone(),
            state: self.state.clone(),
            authorization: address.authorization,
            endpoint: address.endpoint,
            refresh_token: address.refresh_token.or_else(|| self.refresh_token.clone()),
            refresh_endpoint: address
                .refresh_endpoint
                .or_else(|| self.refresh_endpoint.clone()),
            audience: address.audience.or_else(|| self.audience.clone()),
            expires_in: address
                .expires_in
                .as_deref()
                .and_then(|s| s.trim().parse::<u64>().ok()),
        }
    }

    pub fn is_negotiated(&self) -> bool {
        self.state.is_negotiated()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.refresh_endpoint.is_some()
    }

    /// Entry describing this token without its credentials.
    pub fn entry(&self) -> EdrEntry {
        EdrEntry {
            agreement_id: self.agreement_id.clone(),
            transfer_process_id: Some(self.transfer_process_id.clone()),
            asset_id: self.asset_id.clone(),
            provider_id: self.provider_id.clone(),
            edr_state: self.state.clone(),
            created_at: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn entry(agreement: Option<&str>, transfer: Option<&str>, state: &str) -> EdrEntry {
        EdrEntry {
            agreement_id: agreement.map(str::to_string),
            transfer_process_id: transfer.map(str::to_string),
            asset_id: "a1".to_string(),
            provider_id: None,
            edr_state: NegotiationState::from(state),
            created_at: None,
        }
    }

    #[test]
    fn test_verify_negotiated_entry() {
        assert_eq!(entry(Some("ag"), Some("tp"), "NEGOTIATED").verify(), Ok("tp"));
    }

    #[test]
    fn test_verify_agreement_without_transfer_is_inconsistent() {
        assert_eq!(
            entry(Some("ag"), None, "AGREED").verify(),
            Err(EdrStateError::Inconsistent {
                asset_id: "a1".to_string()
            })
        );
        // even if the connector claims NEGOTIATED
        assert!(matches!(
            entry(Some("ag"), Some(" "), "NEGOTIATED").verify(),
            Err(EdrStateError::Inconsistent { .. })
        ));
    }

    #[test]
    fn test_verify_not_negotiated() {
        let err = entry(None, Some("tp"), "REQUESTED").verify().unwrap_err();
        assert!(err.to_string().contains("'REQUESTED'"));
    }

    #[test]
    fn test_data_address_accepts_namespaced_keys() {
        let address: EdrDataAddress = serde_json::from_value(json!({
            "https://w3id.org/edc/v0.0.1/ns/authorization": "token",
            "https://w3id.org/edc/v0.0.1/ns/endpoint": "https://p.example/data",
            "tx-auth:refreshToken": "refresh",
            "tx-auth:refreshEndpoint": "https://p.example/token",
            "tx-auth:expiresIn": "300"
        }))
        .unwrap();

        let token = EdrToken::new(&entry(Some("ag"), Some("tp"), "NEGOTIATED"), "tp", address);
        assert_eq!(token.endpoint, "https://p.example/data");
        assert_eq!(token.expires_in, Some(300));
        assert!(token.can_refresh());
        assert!(token.is_negotiated());
        assert_eq!(token.entry().agreement_id.as_deref(), Some("ag"));
        assert_eq!(token.entry().verify(), Ok("tp"));
    }

    #[test]
    fn test_entry_accepts_prefixed_keys() {
        let entry: EdrEntry = serde_json::from_value(json!({
            "tx:agreementId": "ag",
            "tx:transferProcessId": "tp",
            "edc:assetId": "a1",
            "tx:edrState": "negotiated"
        }))
        .unwrap();
        assert_eq!(entry.edr_state, NegotiationState::Negotiated);
        assert_eq!(entry.verify(), Ok("tp"));
    }
}
