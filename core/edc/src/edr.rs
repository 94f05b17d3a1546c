//! Access credentials (EDR) of negotiated assets.
//!
//! [`EdrTokenCache`] lives for one request or batch. It keeps at most one token
//! per (partner, asset) pair and lets only one task at a time resolve a given
//! pair; tasks working on different pairs never wait for each other.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use dsx_client::{ConnectorApi, NegotiationKind, NegotiationRequest};
use dsx_model::{ActionRequest, EdrEntry, EdrToken, NegotiationState, NegotiationStatus, Offer};

use crate::error::EdrError;
use crate::negotiation::ContractNegotiationOrchestrator;
use crate::utils::KeyLock;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EdrKey {
    pub partner_id: String,
    pub asset_id: String,
}

impl EdrKey {
    pub fn new(partner_id: &str, asset_id: &str) -> EdrKey {
        EdrKey {
            partner_id: partner_id.to_string(),
            asset_id: asset_id.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
struct CachedEdr {
    token: EdrToken,
    expires_at: Option<Instant>,
}

impl CachedEdr {
    fn new(token: EdrToken, margin: Duration) -> CachedEdr {
        let expires_at = token
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs).saturating_sub(margin));
        CachedEdr { token, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

/// What is needed to start a new EDR negotiation for an offer.
#[derive(Clone, Debug)]
pub struct EdrNegotiation<'a> {
    pub process_id: &'a str,
    pub connector_id: &'a str,
    pub recipient_url: &'a str,
    pub action: &'a ActionRequest,
    pub extensible_properties: &'a HashMap<String, String>,
}

pub struct EdrTokenCache {
    connector: Arc<dyn ConnectorApi>,
    orchestrator: Arc<ContractNegotiationOrchestrator>,
    slots: KeyLock<EdrKey, CachedEdr>,
    expiry_margin: Duration,
}

impl EdrTokenCache {
    pub fn new(
        connector: Arc<dyn ConnectorApi>,
        orchestrator: Arc<ContractNegotiationOrchestrator>,
        expiry_margin: Duration,
    ) -> EdrTokenCache {
        EdrTokenCache {
            connector,
            orchestrator,
            slots: KeyLock::new(),
            expiry_margin,
        }
    }

    /// Cached or connector known token for the pair.
    ///
    /// `Ok(None)` means that no EDR exists (or its negotiation was terminated);
    /// an EDR still on its way is reported as [`EdrError::NotReady`].
    pub async fn get_token(&self, partner_id: &str, offer: &Offer) -> Result<Option<EdrToken>, EdrError> {
        let key = EdrKey::new(partner_id, &offer.asset_id);
        let slot = self.slots.get_slot(&key).await;
        let mut slot = slot.lock().await;

        if let Some(token) = self.usable(&key, &mut slot).await {
            return Ok(Some(token));
        }
        let token = self.lookup_token(&offer.asset_id).await?;
        if let Some(token) = &token {
            *slot = Some(CachedEdr::new(token.clone(), self.expiry_margin));
        }
        Ok(token)
    }

    /// Returns a usable token, negotiating a new EDR when the connector has none.
    ///
    /// Concurrent calls for the same pair share a single negotiation.
    pub async fn verify_or_create(
        &self,
        negotiation: &EdrNegotiation<'_>,
        offer: &Offer,
    ) -> Result<EdrToken, EdrError> {
        let key = EdrKey::new(negotiation.connector_id, &offer.asset_id);
        let slot = self.slots.get_slot(&key).await;
        let mut slot = slot.lock().await;

        if let Some(token) = self.usable(&key, &mut slot).await {
            log::debug!("Using cached EDR of asset [{}].", key.asset_id);
            return Ok(token);
        }

        let token = match self.lookup_token(&offer.asset_id).await? {
            Some(token) => token,
            None => self.negotiate(negotiation, offer).await?,
        };
        *slot = Some(CachedEdr::new(token.clone(), self.expiry_margin));
        Ok(token)
    }

    /// Resolves token of the newest EDR the connector has for the asset,
    /// bypassing the cache.
    pub async fn lookup_token(&self, asset_id: &str) -> Result<Option<EdrToken>, EdrError> {
        let entry = match newest(self.connector.lookup_edrs(asset_id).await?) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if entry.edr_state == NegotiationState::Terminated {
            log::info!("EDR of asset [{}] was terminated.", asset_id);
            return Ok(None);
        }

        let transfer_process_id = entry.verify()?;
        match self.connector.edr_data_address(transfer_process_id).await? {
            Some(address) => Ok(Some(EdrToken::new(&entry, transfer_process_id, address))),
            None => Err(EdrError::NotReady {
                asset_id: asset_id.to_string(),
                state: entry.edr_state.clone(),
            }),
        }
    }

    async fn negotiate(&self, negotiation: &EdrNegotiation<'_>, offer: &Offer) -> Result<EdrToken, EdrError> {
        let request = NegotiationRequest {
            kind: NegotiationKind::Edr,
            provider_url: negotiation.recipient_url.to_string(),
            connector_id: negotiation.connector_id.to_string(),
            offer_id: offer.offer_id.clone(),
            asset_id: offer.asset_id.clone(),
            action: negotiation.action.clone(),
            extensible_properties: negotiation.extensible_properties.clone(),
        };
        let record = self.orchestrator.negotiate(negotiation.process_id, &request).await;
        if record.status != NegotiationStatus::Negotiated {
            return Err(EdrError::Negotiation {
                offer_id: offer.offer_id.clone(),
                status: record.status,
                reason: record.error.unwrap_or_default(),
            });
        }

        self.lookup_token(&offer.asset_id)
            .await?
            .ok_or_else(|| EdrError::NotReady {
                asset_id: offer.asset_id.clone(),
                state: NegotiationState::Negotiated,
            })
    }

    /// Cached token if still valid; expired tokens are refreshed when possible,
    /// otherwise dropped from the slot.
    async fn usable(&self, key: &EdrKey, slot: &mut Option<CachedEdr>) -> Option<EdrToken> {
        let cached = slot.take()?;
        if !cached.is_expired() {
            let token = cached.token.clone();
            *slot = Some(cached);
            return Some(token);
        }

        if !cached.token.can_refresh() {
            log::debug!("EDR of asset [{}] expired, discarding.", key.asset_id);
            return None;
        }
        match self
            .connector
            .refresh_edr(&cached.token.transfer_process_id)
            .await
        {
            Ok(address) => {
                log::debug!("Refreshed EDR of asset [{}].", key.asset_id);
                let token = cached.token.refreshed(address);
                *slot = Some(CachedEdr::new(token.clone(), self.expiry_margin));
                Some(token)
            }
            Err(e) => {
                log::warn!(
                    "Unable to refresh EDR of asset [{}], discarding: {}",
                    key.asset_id,
                    e
                );
                None
            }
        }
    }
}

fn newest(entries: Vec<EdrEntry>) -> Option<EdrEntry> {
    entries
        .into_iter()
        .max_by_key(|entry| entry.created_at.unwrap_or(i64::MIN))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::NegotiationConfig;
    use crate::store::MemoryRecordStore;
    use crate::testing::{data_address, edr_entry, FakeConnector};

    fn cache(connector: Arc<FakeConnector>) -> EdrTokenCache {
        let orchestrator = Arc::new(ContractNegotiationOrchestrator::new(
            connector.clone(),
            Arc::new(MemoryRecordStore::new()),
            &NegotiationConfig::default(),
        ));
        EdrTokenCache::new(connector, orchestrator, Duration::from_secs(5))
    }

    #[test]
    fn test_newest_entry_wins() {
        let mut old = edr_entry(Some("ag"), Some("tp-old"), "a1", "NEGOTIATED");
        old.created_at = Some(1);
        let mut new = edr_entry(Some("ag"), Some("tp-new"), "a1", "NEGOTIATED");
        new.created_at = Some(2);

        let picked = newest(vec![new, old]).unwrap();
        assert_eq!(picked.transfer_process_id.as_deref(), Some("tp-new"));
        assert!(newest(vec![]).is_none());
    }

    #[tokio::test]
    async fn test_terminated_entry_is_absent() {
        let connector = Arc::new(FakeConnector::new().with_edr(
            edr_entry(Some("ag"), Some("tp"), "a1", "TERMINATED"),
            Some(data_address("https://p.example/data", "token")),
        ));
        let token = cache(connector)
            .get_token("BPNL000000000001", &Offer::new("o1", "a1"))
            .await
            .unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_not_negotiated_entry_is_not_ready() {
        let connector = Arc::new(
            FakeConnector::new().with_edr(edr_entry(None, Some("tp"), "a1", "REQUESTED"), None),
        );
        let err = cache(connector)
            .get_token("BPNL000000000001", &Offer::new("o1", "a1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EdrError::NotReady { state: NegotiationState::Requested, .. }));
    }

    #[tokio::test]
    async fn test_missing_data_address_is_not_ready() {
        let connector = Arc::new(
            FakeConnector::new().with_edr(edr_entry(Some("ag"), Some("tp"), "a1", "NEGOTIATED"), None),
        );
        let err = cache(connector)
            .get_token("BPNL000000000001", &Offer::new("o1", "a1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EdrError::NotReady { .. }));
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let connector = Arc::new(FakeConnector::new().with_edr(
            edr_entry(Some("ag"), Some("tp"), "a1", "NEGOTIATED"),
            Some(data_address("https://p.example/data", "token")),
        ));
        let cache = cache(connector.clone());
        let offer = Offer::new("o1", "a1");

        let first = cache.get_token("BPNL1", &offer).await.unwrap().unwrap();
        let second = cache.get_token("BPNL1", &offer).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(connector.edr_lookups(), 1);

        // other partner is another key
        cache.get_token("BPNL2", &offer).await.unwrap();
        assert_eq!(connector.edr_lookups(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_is_refreshed() {
        let mut address = data_address("https://p.example/data", "token-1");
        address.refresh_token = Some("refresh".into());
        address.refresh_endpoint = Some("https://p.example/token".into());
        address.expires_in = Some("60".into());

        let mut refreshed = data_address("https://p.example/data", "token-2");
        refreshed.expires_in = Some("60".into());

        let connector = Arc::new(
            FakeConnector::new()
                .with_edr(edr_entry(Some("ag"), Some("tp"), "a1", "NEGOTIATED"), Some(address))
                .with_refresh("tp", refreshed),
        );
        let cache = cache(connector.clone());
        let offer = Offer::new("o1", "a1");

        let first = cache.get_token("BPNL1", &offer).await.unwrap().unwrap();
        assert_eq!(first.authorization, "token-1");

        // still valid 50s later, expired past 55s because of the margin
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(
            cache.get_token("BPNL1", &offer).await.unwrap().unwrap().authorization,
            "token-1"
        );
        tokio::time::advance(Duration::from_secs(6)).await;
        let second = cache.get_token("BPNL1", &offer).await.unwrap().unwrap();

        assert_eq!(second.authorization, "token-2");
        assert_eq!(second.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(connector.refreshes(), 1);
        assert_eq!(connector.edr_lookups(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_without_refresh_is_resolved_again() {
        let mut address = data_address("https://p.example/data", "token-1");
        address.expires_in = Some("10".into());
        let connector = Arc::new(FakeConnector::new().with_edr(
            edr_entry(Some("ag"), Some("tp"), "a1", "NEGOTIATED"),
            Some(address),
        ));
        let cache = cache(connector.clone());
        let offer = Offer::new("o1", "a1");

        cache.get_token("BPNL1", &offer).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        cache.get_token("BPNL1", &offer).await.unwrap();

        assert_eq!(connector.refreshes(), 0);
        assert_eq!(connector.edr_lookups(), 2);
    }
}
