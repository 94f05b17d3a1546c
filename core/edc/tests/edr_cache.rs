use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use dsx_edc::testing::{data_address, edr_entry, FakeConnector};
use dsx_edc::{ContractNegotiationOrchestrator, EdrNegotiation, EdrTokenCache, MemoryRecordStore, NegotiationConfig};
use dsx_model::{ActionRequest, EdrToken, Offer};

fn cache(connector: Arc<FakeConnector>) -> Arc<EdrTokenCache> {
    let _ = env_logger::builder().is_test(true).try_init();
    let orchestrator = Arc::new(ContractNegotiationOrchestrator::new(
        connector.clone(),
        Arc::new(MemoryRecordStore::new()),
        &NegotiationConfig::default(),
    ));
    Arc::new(EdrTokenCache::new(connector, orchestrator, Duration::from_secs(5)))
}

fn publishing(connector: FakeConnector, offer_id: &str, asset_id: &str) -> FakeConnector {
    connector
        .with_negotiation(offer_id, &["NEGOTIATED"])
        .with_edr_after_negotiation(
            offer_id,
            edr_entry(Some("ag"), Some(&format!("tp-{}", asset_id)), asset_id, "NEGOTIATED"),
            Some(data_address("https://p.example/data", "secret")),
        )
}

async fn verify_or_create(cache: Arc<EdrTokenCache>, offer: Offer) -> Result<EdrToken, String> {
    let action = ActionRequest::default();
    let properties = HashMap::new();
    let negotiation = EdrNegotiation {
        process_id: "p1",
        connector_id: "BPNL000000000001",
        recipient_url: "https://p.example/api/v1/dsp",
        action: &action,
        extensible_properties: &properties,
    };
    cache
        .verify_or_create(&negotiation, &offer)
        .await
        .map_err(|e| e.to_string())
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_share_one_negotiation() {
    let connector = Arc::new(publishing(FakeConnector::new(), "o1", "a1"));
    let cache = cache(connector.clone());

    let handles = (0..5)
        .map(|_| tokio::spawn(verify_or_create(cache.clone(), Offer::new("o1", "a1"))))
        .collect::<Vec<_>>();
    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.transfer_process_id, "tp-a1");
    }

    assert_eq!(connector.initiated().len(), 1);
    // one miss before and one lookup after the negotiation, the rest is served from cache
    assert_eq!(connector.edr_lookups(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_different_assets_negotiate_in_parallel() {
    let connector = FakeConnector::new().with_initiate_delay(Duration::from_secs(10));
    let connector = publishing(publishing(connector, "o1", "a1"), "o2", "a2");
    let connector = Arc::new(connector);
    let cache = cache(connector.clone());
    let started = Instant::now();

    let first = tokio::spawn(verify_or_create(cache.clone(), Offer::new("o1", "a1")));
    let second = tokio::spawn(verify_or_create(cache.clone(), Offer::new("o2", "a2")));
    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());

    // 10s initiate delay and one 3s poll, not twice that
    assert_eq!(started.elapsed(), Duration::from_secs(13));
    assert_eq!(connector.initiated().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_negotiation_is_not_cached() {
    let connector = Arc::new(FakeConnector::new().with_negotiation("o1", &["TERMINATED"]));
    let cache = cache(connector.clone());

    let err = verify_or_create(cache.clone(), Offer::new("o1", "a1")).await.unwrap_err();
    assert!(err.contains("TERMINATED"));
    assert!(cache
        .get_token("BPNL000000000001", &Offer::new("o1", "a1"))
        .await
        .unwrap()
        .is_none());

    verify_or_create(cache, Offer::new("o1", "a1")).await.unwrap_err();
    assert_eq!(connector.initiated().len(), 2);
}

#[tokio::test]
async fn test_existing_edr_skips_negotiation() {
    let connector = Arc::new(FakeConnector::new().with_edr(
        edr_entry(Some("ag"), Some("tp"), "a1", "NEGOTIATED"),
        Some(data_address("https://p.example/data", "secret")),
    ));
    let cache = cache(connector.clone());

    let token = verify_or_create(cache, Offer::new("o1", "a1")).await.unwrap();

    assert_eq!(token.endpoint, "https://p.example/data");
    assert!(connector.initiated().is_empty());
}
