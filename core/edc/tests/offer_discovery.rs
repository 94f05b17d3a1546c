use serde_json::{json, Value};
use std::sync::Arc;

use dsx_edc::testing::{data_address, edr_entry, FakeConnector, FakeDiscovery, FakeTwinLookup};
use dsx_edc::{
    ContractNegotiationOrchestrator, DiscoveryError, EdcConfig, MemoryRecordStore, OfferDiscoveryService,
};
use dsx_model::Offer;

const P1_DSP: &str = "https://p1.example/api/v1/dsp";

fn p1_catalog() -> Value {
    json!({
        "dspace:participantId": "BPNL1",
        "dcat:dataset": [
            {
                "@id": "dtr-asset",
                "dct:type": {"@id": "data.core.digitalTwinRegistry"},
                "odrl:hasPolicy": {"@id": "dtr-offer"}
            },
            {
                "@id": "a1",
                "odrl:hasPolicy": [{"@id": "o1"}, {"@id": "o1-alt"}]
            },
            {
                "@id": "a2",
                "odrl:hasPolicy": {"@id": "o2"}
            }
        ]
    })
}

fn p1_connector() -> FakeConnector {
    FakeConnector::new()
        .with_catalog(P1_DSP, p1_catalog())
        .with_negotiation("dtr-offer", &["NEGOTIATED"])
        .with_edr_after_negotiation(
            "dtr-offer",
            edr_entry(Some("ag"), Some("tp-dtr"), "dtr-asset", "NEGOTIATED"),
            Some(data_address("https://p1.example/dtr", "dtr-secret")),
        )
}

fn service(
    connector: Arc<FakeConnector>,
    discovery: Arc<FakeDiscovery>,
    twins: Arc<FakeTwinLookup>,
    with_bpn_discovery: bool,
) -> OfferDiscoveryService {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = EdcConfig::from_env().unwrap();
    let orchestrator = Arc::new(ContractNegotiationOrchestrator::new(
        connector.clone(),
        Arc::new(MemoryRecordStore::new()),
        &config.negotiation,
    ));
    let bpn_discovery: Option<Arc<dyn dsx_client::BpnDiscovery>> = if with_bpn_discovery {
        Some(discovery.clone())
    } else {
        None
    };
    OfferDiscoveryService::new(config, connector, orchestrator, bpn_discovery, discovery, twins)
}

#[tokio::test(start_paused = true)]
async fn test_discovers_offers_of_twin_asset() {
    let connector = Arc::new(p1_connector());
    let discovery = Arc::new(
        FakeDiscovery::new()
            .with_partner("M1", "BPNL1", &["https://p1.example"])
            .with_partner("M1", "BPNL2", &["https://p2.example"]),
    );
    let twins = Arc::new(FakeTwinLookup::new().with_target(
        "https://p1.example/dtr",
        "M1",
        "a1",
        "https://p1.example/",
    ));

    let offers = service(connector.clone(), discovery, twins.clone(), true)
        .discover(None, "M1", "SerialPart", 0, 10)
        .await
        .unwrap();

    let expected = |offer_id: &str| Offer::new(offer_id, "a1").with_connector("BPNL1", P1_DSP);
    assert_eq!(offers.len(), 2);
    assert_eq!(offers[0].asset_id, "a1");
    assert_eq!(
        offers
            .iter()
            .map(|o| Offer { policy: None, ..o.clone() })
            .collect::<Vec<_>>(),
        vec![expected("o1"), expected("o1-alt")]
    );
    assert_eq!(twins.tokens(), vec!["dtr-secret".to_string()]);

    // registry lookup, then the asset query bound to the found asset id
    let requests = connector
        .catalog_requests()
        .into_iter()
        .filter(|r| r.provider_url == P1_DSP)
        .map(|r| (r.query_spec.filter_expression[0].operand_right.clone(), r.query_spec.limit))
        .collect::<Vec<_>>();
    assert_eq!(
        requests,
        vec![
            ("data.core.digitalTwinRegistry".to_string(), 100),
            ("a1".to_string(), 10)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_given_bpn_skips_bpn_discovery() {
    let connector = Arc::new(p1_connector());
    let discovery = Arc::new(FakeDiscovery::new().with_partner("other", "BPNL1", &["https://p1.example"]));
    let twins = Arc::new(FakeTwinLookup::new().with_target(
        "https://p1.example/dtr",
        "M1",
        "a2",
        P1_DSP,
    ));

    let offers = service(connector, discovery, twins, false)
        .discover(Some("BPNL1"), "M1", "SerialPart", 0, 10)
        .await
        .unwrap();

    assert_eq!(
        offers.iter().map(|o| o.offer_id.as_str()).collect::<Vec<_>>(),
        vec!["o2"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_part_without_twin_has_no_offers() {
    let connector = Arc::new(p1_connector());
    let discovery = Arc::new(FakeDiscovery::new().with_partner("M1", "BPNL1", &["https://p1.example"]));

    let offers = service(connector, discovery, Arc::new(FakeTwinLookup::new()), true)
        .discover(None, "M1", "SerialPart", 0, 10)
        .await
        .unwrap();

    assert!(offers.is_empty());
}

#[tokio::test]
async fn test_missing_bpn_without_discovery_is_an_error() {
    let result = service(
        Arc::new(FakeConnector::new()),
        Arc::new(FakeDiscovery::new()),
        Arc::new(FakeTwinLookup::new()),
        false,
    )
    .discover(None, "M1", "SerialPart", 0, 10)
    .await;

    assert!(matches!(result, Err(DiscoveryError::NoBpnDiscovery)));
}

fn registry_dataset(asset_id: &str, offer_id: &str) -> Value {
    json!({
        "@id": asset_id,
        "dct:type": {"@id": "data.core.digitalTwinRegistry"},
        "odrl:hasPolicy": {"@id": offer_id}
    })
}

#[tokio::test(start_paused = true)]
async fn test_failing_connector_does_not_hide_other_connectors() {
    let p0_dsp = "https://p0.example/api/v1/dsp";
    let connector = Arc::new(
        p1_connector()
            .with_catalog(
                p0_dsp,
                json!({
                    "dspace:participantId": "BPNL1",
                    "dcat:dataset": [registry_dataset("dtr-asset-0", "dtr-offer-0")]
                }),
            )
            .with_negotiation("dtr-offer-0", &["TERMINATED"]),
    );
    let discovery = Arc::new(FakeDiscovery::new().with_partner(
        "M1",
        "BPNL1",
        &["https://p0.example", "https://p1.example"],
    ));
    let twins = Arc::new(FakeTwinLookup::new().with_target(
        "https://p1.example/dtr",
        "M1",
        "a1",
        P1_DSP,
    ));

    let offers = service(connector, discovery, twins, true)
        .discover(None, "M1", "SerialPart", 0, 10)
        .await
        .unwrap();

    assert_eq!(
        offers.iter().map(|o| o.offer_id.as_str()).collect::<Vec<_>>(),
        vec!["o1", "o1-alt"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failing_registry_offer_falls_through_to_next_one() {
    let mut catalog = p1_catalog();
    if let Some(Value::Array(datasets)) = catalog.get_mut("dcat:dataset") {
        datasets.insert(0, registry_dataset("dtr-asset-bad", "dtr-offer-bad"));
    }
    let connector = Arc::new(
        p1_connector()
            .with_catalog(P1_DSP, catalog)
            .with_failing_negotiation("dtr-offer-bad", "policy rejected"),
    );
    let discovery = Arc::new(FakeDiscovery::new().with_partner("M1", "BPNL1", &["https://p1.example"]));
    let twins = Arc::new(FakeTwinLookup::new().with_target(
        "https://p1.example/dtr",
        "M1",
        "a2",
        P1_DSP,
    ));

    let offers = service(connector.clone(), discovery, twins.clone(), true)
        .discover(None, "M1", "SerialPart", 0, 10)
        .await
        .unwrap();

    assert_eq!(
        offers.iter().map(|o| o.offer_id.as_str()).collect::<Vec<_>>(),
        vec!["o2"]
    );
    assert_eq!(twins.tokens(), vec!["dtr-secret".to_string()]);
    assert_eq!(
        connector
            .initiated()
            .iter()
            .map(|r| r.offer_id.as_str())
            .collect::<Vec<_>>(),
        vec!["dtr-offer-bad", "dtr-offer"]
    );
}
