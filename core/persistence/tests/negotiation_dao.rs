use chrono::{Duration, NaiveDateTime, Utc};
use tempdir::TempDir;
use test_case::test_case;

use dsx_model::{ContractNegotiationRecord, NegotiationStatus};
use dsx_persistence::{ContractNegotiationDao, DbExecutor};

fn init_db(dir: &TempDir) -> DbExecutor {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = DbExecutor::from_data_dir(dir.path(), "negotiations").unwrap();
    db.apply_migration().unwrap();
    db
}

fn record(id: &str, process_id: &str, status: NegotiationStatus, ts: NaiveDateTime) -> ContractNegotiationRecord {
    ContractNegotiationRecord {
        id: id.to_string(),
        process_id: process_id.to_string(),
        connector_id: "BPNL000000000001".to_string(),
        offer_id: format!("offer-{}", id),
        contract_negotiation_id: Some(format!("neg-{}", id)),
        status,
        remote_state: Some("NEGOTIATED".to_string()),
        error: None,
        timestamp: ts,
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[test_case(NegotiationStatus::Pending)]
#[test_case(NegotiationStatus::Negotiated)]
#[test_case(NegotiationStatus::Terminated)]
#[test_case(NegotiationStatus::FailedTimeout)]
#[test_case(NegotiationStatus::FailedException)]
#[tokio::test]
async fn test_every_status_is_stored(status: NegotiationStatus) {
    let dir = TempDir::new("dsx-db").unwrap();
    let db = init_db(&dir);
    let dao = db.as_dao::<ContractNegotiationDao>();

    let mut inserted = record("r1", "p1", status, now());
    inserted.contract_negotiation_id = None;
    inserted.error = Some("boom".to_string());
    dao.insert(inserted.clone()).await.unwrap();

    assert_eq!(dao.list_by_process("p1").await.unwrap(), vec![inserted]);
}

#[tokio::test]
async fn test_records_are_grouped_by_process() {
    let dir = TempDir::new("dsx-db").unwrap();
    let db = init_db(&dir);
    let dao = db.as_dao::<ContractNegotiationDao>();
    let ts = now();

    dao.insert(record("r2", "p1", NegotiationStatus::FailedTimeout, ts + Duration::seconds(1)))
        .await
        .unwrap();
    dao.insert(record("r1", "p1", NegotiationStatus::Negotiated, ts))
        .await
        .unwrap();
    dao.insert(record("r3", "p2", NegotiationStatus::Negotiated, ts))
        .await
        .unwrap();

    let p1 = dao.list_by_process("p1").await.unwrap();
    assert_eq!(
        p1.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["r1", "r2"]
    );
    assert!(dao.list_by_process("unknown").await.unwrap().is_empty());
    assert_eq!(dao.list_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_duplicate_id_is_rejected() {
    let dir = TempDir::new("dsx-db").unwrap();
    let db = init_db(&dir);
    let dao = db.as_dao::<ContractNegotiationDao>();

    dao.insert(record("r1", "p1", NegotiationStatus::Negotiated, now()))
        .await
        .unwrap();
    assert!(dao
        .insert(record("r1", "p1", NegotiationStatus::Terminated, now()))
        .await
        .is_err());
    assert_eq!(dao.list_all().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts() {
    let dir = TempDir::new("dsx-db").unwrap();
    let db = init_db(&dir);

    let tasks = (0..20)
        .map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                db.as_dao::<ContractNegotiationDao>()
                    .insert(record(&format!("r{}", i), "p1", NegotiationStatus::Negotiated, now()))
                    .await
            })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(
        db.as_dao::<ContractNegotiationDao>()
            .list_by_process("p1")
            .await
            .unwrap()
            .len(),
        20
    );
}
