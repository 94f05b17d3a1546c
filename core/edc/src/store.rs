use async_trait::async_trait;
use std::sync::Mutex;

use dsx_model::ContractNegotiationRecord;
use dsx_persistence::{ContractNegotiationDao, DbError, DbExecutor};

/// Append-only sink of negotiation records.
#[async_trait]
pub trait NegotiationRecordStore: Send + Sync {
    async fn insert(&self, record: ContractNegotiationRecord) -> Result<(), DbError>;

    async fn list_by_process(&self, process_id: &str) -> Result<Vec<ContractNegotiationRecord>, DbError>;
}

#[async_trait]
impl NegotiationRecordStore for DbExecutor {
    async fn insert(&self, record: ContractNegotiationRecord) -> Result<(), DbError> {
        self.as_dao::<ContractNegotiationDao>().insert(record).await
    }

    async fn list_by_process(&self, process_id: &str) -> Result<Vec<ContractNegotiationRecord>, DbError> {
        self.as_dao::<ContractNegotiationDao>()
            .list_by_process(process_id)
            .await
    }
}

/// Store keeping records in memory, for one-shot runs and tests.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<ContractNegotiationRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> MemoryRecordStore {
        MemoryRecordStore::default()
    }

    pub fn records(&self) -> Vec<ContractNegotiationRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl NegotiationRecordStore for MemoryRecordStore {
    async fn insert(&self, record: ContractNegotiationRecord) -> Result<(), DbError> {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
        Ok(())
    }

    async fn list_by_process(&self, process_id: &str) -> Result<Vec<ContractNegotiationRecord>, DbError> {
        Ok(self
            .records()
            .into_iter()
            .filter(|record| record.process_id == process_id)
            .collect())
    }
}
