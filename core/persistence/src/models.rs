use chrono::NaiveDateTime;
use std::convert::TryFrom;
use std::str::FromStr;

use dsx_model::{ContractNegotiationRecord, NegotiationStatus};

use crate::error::DbError;
use crate::schema::contract_negotiation_info;

#[derive(Clone, Debug, Queryable, Insertable)]
#[table_name = "contract_negotiation_info"]
pub struct ContractNegotiationInfo {
    pub id: String,
    pub process_id: String,
    pub connector_id: String,
    pub offer_id: String,
    pub contract_negotiation_id: Option<String>,
    pub status: String,
    pub remote_state: Option<String>,
    pub error: Option<String>,
    pub created_ts: NaiveDateTime,
}

impl From<ContractNegotiationRecord> for ContractNegotiationInfo {
    fn from(record: ContractNegotiationRecord) -> Self {
        ContractNegotiationInfo {
            id: record.id,
            process_id: record.process_id,
            connector_id: record.connector_id,
            offer_id: record.offer_id,
            contract_negotiation_id: record.contract_negotiation_id,
            status: record.status.to_string(),
            remote_state: record.remote_state,
            error: record.error,
            created_ts: record.timestamp,
        }
    }
}

impl TryFrom<ContractNegotiationInfo> for ContractNegotiationRecord {
    type Error = DbError;

    fn try_from(info: ContractNegotiationInfo) -> Result<Self, Self::Error> {
        let status = NegotiationStatus::from_str(&info.status).map_err(|e| DbError::Corrupted {
            id: info.id.clone(),
            msg: format!("status '{}': {}", info.status, e),
        })?;

        Ok(ContractNegotiationRecord {
            id: info.id,
            process_id: info.process_id,
            connector_id: info.connector_id,
            offer_id: info.offer_id,
            contract_negotiation_id: info.contract_negotiation_id,
            status,
            remote_state: info.remote_state,
            error: info.error,
            timestamp: info.created_ts,
        })
    }
}
