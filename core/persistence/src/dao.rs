use diesel::prelude::*;
use std::convert::TryFrom;

use dsx_model::ContractNegotiationRecord;

use crate::error::Result;
use crate::executor::{do_with_transaction, readonly_transaction, AsDao, PoolType};
use crate::models::ContractNegotiationInfo;
use crate::schema::contract_negotiation_info::dsl;

pub struct ContractNegotiationDao<'c> {
    pool: &'c PoolType,
}

impl<'c> AsDao<'c> for ContractNegotiationDao<'c> {
    fn as_dao(pool: &'c PoolType) -> Self {
        ContractNegotiationDao { pool }
    }
}

impl<'c> ContractNegotiationDao<'c> {
    pub async fn insert(&self, record: ContractNegotiationRecord) -> Result<()> {
        let info = ContractNegotiationInfo::from(record);
        do_with_transaction(self.pool, "negotiation_dao_insert", move |conn| {
            diesel::insert_into(dsl::contract_negotiation_info)
                .values(&info)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    pub async fn list_by_process(&self, process_id: &str) -> Result<Vec<ContractNegotiationRecord>> {
        let process_id = process_id.to_owned();
        readonly_transaction(self.pool, "negotiation_dao_list_by_process", move |conn| {
            let infos: Vec<ContractNegotiationInfo> = dsl::contract_negotiation_info
                .filter(dsl::process_id.eq(&process_id))
                .order((dsl::created_ts.asc(), dsl::id.asc()))
                .load(conn)?;
            infos.into_iter().map(ContractNegotiationRecord::try_from).collect()
        })
        .await
    }

    pub async fn list_all(&self) -> Result<Vec<ContractNegotiationRecord>> {
        readonly_transaction(self.pool, "negotiation_dao_list_all", move |conn| {
            let infos: Vec<ContractNegotiationInfo> = dsl::contract_negotiation_info
                .order((dsl::created_ts.asc(), dsl::id.asc()))
                .load(conn)?;
            infos.into_iter().map(ContractNegotiationRecord::try_from).collect()
        })
        .await
    }
}
