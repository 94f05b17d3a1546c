//! Drives remote contract negotiations to a terminal state.
//!
//! Every call to [`ContractNegotiationOrchestrator::negotiate`] persists exactly
//! one [`ContractNegotiationRecord`]: on success, on timeout, on a transport
//! error, and also when the negotiating future is dropped or panics mid-poll.
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use dsx_client::{ApiError, ConnectorApi, NegotiationRequest};
use dsx_model::{ContractNegotiationRecord, NegotiationState, NegotiationStatus};

use crate::config::NegotiationConfig;
use crate::store::NegotiationRecordStore;

pub struct ContractNegotiationOrchestrator {
    connector: Arc<dyn ConnectorApi>,
    store: Arc<dyn NegotiationRecordStore>,
    poll_interval: Duration,
    max_checks: u32,
}

impl ContractNegotiationOrchestrator {
    pub fn new(
        connector: Arc<dyn ConnectorApi>,
        store: Arc<dyn NegotiationRecordStore>,
        config: &NegotiationConfig,
    ) -> ContractNegotiationOrchestrator {
        ContractNegotiationOrchestrator {
            connector,
            store,
            poll_interval: config.poll_interval,
            max_checks: config.max_checks.max(1),
        }
    }

    /// Submits negotiation and polls its state until it is `NEGOTIATED` or
    /// `TERMINATED`, or the check budget is used up.
    ///
    /// Never fails: the outcome is expressed by the status of the returned
    /// record, which is already persisted.
    pub async fn negotiate(&self, process_id: &str, request: &NegotiationRequest) -> ContractNegotiationRecord {
        let mut attempt = PendingAttempt::new(self.store.clone(), process_id, request);

        let outcome = self.drive(request, &mut attempt).await;
        let (status, error) = match &outcome {
            Ok((state, checks)) => match NegotiationStatus::from_final_state(state) {
                NegotiationStatus::Negotiated => (NegotiationStatus::Negotiated, None),
                NegotiationStatus::Terminated => (
                    NegotiationStatus::Terminated,
                    Some("negotiation was terminated by the provider".to_string()),
                ),
                status => (
                    status,
                    Some(format!(
                        "negotiation timeout after {} checks, the last status is '{}'",
                        checks, state
                    )),
                ),
            },
            Err(e) => (NegotiationStatus::FailedException, Some(e.to_string())),
        };

        let record = attempt.finish(status, error);
        match &record.error {
            None => log::info!(
                "Negotiation [{}] of offer [{}] for asset [{}] finished with {}.",
                record.contract_negotiation_id.as_deref().unwrap_or("-"),
                request.offer_id,
                request.asset_id,
                record.status
            ),
            Some(error) => log::warn!(
                "Negotiation [{}] of offer [{}] for asset [{}] finished with {}: {}",
                record.contract_negotiation_id.as_deref().unwrap_or("-"),
                request.offer_id,
                request.asset_id,
                record.status,
                error
            ),
        }

        if let Err(e) = self.store.insert(record.clone()).await {
            log::error!("Failed to save negotiation record [{}]: {}", record.id, e);
        }
        record
    }

    async fn drive(
        &self,
        request: &NegotiationRequest,
        attempt: &mut PendingAttempt,
    ) -> Result<(NegotiationState, u32), ApiError> {
        let negotiation_id = self.connector.initiate_negotiation(request).await?;
        log::debug!(
            "Started {:?} negotiation [{}] of offer [{}] with [{}].",
            request.kind,
            negotiation_id,
            request.offer_id,
            request.provider_url
        );
        attempt.negotiation_id = Some(negotiation_id.clone());

        let mut checks = 0;
        loop {
            tokio::time::sleep(self.poll_interval).await;
            checks += 1;

            let state = self.connector.negotiation_state(&negotiation_id).await?;
            log::debug!(
                "Negotiation [{}] check {}/{}: {}",
                negotiation_id,
                checks,
                self.max_checks,
                state
            );
            attempt.last_state = Some(state.clone());

            if state.is_terminal() || checks >= self.max_checks {
                return Ok((state, checks));
            }
        }
    }
}

// =========================================== //
// Record of negotiation which didn't finish yet
// =========================================== //

/// Owns the bookkeeping of a single negotiation attempt.
///
/// If dropped before [`finish`](Self::finish), the attempt is persisted as
/// `PENDING` (future cancelled) or `Failed:Exception` (panic).
struct PendingAttempt {
    store: Arc<dyn NegotiationRecordStore>,
    record: ContractNegotiationRecord,
    negotiation_id: Option<String>,
    last_state: Option<NegotiationState>,
    armed: bool,
}

impl PendingAttempt {
    fn new(store: Arc<dyn NegotiationRecordStore>, process_id: &str, request: &NegotiationRequest) -> Self {
        PendingAttempt {
            store,
            record: ContractNegotiationRecord {
                id: uuid::Uuid::new_v4().to_string(),
                process_id: process_id.to_string(),
                connector_id: request.connector_id.clone(),
                offer_id: request.offer_id.clone(),
                contract_negotiation_id: None,
                status: NegotiationStatus::Pending,
                remote_state: None,
                error: None,
                timestamp: Utc::now().naive_utc(),
            },
            negotiation_id: None,
            last_state: None,
            armed: true,
        }
    }

    fn outcome(&self, status: NegotiationStatus, error: Option<String>) -> ContractNegotiationRecord {
        ContractNegotiationRecord {
            contract_negotiation_id: self.negotiation_id.clone(),
            remote_state: self.last_state.clone().map(String::from),
            status,
            error,
            timestamp: Utc::now().naive_utc(),
            ..self.record.clone()
        }
    }

    /// Disarms the guard, the caller becomes responsible for persisting.
    fn finish(mut self, status: NegotiationStatus, error: Option<String>) -> ContractNegotiationRecord {
        self.armed = false;
        self.outcome(status, error)
    }
}

impl Drop for PendingAttempt {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let (status, error) = if std::thread::panicking() {
            (NegotiationStatus::FailedException, "negotiation task panicked")
        } else {
            (NegotiationStatus::Pending, "negotiation aborted before reaching a terminal state")
        };
        let record = self.outcome(status, Some(error.to_string()));

        log::warn!(
            "Negotiation of offer [{}] interrupted, saving it as {}.",
            record.offer_id,
            record.status
        );
        let store = self.store.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.insert(record).await {
                        log::error!("Failed to save interrupted negotiation record: {}", e);
                    }
                });
            }
            Err(_) => log::error!(
                "No runtime to save interrupted negotiation record [{}].",
                record.id
            ),
        }
    }
}
