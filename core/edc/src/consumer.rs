//! Consumer side batch operations over the offers of one provider.
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

use dsx_client::{ConnectorApi, DataPlane, NegotiationKind, NegotiationRequest};
use dsx_model::{
    ActionRequest, BatchResult, ConsumerRequest, ContractNegotiationRecord, EdrToken, ItemResult, Offer,
};
use dsx_persistence::DbError;
use dsx_utils_futures::{ParallelBatchRunner, TaskFailure};

use crate::config::EdcConfig;
use crate::download::DataDownloadExecutor;
use crate::edr::{EdrNegotiation, EdrTokenCache};
use crate::error::EdrError;
use crate::negotiation::ContractNegotiationOrchestrator;
use crate::store::NegotiationRecordStore;

pub struct ConsumerService {
    config: EdcConfig,
    connector: Arc<dyn ConnectorApi>,
    orchestrator: Arc<ContractNegotiationOrchestrator>,
    store: Arc<dyn NegotiationRecordStore>,
    downloader: Arc<DataDownloadExecutor>,
    runner: ParallelBatchRunner,
}

impl ConsumerService {
    pub fn new(
        config: EdcConfig,
        connector: Arc<dyn ConnectorApi>,
        data_plane: Arc<dyn DataPlane>,
        store: Arc<dyn NegotiationRecordStore>,
    ) -> ConsumerService {
        let orchestrator = Arc::new(ContractNegotiationOrchestrator::new(
            connector.clone(),
            store.clone(),
            &config.negotiation,
        ));
        let runner = ParallelBatchRunner::new(config.batch_concurrency);
        ConsumerService {
            config,
            connector,
            orchestrator,
            store,
            downloader: Arc::new(DataDownloadExecutor::new(data_plane)),
            runner,
        }
    }

    pub fn orchestrator(&self) -> Arc<ContractNegotiationOrchestrator> {
        self.orchestrator.clone()
    }

    /// Starts contract negotiation of every offer and returns right away.
    ///
    /// Progress is observable through [`negotiation_status`](Self::negotiation_status);
    /// awaiting the handle yields the records once all negotiations are done.
    pub fn subscribe(&self, request: ConsumerRequest, process_id: &str) -> JoinHandle<Vec<ContractNegotiationRecord>> {
        let context = Arc::new(OfferContext::new(&self.config, &request, process_id));
        let orchestrator = self.orchestrator.clone();
        log::info!(
            "Subscribing to {} offers of [{}] in process [{}].",
            request.offers.len(),
            context.connector_id,
            process_id
        );

        let batch = self.runner.spawn(
            request.offers,
            |offer: &Offer| offer.offer_id.clone(),
            move |offer| {
                let orchestrator = orchestrator.clone();
                let context = context.clone();
                async move {
                    let request = context.negotiation_request(NegotiationKind::Contract, &offer);
                    orchestrator.negotiate(&context.process_id, &request).await
                }
            },
        );

        tokio::spawn(async move {
            match batch.await {
                Ok(results) => results
                    .into_iter()
                    .filter_map(|(offer_id, result)| match result {
                        Ok(record) => Some(record),
                        Err(e) => {
                            log::error!("Negotiation task of offer [{}] failed: {}", offer_id, e);
                            None
                        }
                    })
                    .collect(),
                Err(e) => {
                    log::error!("Subscription batch failed: {}", e);
                    vec![]
                }
            }
        })
    }

    /// Makes sure an EDR exists for every offer and optionally downloads the
    /// assets right away.
    ///
    /// The result holds exactly one entry per distinct asset id.
    pub async fn subscribe_and_download(&self, request: ConsumerRequest, download_now: bool) -> BatchResult {
        let process_id = uuid::Uuid::new_v4().to_string();
        let context = Arc::new(OfferContext::new(&self.config, &request, &process_id));
        let cache = Arc::new(self.new_cache());
        let downloader = self.downloader.clone();
        log::info!(
            "Processing {} offers of [{}] in process [{}], download: {}.",
            request.offers.len(),
            context.connector_id,
            process_id,
            download_now
        );

        let results = self
            .runner
            .run(
                request.offers,
                |offer: &Offer| offer.asset_id.clone(),
                move |offer| {
                    let context = context.clone();
                    let cache = cache.clone();
                    let downloader = downloader.clone();
                    async move {
                        let token = match cache.verify_or_create(&context.edr_negotiation(), &offer).await {
                            Ok(token) => token,
                            Err(e) => return failed(&offer.asset_id, e.to_string()),
                        };
                        if !download_now {
                            return ItemResult::success().with_edr(Some(token.entry()));
                        }
                        download(&downloader, &token, &context.format).await
                    }
                },
            )
            .await;
        collect(results)
    }

    /// Downloads assets whose transfer was completed earlier.
    pub async fn download_transferred(&self, asset_ids: Vec<String>, format: &str) -> BatchResult {
        let cache = Arc::new(self.new_cache());
        let downloader = self.downloader.clone();
        let format = format.to_string();

        let results = self
            .runner
            .run(
                asset_ids,
                |asset_id: &String| asset_id.clone(),
                move |asset_id| {
                    let cache = cache.clone();
                    let downloader = downloader.clone();
                    let format = format.clone();
                    async move {
                        match cache.lookup_token(&asset_id).await {
                            Ok(Some(token)) => download(&downloader, &token, &format).await,
                            Ok(None) => failed(&asset_id, EdrError::Missing { asset_id: asset_id.clone() }.to_string()),
                            Err(e) => failed(&asset_id, e.to_string()),
                        }
                    }
                },
            )
            .await;
        collect(results)
    }

    pub async fn negotiation_status(&self, process_id: &str) -> Result<Vec<ContractNegotiationRecord>, DbError> {
        self.store.list_by_process(process_id).await
    }

    fn new_cache(&self) -> EdrTokenCache {
        EdrTokenCache::new(
            self.connector.clone(),
            self.orchestrator.clone(),
            self.config.token_expiry_margin,
        )
    }
}

/// The EDR entry is reported whether or not the download succeeds.
async fn download(downloader: &DataDownloadExecutor, token: &EdrToken, format: &str) -> ItemResult {
    let result = match downloader.download(token, format).await {
        Ok(data) => ItemResult::success().with_data(data),
        Err(e) => failed(&token.asset_id, e.to_string()),
    };
    result.with_edr(Some(token.entry()))
}

fn failed(asset_id: &str, error: String) -> ItemResult {
    log::warn!("Asset [{}] failed: {}", asset_id, error);
    ItemResult::failed(error)
}

fn collect(results: HashMap<String, Result<ItemResult, TaskFailure>>) -> BatchResult {
    results
        .into_iter()
        .map(|(asset_id, result)| {
            let item = result.unwrap_or_else(|e| ItemResult::failed(e.to_string()));
            (asset_id, item)
        })
        .collect()
}

/// Request parameters shared by all offers of one batch.
struct OfferContext {
    process_id: String,
    connector_id: String,
    recipient_url: String,
    action: ActionRequest,
    extensible_properties: HashMap<String, String>,
    format: String,
}

impl OfferContext {
    fn new(config: &EdcConfig, request: &ConsumerRequest, process_id: &str) -> OfferContext {
        OfferContext {
            process_id: process_id.to_string(),
            connector_id: request.connector_id.clone(),
            recipient_url: config.provider_protocol_url(request.recipient_url()),
            action: ActionRequest::from_usage_policies(&request.usage_policies),
            extensible_properties: HashMap::new(),
            format: request.download_data_as.clone(),
        }
    }

    fn negotiation_request(&self, kind: NegotiationKind, offer: &Offer) -> NegotiationRequest {
        NegotiationRequest {
            kind,
            provider_url: self.recipient_url.clone(),
            connector_id: self.connector_id.clone(),
            offer_id: offer.offer_id.clone(),
            asset_id: offer.asset_id.clone(),
            action: self.action.clone(),
            extensible_properties: self.extensible_properties.clone(),
        }
    }

    fn edr_negotiation(&self) -> EdrNegotiation<'_> {
        EdrNegotiation {
            process_id: &self.process_id,
            connector_id: &self.connector_id,
            recipient_url: &self.recipient_url,
            action: &self.action,
            extensible_properties: &self.extensible_properties,
        }
    }
}
