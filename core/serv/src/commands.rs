use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dsx_client::discovery::{HttpBpnDiscovery, HttpConnectorDiscovery};
use dsx_client::edc::{EdcClient, HttpDataPlane};
use dsx_client::web::WebClient;
use dsx_client::BpnDiscovery;
use dsx_edc::{ConsumerService, DiscoveryConfig, EdcConfig, OfferDiscoveryService, RegistryTwinLookup};
use dsx_model::offer::DEFAULT_DOWNLOAD_FORMAT;
use dsx_model::ConsumerRequest;
use dsx_persistence::DbExecutor;
use dsx_twin::{SubmodelSpec, TwinConfig, TwinReconciler, TwinRow};

const DB_NAME: &str = "dsx";

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    #[clap(long = "manufacturer-part-id")]
    manufacturer_part_id: String,
    /// Submodel to find, matched against submodel idShort
    #[clap(long = "submodel")]
    submodel_type: String,
    /// Search only this partner instead of asking BPN discovery
    #[clap(long)]
    bpn: Option<String>,
    #[clap(long, default_value = "0")]
    offset: u32,
    #[clap(long, default_value = "10")]
    limit: u32,
    #[clap(flatten)]
    edc: EdcConfig,
    #[clap(flatten)]
    discovery: DiscoveryConfig,
}

impl DiscoverArgs {
    pub async fn run(self, data_dir: &Path) -> Result<()> {
        let connector_discovery_url = self
            .discovery
            .connector_discovery_url
            .as_deref()
            .ok_or_else(|| anyhow!("connector discovery url is not configured"))?;
        let connector_discovery = Arc::new(HttpConnectorDiscovery::new(
            WebClient::builder().base_url(connector_discovery_url).build()?,
        ));
        let bpn_discovery = match self.discovery.bpn_discovery_url.as_deref() {
            Some(url) => Some(Arc::new(HttpBpnDiscovery::new(WebClient::builder().base_url(url).build()?))
                as Arc<dyn BpnDiscovery>),
            None => None,
        };

        let connector = Arc::new(edc_client(&self.edc)?);
        let consumer = consumer_service(self.edc.clone(), data_dir)?;
        let service = OfferDiscoveryService::new(
            self.edc,
            connector,
            consumer.orchestrator(),
            bpn_discovery,
            connector_discovery,
            Arc::new(RegistryTwinLookup::default()),
        );

        let offers = service
            .discover(
                self.bpn.as_deref(),
                &self.manufacturer_part_id,
                &self.submodel_type,
                self.offset,
                self.limit,
            )
            .await?;
        print_json(&offers)
    }
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    /// JSON file with the consumer request
    #[clap(long)]
    request: PathBuf,
    /// Process id recorded with every negotiation; generated when absent
    #[clap(long = "process-id")]
    process_id: Option<String>,
    #[clap(flatten)]
    edc: EdcConfig,
}

impl SubscribeArgs {
    pub async fn run(self, data_dir: &Path) -> Result<()> {
        let request = read_request(&self.request)?;
        let process_id = self
            .process_id
            .unwrap_or_else(|| format!("subscribe-{}", uuid::Uuid::new_v4()));
        let consumer = consumer_service(self.edc, data_dir)?;

        log::info!("Negotiating {} offers as process [{}].", request.offers.len(), process_id);
        let records = consumer.subscribe(request, &process_id).await?;
        print_json(&records)
    }
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// JSON file with the consumer request
    #[clap(long)]
    request: PathBuf,
    /// Only obtain the tokens, report them instead of the data
    #[clap(long = "no-download")]
    no_download: bool,
    #[clap(flatten)]
    edc: EdcConfig,
}

impl DownloadArgs {
    pub async fn run(self, data_dir: &Path) -> Result<()> {
        let request = read_request(&self.request)?;
        let consumer = consumer_service(self.edc, data_dir)?;
        print_json(&consumer.subscribe_and_download(request, !self.no_download).await)
    }
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[clap(long = "asset-id", required = true)]
    asset_ids: Vec<String>,
    #[clap(long = "type", default_value = DEFAULT_DOWNLOAD_FORMAT)]
    format: String,
    #[clap(flatten)]
    edc: EdcConfig,
}

impl FetchArgs {
    pub async fn run(self, data_dir: &Path) -> Result<()> {
        let consumer = consumer_service(self.edc, data_dir)?;
        print_json(&consumer.download_transferred(self.asset_ids, &self.format).await)
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[clap(long = "process-id")]
    process_id: String,
    #[clap(flatten)]
    edc: EdcConfig,
}

impl StatusArgs {
    pub async fn run(self, data_dir: &Path) -> Result<()> {
        let consumer = consumer_service(self.edc, data_dir)?;
        print_json(&consumer.negotiation_status(&self.process_id).await?)
    }
}

#[derive(Args, Debug)]
pub struct TwinArgs {
    /// JSON file with an array of rows
    #[clap(long)]
    rows: PathBuf,
    #[clap(long = "id-short", default_value = "SerialPartTypization")]
    submodel_id_short: String,
    #[clap(
        long = "semantic-id",
        default_value = "urn:bamm:io.catenax.serial_part_typization:1.0.0#SerialPartTypization"
    )]
    semantic_id: String,
    #[clap(flatten)]
    twin: TwinConfig,
}

impl TwinArgs {
    pub async fn run(self) -> Result<()> {
        let content = std::fs::read_to_string(&self.rows)
            .with_context(|| format!("Failed to read rows from {}", self.rows.display()))?;
        let rows: Vec<TwinRow> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid rows in {}", self.rows.display()))?;

        let reconciler = TwinReconciler::new(Arc::new(self.twin.registry()?), &self.twin);
        let submodel = SubmodelSpec {
            id_short: self.submodel_id_short,
            semantic_id: self.semantic_id,
        };
        print_json(&reconciler.reconcile_batch(rows, submodel).await)
    }
}

fn edc_client(config: &EdcConfig) -> Result<EdcClient> {
    Ok(EdcClient::with_api_key(
        &config.hostname,
        &config.api_key_header,
        config.api_key.as_deref(),
    )?)
}

fn consumer_service(config: EdcConfig, data_dir: &Path) -> Result<ConsumerService> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;
    let db = DbExecutor::from_data_dir(data_dir, DB_NAME)?;
    db.apply_migration()?;

    let connector = Arc::new(edc_client(&config)?);
    let data_plane = Arc::new(HttpDataPlane::new()?);
    Ok(ConsumerService::new(config, connector, data_plane, Arc::new(db)))
}

fn read_request(path: &Path) -> Result<ConsumerRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid consumer request in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
