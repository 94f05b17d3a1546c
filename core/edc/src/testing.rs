//! In-memory stand-ins for remote collaborators.
//!
//! Fakes are scripted up front with builder methods and record every call,
//! so orchestration code can be exercised without a connector.
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dsx_client::{
    ApiError, BpnDiscovery, ConnectorApi, ConnectorDiscovery, DataPlane, NegotiationKind, NegotiationRequest,
    Result,
};
use dsx_model::catalog::{EDC_ID_OPERAND, EDC_TYPE_OPERAND};
use dsx_model::{ActionRequest, CatalogRequest, EdrDataAddress, EdrEntry, EdrToken, NegotiationState};

use crate::discovery::{SubmodelTarget, TwinLookup};

pub fn negotiation_request(kind: NegotiationKind, offer_id: &str, asset_id: &str) -> NegotiationRequest {
    NegotiationRequest {
        kind,
        provider_url: "https://p.example/api/v1/dsp".to_string(),
        connector_id: "BPNL000000000001".to_string(),
        offer_id: offer_id.to_string(),
        asset_id: asset_id.to_string(),
        action: ActionRequest::default(),
        extensible_properties: HashMap::new(),
    }
}

pub fn edr_entry(agreement_id: Option<&str>, transfer_process_id: Option<&str>, asset_id: &str, state: &str) -> EdrEntry {
    EdrEntry {
        agreement_id: agreement_id.map(str::to_string),
        transfer_process_id: transfer_process_id.map(str::to_string),
        asset_id: asset_id.to_string(),
        provider_id: Some("BPNL000000000001".to_string()),
        edr_state: NegotiationState::from(state),
        created_at: None,
    }
}

pub fn data_address(endpoint: &str, authorization: &str) -> EdrDataAddress {
    EdrDataAddress {
        authorization: authorization.to_string(),
        endpoint: endpoint.to_string(),
        refresh_token: None,
        refresh_endpoint: None,
        audience: None,
        expires_in: None,
    }
}

fn fake_error(code: u16, body: &str) -> ApiError {
    ApiError::Status {
        code,
        url: "fake://connector".to_string(),
        body: body.to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct ConnectorState {
    scripts: HashMap<String, Vec<NegotiationState>>,
    failing: HashMap<String, String>,
    negotiations: HashMap<String, String>,
    checks: HashMap<String, usize>,
    initiated: Vec<NegotiationRequest>,
    catalogs: HashMap<String, Value>,
    catalog_requests: Vec<CatalogRequest>,
    edrs: HashMap<String, Vec<EdrEntry>>,
    published_on_negotiated: HashMap<String, (EdrEntry, Option<EdrDataAddress>)>,
    addresses: HashMap<String, EdrDataAddress>,
    refreshed: HashMap<String, EdrDataAddress>,
    refreshes: usize,
    edr_lookups: usize,
}

/// Connector whose negotiations follow per offer scripts of states.
///
/// The last scripted state repeats for every further check; offers without
/// a script stay `REQUESTED`.
#[derive(Default)]
pub struct FakeConnector {
    state: Mutex<ConnectorState>,
    initiate_delay: Option<Duration>,
}

impl FakeConnector {
    pub fn new() -> FakeConnector {
        FakeConnector::default()
    }

    pub fn with_negotiation(self, offer_id: &str, states: &[&str]) -> Self {
        lock(&self.state).scripts.insert(
            offer_id.to_string(),
            states.iter().map(|s| NegotiationState::from(*s)).collect(),
        );
        self
    }

    pub fn with_failing_negotiation(self, offer_id: &str, body: &str) -> Self {
        lock(&self.state)
            .failing
            .insert(offer_id.to_string(), body.to_string());
        self
    }

    pub fn with_initiate_delay(mut self, delay: Duration) -> Self {
        self.initiate_delay = Some(delay);
        self
    }

    pub fn with_catalog(self, provider_url: &str, catalog: Value) -> Self {
        lock(&self.state)
            .catalogs
            .insert(provider_url.to_string(), catalog);
        self
    }

    pub fn with_edr(self, entry: EdrEntry, address: Option<EdrDataAddress>) -> Self {
        {
            let mut state = lock(&self.state);
            if let (Some(tp), Some(address)) = (&entry.transfer_process_id, address) {
                state.addresses.insert(tp.clone(), address);
            }
            state
                .edrs
                .entry(entry.asset_id.clone())
                .or_default()
                .push(entry);
        }
        self
    }

    /// EDR entry that appears once negotiation of `offer_id` is seen `NEGOTIATED`.
    pub fn with_edr_after_negotiation(
        self,
        offer_id: &str,
        entry: EdrEntry,
        address: Option<EdrDataAddress>,
    ) -> Self {
        lock(&self.state)
            .published_on_negotiated
            .insert(offer_id.to_string(), (entry, address));
        self
    }

    pub fn with_refresh(self, transfer_process_id: &str, address: EdrDataAddress) -> Self {
        lock(&self.state)
            .refreshed
            .insert(transfer_process_id.to_string(), address);
        self
    }

    pub fn initiated(&self) -> Vec<NegotiationRequest> {
        lock(&self.state).initiated.clone()
    }

    pub fn state_checks(&self, offer_id: &str) -> usize {
        lock(&self.state).checks.get(offer_id).copied().unwrap_or(0)
    }

    pub fn catalog_requests(&self) -> Vec<CatalogRequest> {
        lock(&self.state).catalog_requests.clone()
    }

    pub fn refreshes(&self) -> usize {
        lock(&self.state).refreshes
    }

    pub fn edr_lookups(&self) -> usize {
        lock(&self.state).edr_lookups
    }
}

#[async_trait]
impl ConnectorApi for FakeConnector {
    async fn query_catalog(&self, request: &CatalogRequest) -> Result<Value> {
        let mut state = lock(&self.state);
        state.catalog_requests.push(request.clone());
        let mut catalog = state
            .catalogs
            .get(&request.provider_url)
            .cloned()
            .ok_or_else(|| fake_error(502, "unknown provider"))?;

        if let Some(Value::Array(datasets)) = catalog.get_mut("dcat:dataset") {
            datasets.retain(|dataset| {
                request.query_spec.filter_expression.iter().all(|criterion| {
                    let value = match criterion.operand_left.as_str() {
                        EDC_ID_OPERAND => dataset.get("@id"),
                        EDC_TYPE_OPERAND => dataset.get("dct:type").and_then(|t| t.get("@id")),
                        _ => None,
                    };
                    value.and_then(Value::as_str) == Some(criterion.operand_right.as_str())
                })
            });
        }
        Ok(catalog)
    }

    async fn initiate_negotiation(&self, request: &NegotiationRequest) -> Result<String> {
        if let Some(delay) = self.initiate_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = lock(&self.state);
        state.initiated.push(request.clone());
        if let Some(body) = state.failing.get(&request.offer_id) {
            return Err(fake_error(500, body));
        }
        let negotiation_id = format!("neg-{}-{}", request.offer_id, state.initiated.len());
        state
            .negotiations
            .insert(negotiation_id.clone(), request.offer_id.clone());
        Ok(negotiation_id)
    }

    async fn negotiation_state(&self, negotiation_id: &str) -> Result<NegotiationState> {
        let mut state = lock(&self.state);
        let offer_id = state
            .negotiations
            .get(negotiation_id)
            .cloned()
            .ok_or_else(|| fake_error(404, "unknown negotiation"))?;

        let checks = {
            let checks = state.checks.entry(offer_id.clone()).or_insert(0);
            *checks += 1;
            *checks
        };
        let current = state
            .scripts
            .get(&offer_id)
            .and_then(|script| script.get(checks - 1).or_else(|| script.last()))
            .cloned()
            .unwrap_or(NegotiationState::Requested);

        if current.is_negotiated() {
            if let Some((entry, address)) = state.published_on_negotiated.remove(&offer_id) {
                if let (Some(tp), Some(address)) = (&entry.transfer_process_id, address) {
                    state.addresses.insert(tp.clone(), address);
                }
                state
                    .edrs
                    .entry(entry.asset_id.clone())
                    .or_default()
                    .push(entry);
            }
        }
        Ok(current)
    }

    async fn lookup_edrs(&self, asset_id: &str) -> Result<Vec<EdrEntry>> {
        let mut state = lock(&self.state);
        state.edr_lookups += 1;
        Ok(state.edrs.get(asset_id).cloned().unwrap_or_default())
    }

    async fn edr_data_address(&self, transfer_process_id: &str) -> Result<Option<EdrDataAddress>> {
        Ok(lock(&self.state).addresses.get(transfer_process_id).cloned())
    }

    async fn refresh_edr(&self, transfer_process_id: &str) -> Result<EdrDataAddress> {
        let mut state = lock(&self.state);
        state.refreshes += 1;
        state
            .refreshed
            .get(transfer_process_id)
            .cloned()
            .ok_or_else(|| fake_error(400, "refresh token expired"))
    }
}

/// Data plane answering from a fixed url table.
#[derive(Default)]
pub struct FakeDataPlane {
    responses: Mutex<HashMap<String, std::result::Result<Value, (u16, String)>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeDataPlane {
    pub fn new() -> FakeDataPlane {
        FakeDataPlane::default()
    }

    pub fn with_payload(self, url: &str, payload: Value) -> Self {
        lock(&self.responses).insert(url.to_string(), Ok(payload));
        self
    }

    pub fn with_failure(self, url: &str, code: u16, body: &str) -> Self {
        lock(&self.responses).insert(url.to_string(), Err((code, body.to_string())));
        self
    }

    /// Urls with the authorization used for each call.
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl DataPlane for FakeDataPlane {
    async fn fetch(&self, url: &str, authorization: &str) -> Result<Value> {
        lock(&self.calls).push((url.to_string(), authorization.to_string()));
        match lock(&self.responses).get(url) {
            Some(Ok(payload)) => Ok(payload.clone()),
            Some(Err((code, body))) => Err(ApiError::Status {
                code: *code,
                url: url.to_string(),
                body: body.clone(),
            }),
            None => Err(ApiError::Status {
                code: 404,
                url: url.to_string(),
                body: "no such resource".to_string(),
            }),
        }
    }
}

/// Partner directory for offer discovery.
#[derive(Default)]
pub struct FakeDiscovery {
    bpns: HashMap<String, Vec<String>>,
    connectors: HashMap<String, Vec<String>>,
}

impl FakeDiscovery {
    pub fn new() -> FakeDiscovery {
        FakeDiscovery::default()
    }

    pub fn with_partner(mut self, manufacturer_part_id: &str, bpn: &str, connectors: &[&str]) -> Self {
        self.bpns
            .entry(manufacturer_part_id.to_string())
            .or_default()
            .push(bpn.to_string());
        self.connectors
            .insert(bpn.to_string(), connectors.iter().map(|c| c.to_string()).collect());
        self
    }
}

#[async_trait]
impl BpnDiscovery for FakeDiscovery {
    async fn search(&self, manufacturer_part_id: &str) -> Result<Vec<String>> {
        Ok(self.bpns.get(manufacturer_part_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ConnectorDiscovery for FakeDiscovery {
    async fn connectors(&self, bpn: &str) -> Result<Vec<String>> {
        self.connectors
            .get(bpn)
            .cloned()
            .ok_or_else(|| fake_error(404, "unknown partner"))
    }
}

/// Twin lookup answering per registry endpoint.
#[derive(Default)]
pub struct FakeTwinLookup {
    targets: HashMap<(String, String), SubmodelTarget>,
    tokens: Mutex<Vec<String>>,
}

impl FakeTwinLookup {
    pub fn new() -> FakeTwinLookup {
        FakeTwinLookup::default()
    }

    pub fn with_target(mut self, registry_endpoint: &str, manufacturer_part_id: &str, asset_id: &str, dsp_endpoint: &str) -> Self {
        self.targets.insert(
            (registry_endpoint.to_string(), manufacturer_part_id.to_string()),
            SubmodelTarget {
                asset_id: asset_id.to_string(),
                dsp_endpoint: dsp_endpoint.to_string(),
            },
        );
        self
    }

    /// Authorizations the registries were accessed with.
    pub fn tokens(&self) -> Vec<String> {
        lock(&self.tokens).clone()
    }
}

#[async_trait]
impl TwinLookup for FakeTwinLookup {
    async fn find(
        &self,
        registry_token: &EdrToken,
        manufacturer_part_id: &str,
        _submodel_type: &str,
    ) -> Result<Option<SubmodelTarget>> {
        lock(&self.tokens).push(registry_token.authorization.clone());
        Ok(self
            .targets
            .get(&(registry_token.endpoint.clone(), manufacturer_part_id.to_string()))
            .cloned())
    }
}
