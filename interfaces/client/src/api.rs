//! Capabilities of the remote collaborators.
//!
//! Orchestration code depends only on these traits; HTTP adapters live in
//! the sibling modules and tests substitute in-memory fakes.
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use dsx_model::{
    ActionRequest, CatalogRequest, EdrDataAddress, EdrEntry, NegotiationState, ShellDescriptor,
    SpecificAssetId, SubmodelDescriptor,
};

use crate::Result;

/// Which negotiation endpoint of the connector is used.
///
/// `Edr` negotiations start the transfer process right after agreement,
/// so an EDR becomes available once they are `NEGOTIATED`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NegotiationKind {
    Contract,
    Edr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NegotiationRequest {
    pub kind: NegotiationKind,
    pub provider_url: String,
    pub connector_id: String,
    pub offer_id: String,
    pub asset_id: String,
    pub action: ActionRequest,
    pub extensible_properties: HashMap<String, String>,
}

#[async_trait]
pub trait ConnectorApi: Send + Sync {
    async fn query_catalog(&self, request: &CatalogRequest) -> Result<Value>;

    /// Returns id of the negotiation assigned by the connector.
    async fn initiate_negotiation(&self, request: &NegotiationRequest) -> Result<String>;

    async fn negotiation_state(&self, negotiation_id: &str) -> Result<NegotiationState>;

    async fn lookup_edrs(&self, asset_id: &str) -> Result<Vec<EdrEntry>>;

    /// `None` when the connector has no EDR for the transfer process yet.
    async fn edr_data_address(&self, transfer_process_id: &str) -> Result<Option<EdrDataAddress>>;

    async fn refresh_edr(&self, transfer_process_id: &str) -> Result<EdrDataAddress>;
}

#[async_trait]
pub trait DataPlane: Send + Sync {
    /// Fetches payload from a provider data plane; non JSON bodies are
    /// returned as a JSON string.
    async fn fetch(&self, url: &str, authorization: &str) -> Result<Value>;
}

#[async_trait]
pub trait TwinRegistry: Send + Sync {
    /// Ids of all shells carrying every one of the given specific asset ids.
    async fn lookup_shells(&self, asset_ids: &[SpecificAssetId]) -> Result<Vec<String>>;

    async fn create_shell(&self, shell: &ShellDescriptor) -> Result<ShellDescriptor>;

    async fn list_submodels(&self, shell_id: &str) -> Result<Vec<SubmodelDescriptor>>;

    async fn create_submodel(
        &self,
        shell_id: &str,
        submodel: &SubmodelDescriptor,
    ) -> Result<SubmodelDescriptor>;
}

#[async_trait]
pub trait BpnDiscovery: Send + Sync {
    async fn search(&self, manufacturer_part_id: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ConnectorDiscovery: Send + Sync {
    /// Protocol urls of connectors operated by the partner.
    async fn connectors(&self, bpn: &str) -> Result<Vec<String>>;
}
