//! Finding offers of a manufacturer part across partner connectors.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use dsx_client::registry::HttpTwinRegistry;
use dsx_client::web::WebAuth;
use dsx_client::{ApiError, BpnDiscovery, ConnectorApi, ConnectorDiscovery, TwinRegistry};
use dsx_model::catalog::{offers_from_catalog, DIGITAL_TWIN_REGISTRY_TYPE};
use dsx_model::twin::MANUFACTURER_PART_ID;
use dsx_model::{ActionRequest, CatalogRequest, Criterion, EdrToken, Offer, SpecificAssetId};

use crate::config::EdcConfig;
use crate::edr::{EdrNegotiation, EdrTokenCache};
use crate::error::{DiscoveryError, EdrError};
use crate::negotiation::ContractNegotiationOrchestrator;

pub const DEFAULT_REGISTRY_API_ROOT: &str = "/api/v3.0";
const REGISTRY_CATALOG_LIMIT: u32 = 100;

/// Asset id and provider connector address of a submodel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmodelTarget {
    pub asset_id: String,
    pub dsp_endpoint: String,
}

/// Looks a submodel up in a partner registry reachable with the given token.
#[async_trait]
pub trait TwinLookup: Send + Sync {
    async fn find(
        &self,
        registry_token: &EdrToken,
        manufacturer_part_id: &str,
        submodel_type: &str,
    ) -> Result<Option<SubmodelTarget>, ApiError>;
}

/// First submodel whose `idShort` contains `submodel_type` (ignoring case)
/// among shells carrying the manufacturer part id.
pub async fn find_submodel(
    registry: &dyn TwinRegistry,
    manufacturer_part_id: &str,
    submodel_type: &str,
) -> Result<Option<SubmodelTarget>, ApiError> {
    let wanted = submodel_type.to_lowercase();
    let shells = registry
        .lookup_shells(&[SpecificAssetId::new(MANUFACTURER_PART_ID, manufacturer_part_id)])
        .await?;
    log::debug!(
        "Found {} shells of manufacturer part [{}].",
        shells.len(),
        manufacturer_part_id
    );

    for shell_id in shells {
        let submodels = registry.list_submodels(&shell_id).await?;
        let target = submodels
            .iter()
            .filter(|submodel| submodel.id_short.to_lowercase().contains(&wanted))
            .flat_map(|submodel| submodel.endpoints.iter())
            .find_map(|endpoint| endpoint.dsp_target());
        if let Some((asset_id, dsp_endpoint)) = target {
            return Ok(Some(SubmodelTarget {
                asset_id,
                dsp_endpoint,
            }));
        }
    }
    Ok(None)
}

/// Reaches partner registries through their data plane.
pub struct RegistryTwinLookup {
    api_root: String,
}

impl RegistryTwinLookup {
    pub fn new(api_root: impl Into<String>) -> RegistryTwinLookup {
        RegistryTwinLookup {
            api_root: api_root.into(),
        }
    }
}

impl Default for RegistryTwinLookup {
    fn default() -> Self {
        RegistryTwinLookup::new(DEFAULT_REGISTRY_API_ROOT)
    }
}

#[async_trait]
impl TwinLookup for RegistryTwinLookup {
    async fn find(
        &self,
        registry_token: &EdrToken,
        manufacturer_part_id: &str,
        submodel_type: &str,
    ) -> Result<Option<SubmodelTarget>, ApiError> {
        let registry = HttpTwinRegistry::connect(
            &registry_token.endpoint,
            &self.api_root,
            Some(WebAuth::Header {
                name: "Authorization".to_string(),
                value: registry_token.authorization.clone(),
            }),
        )?;
        find_submodel(&registry, manufacturer_part_id, submodel_type).await
    }
}

pub struct OfferDiscoveryService {
    config: EdcConfig,
    connector: Arc<dyn ConnectorApi>,
    orchestrator: Arc<ContractNegotiationOrchestrator>,
    bpn_discovery: Option<Arc<dyn BpnDiscovery>>,
    connector_discovery: Arc<dyn ConnectorDiscovery>,
    twin_lookup: Arc<dyn TwinLookup>,
}

impl OfferDiscoveryService {
    pub fn new(
        config: EdcConfig,
        connector: Arc<dyn ConnectorApi>,
        orchestrator: Arc<ContractNegotiationOrchestrator>,
        bpn_discovery: Option<Arc<dyn BpnDiscovery>>,
        connector_discovery: Arc<dyn ConnectorDiscovery>,
        twin_lookup: Arc<dyn TwinLookup>,
    ) -> OfferDiscoveryService {
        OfferDiscoveryService {
            config,
            connector,
            orchestrator,
            bpn_discovery,
            connector_discovery,
            twin_lookup,
        }
    }

    /// Offers of the asset backing `submodel_type` of the manufacturer part.
    ///
    /// Without `bpn` all partners known to BPN discovery are searched. A partner
    /// that fails at any step is skipped, so the result may be partial.
    pub async fn discover(
        &self,
        bpn: Option<&str>,
        manufacturer_part_id: &str,
        submodel_type: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Offer>, DiscoveryError> {
        let bpns = match (bpn, &self.bpn_discovery) {
            (Some(bpn), _) => vec![bpn.to_string()],
            (None, Some(discovery)) => discovery.search(manufacturer_part_id).await?,
            (None, None) => return Err(DiscoveryError::NoBpnDiscovery),
        };
        log::info!(
            "Searching offers of manufacturer part [{}] at {} partners.",
            manufacturer_part_id,
            bpns.len()
        );

        // Registry tokens are shared by all partners of this call only.
        let cache = EdrTokenCache::new(
            self.connector.clone(),
            self.orchestrator.clone(),
            self.config.token_expiry_margin,
        );
        let process_id = format!("discovery-{}", uuid::Uuid::new_v4());
        let lookup = PartLookup {
            manufacturer_part_id,
            submodel_type,
            offset,
            limit,
        };

        let mut offers = Vec::new();
        for bpn in bpns {
            match self.discover_at_partner(&cache, &process_id, &bpn, &lookup).await {
                Ok(found) => offers.extend(found),
                Err(e) => log::warn!("Skipping partner [{}] during offer discovery: {}", bpn, e),
            }
        }
        Ok(offers)
    }

    async fn discover_at_partner(
        &self,
        cache: &EdrTokenCache,
        process_id: &str,
        bpn: &str,
        lookup: &PartLookup<'_>,
    ) -> Result<Vec<Offer>, EdrError> {
        let mut offers = Vec::new();
        for connector_url in self.connector_discovery.connectors(bpn).await? {
            let dsp_url = self.config.provider_protocol_url(&connector_url);
            match self
                .discover_at_connector(cache, process_id, bpn, &dsp_url, lookup)
                .await
            {
                Ok(found) => offers.extend(found),
                Err(e) => log::warn!(
                    "Skipping connector [{}] of partner [{}] during offer discovery: {}",
                    dsp_url,
                    bpn,
                    e
                ),
            }
        }
        Ok(offers)
    }

    async fn discover_at_connector(
        &self,
        cache: &EdrTokenCache,
        process_id: &str,
        bpn: &str,
        dsp_url: &str,
        lookup: &PartLookup<'_>,
    ) -> Result<Vec<Offer>, EdrError> {
        let target = match self.find_target(cache, process_id, bpn, dsp_url, lookup).await? {
            Some(target) => target,
            None => return Ok(vec![]),
        };

        let provider_url = self.config.provider_protocol_url(&target.dsp_endpoint);
        let request = CatalogRequest::new(&provider_url, lookup.offset, lookup.limit)
            .with_filter(Criterion::id_equals(&target.asset_id));
        let catalog = self.connector.query_catalog(&request).await?;
        Ok(offers_from_catalog(&catalog, &provider_url)
            .into_iter()
            .filter(|offer| offer.asset_id == target.asset_id)
            .map(|mut offer| {
                offer.connector_id.get_or_insert_with(|| bpn.to_string());
                offer
            })
            .collect())
    }

    async fn find_target(
        &self,
        cache: &EdrTokenCache,
        process_id: &str,
        bpn: &str,
        dsp_url: &str,
        lookup: &PartLookup<'_>,
    ) -> Result<Option<SubmodelTarget>, EdrError> {
        let request = CatalogRequest::new(dsp_url, 0, REGISTRY_CATALOG_LIMIT)
            .with_filter(Criterion::type_equals(DIGITAL_TWIN_REGISTRY_TYPE));
        let catalog = self.connector.query_catalog(&request).await?;
        let registries = offers_from_catalog(&catalog, dsp_url)
            .into_iter()
            .filter(|offer| offer.asset_type.as_deref() == Some(DIGITAL_TWIN_REGISTRY_TYPE));

        let action = ActionRequest::default();
        let properties = HashMap::new();
        let negotiation = EdrNegotiation {
            process_id,
            connector_id: bpn,
            recipient_url: dsp_url,
            action: &action,
            extensible_properties: &properties,
        };
        for registry in registries {
            let token = match cache.verify_or_create(&negotiation, &registry).await {
                Ok(token) => token,
                Err(e) => {
                    log::warn!(
                        "No EDR token for registry offer [{}] at [{}]: {}",
                        registry.offer_id,
                        dsp_url,
                        e
                    );
                    continue;
                }
            };
            match self
                .twin_lookup
                .find(&token, lookup.manufacturer_part_id, lookup.submodel_type)
                .await
            {
                Ok(Some(target)) => return Ok(Some(target)),
                Ok(None) => (),
                Err(e) => log::warn!(
                    "Twin lookup in registry of offer [{}] at [{}] failed: {}",
                    registry.offer_id,
                    dsp_url,
                    e
                ),
            }
        }
        log::debug!(
            "No {} submodel of part [{}] at [{}].",
            lookup.submodel_type,
            lookup.manufacturer_part_id,
            dsp_url
        );
        Ok(None)
    }
}

struct PartLookup<'a> {
    manufacturer_part_id: &'a str,
    submodel_type: &'a str,
    offset: u32,
    limit: u32,
}
