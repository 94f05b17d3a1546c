//! Data model of the dataspace exchange.
//!
//! Types here are shared between the HTTP adapters (`dsx-client`), the
//! orchestration engine (`dsx-edc`) and the twin reconciler (`dsx-twin`).
//! They serialize to the JSON shapes used on the wire and in batch results.

pub mod catalog;
pub mod edr;
pub mod negotiation;
pub mod offer;
pub mod policy;
pub mod result;
pub mod twin;

pub use catalog::{CatalogRequest, Criterion, QuerySpec};
pub use edr::{EdrDataAddress, EdrEntry, EdrStateError, EdrToken};
pub use negotiation::{ContractNegotiationRecord, NegotiationState, NegotiationStatus};
pub use offer::{ConsumerRequest, Offer};
pub use policy::{ActionRequest, PolicyConstraint, UsagePolicy};
pub use result::{BatchResult, ItemResult, ItemStatus};
pub use twin::{BusinessIdentifiers, ShellDescriptor, SpecificAssetId, SubmodelDescriptor};

/// Generates identifier in `urn:uuid:<v4>` form used for shells and submodels.
pub fn new_urn_uuid() -> String {
    format!("urn:uuid:{}", uuid::Uuid::new_v4())
}
