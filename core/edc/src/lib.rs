//! Contract negotiation and EDR token orchestration.
//!
//! [`ContractNegotiationOrchestrator`] drives one negotiation to a terminal
//! state and records it, [`EdrTokenCache`] hands out access tokens per
//! (partner, asset) pair, [`DataDownloadExecutor`] fetches payloads with them.
//! [`ConsumerService`] and [`OfferDiscoveryService`] compose these into batch
//! operations.

pub mod config;
pub mod consumer;
pub mod discovery;
pub mod download;
pub mod edr;
pub mod error;
pub mod negotiation;
pub mod store;
pub mod testing;
mod utils;

pub use config::{DiscoveryConfig, EdcConfig, NegotiationConfig};
pub use consumer::ConsumerService;
pub use discovery::{OfferDiscoveryService, RegistryTwinLookup, TwinLookup};
pub use download::DataDownloadExecutor;
pub use edr::{EdrNegotiation, EdrTokenCache};
pub use error::{DiscoveryError, DownloadError, EdrError};
pub use negotiation::ContractNegotiationOrchestrator;
pub use store::{MemoryRecordStore, NegotiationRecordStore};
