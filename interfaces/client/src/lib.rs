//! Async bindings for the dataspace collaborators (REST)
//!
//! * [`edc`] - consumer connector management api and provider data planes,
//! * [`registry`] - digital twin registry,
//! * [`discovery`] - BPN and connector discovery services.

pub mod api;
pub mod discovery;
pub mod edc;
pub mod registry;
pub mod web;

pub mod error;
pub use error::ApiError;

pub use api::{
    BpnDiscovery, ConnectorApi, ConnectorDiscovery, DataPlane, NegotiationKind,
    NegotiationRequest, TwinRegistry,
};

pub type Result<T> = std::result::Result<T, ApiError>;
