//! Digital twin reconciliation against a twin registry.

pub mod config;
pub mod error;
pub mod reconciler;
pub mod testing;

pub use config::TwinConfig;
pub use error::ReconcileError;
pub use reconciler::{Reconciled, SubmodelSpec, TwinReconciler, TwinRow};
