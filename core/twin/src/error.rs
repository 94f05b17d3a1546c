use thiserror::Error;

use dsx_client::ApiError;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// More than one shell carries the same business identifiers.
    #[error("Multiple id's found on {identifiers}: {shell_ids:?}")]
    MultipleShells {
        identifiers: String,
        shell_ids: Vec<String>,
    },
    #[error("Registry rejected concurrent change: {body}")]
    Conflict { url: String, body: String },
    #[error(transparent)]
    Registry(ApiError),
}

impl From<ApiError> for ReconcileError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Conflict { url, body } => ReconcileError::Conflict { url, body },
            e => ReconcileError::Registry(e),
        }
    }
}
