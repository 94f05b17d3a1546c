use thiserror::Error;

use dsx_client::ApiError;
use dsx_model::{EdrStateError, NegotiationState, NegotiationStatus};

#[derive(Error, Debug)]
pub enum EdrError {
    #[error(
        "There is valid contract agreement exist for {asset_id} but initiate data transfer is not \
         completed and no EDR token available, download is not possible"
    )]
    Inconsistent { asset_id: String },
    #[error(
        "Time out!! to get 'NEGOTIATED' EDC EDR status to download data, the current status is '{state}'"
    )]
    NotReady {
        asset_id: String,
        state: NegotiationState,
    },
    #[error("No EDR available for asset [{asset_id}].")]
    Missing { asset_id: String },
    #[error("Negotiation for offer [{offer_id}] finished with status {status}: {reason}")]
    Negotiation {
        offer_id: String,
        status: NegotiationStatus,
        reason: String,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<EdrStateError> for EdrError {
    fn from(e: EdrStateError) -> Self {
        match e {
            EdrStateError::Inconsistent { asset_id } => EdrError::Inconsistent { asset_id },
            EdrStateError::NotNegotiated { asset_id, state } => EdrError::NotReady { asset_id, state },
        }
    }
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Download of asset [{asset_id}] requires 'NEGOTIATED' state, the current state is '{state}'")]
    NotNegotiated {
        asset_id: String,
        state: NegotiationState,
    },
    #[error("Unable to download subscribed data offer because: {body}")]
    Remote { url: String, body: String },
    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for DownloadError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Status { url, body, .. } | ApiError::Conflict { url, body } => {
                DownloadError::Remote { url, body }
            }
            e => DownloadError::Api(e),
        }
    }
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("No partner BPN given and BPN discovery is not configured.")]
    NoBpnDiscovery,
    #[error(transparent)]
    Api(#[from] ApiError),
}
