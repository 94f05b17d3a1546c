//! Error definitions and mappings
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Error requesting {url}: {msg}")]
    Transport { url: String, msg: String },
    #[error("Request for {url} resulted in HTTP status code {code}: {body}")]
    Status { code: u16, url: String, body: String },
    #[error("Conflict requesting {url}: {body}")]
    Conflict { url: String, body: String },
    #[error("Unable to decode response from {url}: {msg}")]
    Decode { url: String, msg: String },
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl ApiError {
    /// Response body sent by the remote side, if it answered at all.
    pub fn remote_body(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } | ApiError::Conflict { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { code, .. } => Some(*code),
            ApiError::Conflict { .. } => Some(409),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub(crate) fn transport(url: &str, e: reqwest::Error) -> ApiError {
        let msg = if e.is_timeout() {
            format!("timeout: {}", e)
        } else {
            e.to_string()
        };
        ApiError::Transport {
            url: url.to_string(),
            msg,
        }
    }

    pub(crate) fn from_status(code: u16, url: &str, body: String) -> ApiError {
        match code {
            409 => ApiError::Conflict {
                url: url.to_string(),
                body,
            },
            code => ApiError::Status {
                code,
                url: url.to_string(),
                body,
            },
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(e: url::ParseError) -> Self {
        ApiError::InvalidUrl(e.to_string())
    }
}
