use thiserror::Error;

// Basic error handling with thiserror
#[derive(Error, Debug)]
pub enum RadioError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseFailed(#[from] serde_json::Error),

    #[error("Server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Not signed in (privileged session required)")]
    Unauthorized, // 401/403, or no privileged session known locally

    #[error("Track {0} was already requested in this session")]
    DuplicateRequest(String),

    #[error("Response superseded by a newer request")]
    StaleResponse, // superseded by a newer generation or request id, logged only
}

impl RadioError {
    /// Transport, timeout, non-2xx or undecodable body.
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            RadioError::RequestFailed(_)
                | RadioError::ParseFailed(_)
                | RadioError::HttpStatus(_)
        )
    }

    /// True when the user should be prompted to sign in.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RadioError::Unauthorized)
    }

    /// Maps a non-success status to the matching error variant.
    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                RadioError::Unauthorized
            }
            other => RadioError::HttpStatus(other.as_u16()),
        }
    }
}
