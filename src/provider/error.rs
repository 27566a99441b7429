//! Errors reported by forms provider calls

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("form or file {0} not found")]
    NotFound(String),

    #[error("provider rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Map a non-success HTTP status and body to an error
    pub fn from_status(status: u16, resource: &str, body: String) -> Self {
        match status {
            404 => Self::NotFound(resource.to_string()),
            401 | 403 => Self::Unauthorized(body),
            _ => Self::Rejected {
                status,
                message: body,
            },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
