//! Error types for risk engine

use thiserror::Error;

/// Risk engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Remote inference endpoint failed or answered with something unusable
    #[error("Inference error: {0}")]
    Inference(String),

    /// Decision cache unavailable
    #[error("Cache error: {0}")]
    Cache(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Policy picked an action outside the gateway catalog
    #[error("Unknown gateway action: {0}")]
    UnknownAction(usize),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Inference(format!("request timed out: {}", err))
        } else {
            Error::Inference(err.to_string())
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
