use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{sink} returned HTTP {status}: {body}")]
    UnexpectedStatus {
        sink: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
