use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{vendor} returned HTTP {status}: {body}")]
    UnexpectedStatus {
        vendor: &'static str,
        status: u16,
        body: String,
    },

    #[error("{vendor} rejected the request: {message}")]
    Rejected {
        vendor: &'static str,
        message: String,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to render TwiML: {0}")]
    Twiml(#[from] std::io::Error),

    #[error("invalid phone number: {0}")]
    InvalidPhone(String),
}
