use thiserror::Error;

/// Errors raised inside the enrichment clients. The [`crate::source`]
/// trait impls log these and degrade to "no data".
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Network, TLS or timeout failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {vendor}")]
    UnexpectedStatus { vendor: &'static str, status: u16 },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl EnrichError {
    /// `true` when the request hit the client timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, EnrichError::Http(e) if e.is_timeout())
    }
}

/// Failures of [`crate::PlacesClient::resolve`].
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("place not found: {place_id}")]
    NotFound { place_id: String },

    #[error("place {place_id} is missing address components: {missing}")]
    Incomplete { place_id: String, missing: String },

    #[error("places API returned {status}: {message}")]
    Vendor { status: String, message: String },

    #[error(transparent)]
    Enrich(#[from] EnrichError),
}

impl From<reqwest::Error> for ResolutionError {
    fn from(value: reqwest::Error) -> Self {
        ResolutionError::Enrich(EnrichError::Http(value))
    }
}
