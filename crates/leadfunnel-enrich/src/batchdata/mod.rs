//! Skip-trace client for the BatchData property API.

mod response;

use std::time::Duration;

use async_trait::async_trait;
use leadfunnel_core::{Address, ContactRecord};
use reqwest::{Client, Url};

use crate::error::EnrichError;
use crate::source::ContactSource;
use response::{SkipTraceRequest, SkipTraceResponse};

const DEFAULT_BASE_URL: &str = "https://api.batchdata.com/api/v1/";

pub struct BatchDataClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl BatchDataClient {
    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, EnrichError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`EnrichError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, EnrichError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| EnrichError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
        })
    }

    /// Skip-traces the owner of `address`.
    ///
    /// # Errors
    ///
    /// - [`EnrichError::Http`] on network failure or timeout.
    /// - [`EnrichError::UnexpectedStatus`] on a non-2xx response.
    /// - [`EnrichError::Deserialize`] if the body is not the expected JSON.
    pub async fn try_lookup(&self, address: &Address) -> Result<Option<ContactRecord>, EnrichError> {
        let url = self
            .base_url
            .join("property/skip-trace")
            .unwrap_or_else(|_| self.base_url.clone());

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&SkipTraceRequest::for_address(address))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::UnexpectedStatus {
                vendor: "batchdata",
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: SkipTraceResponse =
            serde_json::from_str(&body).map_err(|e| EnrichError::Deserialize {
                context: format!("batchdata skip-trace({})", address.cache_key()),
                source: e,
            })?;

        Ok(parsed.into_record())
    }
}

#[async_trait]
impl ContactSource for BatchDataClient {
    async fn lookup(&self, address: &Address) -> Option<ContactRecord> {
        match self.try_lookup(address).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                tracing::debug!(address = %address.cache_key(), "batchdata: no skip-trace match");
                None
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    timeout = e.is_timeout(),
                    "batchdata skip-trace failed; continuing without contact data"
                );
                None
            }
        }
    }
}
