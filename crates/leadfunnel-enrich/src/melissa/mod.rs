//! Property valuation client for the Melissa Property web service.

mod response;

use std::time::Duration;

use async_trait::async_trait;
use leadfunnel_core::{Address, PropertyRecord};
use reqwest::{Client, Url};

use crate::error::EnrichError;
use crate::source::PropertySource;
use response::LookupResponse;

const DEFAULT_BASE_URL: &str = "https://property.melissadata.net/v4/WEB/";

/// Column groups requested from `LookupProperty`.
const COLUMNS: &str =
    "GrpPrimaryOwner,GrpEstimatedValue,GrpIntRoomInfo,GrpPropertySize,GrpCurrentDeed";

pub struct MelissaClient {
    client: Client,
    license_key: String,
    base_url: Url,
}

impl MelissaClient {
    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(license_key: &str, timeout_secs: u64) -> Result<Self, EnrichError> {
        Self::with_base_url(license_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`EnrichError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        license_key: &str,
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
            license_key: license_key.to_owned(),
            base_url,
        })
    }

    /// Looks up a property, distinguishing "no match" (`Ok(None)`) from
    /// vendor failure (`Err`).
    ///
    /// # Errors
    ///
    /// - [`EnrichError::Http`] on network failure or timeout.
    /// - [`EnrichError::UnexpectedStatus`] on a non-2xx response.
    /// - [`EnrichError::Deserialize`] if the body is not the expected JSON.
    pub async fn try_lookup(&self, address: &Address) -> Result<Option<PropertyRecord>, EnrichError> {
        let url = self.lookup_url(address);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::UnexpectedStatus {
                vendor: "melissa",
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: LookupResponse =
            serde_json::from_str(&body).map_err(|e| EnrichError::Deserialize {
                context: format!("melissa LookupProperty({})", address.cache_key()),
                source: e,
            })?;

        if let Some(tr) = parsed.transmission_results.as_deref().filter(|s| !s.trim().is_empty()) {
            tracing::debug!(transmission_results = tr, "melissa transmission warnings");
        }

        Ok(parsed
            .records
            .into_iter()
            .find(response::PropertyRow::is_match)
            .map(response::PropertyRow::into_record))
    }

    fn lookup_url(&self, address: &Address) -> Url {
        let mut url = self
            .base_url
            .join("LookupProperty")
            .unwrap_or_else(|_| self.base_url.clone());
        url.query_pairs_mut()
            .append_pair("id", &self.license_key)
            .append_pair("format", "json")
            .append_pair("cols", COLUMNS)
            .append_pair("ff", &address.one_line());
        url
    }
}

#[async_trait]
impl PropertySource for MelissaClient {
    async fn lookup(&self, address: &Address) -> Option<PropertyRecord> {
        match self.try_lookup(address).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                tracing::debug!(address = %address.cache_key(), "melissa: no property match");
                None
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    timeout = e.is_timeout(),
                    "melissa lookup failed; continuing without property data"
                );
                None
            }
        }
    }
}
