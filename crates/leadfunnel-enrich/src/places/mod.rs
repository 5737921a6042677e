//! Address resolution adapter over the Google Places web service.
//!
//! [`PlacesClient::suggest`] never fails: vendor problems surface as an
//! empty suggestion list. [`PlacesClient::resolve`] reports not-found and
//! incomplete places as [`ResolutionError`]s.

mod response;

use std::time::Duration;

use leadfunnel_core::{Address, AddressCandidate, AppConfig};
use reqwest::{Client, Url};

use crate::error::{EnrichError, ResolutionError};
use response::{AutocompleteResponse, DetailsResponse};

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place/";

/// Place details fields requested from the vendor.
const DETAIL_FIELDS: &str = "address_component,geometry,formatted_address";

pub struct PlacesClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl PlacesClient {
    /// Creates a client pointed at the production Places API.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, EnrichError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// `None` (with a warning) when `GOOGLE_PLACES_API_KEY` is unset.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the `reqwest::Client` cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, EnrichError> {
        match &config.vendors.google_places_api_key {
            Some(key) => Self::new(key, config.vendor_timeout_secs).map(Some),
            None => {
                tracing::warn!("GOOGLE_PLACES_API_KEY not set; address endpoints disabled");
                Ok(None)
            }
        }
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
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
            .connect_timeout(Duration::from_secs(timeout_secs.min(5)))
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

    /// Autocomplete suggestions for free-text input, restricted to US
    /// street addresses.
    pub async fn suggest(&self, input: &str) -> Vec<AddressCandidate> {
        let input = input.trim();
        if input.is_empty() {
            return Vec::new();
        }

        let url = self.endpoint(
            "autocomplete/json",
            &[
                ("input", input),
                ("types", "address"),
                ("components", "country:us"),
            ],
        );

        let body: AutocompleteResponse = match self.get_json(url, "autocomplete").await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "places autocomplete failed; returning no suggestions");
                return Vec::new();
            }
        };

        match body.status.as_deref() {
            Some("OK") => body
                .predictions
                .into_iter()
                .filter_map(response::Prediction::into_candidate)
                .collect(),
            Some("ZERO_RESULTS") => Vec::new(),
            status => {
                tracing::warn!(
                    status = status.unwrap_or("<missing>"),
                    message = body.error_message.as_deref().unwrap_or(""),
                    "places autocomplete returned non-OK status"
                );
                Vec::new()
            }
        }
    }

    /// Resolves a suggestion into a normalized [`Address`].
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::NotFound`] when the vendor does not know the place.
    /// - [`ResolutionError::Incomplete`] when street, city, state or ZIP is missing.
    /// - [`ResolutionError::Vendor`] for any other non-`OK` status.
    /// - [`ResolutionError::Enrich`] on transport or decode failure.
    pub async fn resolve(&self, place_id: &str) -> Result<Address, ResolutionError> {
        let place_id = place_id.trim();
        if place_id.is_empty() {
            return Err(ResolutionError::NotFound {
                place_id: String::new(),
            });
        }

        let url = self.endpoint(
            "details/json",
            &[("place_id", place_id), ("fields", DETAIL_FIELDS)],
        );
        let body: DetailsResponse = self.get_json(url, "details").await?;

        match body.status.as_deref() {
            Some("OK") => {}
            Some("NOT_FOUND" | "ZERO_RESULTS" | "INVALID_REQUEST") => {
                return Err(ResolutionError::NotFound {
                    place_id: place_id.to_string(),
                });
            }
            status => {
                return Err(ResolutionError::Vendor {
                    status: status.unwrap_or("<missing>").to_string(),
                    message: body.error_message.unwrap_or_default(),
                });
            }
        }

        let result = body.result.ok_or_else(|| ResolutionError::NotFound {
            place_id: place_id.to_string(),
        })?;

        result
            .into_address(place_id)
            .map_err(|missing| ResolutionError::Incomplete {
                place_id: place_id.to_string(),
                missing: missing.join(", "),
            })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self
            .base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.clone());
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("key", &self.api_key);
        }
        url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        context: &str,
    ) -> Result<T, EnrichError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::UnexpectedStatus {
                vendor: "google-places",
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| EnrichError::Deserialize {
            context: format!("places {context}"),
            source: e,
        })
    }
}
