//! Google Analytics 4 Measurement Protocol.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{build_client, ensure_success, join, parse_base_url, Delivery, TrackingSink};
use crate::error::TrackingError;
use crate::event::{EventKind, TrackingEvent};

const DEFAULT_BASE_URL: &str = "https://www.google-analytics.com/";

pub struct Ga4Sink {
    client: Client,
    measurement_id: String,
    api_secret: String,
    base_url: Url,
}

impl Ga4Sink {
    /// # Errors
    ///
    /// Returns [`TrackingError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(measurement_id: &str, api_secret: &str, timeout_secs: u64) -> Result<Self, TrackingError> {
        Self::with_base_url(measurement_id, api_secret, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`TrackingError::Http`] if the client cannot be built, or
    /// [`TrackingError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        measurement_id: &str,
        api_secret: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, TrackingError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            measurement_id: measurement_id.to_owned(),
            api_secret: api_secret.to_owned(),
            base_url: parse_base_url(base_url)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct CollectRequest<'a> {
    client_id: &'a str,
    timestamp_micros: i64,
    events: [Ga4Event; 1],
}

#[derive(Debug, Serialize)]
struct Ga4Event {
    name: String,
    params: Map<String, Value>,
}

/// GA4 names: recommended events for page views and leads, custom names
/// lowercased with non-alphanumerics folded to `_`.
fn ga4_event(event: &TrackingEvent) -> Ga4Event {
    let mut params = Map::new();
    params.insert("event_id".to_string(), Value::from(event.event_id.clone()));
    if let Some(url) = &event.source_url {
        params.insert("page_location".to_string(), Value::from(url.clone()));
    }

    let name = match &event.kind {
        EventKind::PageView { path } => {
            params.insert("page_path".to_string(), Value::from(path.clone()));
            "page_view".to_string()
        }
        EventKind::Lead {
            lead_id,
            value,
            currency,
        } => {
            params.insert("lead_id".to_string(), Value::from(lead_id.to_string()));
            if let Some(value) = value {
                params.insert("value".to_string(), Value::from(*value));
                params.insert(
                    "currency".to_string(),
                    Value::from(currency.as_deref().unwrap_or("USD")),
                );
            }
            "generate_lead".to_string()
        }
        EventKind::Custom { name, params: extra } => {
            for (key, value) in extra {
                params.entry(key.clone()).or_insert_with(|| value.clone());
            }
            name.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_lowercase()
                    } else {
                        '_'
                    }
                })
                .collect()
        }
    };

    Ga4Event { name, params }
}

#[async_trait]
impl TrackingSink for Ga4Sink {
    fn name(&self) -> &'static str {
        "ga4"
    }

    async fn send(&self, event: &TrackingEvent) -> Result<Delivery, TrackingError> {
        let mut url = join(&self.base_url, "mp/collect")?;
        url.query_pairs_mut()
            .append_pair("measurement_id", &self.measurement_id)
            .append_pair("api_secret", &self.api_secret);

        // Without a browser client id, the event id keeps server events
        // from collapsing into one anonymous user.
        let client_id = event.user.client_id.as_deref().unwrap_or(&event.event_id);
        let body = CollectRequest {
            client_id,
            timestamp_micros: event.occurred_at.timestamp_micros(),
            events: [ga4_event(event)],
        };

        let response = self.client.post(url).json(&body).send().await?;
        ensure_success(self.name(), response).await?;
        Ok(Delivery::Sent)
    }
}
