//! Facebook Conversions API (server-side pixel).

use async_trait::async_trait;
use leadfunnel_core::to_e164;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::{build_client, ensure_success, join, parse_base_url, Delivery, TrackingSink};
use crate::error::TrackingError;
use crate::event::{EventKind, TrackingEvent, UserData};

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v18.0/";

pub struct FacebookConversionsSink {
    client: Client,
    pixel_id: String,
    access_token: String,
    base_url: Url,
    test_event_code: Option<String>,
}

impl FacebookConversionsSink {
    /// # Errors
    ///
    /// Returns [`TrackingError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(pixel_id: &str, access_token: &str, timeout_secs: u64) -> Result<Self, TrackingError> {
        Self::with_base_url(pixel_id, access_token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`TrackingError::Http`] if the client cannot be built, or
    /// [`TrackingError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        pixel_id: &str,
        access_token: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, TrackingError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            pixel_id: pixel_id.to_owned(),
            access_token: access_token.to_owned(),
            base_url: parse_base_url(base_url)?,
            test_event_code: None,
        })
    }

    /// Routes events to the Events Manager "Test events" tab.
    #[must_use]
    pub fn with_test_event_code(mut self, code: impl Into<String>) -> Self {
        self.test_event_code = Some(code.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct EventsRequest<'a> {
    data: [ServerEvent<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    test_event_code: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ServerEvent<'a> {
    event_name: &'a str,
    event_time: i64,
    event_id: &'a str,
    action_source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_source_url: Option<&'a str>,
    user_data: HashedUserData<'a>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    custom_data: Map<String, Value>,
}

/// Matching keys. PII fields are SHA-256 hex of the normalized value.
#[derive(Debug, Default, Serialize)]
struct HashedUserData<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    em: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ph: Vec<String>,
    #[serde(rename = "fn", skip_serializing_if = "Vec::is_empty")]
    first_name: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ln: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_ip_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_user_agent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fbc: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fbp: Option<&'a str>,
}

pub(crate) fn sha256_hex(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

fn hashed_text(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .map(|v| sha256_hex(&v))
        .into_iter()
        .collect()
}

/// Phones hash as country code plus digits, no `+`.
fn hashed_phone(value: Option<&String>) -> Vec<String> {
    value
        .and_then(|raw| to_e164(raw))
        .map(|e164| sha256_hex(e164.trim_start_matches('+')))
        .into_iter()
        .collect()
}

impl<'a> HashedUserData<'a> {
    fn from_user(user: &'a UserData) -> Self {
        Self {
            em: hashed_text(user.email.as_ref()),
            ph: hashed_phone(user.phone.as_ref()),
            first_name: hashed_text(user.first_name.as_ref()),
            ln: hashed_text(user.last_name.as_ref()),
            client_ip_address: user.client_ip.as_deref(),
            client_user_agent: user.user_agent.as_deref(),
            fbc: user.fbc.as_deref(),
            fbp: user.fbp.as_deref(),
        }
    }
}

fn custom_data(kind: &EventKind) -> Map<String, Value> {
    let mut data = Map::new();
    match kind {
        EventKind::PageView { .. } => {}
        EventKind::Lead {
            lead_id,
            value,
            currency,
        } => {
            data.insert("lead_id".to_string(), Value::from(lead_id.to_string()));
            if let Some(value) = value {
                data.insert("value".to_string(), Value::from(*value));
                data.insert(
                    "currency".to_string(),
                    Value::from(currency.as_deref().unwrap_or("USD")),
                );
            }
        }
        EventKind::Custom { params, .. } => data.clone_from(params),
    }
    data
}

#[async_trait]
impl TrackingSink for FacebookConversionsSink {
    fn name(&self) -> &'static str {
        "facebook"
    }

    async fn send(&self, event: &TrackingEvent) -> Result<Delivery, TrackingError> {
        let mut url = join(&self.base_url, &format!("{}/events", self.pixel_id))?;
        url.query_pairs_mut()
            .append_pair("access_token", &self.access_token);

        let body = EventsRequest {
            data: [ServerEvent {
                event_name: event.name(),
                event_time: event.occurred_at.timestamp(),
                event_id: &event.event_id,
                action_source: "website",
                event_source_url: event.source_url.as_deref(),
                user_data: HashedUserData::from_user(&event.user),
                custom_data: custom_data(&event.kind),
            }],
            test_event_code: self.test_event_code.as_deref(),
        };

        let response = self.client.post(url).json(&body).send().await?;
        ensure_success(self.name(), response).await?;
        Ok(Delivery::Sent)
    }
}
