//! Attribution events as accepted from the funnel front end.

use chrono::{DateTime, Utc};
use leadfunnel_core::LeadId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventKind {
    PageView {
        path: String,
    },
    Lead {
        lead_id: LeadId,
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        currency: Option<String>,
    },
    Custom {
        name: String,
        #[serde(default)]
        params: Map<String, Value>,
    },
}

impl EventKind {
    /// Vendor-neutral event name, in Facebook's standard-event spelling.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            EventKind::PageView { .. } => "PageView",
            EventKind::Lead { .. } => "Lead",
            EventKind::Custom { name, .. } => name,
        }
    }
}

/// Visitor details used for vendor-side matching. Sinks hash what their
/// vendor requires hashed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Facebook click cookie (`_fbc`).
    pub fbc: Option<String>,
    /// Facebook browser cookie (`_fbp`).
    pub fbp: Option<String>,
    /// GA4 client id from the `_ga` cookie.
    pub client_id: Option<String>,
}

/// One event, fanned out to every sink with the same `event_id` so vendors
/// can de-duplicate browser and server copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub event_id: String,
    #[serde(flatten)]
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub user: UserData,
}

impl TrackingEvent {
    #[must_use]
    pub fn new(kind: EventKind, at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            occurred_at: at,
            source_url: None,
            user: UserData::default(),
        }
    }

    #[must_use]
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: UserData) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.kind.name()
    }
}
