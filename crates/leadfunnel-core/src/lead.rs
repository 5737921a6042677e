//! The lead document and its funnel progression.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Partial lead document: a flat JSON object merged into the stored lead.
pub type LeadFields = serde_json::Map<String, Value>;

/// Opaque lead identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(Uuid);

impl LeadId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LeadId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for LeadId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for LeadId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Funnel position recorded on the lead under `funnelStep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FunnelStep {
    AddressEntry,
    Enrichment,
    ContactCollection,
    Submitted,
}

impl FunnelStep {
    pub const FIELD: &'static str = "funnelStep";

    /// Returns the step the lead is in after the visitor reaches `next`.
    ///
    /// Earlier steps may be re-entered (back button) until the lead is
    /// submitted; `Submitted` is terminal.
    #[must_use]
    pub fn advance(self, next: FunnelStep) -> FunnelStep {
        if self == FunnelStep::Submitted {
            FunnelStep::Submitted
        } else {
            next
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FunnelStep::AddressEntry => "addressEntry",
            FunnelStep::Enrichment => "enrichment",
            FunnelStep::ContactCollection => "contactCollection",
            FunnelStep::Submitted => "submitted",
        }
    }

    /// Reads a `funnelStep` JSON value; anything but a known step name is
    /// `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    pub fields: LeadFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Shallow-merges `update` into the document. Keys present in `update`
    /// overwrite; absent keys are untouched. `funnelStep` follows
    /// [`FunnelStep::advance`].
    pub fn merge(&mut self, update: LeadFields, at: DateTime<Utc>) {
        merge_fields(&mut self.fields, update);
        self.updated_at = at;
    }

    #[must_use]
    pub fn funnel_step(&self) -> Option<FunnelStep> {
        self.fields.get(FunnelStep::FIELD).and_then(FunnelStep::from_value)
    }
}

/// Shallow field merge with the funnel-step rule applied.
///
/// `funnelStep` only ever holds a known step: unknown values are dropped,
/// and nothing replaces `submitted`.
pub fn merge_fields(target: &mut LeadFields, update: LeadFields) {
    let current = target.get(FunnelStep::FIELD).and_then(FunnelStep::from_value);
    for (key, value) in update {
        if key != FunnelStep::FIELD {
            target.insert(key, value);
            continue;
        }
        let Some(next) = FunnelStep::from_value(&value) else {
            continue;
        };
        let step = current.map_or(next, |current| current.advance(next));
        target.insert(key, Value::from(step.as_str()));
    }
}

/// Campaign metadata captured on the landing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    pub campaign_name: Option<String>,
    pub campaign_id: Option<String>,
    pub adset_name: Option<String>,
    pub adset_id: Option<String>,
    pub ad_name: Option<String>,
    pub ad_id: Option<String>,
    pub gclid: Option<String>,
    pub fbclid: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub landing_page: Option<String>,
}

impl Attribution {
    /// Initial lead fields: every present attribution value plus the
    /// starting funnel step.
    #[must_use]
    pub fn to_fields(&self) -> LeadFields {
        let mut fields = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => LeadFields::new(),
        };
        fields.retain(|_, v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        });
        fields.insert(
            FunnelStep::FIELD.to_string(),
            Value::from(FunnelStep::AddressEntry.as_str()),
        );
        fields
    }
}
