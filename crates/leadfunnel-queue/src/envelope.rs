//! The unit of work carried by the submission queue.

use chrono::{DateTime, Utc};
use leadfunnel_core::{LeadFields, LeadId};
use serde::{Deserialize, Serialize};

/// Prefix of every persisted-state key holding a pending envelope.
pub const PENDING_PREFIX: &str = "pendingSubmission:";

/// A partial lead update awaiting delivery.
///
/// Serialized as `{key, payload, leadId, attemptCount, timestamp}` with the
/// timestamp in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEnvelope {
    pub key: String,
    pub payload: LeadFields,
    pub lead_id: LeadId,
    pub attempt_count: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl SubmissionEnvelope {
    #[must_use]
    pub fn new(key: impl Into<String>, lead_id: LeadId, payload: LeadFields, at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload,
            lead_id,
            attempt_count: 0,
            timestamp: at,
        }
    }

    /// Envelope keyed by the lead itself, so every update for one lead
    /// shares a single retry loop.
    #[must_use]
    pub fn for_lead(lead_id: LeadId, payload: LeadFields, at: DateTime<Utc>) -> Self {
        Self::new(lead_id.to_string(), lead_id, payload, at)
    }

    /// Key under which this envelope is stored in persisted state.
    #[must_use]
    pub fn storage_key(&self) -> String {
        storage_key(&self.key)
    }
}

pub(crate) fn storage_key(key: &str) -> String {
    format!("{PENDING_PREFIX}{key}")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_with_camel_case_keys_and_millisecond_timestamp() {
        let lead_id: LeadId = "6f1c2a8e-3b7d-4c1e-9a55-0d2f4b6e8a10".parse().unwrap();
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let mut payload = LeadFields::new();
        payload.insert("phone".to_string(), json!("(555) 123-4567"));

        let mut envelope = SubmissionEnvelope::for_lead(lead_id, payload, at);
        envelope.attempt_count = 10;

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "key": "6f1c2a8e-3b7d-4c1e-9a55-0d2f4b6e8a10",
                "payload": {"phone": "(555) 123-4567"},
                "leadId": "6f1c2a8e-3b7d-4c1e-9a55-0d2f4b6e8a10",
                "attemptCount": 10,
                "timestamp": 1_700_000_000_123_i64,
            })
        );
        assert_eq!(
            envelope.storage_key(),
            "pendingSubmission:6f1c2a8e-3b7d-4c1e-9a55-0d2f4b6e8a10"
        );
    }
}
