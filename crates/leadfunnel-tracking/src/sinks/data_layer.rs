use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{Delivery, TrackingSink};
use crate::error::TrackingError;
use crate::event::{EventKind, TrackingEvent};

const DEFAULT_CAPACITY: usize = 500;

/// In-process tag-manager data layer: a bounded buffer of
/// `{event, eventId, ...}` objects. The oldest entry is dropped when full.
#[derive(Debug)]
pub struct DataLayerSink {
    capacity: usize,
    entries: Mutex<VecDeque<Value>>,
}

impl Default for DataLayerSink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DataLayerSink {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn drain(&self) -> Vec<Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}

fn entry_for(event: &TrackingEvent) -> Value {
    let mut entry = Map::new();
    entry.insert("event".to_string(), json!(event.name()));
    entry.insert("eventId".to_string(), json!(event.event_id));
    match &event.kind {
        EventKind::PageView { path } => {
            entry.insert("pagePath".to_string(), json!(path));
        }
        EventKind::Lead {
            lead_id,
            value,
            currency,
        } => {
            entry.insert("leadId".to_string(), json!(lead_id));
            if let Some(value) = value {
                entry.insert("value".to_string(), json!(value));
                entry.insert(
                    "currency".to_string(),
                    json!(currency.as_deref().unwrap_or("USD")),
                );
            }
        }
        EventKind::Custom { params, .. } => {
            for (key, value) in params {
                entry.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }
    Value::Object(entry)
}

#[async_trait]
impl TrackingSink for DataLayerSink {
    fn name(&self) -> &'static str {
        "data_layer"
    }

    async fn send(&self, event: &TrackingEvent) -> Result<Delivery, TrackingError> {
        let entry = entry_for(event);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        Ok(Delivery::Sent)
    }
}
