//! "Already tracked" guards against double-counting from repeated UI
//! triggers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use leadfunnel_core::{Clock, LeadId};

use crate::event::EventKind;

pub const DEFAULT_PAGE_VIEW_WINDOW_SECS: i64 = 30;

/// Page views stay remembered until this many distinct paths are tracked,
/// then stale entries are pruned.
const PRUNE_THRESHOLD: usize = 1_024;

/// Page views are suppressed when the same path was tracked less than
/// `page_view_window` ago. Lead events are admitted once per lead id.
/// Custom events always pass.
#[derive(Debug)]
pub struct DedupGuard {
    page_view_window: TimeDelta,
    clock: Arc<dyn Clock>,
    page_views: Mutex<HashMap<String, DateTime<Utc>>>,
    leads: Mutex<HashSet<LeadId>>,
}

impl DedupGuard {
    #[must_use]
    pub fn new(page_view_window: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            page_view_window,
            clock,
            page_views: Mutex::new(HashMap::new()),
            leads: Mutex::new(HashSet::new()),
        }
    }

    /// Returns `true` if `kind` should be dispatched, recording it as
    /// tracked.
    pub fn admit(&self, kind: &EventKind) -> bool {
        match kind {
            EventKind::PageView { path } => self.admit_page_view(path),
            EventKind::Lead { lead_id, .. } => self
                .leads
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(*lead_id),
            EventKind::Custom { .. } => true,
        }
    }

    fn admit_page_view(&self, path: &str) -> bool {
        let now = self.clock.now();
        let mut seen = self
            .page_views
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = seen.get(path) {
            if now - *last < self.page_view_window {
                return false;
            }
        }

        if seen.len() >= PRUNE_THRESHOLD {
            let window = self.page_view_window;
            seen.retain(|_, last| now - *last < window);
        }
        seen.insert(path.to_string(), now);
        true
    }
}
