//! Guarded fan-out of events to sinks.

use std::sync::Arc;

use chrono::TimeDelta;
use leadfunnel_core::{AppConfig, Clock};
use tokio::task::JoinHandle;

use crate::error::TrackingError;
use crate::event::TrackingEvent;
use crate::guard::DedupGuard;
use crate::sinks::{DataLayerSink, Delivery, FacebookConversionsSink, Ga4Sink, TrackingSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkStatus {
    Sent,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkOutcome {
    pub sink: &'static str,
    pub status: SinkStatus,
}

/// Per-sink completion of one dispatched event. Dropping the handle lets the
/// sink tasks finish on their own.
#[derive(Debug)]
pub struct DispatchHandle {
    event_id: String,
    tasks: Vec<(&'static str, JoinHandle<SinkStatus>)>,
}

impl DispatchHandle {
    #[must_use]
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Waits for every sink, in registration order.
    pub async fn wait(self) -> Vec<SinkOutcome> {
        let (names, tasks): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        let results = futures::future::join_all(tasks).await;
        names
            .into_iter()
            .zip(results)
            .map(|(sink, joined)| SinkOutcome {
                sink,
                status: joined.unwrap_or_else(|e| SinkStatus::Failed(format!("sink task failed: {e}"))),
            })
            .collect()
    }
}

pub struct TrackingDispatcher {
    sinks: Vec<Arc<dyn TrackingSink>>,
    guard: DedupGuard,
}

impl TrackingDispatcher {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn TrackingSink>>, guard: DedupGuard) -> Self {
        Self { sinks, guard }
    }

    /// Builds the vendor sinks whose credentials are configured, plus the
    /// in-process data layer.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError`] if a configured sink's HTTP client cannot be
    /// built.
    pub fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self, TrackingError> {
        let vendors = &config.vendors;
        let mut sinks: Vec<Arc<dyn TrackingSink>> = Vec::new();

        match (&vendors.facebook_pixel_id, &vendors.facebook_access_token) {
            (Some(pixel_id), Some(token)) => sinks.push(Arc::new(FacebookConversionsSink::new(
                pixel_id,
                token,
                config.vendor_timeout_secs,
            )?)),
            _ => tracing::warn!("FACEBOOK_PIXEL_ID/FACEBOOK_ACCESS_TOKEN not set; Conversions API disabled"),
        }

        match (&vendors.ga4_measurement_id, &vendors.ga4_api_secret) {
            (Some(id), Some(secret)) => sinks.push(Arc::new(Ga4Sink::new(
                id,
                secret,
                config.vendor_timeout_secs,
            )?)),
            _ => tracing::warn!("GA4_MEASUREMENT_ID/GA4_API_SECRET not set; GA4 tracking disabled"),
        }

        sinks.push(Arc::new(DataLayerSink::default()));

        let window = TimeDelta::seconds(i64::try_from(config.page_view_window_secs).unwrap_or(i64::MAX));
        Ok(Self::new(sinks, DedupGuard::new(window, clock)))
    }

    #[must_use]
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Dispatches `event` to every sink unless the guard suppresses it.
    ///
    /// Returns `None` for a suppressed event. Must be called from within a
    /// Tokio runtime.
    pub fn track(&self, event: TrackingEvent) -> Option<DispatchHandle> {
        if !self.guard.admit(&event.kind) {
            tracing::debug!(event = event.name(), event_id = %event.event_id, "tracking event suppressed as duplicate");
            return None;
        }

        let event = Arc::new(event);
        let tasks = self
            .sinks
            .iter()
            .map(|sink| {
                let sink = Arc::clone(sink);
                let event = Arc::clone(&event);
                let name = sink.name();
                let task = tokio::spawn(async move {
                    match sink.send(&event).await {
                        Ok(Delivery::Sent) => SinkStatus::Sent,
                        Ok(Delivery::Skipped) => SinkStatus::Skipped,
                        Err(e) => {
                            tracing::warn!(
                                sink = sink.name(),
                                event = event.name(),
                                event_id = %event.event_id,
                                error = %e,
                                "tracking sink failed"
                            );
                            SinkStatus::Failed(e.to_string())
                        }
                    }
                });
                (name, task)
            })
            .collect();

        Some(DispatchHandle {
            event_id: event.event_id.clone(),
            tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use leadfunnel_core::ManualClock;

    use super::*;
    use crate::event::EventKind;
    use crate::guard::DEFAULT_PAGE_VIEW_WINDOW_SECS;

    struct BrokenSink;

    #[async_trait]
    impl TrackingSink for BrokenSink {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn send(&self, _event: &TrackingEvent) -> Result<Delivery, TrackingError> {
            Err(TrackingError::InvalidBaseUrl {
                url: "nowhere".to_string(),
                reason: "test".to_string(),
            })
        }
    }

    fn dispatcher(sinks: Vec<Arc<dyn TrackingSink>>) -> (TrackingDispatcher, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let guard = DedupGuard::new(
            TimeDelta::seconds(DEFAULT_PAGE_VIEW_WINDOW_SECS),
            clock.clone(),
        );
        (TrackingDispatcher::new(sinks, guard), clock)
    }

    fn page_view(path: &str) -> TrackingEvent {
        TrackingEvent::new(
            EventKind::PageView {
                path: path.to_string(),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn failing_sink_does_not_affect_others() {
        let layer = Arc::new(DataLayerSink::default());
        let (dispatcher, _clock) = dispatcher(vec![Arc::new(BrokenSink), layer.clone()]);

        let outcomes = dispatcher
            .track(page_view("/"))
            .expect("first page view is admitted")
            .wait()
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].sink, "broken");
        assert!(matches!(outcomes[0].status, SinkStatus::Failed(_)));
        assert_eq!(
            outcomes[1],
            SinkOutcome {
                sink: "data_layer",
                status: SinkStatus::Sent
            }
        );
        assert_eq!(layer.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_page_view_returns_none() {
        let layer = Arc::new(DataLayerSink::default());
        let (dispatcher, clock) = dispatcher(vec![layer.clone()]);

        assert!(dispatcher.track(page_view("/")).is_some());
        clock.advance(TimeDelta::seconds(5));
        assert!(dispatcher.track(page_view("/")).is_none());
        clock.advance(TimeDelta::seconds(30));
        let handle = dispatcher.track(page_view("/")).expect("window elapsed");
        handle.wait().await;

        assert_eq!(layer.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn every_sink_sees_the_same_event_id() {
        let first = Arc::new(DataLayerSink::default());
        let second = Arc::new(DataLayerSink::default());
        let (dispatcher, _clock) = dispatcher(vec![first.clone(), second.clone()]);

        let handle = dispatcher
            .track(page_view("/").with_event_id("evt-42"))
            .expect("admitted");
        assert_eq!(handle.event_id(), "evt-42");
        handle.wait().await;

        assert_eq!(first.snapshot()[0]["eventId"], "evt-42");
        assert_eq!(second.snapshot()[0]["eventId"], "evt-42");
    }
}
