//! Vendor event sinks.

mod data_layer;
mod facebook;
mod ga4;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};

use crate::error::TrackingError;
use crate::event::TrackingEvent;

pub use data_layer::DataLayerSink;
pub use facebook::FacebookConversionsSink;
pub use ga4::Ga4Sink;

/// What a sink did with an event it did not fail on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The vendor has no counterpart for this event kind.
    Skipped,
}

#[async_trait]
pub trait TrackingSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, event: &TrackingEvent) -> Result<Delivery, TrackingError>;
}

fn build_client(timeout_secs: u64) -> Result<Client, TrackingError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.min(5)))
        .build()?)
}

fn parse_base_url(base_url: &str) -> Result<Url, TrackingError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| TrackingError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

fn join(base: &Url, path: &str) -> Result<Url, TrackingError> {
    base.join(path).map_err(|e| TrackingError::InvalidBaseUrl {
        url: format!("{base}{path}"),
        reason: e.to_string(),
    })
}

async fn ensure_success(sink: &'static str, response: Response) -> Result<(), TrackingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(TrackingError::UnexpectedStatus {
        sink,
        status: status.as_u16(),
        body,
    })
}
