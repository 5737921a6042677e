//! Attribution event fan-out to analytics vendors.
//!
//! [`TrackingDispatcher::track`] runs the de-duplication guard synchronously
//! and then hands the event to every configured [`TrackingSink`] on its own
//! task. Sink failures are logged and reported through the returned
//! [`DispatchHandle`]; they never reach the caller as errors.

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod guard;
pub mod sinks;

pub use dispatcher::{DispatchHandle, SinkOutcome, SinkStatus, TrackingDispatcher};
pub use error::TrackingError;
pub use event::{EventKind, TrackingEvent, UserData};
pub use guard::{DedupGuard, DEFAULT_PAGE_VIEW_WINDOW_SECS};
pub use sinks::{DataLayerSink, Delivery, FacebookConversionsSink, Ga4Sink, TrackingSink};
