//! Address resolution and property/contact enrichment.
//!
//! Vendor clients never retry and never propagate vendor failures to the
//! funnel: a timeout, non-2xx response or no-match becomes `None`, and the
//! [`LookupAggregator`] fills in zero values.

pub mod aggregator;
pub mod batchdata;
pub mod cache;
pub mod error;
pub mod melissa;
pub mod places;
pub mod source;

mod lenient;

pub use aggregator::{LookupAggregator, DEFAULT_CACHE_TTL_SECS};
pub use batchdata::BatchDataClient;
pub use cache::{CacheEntry, TtlCache};
pub use error::{EnrichError, ResolutionError};
pub use melissa::MelissaClient;
pub use places::PlacesClient;
pub use source::{ContactSource, PropertySource};

/// Per-request timeout applied by every vendor client unless configured.
pub const DEFAULT_VENDOR_TIMEOUT_SECS: u64 = 8;
