//! Concurrent property + contact enrichment with a TTL cache.

use std::sync::Arc;

use chrono::TimeDelta;
use leadfunnel_core::{Address, AggregatedResult, AppConfig, Clock, ContactRecord, PropertyRecord};

use crate::batchdata::BatchDataClient;
use crate::cache::TtlCache;
use crate::error::{EnrichError, ResolutionError};
use crate::melissa::MelissaClient;
use crate::places::PlacesClient;
use crate::source::{ContactSource, PropertySource};

/// Default time an aggregated result stays fresh.
pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// Runs both enrichment sources for an address and merges whatever came
/// back. A source that is not configured counts as a failed sub-lookup.
pub struct LookupAggregator {
    property: Option<Arc<dyn PropertySource>>,
    contact: Option<Arc<dyn ContactSource>>,
    cache: TtlCache<AggregatedResult>,
}

impl LookupAggregator {
    #[must_use]
    pub fn new(
        property: Option<Arc<dyn PropertySource>>,
        contact: Option<Arc<dyn ContactSource>>,
        ttl: TimeDelta,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if property.is_none() {
            tracing::warn!("no property source configured; valuations will be empty");
        }
        if contact.is_none() {
            tracing::warn!("no contact source configured; skip-trace data will be empty");
        }
        Self {
            property,
            contact,
            cache: TtlCache::new(ttl, clock),
        }
    }

    /// Builds the sources whose keys are configured. A missing key leaves
    /// that side permanently empty.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if a vendor HTTP client cannot be built.
    pub fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self, EnrichError> {
        let vendors = &config.vendors;
        let timeout = config.vendor_timeout_secs;

        let property: Option<Arc<dyn PropertySource>> = match &vendors.melissa_license_key {
            Some(key) => Some(Arc::new(MelissaClient::new(key, timeout)?)),
            None => None,
        };
        let contact: Option<Arc<dyn ContactSource>> = match &vendors.batchdata_api_key {
            Some(key) => Some(Arc::new(BatchDataClient::new(key, timeout)?)),
            None => None,
        };

        let ttl = TimeDelta::seconds(
            i64::try_from(config.cache_ttl_secs).unwrap_or(DEFAULT_CACHE_TTL_SECS),
        );
        Ok(Self::new(property, contact, ttl, clock))
    }

    /// Enriches `address`, serving a cached result when one is fresh.
    ///
    /// Both sources are started together and awaited together; neither
    /// outcome affects the other.
    pub async fn lookup_property(&self, address: &Address) -> AggregatedResult {
        let key = address.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(address = %key, "property lookup served from cache");
            return hit;
        }

        let (property, contact) =
            tokio::join!(self.lookup_valuation(address), self.lookup_contacts(address));

        let result = AggregatedResult::merge(address.clone(), property, contact);
        tracing::info!(
            address = %key,
            melissa = result.property_data_sources.melissa,
            batch_data = result.property_data_sources.batch_data,
            estimated_value = result.api_estimated_value,
            "property lookup complete"
        );

        self.cache.insert(&key, result.clone());
        result
    }

    /// Resolves a place suggestion and enriches the resulting address.
    ///
    /// # Errors
    ///
    /// Propagates [`ResolutionError`] from [`PlacesClient::resolve`];
    /// enrichment itself never fails.
    pub async fn lookup_place(
        &self,
        resolver: &PlacesClient,
        place_id: &str,
    ) -> Result<AggregatedResult, ResolutionError> {
        let address = resolver.resolve(place_id).await?;
        Ok(self.lookup_property(&address).await)
    }

    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    async fn lookup_valuation(&self, address: &Address) -> Option<PropertyRecord> {
        match &self.property {
            Some(source) => source.lookup(address).await,
            None => None,
        }
    }

    async fn lookup_contacts(&self, address: &Address) -> Option<ContactRecord> {
        match &self.contact {
            Some(source) => source.lookup(address).await,
            None => None,
        }
    }
}
