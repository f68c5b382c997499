//! IP geolocation enrichment.
//!
//! Lives outside the analysis pipeline: it reads the IP key set of an
//! [`EventStore`] and never feeds anything back. Every failure, timeout
//! included, turns into an all-absent [`GeoLocation`] for that address.

pub mod cache;
pub mod ipinfo;

pub use cache::{CacheStats, GeoCache};
pub use ipinfo::IpInfoProvider;

use crate::config::GeoSettings;
use crate::error::Result;
use crate::event::Event;
use crate::store::EventStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Lookup request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl GeoLocation {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

#[async_trait::async_trait]
pub trait GeoProvider: Send + Sync {
    async fn lookup(&self, ip: &str) -> std::result::Result<GeoLocation, GeoError>;
    fn get_provider_name(&self) -> &str;
}

/// Resolves IPs through a provider, memoizing every answer in a [`GeoCache`].
pub struct GeoEnricher {
    provider: Arc<dyn GeoProvider>,
    cache: GeoCache,
    timeout: Duration,
}

impl GeoEnricher {
    pub fn new(provider: Arc<dyn GeoProvider>, cache: GeoCache, timeout: Duration) -> Self {
        Self {
            provider,
            cache,
            timeout,
        }
    }

    /// Enricher backed by [`IpInfoProvider`], configured from `[geo]`.
    pub fn from_settings(settings: &GeoSettings) -> Result<Self> {
        let provider = IpInfoProvider::new(settings.endpoint.clone(), settings.timeout())?;
        Ok(Self::new(
            Arc::new(provider),
            GeoCache::new(settings.cache_capacity, settings.cache_ttl()),
            settings.timeout(),
        ))
    }

    pub fn cache(&self) -> &GeoCache {
        &self.cache
    }

    /// Location for one address; never fails.
    pub async fn locate(&self, ip: &str) -> GeoLocation {
        if let Some(location) = self.cache.get(ip) {
            return location;
        }

        let outcome = match tokio::time::timeout(self.timeout, self.provider.lookup(ip)).await {
            Ok(result) => result,
            Err(_) => Err(GeoError::Timeout(self.timeout)),
        };
        let location = outcome.unwrap_or_else(|e| {
            warn!("Geolocation for {} via {} failed: {}", ip, self.provider.get_provider_name(), e);
            GeoLocation::absent()
        });

        self.cache.put(ip.to_string(), location.clone());
        location
    }

    pub async fn resolve(&self, ips: &BTreeSet<String>) -> HashMap<String, GeoLocation> {
        let mut locations = HashMap::with_capacity(ips.len());
        for ip in ips {
            locations.insert(ip.clone(), self.locate(ip).await);
        }

        let located = locations.values().filter(|l| l.has_coordinates()).count();
        let stats = self.cache.stats();
        info!(
            "Resolved {} of {} IPs (cache hits {}, misses {})",
            located,
            ips.len(),
            stats.hits,
            stats.misses
        );
        locations
    }

    pub async fn resolve_store(&self, store: &EventStore) -> HashMap<String, GeoLocation> {
        self.resolve(&store.ip_keys()).await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoTaggedEvent {
    pub event: Event,
    pub location: GeoLocation,
}

/// Pairs events with their address's location. Events without an IP, or
/// whose IP has no coordinates, are left out.
pub fn geo_join(store: &EventStore, locations: &HashMap<String, GeoLocation>) -> Vec<GeoTaggedEvent> {
    let joined: Vec<GeoTaggedEvent> = store
        .events()
        .iter()
        .filter_map(|event| {
            let location = locations.get(event.ip.as_ref()?)?;
            location.has_coordinates().then(|| GeoTaggedEvent {
                event: event.clone(),
                location: location.clone(),
            })
        })
        .collect();
    debug!("Geo join kept {} of {} events", joined.len(), store.len());
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::SourceLines;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        calls: Arc<AtomicUsize>,
        delay: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl GeoProvider for MockProvider {
        async fn lookup(&self, ip: &str) -> std::result::Result<GeoLocation, GeoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if ip.starts_with("10.") {
                return Err(GeoError::InvalidResponse("private range".to_string()));
            }
            Ok(GeoLocation {
                latitude: Some(52.37),
                longitude: Some(4.89),
                city: Some("Amsterdam".to_string()),
                country: Some("NL".to_string()),
            })
        }

        fn get_provider_name(&self) -> &str {
            "mock"
        }
    }

    fn enricher(calls: Arc<AtomicUsize>, delay: Option<Duration>) -> GeoEnricher {
        GeoEnricher::new(
            Arc::new(MockProvider { calls, delay }),
            GeoCache::new(16, Duration::from_secs(60)),
            Duration::from_millis(200),
        )
    }

    fn store() -> EventStore {
        EventStore::from_sources(&[SourceLines::from_text(
            "TXT",
            "[ts:1] usr:a IP:8.8.8.8\n\
             [ts:2] usr:b IP:8.8.8.8\n\
             [ts:3] usr:c IP:10.0.0.5\n\
             [ts:4] usr:d\n\
             IP:1.2.3.4\n",
        )])
    }

    #[tokio::test]
    async fn test_each_ip_looked_up_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let enricher = enricher(calls.clone(), None);
        let store = store();

        let first = enricher.resolve_store(&store).await;
        let second = enricher.resolve_store(&store).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(first, second);
        assert!(!first.contains_key("1.2.3.4"));
    }

    #[tokio::test]
    async fn test_failures_become_absent_and_are_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let enricher = enricher(calls.clone(), None);

        assert_eq!(enricher.locate("10.0.0.5").await, GeoLocation::absent());
        assert_eq!(enricher.locate("10.0.0.5").await, GeoLocation::absent());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_becomes_absent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let enricher = enricher(calls, Some(Duration::from_secs(5)));

        let location = enricher.locate("8.8.4.4").await;
        assert!(!location.has_coordinates());
    }

    #[tokio::test]
    async fn test_geo_join_drops_unlocated_events() {
        let enricher = enricher(Arc::new(AtomicUsize::new(0)), None);
        let store = store();
        let locations = enricher.resolve_store(&store).await;

        let joined = geo_join(&store, &locations);
        let users: Vec<&str> = joined
            .iter()
            .map(|tagged| tagged.event.user.as_deref().unwrap())
            .collect();
        assert_eq!(users, vec!["a", "b"]);
        assert_eq!(joined[0].location.city.as_deref(), Some("Amsterdam"));
    }
}
