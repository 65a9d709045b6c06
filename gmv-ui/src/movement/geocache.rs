//! Client-side geocode cache
//!
//! Maps normalized location strings to coordinates. Locations the backend
//! could not place are looked up in the background; every resolution bumps
//! the cache version and emits `GeocodeCacheUpdated` so open views re-derive
//! their segments. A failed lookup is remembered as a miss and not retried
//! until [`GeocodeCache::forget_missed`] is called.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use gmv_common::events::{EventBus, GmvEvent};
use gmv_common::geo::Coordinate;
use gmv_common::models::normalize_location;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::BackendClient;

/// State of one cache key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheEntry {
    Resolved(Coordinate),
    /// Lookup in flight
    Pending,
    /// Lookup finished without a coordinate
    Missed,
}

pub struct GeocodeCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    version: watch::Sender<u64>,
    events: EventBus,
}

impl GeocodeCache {
    pub fn new(events: EventBus) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            entries: RwLock::new(HashMap::new()),
            version,
            events,
        }
    }

    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        self.read().get(key).copied()
    }

    /// Resolved coordinates only, for feeding the transformer
    pub fn snapshot(&self) -> HashMap<String, Coordinate> {
        self.read()
            .iter()
            .filter_map(|(k, v)| match v {
                CacheEntry::Resolved(c) => Some((k.clone(), *c)),
                _ => None,
            })
            .collect()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Watch the cache version
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn pending_count(&self) -> usize {
        self.read()
            .values()
            .filter(|v| matches!(v, CacheEntry::Pending))
            .count()
    }

    /// Store a known coordinate (manual fix or completed lookup)
    ///
    /// `raw` is normalized before storing; blank locations are ignored.
    pub fn insert_resolved(&self, raw: &str, coordinate: Coordinate) {
        let Some(key) = normalize_location(raw) else {
            return;
        };
        self.write().insert(key.clone(), CacheEntry::Resolved(coordinate));
        self.bump(vec![key]);
    }

    /// Mark keys as pending; returns only keys not already known
    pub fn mark_pending(&self, keys: &[String]) -> Vec<String> {
        let mut entries = self.write();
        keys.iter()
            .filter(|key| {
                if entries.contains_key(key.as_str()) {
                    false
                } else {
                    entries.insert((*key).clone(), CacheEntry::Pending);
                    true
                }
            })
            .cloned()
            .collect()
    }

    /// Record the outcome of a lookup
    ///
    /// Only a still-pending key is updated; a manual fix that landed while
    /// the lookup was in flight wins.
    pub fn complete(&self, key: &str, coordinate: Option<Coordinate>) {
        {
            let mut entries = self.write();
            match entries.get_mut(key) {
                Some(entry) if matches!(entry, CacheEntry::Pending) => {
                    *entry = match coordinate {
                        Some(c) => CacheEntry::Resolved(c),
                        None => CacheEntry::Missed,
                    };
                }
                _ => {
                    debug!(key = %key, "Dropping stale geocode lookup result");
                    return;
                }
            }
        }

        // Only a new coordinate changes derived views
        if coordinate.is_some() {
            self.bump(vec![key.to_string()]);
        }
    }

    /// Drop all misses so they are looked up again; returns the dropped keys
    pub fn forget_missed(&self) -> Vec<String> {
        let mut entries = self.write();
        let missed: Vec<String> = entries
            .iter()
            .filter(|(_, v)| matches!(v, CacheEntry::Missed))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &missed {
            entries.remove(key);
        }
        missed
    }

    /// Start background lookups for keys the cache has not seen
    ///
    /// Returns the number of lookups started. Each lookup runs on its own task
    /// and never fails the caller: network errors are logged and recorded as
    /// misses.
    pub fn request_lookups(self: &Arc<Self>, client: Arc<BackendClient>, keys: &[String]) -> usize {
        let fresh = self.mark_pending(keys);
        let started = fresh.len();

        for key in fresh {
            let cache = Arc::clone(self);
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let coordinate = match client.geocode_lookup(&key).await {
                    Ok(Some(hit)) => {
                        Coordinate::from_parts(Some(hit.lat), Some(hit.lng)).or_else(|| {
                            warn!(key = %key, lat = hit.lat, lng = hit.lng, "Geocoder returned out-of-range coordinate");
                            None
                        })
                    }
                    Ok(None) => {
                        debug!(key = %key, "No geocode match");
                        None
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Geocode lookup failed");
                        None
                    }
                };
                cache.complete(&key, coordinate);
            });
        }

        if started > 0 {
            info!(started, "Queued geocode lookups");
        }
        started
    }

    fn bump(&self, keys: Vec<String>) {
        let mut version = 0;
        self.version.send_modify(|v| {
            *v += 1;
            version = *v;
        });
        self.events.emit_lossy(GmvEvent::GeocodeCacheUpdated {
            version,
            keys,
            timestamp: Utc::now(),
        });
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
