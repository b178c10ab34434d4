use std::collections::HashMap;
use std::collections::VecDeque;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use geo_core::bounds::ViewportBounds;
use geo_core::point::{LatLon, is_valid_lat_lon};
use geo_core::time::{DurationMs, TimeMs};

use crate::stats::CacheStats;
use crate::storage::KeyValueStorage;

/// Version tag for the persisted payload; bumped on any layout change.
pub const SCHEMA_VERSION: &str = "1";

/// Default storage key for the persisted region set.
pub const DEFAULT_STORAGE_KEY: &str = "spatial-regions.v1";

/// Default maximum number of cached regions.
pub const DEFAULT_MAX_REGIONS: usize = 20;

/// Zoom level at which key rounding switches from 3 to 4 decimal digits.
///
/// The threshold is a tuned heuristic carried over unchanged for behavioral
/// compatibility with persisted keys.
const FINE_PRECISION_ZOOM: f64 = 15.0;

/// Derives the cache key for a bounds/zoom pair.
///
/// Bounds are rounded coarsely at low zoom and finely at high zoom, then
/// concatenated with the floored zoom level. Distinct bounds that round to
/// the same key are intentionally treated as identical queries.
pub fn region_key(bounds: &ViewportBounds, zoom: f64) -> String {
    let digits: usize = if zoom >= FINE_PRECISION_ZOOM { 4 } else { 3 };
    format!(
        "{:.digits$},{:.digits$},{:.digits$},{:.digits$}:{}",
        bounds.north,
        bounds.south,
        bounds.east,
        bounds.west,
        zoom.floor() as i64,
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Region<P> {
    bounds: ViewportBounds,
    data: Vec<P>,
    timestamp: TimeMs,
    zoom: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRegion<P> {
    key: String,
    bounds: ViewportBounds,
    data: Vec<P>,
    timestamp: TimeMs,
    zoom: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache<P> {
    version: String,
    regions: Vec<PersistedRegion<P>>,
}

/// Lookup outcome classification, mostly useful for logs and tests.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    ExactHit,
    PartialHit,
    Miss,
}

/// Caches viewport-filtered point subsets across small map movements.
///
/// Lookups have three outcomes: an exact hit on the rounded key, a partial
/// hit where a fresh overlapping region at a nearby zoom is narrowed to the
/// query bounds, and a miss. Panning a map produces heavily overlapping
/// queries, so the partial path is what saves re-filtering the full point
/// set on every pixel of pan.
///
/// Every insert persists the whole region set to the injected storage
/// best-effort; a write failure is logged and the in-memory state stays
/// authoritative. Construct one of these explicitly and hand it to the
/// controller that owns the map; there is no process-wide instance.
#[derive(Debug)]
pub struct SpatialRegionCache<P, S> {
    max_age: DurationMs,
    max_regions: usize,
    storage_key: String,
    regions: HashMap<String, Region<P>>,
    order: VecDeque<String>,
    storage: S,
    stats: CacheStats,
}

impl<P, S> SpatialRegionCache<P, S>
where
    P: LatLon + Clone + Serialize + DeserializeOwned,
    S: KeyValueStorage,
{
    pub fn new(storage: S, max_age: DurationMs) -> Self {
        Self::with_limits(storage, max_age, DEFAULT_MAX_REGIONS, DEFAULT_STORAGE_KEY)
    }

    pub fn with_limits(
        storage: S,
        max_age: DurationMs,
        max_regions: usize,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            max_age,
            max_regions: max_regions.max(1),
            storage_key: storage_key.into(),
            regions: HashMap::new(),
            order: VecDeque::new(),
            storage,
            stats: CacheStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn contains_key(&self, bounds: &ViewportBounds, zoom: f64) -> bool {
        self.regions.contains_key(&region_key(bounds, zoom))
    }

    /// Looks up cached points for the query, or None on a miss.
    ///
    /// On a miss the caller is expected to filter the full point set itself
    /// and hand the result to [`insert`](Self::insert).
    pub fn get(&mut self, bounds: &ViewportBounds, zoom: f64, now: TimeMs) -> Option<Vec<P>> {
        let (outcome, data) = self.lookup(bounds, zoom, now);
        match outcome {
            LookupOutcome::ExactHit => self.stats.hits += 1,
            LookupOutcome::PartialHit => self.stats.partial_hits += 1,
            LookupOutcome::Miss => self.stats.misses += 1,
        }
        data
    }

    fn lookup(
        &self,
        bounds: &ViewportBounds,
        zoom: f64,
        now: TimeMs,
    ) -> (LookupOutcome, Option<Vec<P>>) {
        let key = region_key(bounds, zoom);
        if let Some(region) = self.regions.get(&key) {
            if now.elapsed_since(region.timestamp) < self.max_age {
                return (LookupOutcome::ExactHit, Some(region.data.clone()));
            }
        }

        // Partial pass: first fresh overlapping region at a nearby zoom wins,
        // scanned in insertion order. No merging of multiple candidates.
        for candidate_key in &self.order {
            let Some(region) = self.regions.get(candidate_key) else {
                continue;
            };
            if now.elapsed_since(region.timestamp) >= self.max_age {
                continue;
            }
            if (region.zoom - zoom).abs() > 1.0 {
                continue;
            }
            if !region.bounds.overlaps(bounds) {
                continue;
            }

            let filtered: Vec<P> = region
                .data
                .iter()
                .filter(|p| {
                    is_valid_lat_lon(p.lat(), p.lon()) && bounds.contains(p.lat(), p.lon())
                })
                .cloned()
                .collect();
            if !filtered.is_empty() {
                return (LookupOutcome::PartialHit, Some(filtered));
            }
        }

        (LookupOutcome::Miss, None)
    }

    /// Stores a computed subset under the exact bounds/zoom key and persists
    /// the whole cache best-effort.
    ///
    /// A new key at the region limit evicts the oldest-inserted region first;
    /// re-inserting an existing key keeps its position in the scan order.
    pub fn insert(&mut self, bounds: &ViewportBounds, zoom: f64, data: Vec<P>, now: TimeMs) {
        let key = region_key(bounds, zoom);

        if !self.regions.contains_key(&key) && self.regions.len() >= self.max_regions {
            if let Some(oldest) = self.order.pop_front() {
                self.regions.remove(&oldest);
                self.stats.evictions += 1;
            }
        }

        let region = Region {
            bounds: *bounds,
            data,
            timestamp: now,
            zoom,
        };
        if self.regions.insert(key.clone(), region).is_none() {
            self.order.push_back(key);
        }

        self.persist();
    }

    /// Rebuilds the in-memory cache from storage, dropping entries that are
    /// already stale. Missing or corrupt payloads read as an empty cache.
    pub fn load(&mut self, now: TimeMs) {
        let Some(raw) = self.storage.get_item(&self.storage_key) else {
            return;
        };

        let payload: PersistedCache<P> = match serde_json::from_str(&raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "corrupt persisted spatial cache, starting empty");
                return;
            }
        };
        if payload.version != SCHEMA_VERSION {
            tracing::warn!(
                version = %payload.version,
                "persisted spatial cache has an unknown schema version, starting empty"
            );
            return;
        }

        self.regions.clear();
        self.order.clear();
        for persisted in payload.regions {
            if now.elapsed_since(persisted.timestamp) >= self.max_age {
                continue;
            }
            let region = Region {
                bounds: persisted.bounds,
                data: persisted.data,
                timestamp: persisted.timestamp,
                zoom: persisted.zoom,
            };
            if self.regions.insert(persisted.key.clone(), region).is_none() {
                self.order.push_back(persisted.key);
            }
        }
        tracing::debug!(regions = self.regions.len(), "loaded spatial cache");
    }

    pub fn clear(&mut self) {
        self.regions.clear();
        self.order.clear();
        self.storage.remove_item(&self.storage_key);
    }

    fn persist(&mut self) {
        // Regions are written in insertion order so a reload preserves the
        // first-match scan semantics.
        let regions: Vec<PersistedRegion<P>> = self
            .order
            .iter()
            .filter_map(|key| {
                self.regions.get(key).map(|region| PersistedRegion {
                    key: key.clone(),
                    bounds: region.bounds,
                    data: region.data.clone(),
                    timestamp: region.timestamp,
                    zoom: region.zoom,
                })
            })
            .collect();
        let payload = PersistedCache {
            version: SCHEMA_VERSION.to_string(),
            regions,
        };

        let raw = match serde_json::to_string(&payload) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize spatial cache");
                return;
            }
        };
        if let Err(e) = self.storage.set_item(&self.storage_key, &raw) {
            tracing::warn!(error = %e, "failed to persist spatial cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_MAX_REGIONS, SpatialRegionCache, region_key};
    use crate::storage::{KeyValueStorage, MemoryStorage};
    use geo_core::bounds::ViewportBounds;
    use geo_core::point::GeoPoint;
    use geo_core::time::{DurationMs, TimeMs};

    const MAX_AGE: DurationMs = DurationMs(60_000);

    fn cache() -> SpatialRegionCache<GeoPoint, MemoryStorage> {
        SpatialRegionCache::new(MemoryStorage::new(), MAX_AGE)
    }

    fn bounds(north: f64, south: f64, east: f64, west: f64) -> ViewportBounds {
        ViewportBounds::new(north, south, east, west)
    }

    #[test]
    fn key_rounding_is_coarser_at_low_zoom() {
        let a = bounds(32.2004, 32.0, 34.9, 34.7);
        let b = bounds(32.2, 32.0, 34.9, 34.7);
        assert_eq!(region_key(&a, 12.0), region_key(&b, 12.0));
        assert_ne!(region_key(&a, 16.0), region_key(&b, 16.0));
    }

    #[test]
    fn key_includes_floored_zoom() {
        let v = bounds(32.2, 32.0, 34.9, 34.7);
        assert_eq!(region_key(&v, 12.1), region_key(&v, 12.9));
        assert_ne!(region_key(&v, 12.9), region_key(&v, 13.0));
    }

    #[test]
    fn exact_hit_returns_stored_data_verbatim() {
        let mut cache = cache();
        let v = bounds(32.2, 32.0, 34.9, 34.7);
        let data = vec![GeoPoint::new(32.1, 34.8), GeoPoint::new(32.05, 34.75)];
        cache.insert(&v, 14.0, data.clone(), TimeMs(0));

        assert_eq!(cache.get(&v, 14.0, TimeMs(1000)), Some(data));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn stale_entries_read_as_misses() {
        let mut cache = cache();
        let v = bounds(32.2, 32.0, 34.9, 34.7);
        cache.insert(&v, 14.0, vec![GeoPoint::new(32.1, 34.8)], TimeMs(0));

        assert_eq!(cache.get(&v, 14.0, TimeMs(MAX_AGE.0)), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn partial_hit_filters_an_overlapping_region() {
        let mut cache = cache();
        let big = bounds(33.0, 31.0, 35.0, 34.0);
        let inside = GeoPoint::new(32.1, 34.8);
        let outside = GeoPoint::new(31.5, 34.2);
        cache.insert(&big, 14.0, vec![inside, outside], TimeMs(0));

        let query = bounds(32.2, 32.0, 34.9, 34.7);
        let result = cache.get(&query, 14.5, TimeMs(1000)).unwrap();
        assert_eq!(result, vec![inside]);
        assert_eq!(cache.stats().partial_hits, 1);
    }

    #[test]
    fn partial_hit_requires_zoom_within_one() {
        let mut cache = cache();
        let big = bounds(33.0, 31.0, 35.0, 34.0);
        cache.insert(&big, 14.0, vec![GeoPoint::new(32.1, 34.8)], TimeMs(0));

        let query = bounds(32.2, 32.0, 34.9, 34.7);
        assert!(cache.get(&query, 15.5, TimeMs(1000)).is_none());
        assert!(cache.get(&query, 15.0, TimeMs(1000)).is_some());
    }

    #[test]
    fn first_overlapping_region_wins() {
        let mut cache = cache();
        let first = bounds(33.0, 31.0, 35.0, 34.0);
        let second = bounds(32.5, 31.5, 35.0, 34.0);
        cache.insert(&first, 14.0, vec![GeoPoint::new(32.1, 34.8)], TimeMs(0));
        cache.insert(
            &second,
            14.0,
            vec![GeoPoint::new(32.1, 34.8), GeoPoint::new(32.05, 34.75)],
            TimeMs(0),
        );

        // Both overlap and both are fresh; insertion order decides.
        let query = bounds(32.2, 32.0, 34.9, 34.7);
        let result = cache.get(&query, 14.0, TimeMs(1000)).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn empty_partial_result_falls_through_to_miss() {
        let mut cache = cache();
        let big = bounds(33.0, 31.0, 35.0, 34.0);
        cache.insert(&big, 14.0, vec![GeoPoint::new(31.2, 34.1)], TimeMs(0));

        // Overlaps, but no stored point lands inside the query bounds.
        let query = bounds(32.2, 32.0, 34.9, 34.7);
        assert_eq!(cache.get(&query, 14.0, TimeMs(1000)), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn eviction_keeps_the_region_count_bounded() {
        let mut cache = cache();
        for i in 0..=DEFAULT_MAX_REGIONS {
            let south = 30.0 + i as f64;
            let v = bounds(south + 0.5, south, 35.0, 34.0);
            cache.insert(&v, 14.0, vec![GeoPoint::new(south + 0.1, 34.5)], TimeMs(0));
        }

        assert_eq!(cache.len(), DEFAULT_MAX_REGIONS);
        // Newest region present, oldest gone.
        let newest = bounds(30.0 + DEFAULT_MAX_REGIONS as f64 + 0.5, 30.0 + DEFAULT_MAX_REGIONS as f64, 35.0, 34.0);
        assert!(cache.contains_key(&newest, 14.0));
        let oldest = bounds(30.5, 30.0, 35.0, 34.0);
        assert!(!cache.contains_key(&oldest, 14.0));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn persists_and_reloads_fresh_regions() {
        let mut cache = cache();
        let v = bounds(32.2, 32.0, 34.9, 34.7);
        let data = vec![GeoPoint::new(32.1, 34.8)];
        cache.insert(&v, 14.0, data.clone(), TimeMs(0));

        let mut reloaded: SpatialRegionCache<GeoPoint, MemoryStorage> =
            SpatialRegionCache::new(cache.storage().clone(), MAX_AGE);
        reloaded.load(TimeMs(1000));
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(&v, 14.0, TimeMs(1000)), Some(data));
    }

    #[test]
    fn load_drops_entries_already_stale() {
        let mut cache = cache();
        let old = bounds(32.2, 32.0, 34.9, 34.7);
        let fresh = bounds(33.2, 33.0, 34.9, 34.7);
        cache.insert(&old, 14.0, vec![GeoPoint::new(32.1, 34.8)], TimeMs(0));
        cache.insert(&fresh, 14.0, vec![GeoPoint::new(33.1, 34.8)], TimeMs(50_000));

        let mut reloaded: SpatialRegionCache<GeoPoint, MemoryStorage> =
            SpatialRegionCache::new(cache.storage().clone(), MAX_AGE);
        reloaded.load(TimeMs(70_000));
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains_key(&fresh, 14.0));
    }

    #[test]
    fn corrupt_payload_reads_as_an_empty_cache() {
        let mut storage = MemoryStorage::new();
        storage
            .set_item(super::DEFAULT_STORAGE_KEY, "not json at all")
            .unwrap();

        let mut cache: SpatialRegionCache<GeoPoint, MemoryStorage> =
            SpatialRegionCache::new(storage, MAX_AGE);
        cache.load(TimeMs(0));
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_payload_reads_as_an_empty_cache() {
        let mut cache = cache();
        cache.load(TimeMs(0));
        assert!(cache.is_empty());
    }
}
