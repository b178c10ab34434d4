//! End-to-end check that direct filtering and cache-backed filtering agree
//! on a realistic point set.

use caching::spatial::SpatialRegionCache;
use caching::storage::MemoryStorage;
use geo_core::bounds::ViewportBounds;
use geo_core::point::GeoPoint;
use geo_core::time::{DurationMs, TimeMs};
use viewport::controller::{FilterConfig, ViewportFilter};
use viewport::filter::filter_by_viewport;
use viewport::map_view::ManualMapView;

/// SplitMix64, enough PRNG for a reproducible point cloud.
struct SplitMix64(u64);

impl SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    fn in_range(&mut self, lo: f64, hi: f64) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        lo + (hi - lo) * unit
    }
}

fn random_spots(count: usize, seed: u64) -> Vec<GeoPoint> {
    let mut rng = SplitMix64(seed);
    (0..count)
        .map(|_| GeoPoint::new(rng.in_range(31.0, 33.0), rng.in_range(34.0, 35.0)))
        .collect()
}

#[test]
fn cache_backed_filtering_matches_direct_filtering() {
    let spots = random_spots(1000, 0xC0FFEE);
    let viewport = ViewportBounds::new(32.2, 32.0, 34.9, 34.7);
    let buffered = viewport.expanded(0.10);

    // Ground truth, computable directly from the input.
    let expected: usize = spots
        .iter()
        .filter(|p| p.lat >= buffered.south
            && p.lat <= buffered.north
            && p.lon >= buffered.west
            && p.lon <= buffered.east)
        .count();
    assert!(expected > 0, "seed produced no visible spots");

    // Direct filtering.
    let direct = filter_by_viewport(&spots, &buffered);
    assert_eq!(direct.len(), expected);

    // Cache-miss path through the controller.
    let max_age = DurationMs(60_000);
    let cache = SpatialRegionCache::new(MemoryStorage::new(), max_age);
    let mut filter = ViewportFilter::new(cache, FilterConfig::default());
    filter.set_points(spots.clone());

    let view = ManualMapView::new(viewport, 14.0);
    assert!(filter.request_update(&view, TimeMs(0)));
    let first = filter.snapshot().unwrap().clone();
    assert_eq!(first.visible_count, expected);
    assert_eq!(first.visible, direct);
    assert_eq!(first.total, 1000);
    assert_eq!(filter.cache_stats().misses, 1);

    // Cache-hit path: a second controller reloads the persisted regions and
    // serves the identical subset without re-filtering.
    let mut reloaded_cache: SpatialRegionCache<GeoPoint, MemoryStorage> =
        SpatialRegionCache::new(filter.cache().storage().clone(), max_age);
    reloaded_cache.load(TimeMs(1000));
    let mut second = ViewportFilter::new(reloaded_cache, FilterConfig::default());
    second.set_points(spots);

    assert!(second.request_update(&view, TimeMs(1000)));
    let snapshot = second.snapshot().unwrap();
    assert_eq!(snapshot.visible, direct);
    assert_eq!(second.cache_stats().hits, 1);
    assert_eq!(second.cache_stats().misses, 0);
}
