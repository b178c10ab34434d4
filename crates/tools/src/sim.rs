//! Deterministic pan/zoom session simulator.
//!
//! Replays a scripted map session against the full stack: a rate-limited
//! "feed fetch", the time-bounded memo cache, and the viewport controller
//! backed by the spatial region cache. Wall-clock time is only read to pick
//! a base timestamp when persistence is on; everything else runs on a manual
//! clock so a seeded run replays exactly.

use std::path::PathBuf;

use caching::memo::TimeBoundedCache;
use caching::spatial::SpatialRegionCache;
use caching::stats::CacheStats;
use caching::storage::{FileStorage, KeyValueStorage, MemoryStorage};
use geo_core::bounds::ViewportBounds;
use geo_core::point::GeoPoint;
use geo_core::time::{Clock, DurationMs, SystemClock, TimeMs};
use timing::rate_limit::RateLimiter;
use timing::throttle::Throttle;
use viewport::controller::{FilterConfig, ViewportFilter};
use viewport::map_view::{ManualMapView, MapEvent, MapView};

use crate::rng::SplitMix64;

/// Cached feed entries older than this are stale.
const FEED_MAX_AGE: DurationMs = DurationMs(5 * 60 * 1000);

/// Minimum spacing between simulated feed fetches.
const FETCH_MIN_INTERVAL: DurationMs = DurationMs(1000);

/// Upper bound on backed-off fetch spacing.
const FETCH_MAX_BACKOFF: DurationMs = DurationMs(8000);

/// Logical memo key for the full spot list.
const SPOTS_KEY: &str = "spots";

#[derive(Debug, Clone)]
pub struct SimOptions {
    pub spots: usize,
    pub seed: u64,
    pub steps: usize,
    pub spots_file: Option<PathBuf>,
    pub persist_dir: Option<PathBuf>,
    /// Every n-th fetch fails; 0 disables simulated failures.
    pub fail_every: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            spots: 1000,
            seed: 1,
            steps: 20,
            spots_file: None,
            persist_dir: None,
            fail_every: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub step: usize,
    pub zoom: f64,
    pub visible: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct SimReport {
    pub steps: Vec<StepReport>,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub spatial_stats: CacheStats,
    pub memo_stats: CacheStats,
}

/// Generates `count` spots uniformly over the default city box.
pub fn generate_spots(count: usize, rng: &mut SplitMix64) -> Vec<GeoPoint> {
    (0..count)
        .map(|_| GeoPoint::new(rng.in_range(31.0, 33.0), rng.in_range(34.0, 35.0)))
        .collect()
}

fn load_spots(options: &SimOptions, rng: &mut SplitMix64) -> Result<Vec<GeoPoint>, String> {
    match &options.spots_file {
        None => Ok(generate_spots(options.spots, rng)),
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            serde_json::from_str(&raw).map_err(|e| format!("invalid spots file: {e}"))
        }
    }
}

pub fn run(options: &SimOptions) -> Result<SimReport, String> {
    let mut rng = SplitMix64::new(options.seed);
    let spots = load_spots(options, &mut rng)?;

    let storage: Box<dyn KeyValueStorage> = match &options.persist_dir {
        Some(dir) => Box::new(FileStorage::new(dir.clone())),
        None => Box::new(MemoryStorage::new()),
    };

    // With durable storage, timestamps must be comparable across runs.
    let mut now = if options.persist_dir.is_some() {
        SystemClock.now()
    } else {
        TimeMs(0)
    };

    let mut cache: SpatialRegionCache<GeoPoint, Box<dyn KeyValueStorage>> =
        SpatialRegionCache::new(storage, FEED_MAX_AGE);
    cache.load(now);
    let mut filter = ViewportFilter::new(cache, FilterConfig::default());

    let mut memo: TimeBoundedCache<Vec<GeoPoint>> = TimeBoundedCache::new(50, FEED_MAX_AGE);
    let mut limiter: RateLimiter<Vec<GeoPoint>, String> =
        RateLimiter::new(FETCH_MIN_INTERVAL, FETCH_MAX_BACKOFF);

    let mut fetches = 0u64;
    let mut fetch_failures = 0u64;
    let mut fetch_and_apply = |filter: &mut ViewportFilter<GeoPoint, Box<dyn KeyValueStorage>>,
                               memo: &mut TimeBoundedCache<Vec<GeoPoint>>,
                               limiter: &mut RateLimiter<Vec<GeoPoint>, String>,
                               fetches: &mut u64,
                               fetch_failures: &mut u64,
                               now: TimeMs| {
        *fetches += 1;
        let fail = options.fail_every > 0 && (*fetches as usize) % options.fail_every == 0;
        let payload = spots.clone();
        limiter.submit(move || {
            if fail {
                Err("simulated feed outage".to_string())
            } else {
                Ok(payload)
            }
        });

        if let Some((_id, outcome)) = limiter.poll(now) {
            match outcome {
                Ok(list) => {
                    memo.set(SPOTS_KEY, list.clone(), now);
                    filter.set_points(list);
                }
                Err(e) => {
                    *fetch_failures += 1;
                    tracing::warn!(error = %e, "feed fetch failed, falling back to cache");
                    // Stale-but-usable beats showing nothing.
                    if let Some(cached) = memo.get(SPOTS_KEY, now) {
                        filter.set_points(cached.clone());
                    }
                }
            }
        }
    };

    let mut view = ManualMapView::new(ViewportBounds::new(32.2, 32.0, 34.9, 34.7), 14.0);

    // Render ticks arrive faster than recomputation is worth; the throttle
    // drops the excess on the leading edge.
    let mut render_throttle = Throttle::new(DurationMs(400));

    fetch_and_apply(
        &mut filter,
        &mut memo,
        &mut limiter,
        &mut fetches,
        &mut fetch_failures,
        now,
    );
    filter.request_update(&view, now);

    let mut steps = Vec::with_capacity(options.steps);
    for step in 0..options.steps {
        let zooming = step % 5 == 4;
        if zooming {
            filter.on_event(MapEvent::ZoomStart, now);
            view.set_zoom(view.zoom() + if step % 10 == 9 { -0.5 } else { 0.5 });
        } else {
            filter.on_event(MapEvent::MoveStart, now);
            view.pan(rng.in_range(-0.3, 0.3), rng.in_range(-0.3, 0.3));
        }

        // A render tick lands mid-animation; it must defer, not race.
        now = now.add(DurationMs(150));
        if render_throttle.try_fire(now) {
            filter.request_update(&view, now);
        }

        now = now.add(DurationMs(150));
        filter.on_event(
            if zooming {
                MapEvent::ZoomEnd
            } else {
                MapEvent::MoveEnd
            },
            now,
        );

        now = now.add(DurationMs(300));
        filter.poll(&view, now);

        // Refresh the feed now and then, spaced by the rate limiter.
        if step % 10 == 9 {
            fetch_and_apply(
                &mut filter,
                &mut memo,
                &mut limiter,
                &mut fetches,
                &mut fetch_failures,
                now,
            );
        }

        let (visible, total, zoom) = match filter.snapshot() {
            Some(s) => (s.visible_count, s.total, s.zoom),
            None => (0, filter.points().len(), view.zoom()),
        };
        steps.push(StepReport {
            step,
            zoom,
            visible,
            total,
        });

        now = now.add(DurationMs(400));
    }

    Ok(SimReport {
        steps,
        fetches,
        fetch_failures,
        spatial_stats: filter.cache_stats(),
        memo_stats: memo.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::{SimOptions, run};

    #[test]
    fn seeded_runs_replay_identically() {
        let options = SimOptions {
            steps: 12,
            ..SimOptions::default()
        };
        let a = run(&options).unwrap();
        let b = run(&options).unwrap();
        assert_eq!(a.steps.len(), b.steps.len());
        for (sa, sb) in a.steps.iter().zip(b.steps.iter()) {
            assert_eq!(sa.visible, sb.visible);
            assert_eq!(sa.zoom, sb.zoom);
        }
    }

    #[test]
    fn failed_fetches_fall_back_to_the_memo_cache() {
        let options = SimOptions {
            steps: 25,
            fail_every: 2,
            ..SimOptions::default()
        };
        let report = run(&options).unwrap();
        assert!(report.fetch_failures > 0);
        // The controller always has a point set to filter.
        assert!(report.steps.iter().all(|s| s.total == 1000));
    }

    #[test]
    fn visible_counts_stay_within_the_total() {
        let report = run(&SimOptions::default()).unwrap();
        assert!(report.steps.iter().all(|s| s.visible <= s.total));
        assert!(report.spatial_stats.lookups() > 0);
    }
}
