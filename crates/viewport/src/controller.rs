//! Viewport-driven recomputation controller.
//!
//! Tracks a map's visible bounds and zoom, defers work while the map is
//! animating, throttles recomputation while it is idle, and maintains the
//! visible subset of a larger point set through the spatial region cache.

use serde::Serialize;
use serde::de::DeserializeOwned;

use caching::spatial::SpatialRegionCache;
use caching::stats::CacheStats;
use caching::storage::KeyValueStorage;
use geo_core::bounds::ViewportBounds;
use geo_core::point::LatLon;
use geo_core::time::{DurationMs, TimeMs};
use timing::debounce::Debouncer;

use crate::filter::filter_by_viewport;
use crate::map_view::{MapEvent, MapView};

/// Pause after an animation-end event before trusting the map's bounds as
/// final; absorbs end-of-animation jitter.
pub const DEFAULT_SETTLE_DELAY: DurationMs = DurationMs(250);

/// Minimum spacing between idle-state recomputations.
pub const DEFAULT_MIN_UPDATE_INTERVAL: DurationMs = DurationMs(500);

/// Zoom deltas below this do not justify a recompute on their own.
pub const DEFAULT_ZOOM_THRESHOLD: f64 = 0.3;

/// Fraction of each viewport axis added on every side before filtering.
pub const DEFAULT_BUFFER_PERCENT: f64 = 0.10;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FilterConfig {
    pub settle_delay: DurationMs,
    pub min_update_interval: DurationMs,
    pub zoom_threshold: f64,
    pub buffer_percent: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            min_update_interval: DEFAULT_MIN_UPDATE_INTERVAL,
            zoom_threshold: DEFAULT_ZOOM_THRESHOLD,
            buffer_percent: DEFAULT_BUFFER_PERCENT,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Animating,
}

/// Pure projection of the current viewport state.
///
/// Recomputed only when the controller's gating passes; consumers re-render
/// on these transitions and never in between.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSnapshot<P> {
    pub visible: Vec<P>,
    pub bounds: ViewportBounds,
    /// Zoom rounded to one decimal.
    pub zoom: f64,
    pub total: usize,
    pub visible_count: usize,
}

/// Maintains the visible subset of a point set as the user pans and zooms.
///
/// Two-phase state machine over a single map view:
///
/// - Idle: update requests run immediately, gated by a minimum interval and
///   a zoom-delta threshold.
/// - Animating (between `MoveStart`/`ZoomStart` and the settle delay after
///   `MoveEnd`/`ZoomEnd`): requests set a pending flag instead of executing,
///   so two overlapping recomputes can never race; the settle-triggered
///   recompute reads the map's final bounds (last write wins).
///
/// The spatial cache is injected at construction; share one across
/// controllers by constructing it once and deciding ownership explicitly,
/// not through a process-wide global.
#[derive(Debug)]
pub struct ViewportFilter<P, S> {
    config: FilterConfig,
    cache: SpatialRegionCache<P, S>,
    points: Vec<P>,
    phase: Phase,
    pending_update: bool,
    settle: Debouncer,
    last_update_time: Option<TimeMs>,
    last_zoom: Option<f64>,
    snapshot: Option<ViewportSnapshot<P>>,
}

impl<P, S> ViewportFilter<P, S>
where
    P: LatLon + Clone + Serialize + DeserializeOwned,
    S: KeyValueStorage,
{
    pub fn new(cache: SpatialRegionCache<P, S>, config: FilterConfig) -> Self {
        let settle = Debouncer::new(config.settle_delay);
        Self {
            config,
            cache,
            points: Vec::new(),
            phase: Phase::Idle,
            pending_update: false,
            settle,
            last_update_time: None,
            last_zoom: None,
            snapshot: None,
        }
    }

    /// Replaces the full point set and clears the update gating so the next
    /// request recomputes against the new data.
    pub fn set_points(&mut self, points: Vec<P>) {
        self.points = points;
        self.last_update_time = None;
        self.last_zoom = None;
    }

    pub fn points(&self) -> &[P] {
        &self.points
    }

    pub fn snapshot(&self) -> Option<&ViewportSnapshot<P>> {
        self.snapshot.as_ref()
    }

    pub fn is_animating(&self) -> bool {
        self.phase == Phase::Animating
    }

    pub fn has_pending_update(&self) -> bool {
        self.pending_update
    }

    pub fn cache(&self) -> &SpatialRegionCache<P, S> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut SpatialRegionCache<P, S> {
        &mut self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Feeds a map lifecycle event into the state machine.
    pub fn on_event(&mut self, event: MapEvent, now: TimeMs) {
        match event {
            MapEvent::MoveStart | MapEvent::ZoomStart => {
                // A new animation supersedes any armed settle timer; the
                // pending flag survives so the final settle still applies it.
                self.settle.cancel();
                self.phase = Phase::Animating;
            }
            MapEvent::MoveEnd | MapEvent::ZoomEnd => {
                self.settle.trigger(now);
            }
        }
    }

    /// Requests a recompute. Returns true iff one actually ran.
    ///
    /// While animating, the request is deferred via the pending flag.
    /// While idle, a request is dropped when less than the minimum interval
    /// has elapsed since the last recompute, or when bounds already exist and
    /// the zoom moved by less than the threshold (sub-pixel zoom events
    /// otherwise cause recompute storms).
    pub fn request_update(&mut self, view: &dyn MapView, now: TimeMs) -> bool {
        if self.phase == Phase::Animating {
            self.pending_update = true;
            return false;
        }

        if let Some(last) = self.last_update_time {
            if now.elapsed_since(last) < self.config.min_update_interval {
                return false;
            }
        }
        if self.snapshot.is_some() {
            if let Some(last_zoom) = self.last_zoom {
                if (view.zoom() - last_zoom).abs() < self.config.zoom_threshold {
                    return false;
                }
            }
        }

        self.recompute(view, now)
    }

    /// Drives the settle timer. Returns true iff a deferred recompute ran.
    ///
    /// Call this from the host event loop; the settle-triggered recompute
    /// reads the map's current bounds, never a superseded intermediate set.
    pub fn poll(&mut self, view: &dyn MapView, now: TimeMs) -> bool {
        if self.settle.poll(now) {
            self.phase = Phase::Idle;
            if self.pending_update {
                self.pending_update = false;
                return self.recompute(view, now);
            }
        }
        false
    }

    fn recompute(&mut self, view: &dyn MapView, now: TimeMs) -> bool {
        let Some(bounds) = view.bounds() else {
            // No map handle: nothing to filter against.
            return false;
        };
        let zoom = view.zoom();
        let buffered = bounds.expanded(self.config.buffer_percent);

        let visible = match self.cache.get(&buffered, zoom, now) {
            Some(cached) => cached,
            None => {
                let computed = filter_by_viewport(&self.points, &buffered);
                self.cache.insert(&buffered, zoom, computed.clone(), now);
                computed
            }
        };

        tracing::debug!(
            visible = visible.len(),
            total = self.points.len(),
            zoom,
            "viewport recomputed"
        );

        self.snapshot = Some(ViewportSnapshot {
            visible_count: visible.len(),
            visible,
            bounds: buffered,
            zoom: (zoom * 10.0).round() / 10.0,
            total: self.points.len(),
        });
        self.last_update_time = Some(now);
        self.last_zoom = Some(zoom);
        true
    }
}
