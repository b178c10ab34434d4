use geo_core::bounds::ViewportBounds;
use geo_core::point::{LatLon, is_valid_lat_lon};

/// Linearly narrows `points` to those inside `bounds`.
///
/// A point is included iff its coordinates are valid (in range, not NaN) and
/// contained with inclusive edges. Invalid points are dropped silently; they
/// never interrupt the batch.
pub fn filter_by_viewport<P: LatLon + Clone>(points: &[P], bounds: &ViewportBounds) -> Vec<P> {
    points
        .iter()
        .filter(|p| is_valid_lat_lon(p.lat(), p.lon()) && bounds.contains(p.lat(), p.lon()))
        .cloned()
        .collect()
}
