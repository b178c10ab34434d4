use geo_core::bounds::ViewportBounds;

/// Animation lifecycle events fired by a map widget.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MapEvent {
    MoveStart,
    MoveEnd,
    ZoomStart,
    ZoomEnd,
}

/// Collaborator over the real map widget.
///
/// `bounds` returns None when no map handle exists yet; every recompute
/// against such a view is a no-op.
pub trait MapView {
    fn bounds(&self) -> Option<ViewportBounds>;
    fn zoom(&self) -> f64;
}

/// Scriptable view for tests and simulations.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualMapView {
    bounds: Option<ViewportBounds>,
    zoom: f64,
}

impl ManualMapView {
    pub fn new(bounds: ViewportBounds, zoom: f64) -> Self {
        Self {
            bounds: Some(bounds),
            zoom,
        }
    }

    pub fn detached() -> Self {
        Self {
            bounds: None,
            zoom: 0.0,
        }
    }

    pub fn set_bounds(&mut self, bounds: ViewportBounds) {
        self.bounds = Some(bounds);
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    /// Shifts the view by whole-viewport fractions, simulating a pan.
    pub fn pan(&mut self, lat_fraction: f64, lon_fraction: f64) {
        if let Some(b) = self.bounds {
            let dlat = b.height() * lat_fraction;
            let dlon = b.width() * lon_fraction;
            self.bounds = Some(ViewportBounds::new(
                b.north + dlat,
                b.south + dlat,
                b.east + dlon,
                b.west + dlon,
            ));
        }
    }
}

impl MapView for ManualMapView {
    fn bounds(&self) -> Option<ViewportBounds> {
        self.bounds
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }
}
