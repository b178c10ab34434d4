use serde::{Deserialize, Serialize};

/// Geographic rectangle in decimal degrees.
///
/// Invariant: `south <= north` and `west <= east`. The constructor normalizes
/// swapped edges rather than erroring, so a constructed value is always well
/// formed.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl ViewportBounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north: north.max(south),
            south: south.min(north),
            east: east.max(west),
            west: west.min(east),
        }
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Inclusive containment on all four edges.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    /// Standard AABB overlap test; a shared edge counts as overlap.
    pub fn overlaps(&self, other: &ViewportBounds) -> bool {
        !(self.east < other.west
            || self.west > other.east
            || self.north < other.south
            || self.south > other.north)
    }

    /// Returns bounds grown symmetrically by `buffer_percent` of each axis
    /// span on every side.
    ///
    /// The buffer preloads points just outside the visible edge so panning
    /// does not pop markers in at the viewport boundary.
    pub fn expanded(&self, buffer_percent: f64) -> Self {
        let lat_buffer = self.height() * buffer_percent;
        let lon_buffer = self.width() * buffer_percent;
        Self {
            north: self.north + lat_buffer,
            south: self.south - lat_buffer,
            east: self.east + lon_buffer,
            west: self.west - lon_buffer,
        }
    }
}
