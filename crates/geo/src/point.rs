use serde::{Deserialize, Serialize};

/// Anything with geographic coordinates in decimal degrees.
///
/// Filtering code is generic over this trait so callers can run their own
/// record types (parking spots, traffic reports) through the viewport
/// machinery without conversion.
pub trait LatLon {
    fn lat(&self) -> f64;
    fn lon(&self) -> f64;
}

/// Returns true iff both coordinates are in range and neither is NaN.
///
/// Points failing this check are silently excluded from filtered results;
/// they never raise an error or interrupt batch processing.
pub fn is_valid_lat_lon(lat: f64, lon: f64) -> bool {
    !lat.is_nan() && !lon.is_nan() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Minimal concrete point for tests, tools, and callers without a richer type.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl LatLon for GeoPoint {
    fn lat(&self) -> f64 {
        self.lat
    }

    fn lon(&self) -> f64 {
        self.lon
    }
}

#[cfg(test)]
mod tests {
    use super::is_valid_lat_lon;

    #[test]
    fn accepts_in_range_coordinates() {
        assert!(is_valid_lat_lon(0.0, 0.0));
        assert!(is_valid_lat_lon(90.0, 180.0));
        assert!(is_valid_lat_lon(-90.0, -180.0));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(!is_valid_lat_lon(90.001, 0.0));
        assert!(!is_valid_lat_lon(-90.001, 0.0));
        assert!(!is_valid_lat_lon(0.0, 180.001));
        assert!(!is_valid_lat_lon(0.0, -180.001));
    }

    #[test]
    fn rejects_nan() {
        assert!(!is_valid_lat_lon(f64::NAN, 0.0));
        assert!(!is_valid_lat_lon(0.0, f64::NAN));
        assert!(!is_valid_lat_lon(f64::NAN, f64::NAN));
    }
}
