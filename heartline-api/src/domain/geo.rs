use serde::{Deserialize, Serialize};

use heartline_shared::errors::{AppError, ErrorCode};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Validated constructor: both coordinates finite and within range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AppError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(AppError::new(ErrorCode::InvalidCoordinates, "coordinates must be finite numbers"));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::new(ErrorCode::InvalidCoordinates, "latitude must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::new(ErrorCode::InvalidCoordinates, "longitude must be between -180 and 180"));
        }
        Ok(Self { latitude, longitude })
    }

    /// Build from an optional query pair; both halves or neither.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Result<Option<Self>, AppError> {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => Self::new(lat, lng).map(Some),
            (None, None) => Ok(None),
            _ => Err(AppError::new(
                ErrorCode::InvalidCoordinates,
                "latitude and longitude must be supplied together",
            )),
        }
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push `a` past 1.0 for antipodal points.
    let c = 2.0 * a.min(1.0).sqrt().asin();
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let p = GeoPoint::new(48.8566, 2.3522).unwrap();
        assert_eq!(p.distance_km(&p), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let paris = GeoPoint::new(48.8566, 2.3522).unwrap();
        let london = GeoPoint::new(51.5074, -0.1278).unwrap();
        let there = paris.distance_km(&london);
        assert!((there - london.distance_km(&paris)).abs() < 1e-9);
        assert!((there - 343.5).abs() < 1.0, "paris-london was {there}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn antipodes_are_half_the_circumference() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn half_a_pair_is_rejected() {
        assert!(GeoPoint::from_parts(Some(1.0), None).is_err());
        assert_eq!(GeoPoint::from_parts(None, None).unwrap(), None);
    }
}
