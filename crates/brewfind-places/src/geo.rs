//! Great-circle geometry helpers.

use crate::types::PlacesError;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two points in decimal degrees.
///
/// Uses the haversine formula. Pure and total over valid coordinates: NaN
/// inputs propagate as NaN rather than panicking, and no range validation is
/// performed.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Parse a `"lat,lon"` pair into decimal degrees.
pub fn parse_latlng(value: &str) -> Result<(f64, f64), PlacesError> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(PlacesError::InvalidCoordinates(format!(
            "expected 'lat,lon', got '{value}'"
        )));
    }

    let lat = parts[0]
        .parse::<f64>()
        .map_err(|_| PlacesError::InvalidCoordinates(format!("bad latitude '{}'", parts[0])))?;
    let lon = parts[1]
        .parse::<f64>()
        .map_err(|_| PlacesError::InvalidCoordinates(format!("bad longitude '{}'", parts[1])))?;

    Ok((lat, lon))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let d = haversine_distance(40.7128, -74.0060, 40.7128, -74.0060);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = (51.5074, -0.1278);
        let b = (48.8566, 2.3522);
        let ab = haversine_distance(a.0, a.1, b.0, b.1);
        let ba = haversine_distance(b.0, b.1, a.0, a.1);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // One degree of latitude is ~111.2 km on a 6371 km sphere.
        let d = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn test_london_to_paris() {
        // Published great-circle distance is ~343 km.
        let d = haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((d - 343_000.0).abs() < 2_000.0, "got {d}");
    }

    #[test]
    fn test_nan_propagates() {
        let d = haversine_distance(f64::NAN, 0.0, 1.0, 0.0);
        assert!(d.is_nan());
    }

    #[test]
    fn test_parse_latlng() {
        assert_eq!(parse_latlng("40.7128,-74.0060").unwrap(), (40.7128, -74.0060));
    }

    #[test]
    fn test_parse_latlng_trims_whitespace() {
        assert_eq!(parse_latlng(" 40.0 , -74.0 ").unwrap(), (40.0, -74.0));
    }

    #[test]
    fn test_parse_latlng_rejects_wrong_arity() {
        assert!(matches!(
            parse_latlng("40.0"),
            Err(PlacesError::InvalidCoordinates(_))
        ));
        assert!(matches!(
            parse_latlng("1,2,3"),
            Err(PlacesError::InvalidCoordinates(_))
        ));
    }

    #[test]
    fn test_parse_latlng_rejects_non_numeric() {
        assert!(matches!(
            parse_latlng("north,west"),
            Err(PlacesError::InvalidCoordinates(_))
        ));
    }
}
