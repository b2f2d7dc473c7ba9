use serde::{Deserialize, Serialize};

/// Which provider produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaceSource {
    FreeProvider,
    PaidProvider,
}

impl PlaceSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FreeProvider => "free-provider",
            Self::PaidProvider => "paid-provider",
        }
    }
}

/// Normalized point of interest returned to callers.
///
/// Records are immutable once built: ranking and filtering replace lists
/// wholesale instead of editing entries in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    /// Display name. Candidates without one are discarded during
    /// normalization.
    pub name: String,
    /// Signed decimal degrees; absent for malformed source entries.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Free-text address, possibly empty.
    #[serde(default)]
    pub address: String,
    /// Only the paid provider populates ratings.
    pub rating: Option<f64>,
    /// Distance from the query center; `None` when coordinates were
    /// unavailable.
    pub distance_meters: Option<f64>,
    pub source: PlaceSource,
}

/// Parameters for one aggregation call.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius in meters.
    pub radius_m: u32,
    /// Maximum number of records returned.
    pub limit: usize,
    /// Keep only records rated at least this highly. Records with an unknown
    /// rating are excluded while the filter is active.
    pub min_rating: Option<f64>,
}

impl SearchQuery {
    /// A query at the given center with the default radius and limit.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_m: 1000,
            limit: 10,
            min_rating: None,
        }
    }
}

/// Places engine errors.
#[derive(Debug, thiserror::Error)]
pub enum PlacesError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Could not determine a location: {0}")]
    NoLocation(String),
}

impl PlacesError {
    /// User-friendly error message for terminal display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Network error. Check your connection.".to_string(),
            Self::Api { status, .. } => {
                format!("The places service returned an error (HTTP {status}). Try again later.")
            }
            Self::Parse(_) => {
                "Received an unexpected response from the places service.".to_string()
            }
            Self::InvalidCoordinates(msg) => format!("Invalid coordinates: {msg}"),
            Self::LocationNotFound(query) => format!("Address not found: {query}"),
            Self::NoLocation(_) => {
                "Could not detect your location. Provide --latlng or --address.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_source_serializes_as_kebab_case() {
        let free = serde_json::to_value(PlaceSource::FreeProvider).unwrap();
        let paid = serde_json::to_value(PlaceSource::PaidProvider).unwrap();
        assert_eq!(free, serde_json::json!("free-provider"));
        assert_eq!(paid, serde_json::json!("paid-provider"));
    }

    #[test]
    fn test_source_as_str_matches_wire_tag() {
        assert_eq!(PlaceSource::FreeProvider.as_str(), "free-provider");
        assert_eq!(PlaceSource::PaidProvider.as_str(), "paid-provider");
    }

    #[test]
    fn test_query_defaults() {
        let query = SearchQuery::new(40.0, -74.0);
        assert_eq!(query.radius_m, 1000);
        assert_eq!(query.limit, 10);
        assert!(query.min_rating.is_none());
    }

    #[test]
    fn test_api_error_user_message_includes_status() {
        let err = PlacesError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        assert!(err.user_message().contains("503"));
    }
}
