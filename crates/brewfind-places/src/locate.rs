//! Location resolution: turn caller input into a coordinate pair.
//!
//! Accepts explicit coordinates, a `"lat,lon"` string, a free-text address
//! (forward geocoded via Nominatim), or nothing at all, in which case an
//! IP-based lookup provides a rough position.

use serde::Deserialize;
use std::time::Duration;

use crate::geo::parse_latlng;
use crate::types::PlacesError;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const IPINFO_URL: &str = "https://ipinfo.io";
// Nominatim's usage policy requires an identifying User-Agent.
const USER_AGENT: &str = "brewfind/0.1 (https://github.com/brewfind/brewfind)";
const GEOCODE_TIMEOUT_SECS: u64 = 10;
const IP_LOOKUP_TIMEOUT_SECS: u64 = 5;

/// A caller-supplied location in one of the accepted shapes.
#[derive(Debug, Clone)]
pub enum LocationInput {
    /// Explicit coordinates in decimal degrees.
    Coords(f64, f64),
    /// A `"lat,lon"` string as typed on the command line.
    LatLng(String),
    /// Free-text address to forward geocode.
    Address(String),
    /// No input: detect via the caller's public IP.
    Auto,
}

/// Resolve a location input to `(latitude, longitude)`.
pub async fn resolve(input: &LocationInput) -> Result<(f64, f64), PlacesError> {
    match input {
        LocationInput::Coords(lat, lon) => Ok((*lat, *lon)),
        LocationInput::LatLng(raw) => parse_latlng(raw),
        LocationInput::Address(query) => geocode_address(query).await,
        LocationInput::Auto => detect_via_ip().await,
    }
}

/// Forward geocode a free-text address via Nominatim.
pub async fn geocode_address(query: &str) -> Result<(f64, f64), PlacesError> {
    geocode_address_at(NOMINATIM_URL, query).await
}

async fn geocode_address_at(base_url: &str, query: &str) -> Result<(f64, f64), PlacesError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(GEOCODE_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()?;

    let response = client
        .get(format!("{base_url}/search"))
        .query(&[("q", query), ("format", "json"), ("limit", "1")])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(PlacesError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let results: Vec<NominatimResult> = response
        .json()
        .await
        .map_err(|e| PlacesError::Parse(e.to_string()))?;

    let Some(hit) = results.first() else {
        return Err(PlacesError::LocationNotFound(query.to_string()));
    };

    let lat = hit
        .lat
        .parse::<f64>()
        .map_err(|_| PlacesError::Parse(format!("bad latitude '{}'", hit.lat)))?;
    let lon = hit
        .lon
        .parse::<f64>()
        .map_err(|_| PlacesError::Parse(format!("bad longitude '{}'", hit.lon)))?;

    tracing::info!("Geocoded '{query}' to {lat},{lon}");
    Ok((lat, lon))
}

/// Detect an approximate location from the caller's public IP.
///
/// Every failure mode maps to [`PlacesError::NoLocation`] — this is the last
/// resort in the input chain, and the caller's remedy is always the same:
/// supply an explicit location.
pub async fn detect_via_ip() -> Result<(f64, f64), PlacesError> {
    detect_via_ip_at(IPINFO_URL).await
}

async fn detect_via_ip_at(base_url: &str) -> Result<(f64, f64), PlacesError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(IP_LOOKUP_TIMEOUT_SECS))
        .build()
        .map_err(|e| PlacesError::NoLocation(e.to_string()))?;

    let response = client
        .get(format!("{base_url}/json"))
        .send()
        .await
        .map_err(|e| PlacesError::NoLocation(e.to_string()))?;

    if !response.status().is_success() {
        return Err(PlacesError::NoLocation(format!(
            "IP lookup returned HTTP {}",
            response.status()
        )));
    }

    let info: IpInfoResponse = response
        .json()
        .await
        .map_err(|e| PlacesError::NoLocation(e.to_string()))?;

    let Some(loc) = info.loc else {
        return Err(PlacesError::NoLocation(
            "IP lookup response had no location".to_string(),
        ));
    };

    parse_latlng(&loc).map_err(|e| PlacesError::NoLocation(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    // Nominatim returns coordinates as strings.
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    loc: Option<String>,
}
