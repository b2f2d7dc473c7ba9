//! Paid provider: Google Places nearby search.
//!
//! Pages through `next_page_token` results and normalizes them into
//! [`Place`] records. Unlike the free provider, the API's relevance
//! ordering is preserved and no cache is consulted.

use std::time::Duration;

use serde::Deserialize;
use tracing::instrument;

use crate::geo::haversine_distance;
use crate::types::{Place, PlaceSource, PlacesError, SearchQuery};

const GOOGLE_PLACES_URL: &str = "https://maps.googleapis.com";
const NEARBY_SEARCH_PATH: &str = "/maps/api/place/nearbysearch/json";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Client for the Places nearby-search endpoint.
pub struct GooglePlacesProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GooglePlacesProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, PlacesError> {
        Self::with_base_url(api_key, GOOGLE_PLACES_URL)
    }

    #[cfg(test)]
    pub(crate) fn new_with_base_url(
        api_key: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, PlacesError> {
        Self::with_base_url(api_key, base_url)
    }

    fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self, PlacesError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Nearby search filtered to cafés with a "coffee" keyword hint.
    ///
    /// Follows the pagination token page by page until `limit` records are
    /// accumulated or the provider stops returning a token.
    #[instrument(skip(self), level = "info")]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>, PlacesError> {
        let url = format!("{}{}", self.base_url, NEARBY_SEARCH_PATH);
        let mut places = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let params: Vec<(&str, String)> = match &page_token {
                Some(token) => vec![
                    ("pagetoken", token.clone()),
                    ("key", self.api_key.clone()),
                ],
                None => vec![
                    (
                        "location",
                        format!("{},{}", query.latitude, query.longitude),
                    ),
                    ("radius", query.radius_m.to_string()),
                    ("keyword", "coffee".to_string()),
                    ("type", "cafe".to_string()),
                    ("key", self.api_key.clone()),
                ],
            };

            let response = self.client.get(&url).query(&params).send().await?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(PlacesError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let page: NearbySearchResponse = response
                .json()
                .await
                .map_err(|e| PlacesError::Parse(e.to_string()))?;

            for result in page.results {
                let Some(place) = normalize_result(result, query) else {
                    continue;
                };
                places.push(place);
                if places.len() >= query.limit {
                    places.truncate(query.limit);
                    return Ok(places);
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(places)
    }
}

#[derive(Debug, Deserialize)]
struct NearbySearchResponse {
    #[serde(default)]
    results: Vec<NearbyResult>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyResult {
    name: Option<String>,
    geometry: Option<Geometry>,
    rating: Option<f64>,
    vicinity: Option<String>,
    formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<LatLngLiteral>,
}

#[derive(Debug, Deserialize)]
struct LatLngLiteral {
    lat: f64,
    lng: f64,
}

/// Turn one nearby-search result into a [`Place`].
///
/// Results without a name are dropped. Results without a geometry are kept
/// with a null distance; the paid provider's relevance ordering does not
/// depend on it.
fn normalize_result(result: NearbyResult, query: &SearchQuery) -> Option<Place> {
    let name = result.name?;
    let location = result.geometry.and_then(|g| g.location);

    let (latitude, longitude, distance) = match location {
        Some(loc) => (
            Some(loc.lat),
            Some(loc.lng),
            Some(haversine_distance(
                query.latitude,
                query.longitude,
                loc.lat,
                loc.lng,
            )),
        ),
        None => (None, None, None),
    };

    let address = result
        .vicinity
        .or(result.formatted_address)
        .unwrap_or_default();

    Some(Place {
        name,
        latitude,
        longitude,
        address,
        rating: result.rating,
        distance_meters: distance,
        source: PlaceSource::PaidProvider,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn result(name: &str, lat: f64, lng: f64, rating: Option<f64>) -> serde_json::Value {
        json!({
            "name": name,
            "geometry": { "location": { "lat": lat, "lng": lng } },
            "rating": rating,
            "vicinity": format!("{} Vicinity Ave", name),
        })
    }

    #[tokio::test]
    async fn test_single_page_preserves_provider_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(NEARBY_SEARCH_PATH))
            .and(query_param("keyword", "coffee"))
            .and(query_param("type", "cafe"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                // Deliberately not distance-ordered.
                "results": [
                    result("Far But Relevant", 40.01, -74.0, Some(4.8)),
                    result("Near", 40.0005, -74.0, Some(4.1)),
                ]
            })))
            .mount(&server)
            .await;

        let provider = GooglePlacesProvider::new_with_base_url("test-key", &server.uri()).unwrap();
        let places = provider.search(&SearchQuery::new(40.0, -74.0)).await.unwrap();

        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "Far But Relevant");
        assert!(places[0].distance_meters.unwrap() > places[1].distance_meters.unwrap());
        assert!(places.iter().all(|p| p.source == PlaceSource::PaidProvider));
        assert_eq!(places[0].rating, Some(4.8));
        assert_eq!(places[0].address, "Far But Relevant Vicinity Ave");
    }

    #[tokio::test]
    async fn test_follows_page_token_until_exhausted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(NEARBY_SEARCH_PATH))
            .and(query_param("location", "40,-74"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [result("Page One", 40.001, -74.0, None)],
                "next_page_token": "tok-2",
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(NEARBY_SEARCH_PATH))
            .and(query_param("pagetoken", "tok-2"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [result("Page Two", 40.002, -74.0, None)],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GooglePlacesProvider::new_with_base_url("test-key", &server.uri()).unwrap();
        let places = provider.search(&SearchQuery::new(40.0, -74.0)).await.unwrap();

        let names: Vec<&str> = places.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Page One", "Page Two"]);
    }

    #[tokio::test]
    async fn test_stops_paging_once_limit_reached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(NEARBY_SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    result("One", 40.001, -74.0, None),
                    result("Two", 40.002, -74.0, None),
                ],
                // A token the adapter must not follow once the limit is hit.
                "next_page_token": "tok-never-used",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GooglePlacesProvider::new_with_base_url("test-key", &server.uri()).unwrap();
        let mut query = SearchQuery::new(40.0, -74.0);
        query.limit = 2;
        let places = provider.search(&query).await.unwrap();

        assert_eq!(places.len(), 2);
    }

    #[tokio::test]
    async fn test_nameless_results_skipped_and_missing_geometry_kept() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(NEARBY_SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "geometry": { "location": { "lat": 40.001, "lng": -74.0 } } },
                    { "name": "No Fix", "formatted_address": "Somewhere" },
                ]
            })))
            .mount(&server)
            .await;

        let provider = GooglePlacesProvider::new_with_base_url("test-key", &server.uri()).unwrap();
        let places = provider.search(&SearchQuery::new(40.0, -74.0)).await.unwrap();

        assert_eq!(places.len(), 1);
        assert_eq!(places[0].name, "No Fix");
        assert!(places[0].distance_meters.is_none());
        assert_eq!(places[0].address, "Somewhere");
    }

    #[tokio::test]
    async fn test_http_error_raises() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(NEARBY_SEARCH_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = GooglePlacesProvider::new_with_base_url("bad-key", &server.uri()).unwrap();
        let err = provider
            .search(&SearchQuery::new(40.0, -74.0))
            .await
            .unwrap_err();

        assert!(matches!(err, PlacesError::Api { status: 403, .. }));
    }
}
