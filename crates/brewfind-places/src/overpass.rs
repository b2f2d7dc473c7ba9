//! Free provider: spatial queries against the Overpass community map API.
//!
//! Queries nodes and ways tagged `amenity=cafe` or `shop=coffee` around a
//! center point, normalizes them into [`Place`] records, and reads through
//! the shared on-disk result cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::instrument;

use crate::cache::SearchCache;
use crate::geo::haversine_distance;
use crate::types::{Place, PlaceSource, PlacesError, SearchQuery};

const OVERPASS_URL: &str = "https://overpass-api.de";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Structured address tags, joined in this order when present.
const ADDRESS_TAGS: [&str; 5] = [
    "addr:housenumber",
    "addr:street",
    "addr:city",
    "addr:postcode",
    "addr:country",
];

/// Client for the Overpass interpreter endpoint with read-through caching.
pub struct OverpassProvider {
    client: reqwest::Client,
    base_url: String,
    cache: Arc<SearchCache>,
    ttl: Duration,
}

impl OverpassProvider {
    pub fn new(cache: Arc<SearchCache>, ttl: Duration) -> Result<Self, PlacesError> {
        Self::with_base_url(cache, ttl, OVERPASS_URL)
    }

    #[cfg(test)]
    pub(crate) fn new_with_base_url(
        cache: Arc<SearchCache>,
        ttl: Duration,
        base_url: &str,
    ) -> Result<Self, PlacesError> {
        Self::with_base_url(cache, ttl, base_url)
    }

    fn with_base_url(
        cache: Arc<SearchCache>,
        ttl: Duration,
        base_url: &str,
    ) -> Result<Self, PlacesError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            cache,
            ttl,
        })
    }

    /// Search for coffee places near the query center.
    ///
    /// Consults the shared result cache before issuing any network I/O; on a
    /// miss, runs one spatial query, sorts candidates by ascending distance,
    /// and stores the full sorted list before truncating to the limit.
    #[instrument(skip(self), level = "info")]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>, PlacesError> {
        let key = cache_key(query);

        if let Some(mut cached) = self.cache.get(&key, self.ttl) {
            tracing::debug!("cache hit for {key}");
            cached.truncate(query.limit);
            return Ok(cached);
        }

        let response = self
            .client
            .post(format!("{}/api/interpreter", self.base_url))
            .form(&[("data", overpass_query(query).as_str())])
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

        let parsed: OverpassResponse = response
            .json()
            .await
            .map_err(|e| PlacesError::Parse(e.to_string()))?;

        let mut places: Vec<Place> = parsed
            .elements
            .iter()
            .filter_map(|el| normalize_element(el, query))
            .collect();
        places.sort_by(|a, b| {
            a.distance_meters
                .unwrap_or(f64::MAX)
                .total_cmp(&b.distance_meters.unwrap_or(f64::MAX))
        });

        // Cache the full sorted list so a later call with a smaller limit
        // hits the same key.
        self.cache.set(&key, &places);

        places.truncate(query.limit);
        Ok(places)
    }
}

fn cache_key(query: &SearchQuery) -> String {
    format!(
        "overpass:{:.6}:{:.6}:{}",
        query.latitude, query.longitude, query.radius_m
    )
}

fn overpass_query(query: &SearchQuery) -> String {
    let (lat, lon, radius) = (query.latitude, query.longitude, query.radius_m);
    format!(
        "[out:json][timeout:25];\n\
         (\n\
           node(around:{radius},{lat},{lon})[amenity=cafe];\n\
           node(around:{radius},{lat},{lon})[shop=coffee];\n\
           way(around:{radius},{lat},{lon})[amenity=cafe];\n\
           way(around:{radius},{lat},{lon})[shop=coffee];\n\
         );\n\
         out center {limit};",
        limit = query.limit
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

/// Turn one Overpass element into a [`Place`].
///
/// Candidates without a usable name or without coordinates are dropped —
/// free-provider ranking depends on a computable distance, so unranked
/// records are not emitted here.
fn normalize_element(el: &OverpassElement, query: &SearchQuery) -> Option<Place> {
    let name = el.tags.get("name").or_else(|| el.tags.get("brand"))?;

    // Nodes carry coordinates directly; ways carry a precomputed centroid.
    let (lat, lon) = if el.kind == "node" {
        (el.lat?, el.lon?)
    } else {
        let center = el.center.as_ref()?;
        (center.lat, center.lon)
    };

    let parts: Vec<&str> = ADDRESS_TAGS
        .iter()
        .filter_map(|k| el.tags.get(*k).map(String::as_str))
        .collect();
    let address = if parts.is_empty() {
        el.tags.get("addr:full").cloned().unwrap_or_default()
    } else {
        parts.join(", ")
    };

    let distance = haversine_distance(query.latitude, query.longitude, lat, lon);

    Some(Place {
        name: name.clone(),
        latitude: Some(lat),
        longitude: Some(lon),
        address,
        rating: None,
        distance_meters: Some(distance),
        source: PlaceSource::FreeProvider,
    })
}
