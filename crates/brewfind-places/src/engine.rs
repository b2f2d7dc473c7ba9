//! Aggregation engine: provider choice, fallback, and rating filtering.

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::cache::SearchCache;
use crate::google::GooglePlacesProvider;
use crate::overpass::OverpassProvider;
use crate::types::{Place, PlacesError, SearchQuery};

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "GOOGLE_PLACES_API_KEY";

/// Resolve the paid-provider credential.
///
/// A process-level override wins over the persisted configuration; blank
/// values count as absent.
pub fn resolve_api_key(configured: Option<&str>) -> Option<String> {
    let env_key = std::env::var(API_KEY_ENV).ok();
    pick_api_key(env_key.as_deref(), configured)
}

fn pick_api_key(override_key: Option<&str>, configured: Option<&str>) -> Option<String> {
    override_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| configured.filter(|k| !k.trim().is_empty()))
        .map(str::to_owned)
}

/// Orchestrates provider selection and result shaping for one search.
pub struct PlacesEngine {
    google: Option<GooglePlacesProvider>,
    overpass: OverpassProvider,
}

impl PlacesEngine {
    /// Build an engine.
    ///
    /// `api_key` enables the paid provider; the free provider is always
    /// available as the fallback and reads through the shared cache with the
    /// given TTL.
    pub fn new(
        api_key: Option<String>,
        cache: Arc<SearchCache>,
        ttl: Duration,
    ) -> Result<Self, PlacesError> {
        let google = match api_key {
            Some(key) => Some(GooglePlacesProvider::new(key)?),
            None => None,
        };

        Ok(Self {
            google,
            overpass: OverpassProvider::new(cache, ttl)?,
        })
    }

    #[cfg(test)]
    fn new_with_base_urls(
        api_key: Option<&str>,
        cache: Arc<SearchCache>,
        ttl: Duration,
        google_base: &str,
        overpass_base: &str,
    ) -> Result<Self, PlacesError> {
        let google = match api_key {
            Some(key) => Some(GooglePlacesProvider::new_with_base_url(key, google_base)?),
            None => None,
        };

        Ok(Self {
            google,
            overpass: OverpassProvider::new_with_base_url(cache, ttl, overpass_base)?,
        })
    }

    /// Find coffee places near the query center.
    ///
    /// Provider policy is strict priority with no merging: the paid provider
    /// runs first when a credential is configured and its non-empty result is
    /// returned as-is; on failure or an empty result the free provider takes
    /// over. Only that paid-to-free transition swallows an error — free
    /// provider failures surface to the caller, since there is no further
    /// fallback. No retries at any layer.
    #[instrument(skip(self), level = "info")]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>, PlacesError> {
        let mut places = match &self.google {
            Some(google) => match google.search(query).await {
                Ok(results) if !results.is_empty() => results,
                Ok(_) => {
                    tracing::debug!("paid provider returned no results, falling back");
                    self.overpass.search(query).await?
                }
                Err(e) => {
                    tracing::warn!("paid provider failed ({e}), falling back");
                    self.overpass.search(query).await?
                }
            },
            None => self.overpass.search(query).await?,
        };

        if let Some(min_rating) = query.min_rating {
            // Unknown ratings are excluded while the filter is active. Only
            // the paid provider populates ratings, so a fallback result
            // filtered this way comes back empty.
            places.retain(|p| p.rating.is_some_and(|r| r >= min_rating));
        }

        Ok(places)
    }
}
