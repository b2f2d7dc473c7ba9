//! Places engine for Brewfind
//!
//! Resolves a location input to coordinates, queries a paid or free geodata
//! provider for nearby coffee places, ranks candidates by great-circle
//! distance, and caches free-provider responses on disk.

pub mod cache;
pub mod engine;
pub mod geo;
pub mod google;
pub mod locate;
pub mod overpass;
pub mod types;

pub use cache::SearchCache;
pub use engine::{resolve_api_key, PlacesEngine};
pub use locate::{resolve, LocationInput};
pub use types::{Place, PlaceSource, PlacesError, SearchQuery};
