//! Brewfind CLI - find coffee shops near a point of interest.
//!
//! Resolves a location from the command line (coordinates, an address, a
//! stored home location, or IP detection), runs the places engine, and
//! prints a ranked list.

use std::process;
use std::sync::Arc;

use clap::Parser;

use brewfind_core::{AppError, Config};
use brewfind_places::geo::parse_latlng;
use brewfind_places::{
    resolve_api_key, LocationInput, Place, PlacesEngine, SearchCache, SearchQuery,
};
use brewfind_store::UserStore;

const DEFAULT_USER: &str = "default_user";

#[derive(Parser)]
#[command(name = "brewfind")]
#[command(about = "Find coffee shops near a point of interest", long_about = None)]
struct Args {
    /// Latitude,Longitude (e.g. 40.7128,-74.0060)
    #[arg(long, conflicts_with = "address")]
    latlng: Option<String>,

    /// Address to geocode (uses Nominatim)
    #[arg(long)]
    address: Option<String>,

    /// Latitude (use with --lng)
    #[arg(long, requires = "lng")]
    lat: Option<f64>,

    /// Longitude (use with --lat)
    #[arg(long, requires = "lat")]
    lng: Option<f64>,

    /// Search radius in meters (defaults to the configured value)
    #[arg(long)]
    radius: Option<u32>,

    /// Max results (defaults to the configured value)
    #[arg(long)]
    limit: Option<usize>,

    /// Minimum rating to include (paid provider only)
    #[arg(long)]
    min_rating: Option<f64>,

    /// Store a home location ("lat,lng") used when no other location is given
    #[arg(long, value_name = "LATLNG")]
    set_home: Option<String>,

    /// List saved coffee places and exit
    #[arg(long)]
    saved: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = brewfind_core::init() {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = run(args).await {
        tracing::error!("{e}");
        eprintln!("{}", e.user_message());
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let (config, _validation) = Config::load_validated()?;

    if let Some(raw) = &args.set_home {
        let (lat, lng) = parse_latlng(raw).map_err(|e| AppError::Places(e.user_message()))?;
        let mut store = UserStore::open_default()?;
        store.set_home(DEFAULT_USER, None, lat, lng)?;
        println!("Home location saved: {lat},{lng}");
        return Ok(());
    }

    if args.saved {
        return list_saved();
    }

    let input = location_input(&args)?;
    let (lat, lng) = brewfind_places::resolve(&input)
        .await
        .map_err(|e| AppError::Places(e.user_message()))?;

    let cache = Arc::new(SearchCache::open_default()?);
    let api_key = resolve_api_key(config.google_places_api_key.as_deref());
    let engine = PlacesEngine::new(api_key, cache, config.cache_ttl())
        .map_err(|e| AppError::Places(e.user_message()))?;

    let query = SearchQuery {
        latitude: lat,
        longitude: lng,
        radius_m: args.radius.unwrap_or(config.search.radius_m),
        limit: args.limit.unwrap_or(config.search.limit),
        min_rating: args.min_rating,
    };

    let places = engine
        .search(&query)
        .await
        .map_err(|e| AppError::Places(e.user_message()))?;

    if places.is_empty() {
        println!("No coffee places found within radius.");
        return Ok(());
    }

    println!(
        "Found {} places near {lat},{lng} (radius {} m):\n",
        places.len(),
        query.radius_m
    );
    for (i, place) in places.iter().enumerate() {
        println!("{}. {}", i + 1, format_place(place));
    }

    Ok(())
}

/// Pick the search center input: explicit flags win, then the stored home
/// location, then IP detection as the last resort.
fn location_input(args: &Args) -> Result<LocationInput, AppError> {
    if let Some(raw) = &args.latlng {
        return Ok(LocationInput::LatLng(raw.clone()));
    }
    if let (Some(lat), Some(lng)) = (args.lat, args.lng) {
        return Ok(LocationInput::Coords(lat, lng));
    }
    if let Some(address) = &args.address {
        return Ok(LocationInput::Address(address.clone()));
    }

    let store = UserStore::open_default()?;
    if let Some(home) = store.home(DEFAULT_USER)? {
        tracing::info!("Using stored home location");
        return Ok(LocationInput::Coords(home.latitude, home.longitude));
    }

    Ok(LocationInput::Auto)
}

fn list_saved() -> Result<(), AppError> {
    let store = UserStore::open_default()?;
    let saved = store.saved_places(DEFAULT_USER)?;

    if saved.is_empty() {
        println!("No saved places.");
        return Ok(());
    }

    for (i, place) in saved.iter().enumerate() {
        println!(
            "{}. {} ({},{}) {}",
            i + 1,
            place.name,
            place.latitude,
            place.longitude,
            place.address
        );
    }

    Ok(())
}

fn format_place(place: &Place) -> String {
    let mut parts = vec![place.name.clone()];
    if let Some(rating) = place.rating {
        parts.push(format!("(rating: {rating})"));
    }
    if let Some(distance) = place.distance_meters {
        parts.push(format!("{} m", distance.round() as i64));
    }
    if !place.address.is_empty() {
        parts.push(format!("- {}", place.address));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewfind_places::PlaceSource;

    fn place() -> Place {
        Place {
            name: "Daily Grind".to_string(),
            latitude: Some(40.0),
            longitude: Some(-74.0),
            address: "5 Bean Blvd".to_string(),
            rating: Some(4.6),
            distance_meters: Some(245.7),
            source: PlaceSource::PaidProvider,
        }
    }

    #[test]
    fn test_format_place_full() {
        assert_eq!(
            format_place(&place()),
            "Daily Grind (rating: 4.6) 246 m - 5 Bean Blvd"
        );
    }

    #[test]
    fn test_format_place_minimal() {
        let mut p = place();
        p.rating = None;
        p.distance_meters = None;
        p.address = String::new();
        assert_eq!(format_place(&p), "Daily Grind");
    }
}
