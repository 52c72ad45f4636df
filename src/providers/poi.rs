/*
 * src/providers/poi.rs
 *
 * Primary (commercial places) and fallback (open map data) POI provider
 * clients (§4.1, §4.2). The orchestration of "try primary, fall back,
 * broaden" lives in `crate::poi_search`; this module only knows how to
 * ask a single provider for candidates.
 */

use crate::global::POI_FALLBACK_RATE_LIMIT_MS;
use crate::models::{Category, DataSource, Location, Poi};
use crate::providers::RateLimiter;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[async_trait]
pub trait PoiProvider: Send + Sync {
	/// Returns candidate POIs near `center` for the given interests,
	/// within `radius_km`, or an empty vec on a non-retriable failure
	/// (§4.1: providers never throw out of the orchestration layer).
	async fn search(
		&self,
		center: Location,
		interests: &[String],
		radius_km: f64,
		limit: usize,
	) -> Vec<Poi>;
}

/// interest -> category mapping used to build both the commercial text
/// query and the fallback tag-filter union (§4.2).
pub static INTEREST_CATEGORIES: Lazy<HashMap<&'static str, &'static [Category]>> = Lazy::new(|| {
	HashMap::from([
		("culture", &[Category::Museum, Category::Historical, Category::Attraction][..]),
		("history", &[Category::Historical, Category::Museum][..]),
		("food", &[Category::Restaurant][..]),
		("nightlife", &[Category::Nightlife][..]),
		("nature", &[Category::Nature, Category::Park][..]),
		("shopping", &[Category::Shopping][..]),
		("relaxation", &[Category::Park, Category::Nature][..]),
	])
});

fn categories_for_interests(interests: &[String]) -> Vec<Category> {
	let mut categories = Vec::new();
	for interest in interests {
		if let Some(cats) = INTEREST_CATEGORIES.get(interest.to_ascii_lowercase().as_str()) {
			for c in *cats {
				if !categories.contains(c) {
					categories.push(*c);
				}
			}
		}
	}
	if categories.is_empty() {
		categories.push(Category::Attraction);
	}
	categories
}

/// Google Places-class commercial provider. Credentialed via
/// `Config::google_maps_api_key`; returns an empty vec when no key is
/// configured, matching §4.1's "credentialed" qualifier.
pub struct GooglePlacesProvider {
	client: Option<google_maps::Client>,
}

impl GooglePlacesProvider {
	pub fn new(api_key: Option<String>) -> Self {
		let client = api_key.and_then(|key| google_maps::Client::try_new(key).ok());
		Self { client }
	}
}

#[async_trait]
impl PoiProvider for GooglePlacesProvider {
	async fn search(
		&self,
		center: Location,
		interests: &[String],
		radius_km: f64,
		limit: usize,
	) -> Vec<Poi> {
		let Some(client) = &self.client else {
			return Vec::new();
		};
		let categories = categories_for_interests(interests);
		let radius_meters = (radius_km * 1000.0).min(50_000.0);

		let Ok(search_builder) = client.nearby_search((center.lat, center.lon, radius_meters)) else {
			return Vec::new();
		};

		match search_builder.execute().await {
			Ok(res) if res.error().is_none() => res
				.places()
				.into_iter()
				.take(limit)
				.filter_map(|p| place_to_poi(p, &categories))
				.collect(),
			_ => Vec::new(),
		}
	}
}

fn place_to_poi(place: &google_maps::places_new::Place, fallback_categories: &[Category]) -> Option<Poi> {
	let name = place.display_name.as_ref().map(|d| d.text.clone())?;
	let lat = place.location.as_ref()?.latitude;
	let lon = place.location.as_ref()?.longitude;
	let category = fallback_categories.first().copied().unwrap_or(Category::Attraction);
	Some(Poi {
		data_source: DataSource::GooglePlaces,
		source_id: place.id.clone().unwrap_or_default(),
		name,
		category,
		location: Location::new(lat, lon),
		duration_minutes: category.base_duration_minutes(),
		rating: place.rating.map(|r| r as f32),
		description: None,
		opening_hours: None,
	})
}

/// OSM Overpass-class open fallback provider. Queries a union of tag
/// filters derived from interests (§4.2 step 4); on gateway timeout the
/// caller (the pipeline) is expected to retry with a shrunk radius.
pub struct OverpassProvider {
	client: reqwest::Client,
	rate_limiter: RateLimiter,
	endpoints: Vec<&'static str>,
}

impl OverpassProvider {
	pub fn new() -> Self {
		Self {
			client: reqwest::Client::new(),
			rate_limiter: RateLimiter::from_millis(POI_FALLBACK_RATE_LIMIT_MS),
			endpoints: vec![
				"https://overpass-api.de/api/interpreter",
				"https://overpass.kumi.systems/api/interpreter",
			],
		}
	}

	fn tag_query(&self, center: Location, radius_km: f64, categories: &[Category]) -> String {
		let radius_m = (radius_km * 1000.0) as u32;
		let mut filters = Vec::new();
		for cat in categories.iter().take(8) {
			let filter = match cat {
				Category::Museum | Category::Attraction => "tourism~\"museum|attraction|gallery\"",
				Category::Historical => "historic",
				Category::Shopping => "shop",
				Category::Restaurant => "amenity~\"restaurant|cafe\"",
				Category::Nightlife => "amenity~\"bar|nightclub|pub\"",
				Category::Park | Category::Nature => "leisure~\"park|nature_reserve\"",
			};
			filters.push(format!("node[{filter}](around:{radius_m},{},{});", center.lat, center.lon));
		}
		format!("[out:json][timeout:25];({});out center;", filters.join(""))
	}

	fn tags_to_category(tags: &HashMap<String, String>) -> Option<Category> {
		if tags.contains_key("historic") {
			return Some(Category::Historical);
		}
		match tags.get("tourism").map(String::as_str) {
			Some("museum") => return Some(Category::Museum),
			Some("attraction") | Some("gallery") => return Some(Category::Attraction),
			_ => {}
		}
		match tags.get("amenity").map(String::as_str) {
			Some("restaurant") | Some("cafe") => return Some(Category::Restaurant),
			Some("bar") | Some("nightclub") | Some("pub") => return Some(Category::Nightlife),
			_ => {}
		}
		if tags.contains_key("shop") {
			return Some(Category::Shopping);
		}
		if tags.get("leisure").map(String::as_str) == Some("park") {
			return Some(Category::Park);
		}
		if tags.get("leisure").map(String::as_str) == Some("nature_reserve") {
			return Some(Category::Nature);
		}
		None
	}
}

impl Default for OverpassProvider {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl PoiProvider for OverpassProvider {
	async fn search(
		&self,
		center: Location,
		interests: &[String],
		radius_km: f64,
		limit: usize,
	) -> Vec<Poi> {
		let categories = categories_for_interests(interests);
		let query = self.tag_query(center, radius_km, &categories);

		for endpoint in &self.endpoints {
			self.rate_limiter.acquire().await;
			let resp = self.client.post(*endpoint).body(format!("data={query}")).send().await;
			let Ok(resp) = resp else { continue };
			let Ok(body): Result<serde_json::Value, _> = resp.json().await else { continue };
			let Some(elements) = body["elements"].as_array() else { continue };

			let pois: Vec<Poi> = elements
				.iter()
				.filter_map(|el| parse_overpass_element(el))
				.take(limit)
				.collect();
			if !pois.is_empty() {
				return pois;
			}
		}
		Vec::new()
	}
}

fn parse_overpass_element(el: &serde_json::Value) -> Option<Poi> {
	let tags: HashMap<String, String> = el["tags"]
		.as_object()?
		.iter()
		.map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
		.collect();
	let name = tags.get("name").cloned()?;

	let (lat, lon) = if let (Some(lat), Some(lon)) = (el["lat"].as_f64(), el["lon"].as_f64()) {
		(lat, lon)
	} else {
		(el["center"]["lat"].as_f64()?, el["center"]["lon"].as_f64()?)
	};

	let osm_type = el["type"].as_str().unwrap_or("node");
	let id = el["id"].as_i64()?;
	let category = OverpassProvider::tags_to_category(&tags).unwrap_or(Category::Attraction);

	Some(Poi {
		data_source: DataSource::Openstreetmap,
		source_id: format!("{osm_type}:{id}"),
		name,
		category,
		location: Location::new(lat, lon),
		duration_minutes: category.base_duration_minutes(),
		rating: None,
		description: None,
		opening_hours: None,
	})
}

#[cfg(any(test, feature = "test-utils"))]
pub struct MockPoiProvider {
	pub pois: Vec<Poi>,
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl PoiProvider for MockPoiProvider {
	async fn search(&self, _center: Location, _interests: &[String], _radius_km: f64, limit: usize) -> Vec<Poi> {
		self.pois.iter().take(limit).cloned().collect()
	}
}
