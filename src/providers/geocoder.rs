/*
 * src/providers/geocoder.rs
 *
 * Name -> coordinates resolution, fronting a Nominatim-class public
 * geocoder. Grounded directly on
 * `original_source/backend/src/data_sources/geocoding.py`.
 */

use crate::error::{EngineError, EngineResult};
use crate::global::GEOCODER_RATE_LIMIT_MS;
use crate::models::Location;
use crate::providers::{RateLimiter, TtlCache};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GeocodeResult {
	pub location: Location,
	pub display_name: String,
	pub place_id: Option<String>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
	async fn geocode(&self, query: &str, limit: usize) -> EngineResult<Vec<GeocodeResult>>;
}

/// A small table of common city-name variations that improve recall when
/// the bare city name alone is ambiguous or under-specified, ported from
/// `geocoding.py`'s `indian_city_fixes`.
static CITY_FIXES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
	HashMap::from([
		("chennai", "Chennai, Tamil Nadu, India"),
		("mumbai", "Mumbai, Maharashtra, India"),
		("delhi", "Delhi, India"),
		("bangalore", "Bangalore, Karnataka, India"),
		("hyderabad", "Hyderabad, Telangana, India"),
		("kolkata", "Kolkata, West Bengal, India"),
		("pune", "Pune, Maharashtra, India"),
		("jaipur", "Jaipur, Rajasthan, India"),
	])
});

pub struct NominatimGeocoder {
	client: reqwest::Client,
	rate_limiter: RateLimiter,
	cache: TtlCache<String, Vec<(f64, f64, String, Option<String>)>>,
}

impl NominatimGeocoder {
	const API_URL: &'static str = "https://nominatim.openstreetmap.org/search";
	const USER_AGENT: &'static str = "journey-planner/0.1";

	pub fn new() -> Self {
		Self {
			client: reqwest::Client::new(),
			rate_limiter: RateLimiter::from_millis(GEOCODER_RATE_LIMIT_MS),
			cache: TtlCache::new(Duration::from_secs(24 * 3600), 100),
		}
	}

	async fn query(&self, q: &str, limit: usize) -> EngineResult<Vec<serde_json::Value>> {
		self.rate_limiter.acquire().await;
		let resp = self
			.client
			.get(Self::API_URL)
			.query(&[
				("q", q),
				("format", "json"),
				("limit", &limit.to_string()),
				("addressdetails", "1"),
			])
			.header("User-Agent", Self::USER_AGENT)
			.send()
			.await
			.map_err(|e| EngineError::ExternalProviderUnavailable(format!("geocoder: {e}")))?;

		resp.json::<Vec<serde_json::Value>>()
			.await
			.map_err(|e| EngineError::ExternalProviderUnavailable(format!("geocoder parse: {e}")))
	}
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
	async fn geocode(&self, query: &str, limit: usize) -> EngineResult<Vec<GeocodeResult>> {
		let cache_key = query.to_ascii_lowercase();
		if let Some(cached) = self.cache.get(&cache_key).await {
			return Ok(cached
				.into_iter()
				.map(|(lat, lon, display_name, place_id)| GeocodeResult {
					location: Location::new(lat, lon),
					display_name,
					place_id,
				})
				.collect());
		}

		let mut results = self.query(query, limit).await?;

		if results.is_empty() {
			if let Some(fixed) = CITY_FIXES.get(query.trim().to_ascii_lowercase().as_str()) {
				results = self.query(fixed, limit).await?;
			}
		}

		if results.is_empty() {
			return Err(EngineError::CityNotFound(query.to_string()));
		}

		// Prefer a result whose address city/town/village contains the
		// queried name case-insensitively; otherwise take the first.
		let query_lower = query.trim().to_ascii_lowercase();
		let best_index = results
			.iter()
			.position(|r| {
				let addr = &r["address"];
				[addr["city"].as_str(), addr["town"].as_str(), addr["village"].as_str()]
					.into_iter()
					.flatten()
					.any(|c| c.to_ascii_lowercase().contains(&query_lower))
			})
			.unwrap_or(0);

		let parsed: EngineResult<Vec<GeocodeResult>> = results
			.iter()
			.map(|r| {
				let lat: f64 = r["lat"]
					.as_str()
					.and_then(|s| s.parse().ok())
					.ok_or_else(|| EngineError::CityNotFound(query.to_string()))?;
				let lon: f64 = r["lon"]
					.as_str()
					.and_then(|s| s.parse().ok())
					.ok_or_else(|| EngineError::CityNotFound(query.to_string()))?;
				Ok(GeocodeResult {
					location: Location::new(lat, lon),
					display_name: r["display_name"].as_str().unwrap_or(query).to_string(),
					place_id: r["place_id"].as_i64().map(|id| id.to_string()),
				})
			})
			.collect();
		let mut parsed = parsed?;
		if best_index != 0 && best_index < parsed.len() {
			parsed.swap(0, best_index);
		}

		self.cache
			.insert(
				cache_key,
				parsed
					.iter()
					.map(|r| (r.location.lat, r.location.lon, r.display_name.clone(), r.place_id.clone()))
					.collect(),
			)
			.await;

		Ok(parsed)
	}
}

impl Default for NominatimGeocoder {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(any(test, feature = "test-utils"))]
pub struct MockGeocoder {
	pub result: EngineResult<GeocodeResult>,
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Geocoder for MockGeocoder {
	async fn geocode(&self, _query: &str, _limit: usize) -> EngineResult<Vec<GeocodeResult>> {
		match &self.result {
			Ok(r) => Ok(vec![GeocodeResult {
				location: r.location,
				display_name: r.display_name.clone(),
				place_id: r.place_id.clone(),
			}]),
			Err(e) => Err(EngineError::CityNotFound(e.to_string())),
		}
	}
}
