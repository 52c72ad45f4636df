/*
 * src/providers/router.rs
 *
 * Point-to-point travel time lookups: credentialed Directions API first,
 * OSRM public instance second, haversine-plus-speed estimate last (§4.1,
 * §4.3). Grounded on
 * `original_source/backend/src/data_sources/travel_time.py`'s provider
 * cascade and its `_haversine_fallback()` constants.
 */

use crate::global::PAID_PROVIDER_RATE_LIMIT_MS;
use crate::models::{Location, TravelMode};
use crate::providers::RateLimiter;
use async_trait::async_trait;

#[async_trait]
pub trait Router: Send + Sync {
	/// Travel time in whole minutes between two points for the given mode,
	/// or `None` if this provider cannot answer (caller falls through).
	async fn travel_time_minutes(&self, from: Location, to: Location, mode: TravelMode) -> Option<u32>;
}

const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn haversine_km(a: Location, b: Location) -> f64 {
	let lat1 = a.lat.to_radians();
	let lat2 = b.lat.to_radians();
	let dlat = (b.lat - a.lat).to_radians();
	let dlon = (b.lon - a.lon).to_radians();

	let sin_dlat = (dlat / 2.0).sin();
	let sin_dlon = (dlon / 2.0).sin();
	let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
	EARTH_RADIUS_KM * 2.0 * h.sqrt().asin()
}

/// Speed (km/h), buffer multiplier, and floor (minutes) per mode, per
/// `travel_time.py`'s `_haversine_fallback` table.
fn speed_profile(mode: TravelMode) -> (f64, f64, u32) {
	match mode {
		TravelMode::Road => (30.0, 1.3, 10),
		TravelMode::Airplane => (25.0, 1.25, 10),
		TravelMode::Railway => (30.0, 1.3, 10),
	}
}

/// Walking is used for intra-day short hops regardless of the
/// session-level travel mode; kept as a distinct constant set because it
/// never maps onto `TravelMode`.
pub fn walking_minutes(distance_km: f64) -> u32 {
	estimate_minutes(distance_km, 5.0, 1.2, 5)
}

pub fn cycling_minutes(distance_km: f64) -> u32 {
	estimate_minutes(distance_km, 15.0, 1.25, 10)
}

fn estimate_minutes(distance_km: f64, speed_kmh: f64, buffer: f64, floor_minutes: u32) -> u32 {
	let raw_minutes = (distance_km / speed_kmh) * 60.0 * buffer;
	(raw_minutes.round() as u32).max(floor_minutes)
}

/// Always answers; the bottom of the cascade.
pub struct HaversineRouter;

#[async_trait]
impl Router for HaversineRouter {
	async fn travel_time_minutes(&self, from: Location, to: Location, mode: TravelMode) -> Option<u32> {
		let distance_km = haversine_km(from, to);
		let (speed, buffer, floor_minutes) = speed_profile(mode);
		Some(estimate_minutes(distance_km, speed, buffer, floor_minutes))
	}
}

/// Public OSRM-class routing instance: real road network, no credential.
pub struct OsrmRouter {
	client: reqwest::Client,
	rate_limiter: RateLimiter,
	base_url: String,
}

impl OsrmRouter {
	pub fn new() -> Self {
		Self {
			client: reqwest::Client::new(),
			rate_limiter: RateLimiter::from_millis(PAID_PROVIDER_RATE_LIMIT_MS),
			base_url: "https://router.project-osrm.org".to_string(),
		}
	}

	fn profile(mode: TravelMode) -> &'static str {
		match mode {
			TravelMode::Road => "driving",
			TravelMode::Railway => "driving",
			TravelMode::Airplane => "driving",
		}
	}
}

impl Default for OsrmRouter {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Router for OsrmRouter {
	async fn travel_time_minutes(&self, from: Location, to: Location, mode: TravelMode) -> Option<u32> {
		self.rate_limiter.acquire().await;
		let url = format!(
			"{}/route/v1/{}/{},{};{},{}",
			self.base_url,
			Self::profile(mode),
			from.lon,
			from.lat,
			to.lon,
			to.lat
		);
		let resp = self
			.client
			.get(&url)
			.query(&[("overview", "false")])
			.send()
			.await
			.ok()?;
		let body: serde_json::Value = resp.json().await.ok()?;
		let seconds = body["routes"][0]["duration"].as_f64()?;
		Some((seconds / 60.0).round() as u32)
	}
}

/// Commercial Directions-class provider, credentialed via
/// `google_maps::Client`. Returns `None` without a key (the cascade falls
/// through to OSRM).
pub struct DirectionsRouter {
	client: Option<google_maps::Client>,
	rate_limiter: RateLimiter,
}

impl DirectionsRouter {
	pub fn new(api_key: Option<String>) -> Self {
		Self {
			client: api_key.and_then(|key| google_maps::Client::try_new(key).ok()),
			rate_limiter: RateLimiter::from_millis(PAID_PROVIDER_RATE_LIMIT_MS),
		}
	}
}

#[async_trait]
impl Router for DirectionsRouter {
	async fn travel_time_minutes(&self, from: Location, to: Location, mode: TravelMode) -> Option<u32> {
		let client = self.client.as_ref()?;
		self.rate_limiter.acquire().await;
		let _ = mode;

		let origin = google_maps::LatLng::try_from_f64(from.lat, from.lon).ok()?;
		let destination = google_maps::LatLng::try_from_f64(to.lat, to.lon).ok()?;

		let directions_res = client
			.directions(google_maps::directions::Location::LatLng(origin), google_maps::directions::Location::LatLng(destination))
			.execute()
			.await
			.ok()?;

		if !matches!(directions_res.status, google_maps::directions::Status::Ok) {
			return None;
		}

		let leg = directions_res.routes.first()?.legs.first()?;
		Some((leg.duration.value.as_secs_f64() / 60.0).round() as u32)
	}
}

/// Tries each router in order, falling through to the next on `None`.
/// The last entry should always answer (typically `HaversineRouter`).
pub struct CascadingRouter {
	routers: Vec<Box<dyn Router>>,
}

impl CascadingRouter {
	pub fn new(routers: Vec<Box<dyn Router>>) -> Self {
		Self { routers }
	}
}

#[async_trait]
impl Router for CascadingRouter {
	async fn travel_time_minutes(&self, from: Location, to: Location, mode: TravelMode) -> Option<u32> {
		for router in &self.routers {
			if let Some(minutes) = router.travel_time_minutes(from, to, mode).await {
				return Some(minutes);
			}
		}
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn haversine_zero_distance_is_zero() {
		let p = Location::new(12.97, 77.59);
		assert!(haversine_km(p, p) < 1e-6);
	}

	#[tokio::test]
	async fn haversine_router_respects_floor() {
		let router = HaversineRouter;
		let a = Location::new(12.9716, 77.5946);
		let b = Location::new(12.9717, 77.5947);
		let minutes = router.travel_time_minutes(a, b, TravelMode::Road).await.unwrap();
		assert!(minutes >= 10);
	}
}
