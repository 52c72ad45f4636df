/*
 * src/poi_search.rs
 *
 * §4.2: `search_pois(city, interests, constraints?, country?, state?,
 * limit) -> [POI]`. Geocode, then primary provider, then fallback
 * provider with progressively broader queries, then de-duplicate.
 */

use crate::error::{EngineError, EngineResult};
use crate::models::{DataSource, Poi};
use crate::providers::geocoder::Geocoder;
use crate::providers::poi::PoiProvider;
use std::collections::HashSet;

/// Default search radius around the geocoded city center (§4.2 step 2).
const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Applied on a gateway timeout during the fallback broadening loop
/// (§4.2 step 5): 30% then 50% shrink.
const RADIUS_SHRINK_STEPS: [f64; 2] = [0.7, 0.5];

pub struct PoiSearchRequest<'a> {
	pub city: &'a str,
	pub interests: &'a [String],
	pub country: Option<&'a str>,
	pub state: Option<&'a str>,
	pub limit: usize,
}

/// `city | sorted(interests) | country | state`, the caching key used one
/// layer up by callers who want to memoize the whole pipeline result
/// (§4.2: "caching key ignores constraints that would change
/// filtering").
pub fn cache_key(req: &PoiSearchRequest) -> String {
	let mut interests: Vec<String> = req.interests.iter().map(|i| i.to_ascii_lowercase()).collect();
	interests.sort();
	format!(
		"{}|{}|{}|{}",
		title_case(req.city),
		interests.join(","),
		req.country.unwrap_or(""),
		req.state.unwrap_or("")
	)
}

/// Title-cases a city name token by token (§4.2: "normalize city name to
/// title case").
pub fn title_case(city: &str) -> String {
	city.split_whitespace()
		.map(|word| {
			let mut chars = word.chars();
			match chars.next() {
				Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_ascii_lowercase(),
				None => String::new(),
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}

pub async fn search_pois(
	geocoder: &dyn Geocoder,
	primary: &dyn PoiProvider,
	fallback: &dyn PoiProvider,
	req: &PoiSearchRequest<'_>,
) -> EngineResult<Vec<Poi>> {
	let query = match (req.country, req.state) {
		(Some(country), Some(state)) => format!("{}, {}, {}", req.city, state, country),
		(Some(country), None) => format!("{}, {}", req.city, country),
		(None, Some(state)) => format!("{}, {}", req.city, state),
		(None, None) => req.city.to_string(),
	};

	let geocoded = geocoder.geocode(&query, 5).await?;
	let center = geocoded.first().ok_or_else(|| EngineError::CityNotFound(req.city.to_string()))?.location;

	let primary_results = primary.search(center, req.interests, DEFAULT_RADIUS_KM, req.limit).await;
	if !primary_results.is_empty() {
		return Ok(dedupe(primary_results, req.limit));
	}

	let mut radius = DEFAULT_RADIUS_KM;
	let mut results = fallback.search(center, req.interests, radius, req.limit).await;

	for shrink in RADIUS_SHRINK_STEPS {
		if !results.is_empty() {
			break;
		}
		radius *= shrink;
		results = fallback.search(center, req.interests, radius, req.limit).await;
	}

	// Total failure after broadening is not an error (§4.4): the caller
	// gets an empty POI list and the builder's own empty-pool path
	// produces an itinerary with an explanatory note instead.
	Ok(dedupe(results, req.limit))
}

/// De-duplicate by `(data_source, source_id)` (§9: "the same POI may
/// surface from both primary and fallback providers").
fn dedupe(pois: Vec<Poi>, limit: usize) -> Vec<Poi> {
	let mut seen: HashSet<(DataSource, String)> = HashSet::new();
	let mut out = Vec::with_capacity(pois.len().min(limit));
	for poi in pois {
		let key = (poi.data_source, poi.source_id.clone());
		if seen.insert(key) {
			out.push(poi);
			if out.len() >= limit {
				break;
			}
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::{Category, Location};
	use crate::providers::geocoder::{GeocodeResult, MockGeocoder};
	use crate::providers::poi::MockPoiProvider;

	fn poi(source: DataSource, id: &str) -> Poi {
		Poi {
			data_source: source,
			source_id: id.to_string(),
			name: format!("poi-{id}"),
			category: Category::Museum,
			location: Location::new(26.9, 75.8),
			duration_minutes: 90,
			rating: None,
			description: None,
			opening_hours: None,
		}
	}

	#[tokio::test]
	async fn primary_results_short_circuit_fallback() {
		let geocoder = MockGeocoder {
			result: Ok(GeocodeResult { location: Location::new(26.9, 75.8), display_name: "Jaipur".into(), place_id: None }),
		};
		let primary = MockPoiProvider { pois: vec![poi(DataSource::GooglePlaces, "1")] };
		let fallback = MockPoiProvider { pois: vec![poi(DataSource::Openstreetmap, "2")] };
		let req = PoiSearchRequest { city: "jaipur", interests: &["culture".to_string()], country: None, state: None, limit: 10 };

		let result = search_pois(&geocoder, &primary, &fallback, &req).await.unwrap();
		assert_eq!(result.len(), 1);
		assert_eq!(result[0].source_id, "1");
	}

	#[tokio::test]
	async fn falls_back_when_primary_empty() {
		let geocoder = MockGeocoder {
			result: Ok(GeocodeResult { location: Location::new(26.9, 75.8), display_name: "Jaipur".into(), place_id: None }),
		};
		let primary = MockPoiProvider { pois: vec![] };
		let fallback = MockPoiProvider { pois: vec![poi(DataSource::Openstreetmap, "2")] };
		let req = PoiSearchRequest { city: "jaipur", interests: &["culture".to_string()], country: None, state: None, limit: 10 };

		let result = search_pois(&geocoder, &primary, &fallback, &req).await.unwrap();
		assert_eq!(result[0].source_id, "2");
	}

	#[tokio::test]
	async fn dedupes_across_providers_by_identity() {
		let pois = vec![poi(DataSource::Openstreetmap, "1"), poi(DataSource::Openstreetmap, "1"), poi(DataSource::Openstreetmap, "2")];
		let deduped = dedupe(pois, 10);
		assert_eq!(deduped.len(), 2);
	}

	#[test]
	fn title_case_handles_multi_word_city() {
		assert_eq!(title_case("new york"), "New York");
	}
}
