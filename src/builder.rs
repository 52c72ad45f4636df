/*
 * src/builder.rs
 *
 * §4.4: `build(pois, daily_time_windows, pace, preferences?,
 * starting_point_location?, travel_mode?) -> {itinerary,
 * total_travel_time, explanation}`. LLM selection pass, deterministic
 * enrichment pass (POI is the authority), travel-time pass.
 *
 * The selection pass's day-keyed `{morning, afternoon, evening}` parsing
 * target and the nearest-neighbor-then-2-opt sequencing idea both carry
 * over from the teacher's tooling, generalized from a fixed-endpoint
 * round-trip to arbitrary chronological activity sequencing.
 */

use crate::models::{Activity, BlockName, DayItinerary, Itinerary, Location, Pace, Poi, RawActivity, RawPlan, TravelMode};
use crate::providers::llm::{Llm, LlmTier};
use crate::providers::router::Router;
use crate::travel_time::{travel_time, RoutingMode, TravelSource};
use chrono::{NaiveDate, NaiveTime};

#[derive(Debug, Clone, Copy)]
pub struct DailyWindow {
	pub day: u32,
	pub start: NaiveTime,
	pub end: NaiveTime,
}

pub struct BuildRequest<'a> {
	pub pois: &'a [Poi],
	pub daily_windows: &'a [DailyWindow],
	pub pace: Pace,
	pub interests: &'a [String],
	pub starting_point: Location,
	pub travel_mode: Option<TravelMode>,
	pub travel_dates: Vec<NaiveDate>,
	pub city: String,
}

pub struct BuildResult {
	pub itinerary: Itinerary,
	pub explanation: String,
}

pub async fn build(llm: &dyn Llm, router: &dyn Router, req: &BuildRequest<'_>) -> BuildResult {
	if req.pois.is_empty() {
		let itinerary = empty_itinerary(req);
		return BuildResult { itinerary, explanation: "No points of interest were available, so the itinerary has no activities.".to_string() };
	}

	let raw_plan = select(llm, req).await;
	let mut itinerary = enrich(req, &raw_plan);
	run_travel_time_pass(router, req, &mut itinerary).await;

	let explanation = format!(
		"Built a {}-day {} itinerary around {} interests.",
		req.daily_windows.len(),
		pace_label(req.pace),
		if req.interests.is_empty() { "general".to_string() } else { req.interests.join(", ") }
	);
	BuildResult { itinerary, explanation }
}

fn pace_label(pace: Pace) -> &'static str {
	match pace {
		Pace::Relaxed => "relaxed",
		Pace::Moderate => "moderate",
		Pace::Fast => "fast",
	}
}

fn empty_itinerary(req: &BuildRequest) -> Itinerary {
	Itinerary {
		city: req.city.clone(),
		duration_days: req.daily_windows.len() as u32,
		pace: req.pace,
		interests: req.interests.to_vec(),
		travel_mode: req.travel_mode,
		travel_dates: req.travel_dates.clone(),
		starting_point: req.starting_point,
		days: (0..req.daily_windows.len()).map(|_| DayItinerary::default()).collect(),
		total_travel_time: 0,
	}
}

// --- Selection pass ---

async fn select(llm: &dyn Llm, req: &BuildRequest<'_>) -> RawPlan {
	let system_prompt = "You plan day-by-day travel itineraries from a fixed list of points of interest. \
		You must only use the name, coordinates, and source_id exactly as given in the provided list. \
		Respect each day's time window. Group points of interest within roughly 2km on the same day and \
		block. Respond with strict JSON: an object keyed by day_1, day_2, ... each holding \
		{\"morning\": [...], \"afternoon\": [...], \"evening\": [...]}, each entry an activity object \
		with name, source_id, lat, lon.";

	let (min_count, max_count) = req.pace.activity_range();
	let food_primary = req.interests.iter().any(|i| i.eq_ignore_ascii_case("food"));

	let poi_list: String = req
		.pois
		.iter()
		.map(|p| {
			format!(
				"- {} | {:?} | ({:.4},{:.4}) | {}min | {}",
				p.name,
				p.category,
				p.location.lat,
				p.location.lon,
				p.duration_minutes,
				p.canonical_source_id()
			)
		})
		.collect::<Vec<_>>()
		.join("\n");

	let user_prompt = format!(
		"Points of interest:\n{poi_list}\n\nDays: {}. Target {}-{} activities per day. {} \
		Distribute evenly across days and time blocks.",
		req.daily_windows.len(),
		min_count,
		max_count,
		if food_primary { "Food is a primary interest: restaurants/cafes should dominate and appear in all three blocks." } else { "" }
	);

	let Some(response) = llm.complete(LlmTier::Quality, system_prompt, &user_prompt).await else {
		return empty_raw_plan(req.daily_windows.len());
	};

	match serde_json::from_str::<RawPlan>(&response) {
		Ok(plan) => plan,
		Err(_) => empty_raw_plan(req.daily_windows.len()),
	}
}

fn empty_raw_plan(days: usize) -> RawPlan {
	(0..days).map(|i| (Itinerary::day_key(i), Default::default())).collect()
}

// --- Enrichment pass ---

fn enrich(req: &BuildRequest, raw_plan: &RawPlan) -> Itinerary {
	let mut days = Vec::with_capacity(req.daily_windows.len());

	for (index, window) in req.daily_windows.iter().enumerate() {
		let key = Itinerary::day_key(index);
		let raw_day = raw_plan.get(&key).cloned().unwrap_or_default();
		let mut day = DayItinerary::default();

		for block_name in BlockName::ALL {
			let raw_activities = match block_name {
				BlockName::Morning => &raw_day.morning,
				BlockName::Afternoon => &raw_day.afternoon,
				BlockName::Evening => &raw_day.evening,
			};
			let time_slot = block_time_slot(*window, block_name);
			let activities: Vec<Activity> = raw_activities.iter().map(|raw| enrich_activity(req.pois, raw, &time_slot)).collect();
			*day.block_mut(block_name) = crate::models::TimeBlock { activities };
		}

		days.push(day);
	}

	Itinerary {
		city: req.city.clone(),
		duration_days: req.daily_windows.len() as u32,
		pace: req.pace,
		interests: req.interests.to_vec(),
		travel_mode: req.travel_mode,
		travel_dates: req.travel_dates.clone(),
		starting_point: req.starting_point,
		days,
		total_travel_time: 0,
	}
}

/// Splits a day's window into three equal blocks and formats `HH:MM-HH:MM`.
fn block_time_slot(window: DailyWindow, block: BlockName) -> String {
	let total_minutes = (window.end - window.start).num_minutes().max(0);
	let third = total_minutes / 3;
	let (offset_start, offset_end) = match block {
		BlockName::Morning => (0, third),
		BlockName::Afternoon => (third, third * 2),
		BlockName::Evening => (third * 2, total_minutes),
	};
	let start = window.start + chrono::Duration::minutes(offset_start);
	let end = window.start + chrono::Duration::minutes(offset_end);
	format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
}

/// Finds the POI matching `raw` by, in priority order: source_id
/// equality, case-insensitive exact name, substring containment either
/// way, >=2 significant-word overlap (§4.4 enrichment pass).
fn find_matching_poi<'a>(pois: &'a [Poi], raw: &RawActivity) -> Option<&'a Poi> {
	if let Some(source_id) = &raw.source_id {
		if let Some(poi) = pois.iter().find(|p| &p.source_id == source_id || p.canonical_source_id() == *source_id) {
			return Some(poi);
		}
	}

	let raw_lower = raw.name.to_ascii_lowercase();
	if let Some(poi) = pois.iter().find(|p| p.name.to_ascii_lowercase() == raw_lower) {
		return Some(poi);
	}

	if let Some(poi) = pois.iter().find(|p| {
		let poi_lower = p.name.to_ascii_lowercase();
		poi_lower.contains(&raw_lower) || raw_lower.contains(&poi_lower)
	}) {
		return Some(poi);
	}

	let raw_tokens = significant_tokens(&raw.name);
	pois.iter().find(|p| {
		let poi_tokens = significant_tokens(&p.name);
		raw_tokens.iter().filter(|t| poi_tokens.contains(t)).count() >= 2
	})
}

const STOPWORDS: [&str; 6] = ["the", "of", "and", "at", "in", "a"];

fn significant_tokens(name: &str) -> Vec<String> {
	name.to_ascii_lowercase()
		.split_whitespace()
		.map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
		.filter(|w| w.len() > 1 && !STOPWORDS.contains(&w.as_str()))
		.collect()
}

fn enrich_activity(pois: &[Poi], raw: &RawActivity, time_slot: &str) -> Activity {
	if let Some(poi) = find_matching_poi(pois, raw) {
		return Activity {
			name: poi.name.clone(),
			source_id: poi.source_id.clone(),
			data_source: poi.data_source,
			location: poi.location,
			duration_minutes: poi.duration_minutes,
			time_slot: time_slot.to_string(),
			travel_time_from_previous: 0,
			category: poi.category,
			rating: poi.rating,
			description: poi.description.clone(),
			opening_hours: poi.opening_hours.clone(),
		};
	}

	// No POI match: keep the LLM's label, estimate duration from a
	// conservative default category (§4.4: "keep the LLM's label but
	// estimate duration from category").
	let category = crate::models::Category::Attraction;
	Activity {
		name: raw.name.clone(),
		source_id: raw.source_id.clone().unwrap_or_default(),
		data_source: crate::models::DataSource::Openstreetmap,
		location: Location::new(raw.lat.unwrap_or(0.0), raw.lon.unwrap_or(0.0)),
		duration_minutes: category.base_duration_minutes(),
		time_slot: time_slot.to_string(),
		travel_time_from_previous: 0,
		category,
		rating: None,
		description: None,
		opening_hours: None,
	}
}

// --- Travel-time pass ---

/// Default travel time for the first activity from a known starting
/// point when routing fails (§4.4 failure semantics).
const STARTING_POINT_DEFAULT_MINUTES: u32 = 10;

pub async fn run_travel_time_pass(router: &dyn Router, req: &BuildRequest<'_>, itinerary: &mut Itinerary) {
	let routing_mode = match req.travel_mode {
		Some(mode) => RoutingMode::Travel(mode),
		None => RoutingMode::Travel(TravelMode::Road),
	};

	let mut previous_location: Location = req.starting_point;
	let mut is_first = true;

	for day in itinerary.days.iter_mut() {
		for block in [&mut day.morning, &mut day.afternoon, &mut day.evening] {
			for activity in block.activities.iter_mut() {
				let result = travel_time(router, previous_location, activity.location, routing_mode).await;
				let minutes = match result.source {
					TravelSource::Router => result.duration_minutes,
					TravelSource::Unavailable if is_first => STARTING_POINT_DEFAULT_MINUTES,
					TravelSource::Unavailable => 0,
				};
				activity.travel_time_from_previous = minutes;
				previous_location = activity.location;
				is_first = false;
			}
		}
	}

	itinerary.recompute_total_travel_time();
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::{Category, DataSource};
	use crate::providers::llm::MockLlm;
	use crate::providers::router::HaversineRouter;

	fn poi(id: &str, name: &str) -> Poi {
		Poi {
			data_source: DataSource::Openstreetmap,
			source_id: id.to_string(),
			name: name.to_string(),
			category: Category::Museum,
			location: Location::new(26.9, 75.8),
			duration_minutes: 90,
			rating: None,
			description: None,
			opening_hours: None,
		}
	}

	#[tokio::test]
	async fn empty_poi_list_yields_empty_itinerary_not_error() {
		let llm = MockLlm { response: "{}".to_string(), fast_response: None };
		let router = HaversineRouter;
		let req = BuildRequest {
			pois: &[],
			daily_windows: &[DailyWindow { day: 1, start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(21, 0, 0).unwrap() }],
			pace: Pace::Moderate,
			interests: &[],
			starting_point: Location::new(26.9, 75.8),
			travel_mode: None,
			travel_dates: vec![],
			city: "Jaipur".to_string(),
		};
		let result = build(&llm, &router, &req).await;
		assert_eq!(result.itinerary.days.len(), 1);
		assert_eq!(result.itinerary.days[0].activity_count(), 0);
	}

	#[tokio::test]
	async fn malformed_llm_response_falls_back_to_empty_days() {
		let llm = MockLlm { response: "not json".to_string(), fast_response: None };
		let router = HaversineRouter;
		let req = BuildRequest {
			pois: &[poi("node:1", "Amber Fort")],
			daily_windows: &[DailyWindow { day: 1, start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(21, 0, 0).unwrap() }],
			pace: Pace::Moderate,
			interests: &[],
			starting_point: Location::new(26.9, 75.8),
			travel_mode: None,
			travel_dates: vec![],
			city: "Jaipur".to_string(),
		};
		let result = build(&llm, &router, &req).await;
		assert_eq!(result.itinerary.days[0].activity_count(), 0);
	}

	#[tokio::test]
	async fn enrichment_overwrites_llm_fields_from_poi() {
		let llm = MockLlm { response: r#"{"day_1":{"morning":[{"name":"amber fort","source_id":"node:1","lat":0.0,"lon":0.0}],"afternoon":[],"evening":[]}}"#.to_string(), fast_response: None };
		let router = HaversineRouter;
		let req = BuildRequest {
			pois: &[poi("node:1", "Amber Fort")],
			daily_windows: &[DailyWindow { day: 1, start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(21, 0, 0).unwrap() }],
			pace: Pace::Moderate,
			interests: &[],
			starting_point: Location::new(26.9, 75.8),
			travel_mode: None,
			travel_dates: vec![],
			city: "Jaipur".to_string(),
		};
		let result = build(&llm, &router, &req).await;
		let activity = &result.itinerary.days[0].morning.activities[0];
		assert_eq!(activity.name, "Amber Fort");
		assert_eq!(activity.location.lat, 26.9);
		assert!(activity.travel_time_from_previous > 0);
	}

	#[test]
	fn significant_word_overlap_matches_reordered_names() {
		let pois = vec![poi("node:1", "City Palace Jaipur")];
		let raw = RawActivity { name: "Jaipur City Palace".to_string(), source_id: None, lat: None, lon: None };
		assert!(find_matching_poi(&pois, &raw).is_some());
	}

	struct NeverRouter;

	#[async_trait::async_trait]
	impl crate::providers::router::Router for NeverRouter {
		async fn travel_time_minutes(&self, _from: Location, _to: Location, _mode: crate::models::TravelMode) -> Option<u32> {
			None
		}
	}

	#[tokio::test]
	async fn routing_failure_defaults_first_leg_only_rest_get_zero() {
		let router = NeverRouter;
		let mut day = crate::models::DayItinerary::default();
		day.morning.activities.push(activity_at("A", Location::new(26.9, 75.8)));
		day.afternoon.activities.push(activity_at("B", Location::new(27.0, 75.9)));
		day.evening.activities.push(activity_at("C", Location::new(27.1, 76.0)));

		let req = BuildRequest {
			pois: &[],
			daily_windows: &[DailyWindow { day: 1, start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(21, 0, 0).unwrap() }],
			pace: Pace::Moderate,
			interests: &[],
			starting_point: Location::new(26.8, 75.7),
			travel_mode: None,
			travel_dates: vec![],
			city: "Jaipur".to_string(),
		};

		let mut itinerary = Itinerary {
			city: "Jaipur".to_string(),
			duration_days: 1,
			pace: Pace::Moderate,
			interests: vec![],
			travel_mode: None,
			travel_dates: vec![],
			starting_point: req.starting_point,
			days: vec![day],
			total_travel_time: 0,
		};

		run_travel_time_pass(&router, &req, &mut itinerary).await;

		assert_eq!(itinerary.days[0].morning.activities[0].travel_time_from_previous, STARTING_POINT_DEFAULT_MINUTES);
		assert_eq!(itinerary.days[0].afternoon.activities[0].travel_time_from_previous, 0);
		assert_eq!(itinerary.days[0].evening.activities[0].travel_time_from_previous, 0);
	}

	fn activity_at(name: &str, location: Location) -> crate::models::Activity {
		crate::models::Activity {
			name: name.to_string(),
			source_id: format!("node:{name}"),
			data_source: DataSource::Openstreetmap,
			location,
			duration_minutes: 60,
			time_slot: "09:00-10:00".to_string(),
			travel_time_from_previous: 0,
			category: Category::Museum,
			rating: None,
			description: None,
			opening_hours: None,
		}
	}
}
