/*
 * src/edit_engine.rs
 *
 * §4.5: `apply_edit(itinerary, edit_intent, preferences?) -> itinerary'`.
 * Parsing (LLM + regex fallback), affected-section identification, and
 * per-edit-type mutation, re-running the travel-time pass afterward.
 *
 * The regex fallback and the day-swap/time-block-move detection rules
 * are ported from
 * `original_source/backend/src/orchestrator/edit_handler.py`'s
 * `_parse_edit_command_fallback`; voice normalization from
 * `intent_classifier.py`'s `normalize_voice_input`, made word-boundary
 * aware.
 */

use crate::builder::{self, BuildRequest, DailyWindow};
use crate::error::{EngineError, EngineResult};
use crate::models::{BlockName, DayItinerary, EditIntent, EditType, Itinerary, Pace, Poi, TimeBlock};
use crate::poi_search::{self, PoiSearchRequest};
use crate::providers::geocoder::Geocoder;
use crate::providers::llm::{Llm, LlmTier};
use crate::providers::poi::PoiProvider;
use crate::providers::router::Router;
use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

// --- Voice normalization (§4.5, §9) ---

static FILLER_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(um|uh|like|you know)\b").unwrap());
static NUMBER_WORD: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"(?i)\b(one|two|three|four|five|six|seven|eight|nine|ten)\b").unwrap()
});

static CITY_MISPRONUNCIATIONS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
	vec![("jaypur", "jaipur"), ("chennigh", "chennai"), ("banglore", "bangalore")]
});

fn number_word_to_digit(word: &str) -> Option<&'static str> {
	match word.to_ascii_lowercase().as_str() {
		"one" => Some("1"),
		"two" => Some("2"),
		"three" => Some("3"),
		"four" => Some("4"),
		"five" => Some("5"),
		"six" => Some("6"),
		"seven" => Some("7"),
		"eight" => Some("8"),
		"nine" => Some("9"),
		"ten" => Some("10"),
		_ => None,
	}
}

/// Fixes known speech-to-text errors, word-boundary-aware throughout so
/// substrings inside unrelated words (e.g. "Lakeside") are never touched
/// - the bug the original's naive substring-replace had.
pub fn normalize_voice_input(input: &str) -> String {
	let mut text = input.to_string();

	static PLAY_ONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bplay\s+(\w+)\b").unwrap());
	text = PLAY_ONE.replace_all(&text, "swap day $1").to_string();

	static DAY_TO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bday\s+to\b|\bday\s+too\b").unwrap());
	text = DAY_TO.replace_all(&text, "day 2").to_string();

	for (wrong, right) in CITY_MISPRONUNCIATIONS.iter() {
		let pattern = Regex::new(&format!(r"(?i)\b{wrong}\b")).unwrap();
		text = pattern.replace_all(&text, *right).to_string();
	}

	text = NUMBER_WORD
		.replace_all(&text, |caps: &regex::Captures| number_word_to_digit(&caps[1]).unwrap_or(&caps[0]).to_string())
		.to_string();

	text = FILLER_WORDS.replace_all(&text, "").to_string();

	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// --- Parsing ---

pub async fn parse_edit_command(llm: &dyn Llm, user_input: &str) -> EditIntent {
	let normalized = normalize_voice_input(user_input);

	let system_prompt = "Parse travel itinerary edit commands into strict JSON matching this shape: \
		{\"edit_type\":\"CHANGE_PACE|SWAP_ACTIVITY|SWAP_DAYS|MOVE_TIME_BLOCK|ADD_ACTIVITY|ADD_DAY|REMOVE_ACTIVITY|REDUCE_TRAVEL\", \
		\"target_day\":number|null,\"source_day\":number|null,\"target_time_block\":\"morning|afternoon|evening\"|null, \
		\"source_time_block\":\"morning|afternoon|evening\"|null,\"target_activity\":string|null,\"new_pace\":\"relaxed|moderate|fast\"|null, \
		\"new_activity_name\":string|null,\"place_name\":string|null,\"regenerate_vacated\":bool}";

	let llm_intent = match llm.complete(LlmTier::Fast, system_prompt, &normalized).await {
		Some(response) => serde_json::from_str::<EditIntent>(&response).ok(),
		None => None,
	};

	let fallback_intent = parse_edit_command_fallback(&normalized);

	// Never override a rule-detected SWAP_DAYS/MOVE_TIME_BLOCK from two
	// explicit day numbers with a different LLM-proposed edit_type (§4.5,
	// reframed from the original's LLM-primary/rule-secondary trust order
	// since here rules run as the fallback rather than a parallel check).
	match (llm_intent, fallback_intent.edit_type) {
		(Some(llm), Some(EditType::SwapDays | EditType::MoveTimeBlock)) if llm.edit_type != fallback_intent.edit_type => fallback_intent,
		(Some(llm), _) => llm,
		(None, _) => fallback_intent,
	}
}

fn parse_edit_command_fallback(normalized: &str) -> EditIntent {
	let lower = normalized.to_ascii_lowercase();

	static SWAP_DAYS_PATTERN: Lazy<Regex> =
		Lazy::new(|| Regex::new(r"(?:swap|modify|change)\s+day\s+(\d+)\s+(?:itinerary\s+)?(?:with|and|to)\s+day\s+(\d+)").unwrap());
	if let Some(caps) = SWAP_DAYS_PATTERN.captures(&lower) {
		return EditIntent {
			edit_type: Some(EditType::SwapDays),
			source_day: caps[1].parse().ok(),
			target_day: caps[2].parse().ok(),
			regenerate_vacated: false,
			..Default::default()
		};
	}

	static MOVE_BLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
		Regex::new(r"(?:move|swap|modify|change|update)\s+day\s+(\d+)\s+(morning|afternoon|evening)\s+(?:to|with)\s+day\s+(\d+)\s+(morning|afternoon|evening)").unwrap()
	});
	if let Some(caps) = MOVE_BLOCK_PATTERN.captures(&lower) {
		return EditIntent {
			edit_type: Some(EditType::MoveTimeBlock),
			source_day: caps[1].parse().ok(),
			source_time_block: BlockName::parse(&caps[2]),
			target_day: caps[3].parse().ok(),
			target_time_block: BlockName::parse(&caps[4]),
			regenerate_vacated: true,
			..Default::default()
		};
	}

	static DAY_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"day\s+(\d+)").unwrap());
	let day_numbers: Vec<u32> = DAY_NUMBER.captures_iter(&lower).filter_map(|c| c[1].parse().ok()).collect();
	let swap_keywords = ["swap", "modify", "change", "switch", "replace"];
	let has_time_block_word = lower.contains("morning") || lower.contains("afternoon") || lower.contains("evening");

	if day_numbers.len() >= 2 && swap_keywords.iter().any(|kw| lower.contains(kw)) && !has_time_block_word {
		return EditIntent {
			edit_type: Some(EditType::SwapDays),
			source_day: Some(day_numbers[0]),
			target_day: Some(day_numbers[1]),
			regenerate_vacated: false,
			..Default::default()
		};
	}

	let move_keywords = ["swap", "move", "modify", "change", "update"];
	if day_numbers.len() >= 2 && has_time_block_word && move_keywords.iter().any(|kw| lower.contains(kw)) {
		let block = ["morning", "afternoon", "evening"].into_iter().find(|b| lower.contains(b)).and_then(BlockName::parse);
		return EditIntent {
			edit_type: Some(EditType::MoveTimeBlock),
			source_day: Some(day_numbers[0]),
			target_day: Some(day_numbers[1]),
			source_time_block: block,
			target_time_block: block,
			regenerate_vacated: true,
			..Default::default()
		};
	}

	static ADD_DAY_PATTERN: Lazy<Regex> = Lazy::new(|| {
		Regex::new(r"add\s+(?:one\s+more|another|extra)\s+day|add\s+day\s+(\d+)|extend\s+itinerary").unwrap()
	});
	if ADD_DAY_PATTERN.is_match(&lower) {
		return EditIntent { edit_type: Some(EditType::AddDay), regenerate_vacated: false, ..Default::default() };
	}

	if lower.contains("remove") || lower.contains("delete") {
		let block = ["morning", "afternoon", "evening"].into_iter().find(|b| lower.contains(b)).and_then(BlockName::parse);
		return EditIntent {
			edit_type: Some(EditType::RemoveActivity),
			target_day: day_numbers.first().copied(),
			target_time_block: block,
			regenerate_vacated: false,
			..Default::default()
		};
	}

	EditIntent { edit_type: Some(EditType::ChangePace), target_day: day_numbers.first().copied(), ..Default::default() }
}

// --- Affected-section identification (§4.5 table) ---

pub fn affected_sections(intent: &EditIntent, total_days: usize) -> Vec<String> {
	match intent.edit_type {
		Some(EditType::ChangePace) => (0..total_days).map(Itinerary::day_key).collect(),
		Some(EditType::SwapDays) => sections_for_days(intent.source_day, intent.target_day),
		Some(EditType::MoveTimeBlock) => {
			let mut sections = Vec::new();
			if let Some(d) = intent.source_day {
				sections.push(block_key(d, intent.source_time_block));
			}
			if let Some(d) = intent.target_day {
				sections.push(block_key(d, intent.target_time_block));
			}
			sections
		}
		Some(EditType::AddActivity | EditType::SwapActivity) => {
			intent.target_day.map(|d| vec![block_key(d, intent.target_time_block)]).unwrap_or_default()
		}
		Some(EditType::AddDay) => vec![Itinerary::day_key(total_days)],
		Some(EditType::RemoveActivity) => intent.target_day.map(|d| vec![Itinerary::day_key((d - 1) as usize)]).unwrap_or_default(),
		Some(EditType::ReduceTravel) | None => Vec::new(),
	}
}

fn sections_for_days(source: Option<u32>, target: Option<u32>) -> Vec<String> {
	[source, target].into_iter().flatten().map(|d| Itinerary::day_key((d - 1) as usize)).collect()
}

fn block_key(day: u32, block: Option<BlockName>) -> String {
	match block {
		Some(b) => format!("{}.{}", Itinerary::day_key((day - 1) as usize), b.as_str()),
		None => Itinerary::day_key((day - 1) as usize),
	}
}

// --- Apply ---

pub struct EditContext<'a> {
	pub geocoder: &'a dyn Geocoder,
	pub primary_poi: &'a dyn PoiProvider,
	pub fallback_poi: &'a dyn PoiProvider,
	pub llm: &'a dyn Llm,
	pub router: &'a dyn Router,
	pub interests: &'a [String],
	/// §9 Open Question, resolved: on `true`, a pace change re-invokes the
	/// Builder for every day against a freshly searched POI pool,
	/// constrained to the new pace's activity-count target. On `false`
	/// only the `pace` field is updated and activities are left untouched.
	pub rebalance_pace_on_change: bool,
}

pub async fn apply_edit(ctx: &EditContext<'_>, itinerary: &Itinerary, intent: &EditIntent) -> EngineResult<Itinerary> {
	let mut result = itinerary.clone();

	match intent.edit_type {
		Some(EditType::SwapDays) => apply_swap_days(&mut result, intent)?,
		Some(EditType::MoveTimeBlock) => apply_move_time_block(ctx, &mut result, intent).await?,
		Some(EditType::AddDay) => apply_add_day(ctx, &mut result, intent).await?,
		Some(EditType::AddActivity) => apply_add_activity(ctx, &mut result, intent).await?,
		Some(EditType::RemoveActivity) => apply_remove_activity(&mut result, intent)?,
		Some(EditType::ChangePace) => apply_change_pace(ctx, &mut result, intent).await?,
		Some(EditType::SwapActivity) | Some(EditType::ReduceTravel) | None => {
			return Err(EngineError::EditValidationFailed("unsupported edit type for this pass".to_string()));
		}
	}

	builder::run_travel_time_pass(
		ctx.router,
		&BuildRequest {
			pois: &[],
			daily_windows: &[],
			pace: result.pace,
			interests: ctx.interests,
			starting_point: result.starting_point,
			travel_mode: result.travel_mode,
			travel_dates: result.travel_dates.clone(),
			city: result.city.clone(),
		},
		&mut result,
	)
	.await;

	Ok(result)
}

fn apply_swap_days(itinerary: &mut Itinerary, intent: &EditIntent) -> EngineResult<()> {
	let source = day_index(intent.source_day)?;
	let target = day_index(intent.target_day)?;
	if source >= itinerary.days.len() || target >= itinerary.days.len() {
		return Err(EngineError::EditValidationFailed("day out of range".to_string()));
	}
	itinerary.days.swap(source, target);
	Ok(())
}

async fn apply_move_time_block(ctx: &EditContext<'_>, itinerary: &mut Itinerary, intent: &EditIntent) -> EngineResult<()> {
	let target_day = day_index(intent.target_day)?;
	let target_block = intent.target_time_block.ok_or_else(|| EngineError::EditValidationFailed("missing target_time_block".to_string()))?;

	let replacement = if let (Some(source_day_num), Some(source_block)) = (intent.source_day, intent.source_time_block) {
		let source_day = day_index(Some(source_day_num))?;
		itinerary.days.get(source_day).map(|d| d.block(source_block).clone())
	} else {
		None
	};

	match replacement {
		Some(source_block_content) => {
			let vacated_day = day_index(intent.source_day)?;
			let target_content = itinerary.days[target_day].block(target_block).clone();
			*itinerary.days[target_day].block_mut(target_block) = source_block_content;

			if intent.regenerate_vacated {
				let excluded: HashSet<String> = itinerary.activities_in_order().iter().map(|a| a.source_id.clone()).collect();
				let regenerated = regenerate_block(ctx, itinerary, &excluded).await?;
				*itinerary.days[vacated_day].block_mut(intent.source_time_block.unwrap()) = regenerated;
			} else {
				*itinerary.days[vacated_day].block_mut(intent.source_time_block.unwrap()) = target_content;
			}
		}
		None => {
			if intent.regenerate_vacated {
				let excluded: HashSet<String> = itinerary.activities_in_order().iter().map(|a| a.source_id.clone()).collect();
				let regenerated = regenerate_block(ctx, itinerary, &excluded).await?;
				*itinerary.days[target_day].block_mut(target_block) = regenerated;
			}
		}
	}

	Ok(())
}

async fn regenerate_block(ctx: &EditContext<'_>, itinerary: &Itinerary, excluded: &HashSet<String>) -> EngineResult<TimeBlock> {
	let req = PoiSearchRequest { city: &itinerary.city, interests: ctx.interests, country: None, state: None, limit: 10 };
	let candidates = poi_search::search_pois(ctx.geocoder, ctx.primary_poi, ctx.fallback_poi, &req)
		.await
		.unwrap_or_default()
		.into_iter()
		.filter(|p| !excluded.contains(&p.source_id))
		.collect::<Vec<Poi>>();

	let activities = candidates
		.into_iter()
		.take(2)
		.map(|poi| crate::models::Activity {
			name: poi.name,
			source_id: poi.source_id,
			data_source: poi.data_source,
			location: poi.location,
			duration_minutes: poi.duration_minutes,
			time_slot: "00:00-00:00".to_string(),
			travel_time_from_previous: 0,
			category: poi.category,
			rating: poi.rating,
			description: poi.description,
			opening_hours: poi.opening_hours,
		})
		.collect();

	Ok(TimeBlock { activities })
}

async fn apply_add_day(ctx: &EditContext<'_>, itinerary: &mut Itinerary, intent: &EditIntent) -> EngineResult<()> {
	let query_city = intent.place_name.clone().unwrap_or_else(|| itinerary.city.clone());
	let req = PoiSearchRequest { city: &query_city, interests: ctx.interests, country: None, state: None, limit: 12 };

	let pois = match poi_search::search_pois(ctx.geocoder, ctx.primary_poi, ctx.fallback_poi, &req).await {
		Ok(pois) => pois,
		Err(_) if intent.place_name.is_some() => {
			let fallback_req = PoiSearchRequest { city: &itinerary.city, interests: ctx.interests, country: None, state: None, limit: 12 };
			poi_search::search_pois(ctx.geocoder, ctx.primary_poi, ctx.fallback_poi, &fallback_req).await?
		}
		Err(e) => return Err(e),
	};

	let window = DailyWindow { day: itinerary.days.len() as u32 + 1, start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(21, 0, 0).unwrap() };
	let build_req = BuildRequest {
		pois: &pois,
		daily_windows: &[window],
		pace: itinerary.pace,
		interests: ctx.interests,
		starting_point: itinerary.starting_point,
		travel_mode: itinerary.travel_mode,
		travel_dates: vec![],
		city: itinerary.city.clone(),
	};
	let built = builder::build(ctx.llm, ctx.router, &build_req).await;

	itinerary.days.push(built.itinerary.days.into_iter().next().unwrap_or_default());
	itinerary.duration_days += 1;
	if let Some(last_date) = itinerary.travel_dates.last().copied() {
		itinerary.travel_dates.push(last_date + chrono::Duration::days(1));
	}
	Ok(())
}

async fn apply_add_activity(ctx: &EditContext<'_>, itinerary: &mut Itinerary, intent: &EditIntent) -> EngineResult<()> {
	let target_day = day_index(intent.target_day)?;
	let target_block = intent.target_time_block.ok_or_else(|| EngineError::EditValidationFailed("missing target_time_block".to_string()))?;

	let req = PoiSearchRequest { city: &itinerary.city, interests: ctx.interests, country: None, state: None, limit: 10 };
	let candidates = poi_search::search_pois(ctx.geocoder, ctx.primary_poi, ctx.fallback_poi, &req).await?;

	let chosen = intent
		.new_activity_name
		.as_ref()
		.and_then(|name| candidates.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
		.or_else(|| candidates.first())
		.ok_or_else(|| EngineError::PoiNotFound)?;

	itinerary.days[target_day].block_mut(target_block).activities.push(crate::models::Activity {
		name: chosen.name.clone(),
		source_id: chosen.source_id.clone(),
		data_source: chosen.data_source,
		location: chosen.location,
		duration_minutes: chosen.duration_minutes,
		time_slot: "00:00-00:00".to_string(),
		travel_time_from_previous: 0,
		category: chosen.category,
		rating: chosen.rating,
		description: chosen.description.clone(),
		opening_hours: chosen.opening_hours.clone(),
	});
	Ok(())
}

fn apply_remove_activity(itinerary: &mut Itinerary, intent: &EditIntent) -> EngineResult<()> {
	let target_day = day_index(intent.target_day)?;
	let day = itinerary.days.get_mut(target_day).ok_or_else(|| EngineError::EditValidationFailed("day out of range".to_string()))?;

	let name = intent.target_activity.clone().unwrap_or_default();
	let mut removed = false;
	for block in [&mut day.morning, &mut day.afternoon, &mut day.evening] {
		let before = block.activities.len();
		block.activities.retain(|a| !a.name.eq_ignore_ascii_case(&name));
		if block.activities.len() != before {
			removed = true;
		}
	}

	if !removed {
		return Err(EngineError::EditValidationFailed(format!("activity '{name}' not found on the target day")));
	}
	Ok(())
}

async fn apply_change_pace(ctx: &EditContext<'_>, itinerary: &mut Itinerary, intent: &EditIntent) -> EngineResult<()> {
	let new_pace = intent.new_pace.ok_or_else(|| EngineError::EditValidationFailed("missing new_pace".to_string()))?;
	itinerary.pace = new_pace;

	if !ctx.rebalance_pace_on_change {
		return Ok(());
	}

	let req = PoiSearchRequest { city: &itinerary.city, interests: ctx.interests, country: None, state: None, limit: 20 };
	let pois = poi_search::search_pois(ctx.geocoder, ctx.primary_poi, ctx.fallback_poi, &req).await?;

	let daily_windows: Vec<DailyWindow> = (0..itinerary.days.len())
		.map(|i| DailyWindow { day: i as u32 + 1, start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(21, 0, 0).unwrap() })
		.collect();

	let build_req = BuildRequest {
		pois: &pois,
		daily_windows: &daily_windows,
		pace: new_pace,
		interests: ctx.interests,
		starting_point: itinerary.starting_point,
		travel_mode: itinerary.travel_mode,
		travel_dates: itinerary.travel_dates.clone(),
		city: itinerary.city.clone(),
	};
	let built = builder::build(ctx.llm, ctx.router, &build_req).await;
	itinerary.days = built.itinerary.days;
	Ok(())
}

fn day_index(day: Option<u32>) -> EngineResult<usize> {
	let day = day.ok_or_else(|| EngineError::EditValidationFailed("missing day number".to_string()))?;
	if day == 0 {
		return Err(EngineError::EditValidationFailed("day numbers are 1-indexed".to_string()));
	}
	Ok((day - 1) as usize)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_voice_transcription_errors() {
		let normalized = normalize_voice_input("play one with day to");
		assert_eq!(normalized, "swap day 1 with day 2");
	}

	#[test]
	fn voice_normalization_is_word_boundary_aware() {
		let normalized = normalize_voice_input("visit Lakeside park on day 1");
		assert!(normalized.contains("Lakeside"));
	}

	#[test]
	fn fallback_parses_explicit_day_swap() {
		let intent = parse_edit_command_fallback("swap day 1 and day 3");
		assert_eq!(intent.edit_type, Some(EditType::SwapDays));
		assert_eq!(intent.source_day, Some(1));
		assert_eq!(intent.target_day, Some(3));
	}

	#[test]
	fn fallback_parses_time_block_move() {
		let intent = parse_edit_command_fallback("swap day 1 evening with day 2 evening");
		assert_eq!(intent.edit_type, Some(EditType::MoveTimeBlock));
		assert_eq!(intent.source_time_block, Some(BlockName::Evening));
		assert!(intent.regenerate_vacated);
	}

	#[test]
	fn swap_days_affected_sections_match_both_days() {
		let intent = EditIntent { edit_type: Some(EditType::SwapDays), source_day: Some(1), target_day: Some(3), ..Default::default() };
		let sections = affected_sections(&intent, 3);
		assert_eq!(sections, vec!["day_1".to_string(), "day_3".to_string()]);
	}

	#[test]
	fn apply_swap_days_exchanges_day_subtrees() {
		let mut itinerary = sample_itinerary(3);
		itinerary.days[0].morning.activities.push(sample_activity("A"));
		itinerary.days[2].morning.activities.push(sample_activity("C"));
		let intent = EditIntent { edit_type: Some(EditType::SwapDays), source_day: Some(1), target_day: Some(3), ..Default::default() };
		apply_swap_days(&mut itinerary, &intent).unwrap();
		assert_eq!(itinerary.days[0].morning.activities[0].name, "C");
		assert_eq!(itinerary.days[2].morning.activities[0].name, "A");
	}

	fn sample_itinerary(days: usize) -> Itinerary {
		Itinerary {
			city: "Jaipur".to_string(),
			duration_days: days as u32,
			pace: Pace::Moderate,
			interests: vec![],
			travel_mode: None,
			travel_dates: vec![],
			starting_point: crate::models::Location::new(26.9, 75.8),
			days: (0..days).map(|_| DayItinerary::default()).collect(),
			total_travel_time: 0,
		}
	}

	fn sample_activity(name: &str) -> crate::models::Activity {
		crate::models::Activity {
			name: name.to_string(),
			source_id: "node:1".to_string(),
			data_source: crate::models::DataSource::Openstreetmap,
			location: crate::models::Location::new(26.9, 75.8),
			duration_minutes: 60,
			time_slot: "09:00-10:00".to_string(),
			travel_time_from_previous: 0,
			category: crate::models::Category::Attraction,
			rating: None,
			description: None,
			opening_hours: None,
		}
	}
}
