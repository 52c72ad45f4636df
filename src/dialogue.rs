/*
 * src/dialogue.rs
 *
 * §4.8: the `collecting -> confirming -> planning -> steady` state
 * machine. Intent classification (LLM + rule-based fallback), slot
 * extraction and merge, bounded clarification loop, confirmation gate.
 *
 * Keyword classification and the regex-based entity extraction are
 * ported from
 * `original_source/backend/src/orchestrator/intent_classifier.py`'s
 * `_fallback_classify` / `_extract_entities_simple`.
 */

use crate::edit_engine::normalize_voice_input;
use crate::models::{DialogueState, Pace, Preferences, Session, TravelMode};
use crate::providers::llm::{Llm, LlmTier};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
	PlanTrip,
	EditItinerary,
	Explain,
	Clarify,
	Other,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractedEntities {
	pub preferences: Preferences,
}

const CONFIRMATION_WORDS: [&str; 5] = ["yes", "confirm", "proceed", "sure", "go ahead"];

pub async fn classify_intent(llm: &dyn Llm, user_input: &str) -> Intent {
	let normalized = normalize_voice_input(user_input);

	let system_prompt = "Classify the user's travel-planning message into exactly one of: \
		PLAN_TRIP, EDIT_ITINERARY, EXPLAIN, CLARIFY, OTHER. Respond with only the label.";

	if let Some(response) = llm.complete(LlmTier::Fast, system_prompt, &normalized).await {
		if let Some(intent) = parse_intent_label(&response) {
			return intent;
		}
	}

	fallback_classify(&normalized)
}

fn parse_intent_label(label: &str) -> Option<Intent> {
	match label.trim().to_ascii_uppercase().as_str() {
		"PLAN_TRIP" => Some(Intent::PlanTrip),
		"EDIT_ITINERARY" => Some(Intent::EditItinerary),
		"EXPLAIN" => Some(Intent::Explain),
		"CLARIFY" => Some(Intent::Clarify),
		"OTHER" => Some(Intent::Other),
		_ => None,
	}
}

fn fallback_classify(normalized: &str) -> Intent {
	let lower = normalized.to_ascii_lowercase();

	if ["plan", "trip", "itinerary", "visit", "travel to", "create"].iter().any(|w| lower.contains(w)) {
		return Intent::PlanTrip;
	}
	if ["edit", "change", "modify", "swap", "remove", "add", "move", "update", "replace"].iter().any(|w| lower.contains(w)) {
		return Intent::EditItinerary;
	}
	if ["why", "explain", "reason", "how come"].iter().any(|w| lower.contains(w)) {
		return Intent::Explain;
	}
	if CONFIRMATION_WORDS.iter().any(|w| lower == *w) || ["no", "okay", "ok", "correct", "right"].iter().any(|w| lower.contains(w)) {
		return Intent::Clarify;
	}
	Intent::Other
}

pub fn is_confirmation(user_input: &str) -> bool {
	let lower = user_input.trim().to_ascii_lowercase();
	CONFIRMATION_WORDS.iter().any(|w| lower == *w || lower.starts_with(w))
}

// --- Entity extraction (§4.8: "extract preferences and merge") ---

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)[\s-]?day").unwrap());

const WORD_NUMBERS: [(&str, u32); 10] =
	[("one", 1), ("two", 2), ("three", 3), ("four", 4), ("five", 5), ("six", 6), ("seven", 7), ("eight", 8), ("nine", 9), ("ten", 10)];

fn word_number_to_digit(input: &str) -> String {
	let mut out = input.to_string();
	for (word, digit) in WORD_NUMBERS {
		let pattern = Regex::new(&format!(r"(?i)\b{word}\b")).unwrap();
		out = pattern.replace_all(&out, digit.to_string()).to_string();
	}
	out
}

/// Rule-based slot extraction, used both as the LLM-unavailable fallback
/// and to pre-fill obvious numeric/city slots before an LLM call (§4.8:
/// "convert word-numbers to digits", "normalize city to title case").
pub fn extract_preferences_fallback(user_input: &str) -> Preferences {
	let normalized = word_number_to_digit(user_input);
	let lower = normalized.to_ascii_lowercase();
	let mut preferences = Preferences::default();

	if let Some(caps) = DURATION_PATTERN.captures(&lower) {
		preferences.duration_days = caps[1].parse().ok();
	}

	if lower.contains("road") || lower.contains("car") || lower.contains("drive") {
		preferences.travel_mode = Some(TravelMode::Road);
	} else if lower.contains("flight") || lower.contains("fly") || lower.contains("plane") || lower.contains("airplane") {
		preferences.travel_mode = Some(TravelMode::Airplane);
	} else if lower.contains("train") || lower.contains("rail") {
		preferences.travel_mode = Some(TravelMode::Railway);
	}

	if let Some(pace) = ["relaxed", "moderate", "fast"].iter().find(|p| lower.contains(**p)).and_then(|p| crate::models::Pace::parse(p)) {
		preferences.pace = Some(pace);
	}

	const INTEREST_WORDS: [&str; 7] = ["culture", "history", "food", "nightlife", "nature", "shopping", "relaxation"];
	preferences.interests = INTEREST_WORDS.iter().filter(|w| lower.contains(**w)).map(|w| w.to_string()).collect();

	preferences
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LlmEntities {
	city: Option<String>,
	duration: Option<u32>,
	travel_mode: Option<String>,
	pace: Option<String>,
	interests: Option<Vec<String>>,
}

/// Preference extraction, LLM-first: a single structured-JSON call that
/// can recover `city` (which the regex fallback can never find on its
/// own), falling back to `extract_preferences_fallback` for any slot the
/// LLM leaves null or when the call fails outright, ported from
/// `intent_classifier.py`'s single `classify_intent` call that returns
/// both intent and entities together.
pub async fn extract_preferences(llm: &dyn Llm, user_input: &str) -> Preferences {
	let mut preferences = extract_preferences_fallback(user_input);

	let system_prompt = "Extract travel-planning entities from the user's message. Respond with \
		strict JSON: {\"city\": string or null, \"duration\": integer or null, \"travel_mode\": \
		\"road\"|\"airplane\"|\"railway\" or null, \"pace\": \"relaxed\"|\"moderate\"|\"fast\" or \
		null, \"interests\": [string] or null}.";

	let Some(response) = llm.complete(LlmTier::Fast, system_prompt, user_input).await else {
		return preferences;
	};
	let Ok(entities) = serde_json::from_str::<LlmEntities>(&response) else {
		return preferences;
	};

	if let Some(city) = entities.city {
		preferences.city = Some(city);
	}
	if let Some(duration) = entities.duration {
		preferences.duration_days = Some(duration);
	}
	if let Some(mode) = entities.travel_mode.as_deref() {
		preferences.travel_mode = match mode.to_ascii_lowercase().as_str() {
			"road" => Some(TravelMode::Road),
			"airplane" | "air" | "flight" => Some(TravelMode::Airplane),
			"railway" | "rail" | "train" => Some(TravelMode::Railway),
			_ => preferences.travel_mode,
		};
	}
	if let Some(pace) = entities.pace.as_deref().and_then(Pace::parse) {
		preferences.pace = Some(pace);
	}
	if let Some(interests) = entities.interests {
		for interest in interests {
			if !preferences.interests.iter().any(|i| i.eq_ignore_ascii_case(&interest)) {
				preferences.interests.push(interest);
			}
		}
	}

	preferences
}

// --- Clarification (§4.8, §4.9) ---

/// Returns the next slot to ask about, filtering out slots already
/// asked this session (clarification loop prevention), or `None` if
/// nothing left to ask.
pub fn next_clarification_slot(preferences: &Preferences, already_asked: &[String]) -> Option<&'static str> {
	preferences.priority_missing_slots().into_iter().find(|slot| !already_asked.iter().any(|a| a == slot))
}

pub fn clarification_question(slot: &str) -> String {
	match slot {
		"city" => "Which city would you like to visit?".to_string(),
		"duration_days" => "How many days will you be traveling?".to_string(),
		"travel_mode" => "How are you traveling — by road, air, or rail?".to_string(),
		"travel_dates" => "What dates are you planning to travel?".to_string(),
		"interests" => "What are you interested in — culture, food, nature, nightlife?".to_string(),
		"pace" => "Would you like a relaxed, moderate, or fast pace?".to_string(),
		_ => "Could you tell me more about your trip?".to_string(),
	}
}

/// Whether the clarification counter may still increment (§8 invariant
/// 8: monotonic non-decreasing, <= cap).
pub fn can_ask_more(session: &Session, cap: u32) -> bool {
	(session.clarifying_questions_asked.len() as u32) < cap
}

/// Advances the dialogue state on confirmation (§4.8).
pub fn advance_on_confirmation(state: DialogueState) -> DialogueState {
	match state {
		DialogueState::Confirming => DialogueState::Planning,
		other => other,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fallback_classifies_plan_trip_keywords() {
		assert_eq!(fallback_classify("I want to plan a trip to Jaipur"), Intent::PlanTrip);
	}

	#[test]
	fn fallback_classifies_edit_keywords() {
		assert_eq!(fallback_classify("please swap day 1 and day 2"), Intent::EditItinerary);
	}

	#[test]
	fn recognizes_confirmation_words() {
		assert!(is_confirmation("yes"));
		assert!(is_confirmation("Confirm please"));
		assert!(!is_confirmation("no thanks"));
	}

	#[test]
	fn extracts_duration_from_word_numbers() {
		let prefs = extract_preferences_fallback("I want a three day trip");
		assert_eq!(prefs.duration_days, Some(3));
	}

	#[test]
	fn extracts_travel_mode_and_interests() {
		let prefs = extract_preferences_fallback("traveling by road, interested in food and culture");
		assert_eq!(prefs.travel_mode, Some(TravelMode::Road));
		assert!(prefs.interests.contains(&"food".to_string()));
		assert!(prefs.interests.contains(&"culture".to_string()));
	}

	#[test]
	fn clarification_slots_follow_priority_order_and_skip_asked() {
		let prefs = Preferences::default();
		let asked = vec!["city".to_string()];
		assert_eq!(next_clarification_slot(&prefs, &asked), Some("duration_days"));
	}
}
