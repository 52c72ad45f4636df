/*
 * src/models.rs
 *
 * Core data model: Location, POI, Activity, TimeBlock, DayItinerary,
 * Itinerary, Session, Source, EditIntent, and the evaluation shapes.
 *
 * Every type here is plain data. Mutation lives in the components that
 * own a given transformation (builder, edit engine); nothing in this
 * module mutates itself.
 */

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A geographic coordinate. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
	pub lat: f64,
	pub lon: f64,
}

impl Location {
	pub fn new(lat: f64, lon: f64) -> Self {
		Self { lat, lon }
	}

	pub fn is_valid(&self) -> bool {
		self.lat.is_finite()
			&& self.lon.is_finite()
			&& (-90.0..=90.0).contains(&self.lat)
			&& (-180.0..=180.0).contains(&self.lon)
	}

	/// Rounds both components to 4 decimal places, the cache-key precision
	/// used throughout the travel-time and POI caches.
	pub fn rounded(&self) -> (i64, i64) {
		((self.lat * 10_000.0).round() as i64, (self.lon * 10_000.0).round() as i64)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
	Restaurant,
	Museum,
	Attraction,
	Shopping,
	Park,
	Nightlife,
	Historical,
	Nature,
}

impl Category {
	/// A coarse duration estimate used when a POI lacks enough signal
	/// (rating/review count) to refine it further.
	pub fn base_duration_minutes(&self) -> u32 {
		match self {
			Category::Restaurant => 75,
			Category::Museum => 120,
			Category::Attraction => 90,
			Category::Shopping => 60,
			Category::Park => 60,
			Category::Nightlife => 120,
			Category::Historical => 60,
			Category::Nature => 90,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
	Openstreetmap,
	GooglePlaces,
	Wikivoyage,
	Weather,
}

/// A point of interest. Identity is `(data_source, source_id)`. Created by
/// a provider and never mutated thereafter - the enrichment pass in the
/// builder copies fields out of a POI, it never writes into one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
	pub data_source: DataSource,
	pub source_id: String,
	pub name: String,
	pub category: Category,
	pub location: Location,
	pub duration_minutes: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rating: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub opening_hours: Option<String>,
}

impl Poi {
	pub fn identity(&self) -> (DataSource, &str) {
		(self.data_source, &self.source_id)
	}

	/// Canonical source_id string as used in the grounding evaluator and
	/// identifier-format checks of §6, e.g. `way:12345` or
	/// `place_id:ChIJ...`.
	pub fn canonical_source_id(&self) -> String {
		match self.data_source {
			DataSource::GooglePlaces => format!("place_id:{}", self.source_id),
			_ => self.source_id.clone(),
		}
	}
}

/// An instantiated POI inside a time block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
	pub name: String,
	pub source_id: String,
	pub data_source: DataSource,
	pub location: Location,
	pub duration_minutes: u32,
	/// "HH:MM-HH:MM"
	pub time_slot: String,
	pub travel_time_from_previous: u32,
	pub category: Category,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rating: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub opening_hours: Option<String>,
}

impl Activity {
	pub fn canonical_source_id(&self) -> String {
		match self.data_source {
			DataSource::GooglePlaces => format!("place_id:{}", self.source_id),
			_ => self.source_id.clone(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockName {
	Morning,
	Afternoon,
	Evening,
}

impl BlockName {
	pub const ALL: [BlockName; 3] = [BlockName::Morning, BlockName::Afternoon, BlockName::Evening];

	pub fn as_str(&self) -> &'static str {
		match self {
			BlockName::Morning => "morning",
			BlockName::Afternoon => "afternoon",
			BlockName::Evening => "evening",
		}
	}

	pub fn parse(s: &str) -> Option<BlockName> {
		match s.to_ascii_lowercase().as_str() {
			"morning" => Some(BlockName::Morning),
			"afternoon" => Some(BlockName::Afternoon),
			"evening" => Some(BlockName::Evening),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeBlock {
	pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayItinerary {
	pub morning: TimeBlock,
	pub afternoon: TimeBlock,
	pub evening: TimeBlock,
}

impl DayItinerary {
	pub fn block(&self, name: BlockName) -> &TimeBlock {
		match name {
			BlockName::Morning => &self.morning,
			BlockName::Afternoon => &self.afternoon,
			BlockName::Evening => &self.evening,
		}
	}

	pub fn block_mut(&mut self, name: BlockName) -> &mut TimeBlock {
		match name {
			BlockName::Morning => &mut self.morning,
			BlockName::Afternoon => &mut self.afternoon,
			BlockName::Evening => &mut self.evening,
		}
	}

	pub fn activity_count(&self) -> usize {
		self.morning.activities.len() + self.afternoon.activities.len() + self.evening.activities.len()
	}

	/// Canonical JSON used by the edit-correctness evaluator's
	/// sorted-key-serialization diff (§4.6 supplement).
	pub fn canonical_json(&self) -> String {
		serde_json::to_string(self).unwrap_or_default()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
	Relaxed,
	Moderate,
	Fast,
}

impl Pace {
	/// Inclusive (min, max) activities-per-day range, per spec §4.4/§4.6.
	pub fn activity_range(&self) -> (usize, usize) {
		match self {
			Pace::Relaxed => (2, 3),
			Pace::Moderate => (3, 4),
			Pace::Fast => (4, 5),
		}
	}

	pub fn parse(s: &str) -> Option<Pace> {
		match s.to_ascii_lowercase().as_str() {
			"relaxed" => Some(Pace::Relaxed),
			"moderate" => Some(Pace::Moderate),
			"fast" => Some(Pace::Fast),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
	Road,
	Airplane,
	Railway,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Itinerary {
	pub city: String,
	pub duration_days: u32,
	pub pace: Pace,
	#[serde(default)]
	pub interests: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub travel_mode: Option<TravelMode>,
	pub travel_dates: Vec<NaiveDate>,
	pub starting_point: Location,
	pub days: Vec<DayItinerary>,
	pub total_travel_time: u32,
}

impl Itinerary {
	/// `day_1`-style section key, 1-indexed per spec.
	pub fn day_key(index: usize) -> String {
		format!("day_{}", index + 1)
	}

	pub fn day(&self, index: usize) -> Option<&DayItinerary> {
		self.days.get(index)
	}

	pub fn day_mut(&mut self, index: usize) -> Option<&mut DayItinerary> {
		self.days.get_mut(index)
	}

	/// All activities in chronological cross-day order, used by the
	/// travel-time pass and by invariant checks.
	pub fn activities_in_order(&self) -> Vec<&Activity> {
		let mut out = Vec::new();
		for day in &self.days {
			for block in [&day.morning, &day.afternoon, &day.evening] {
				out.extend(block.activities.iter());
			}
		}
		out
	}

	pub fn recompute_total_travel_time(&mut self) {
		self.total_travel_time = self
			.activities_in_order()
			.iter()
			.map(|a| a.travel_time_from_previous)
			.sum();
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
	Openstreetmap,
	GooglePlaces,
	Wikivoyage,
	Weather,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
	#[serde(rename = "type")]
	pub source_type: SourceType,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub poi_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub source_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub topic: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub snippet: Option<String>,
}

impl Source {
	pub fn from_poi(poi: &Poi) -> Self {
		Self {
			source_type: match poi.data_source {
				DataSource::Openstreetmap => SourceType::Openstreetmap,
				DataSource::GooglePlaces => SourceType::GooglePlaces,
				DataSource::Wikivoyage => SourceType::Wikivoyage,
				DataSource::Weather => SourceType::Weather,
			},
			poi_name: Some(poi.name.clone()),
			source_id: Some(poi.canonical_source_id()),
			url: None,
			topic: None,
			snippet: None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditType {
	ChangePace,
	SwapActivity,
	SwapDays,
	MoveTimeBlock,
	AddActivity,
	AddDay,
	RemoveActivity,
	ReduceTravel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditIntent {
	pub edit_type: Option<EditType>,
	pub target_day: Option<u32>,
	pub source_day: Option<u32>,
	pub target_time_block: Option<BlockName>,
	pub source_time_block: Option<BlockName>,
	pub target_activity: Option<String>,
	pub new_pace: Option<Pace>,
	pub new_activity_name: Option<String>,
	pub place_name: Option<String>,
	pub regenerate_vacated: bool,
}

// --- Evaluation shapes (supplemented from original_source Pydantic models) ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeasibilityEvaluation {
	pub pass: bool,
	pub score: f32,
	pub violations: Vec<String>,
	pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundingEvaluation {
	pub pass: bool,
	pub score: f32,
	pub violations: Vec<String>,
	pub warnings: Vec<String>,
	pub all_pois_have_sources: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditCorrectnessEvaluation {
	pub is_correct: bool,
	pub modified_sections: Vec<String>,
	pub unchanged_sections: Vec<String>,
	pub violations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evaluation {
	pub feasibility: FeasibilityEvaluation,
	pub grounding: GroundingEvaluation,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub edit_correctness: Option<EditCorrectnessEvaluation>,
	pub overall_score: f32,
}

impl Evaluation {
	pub fn new(feasibility: FeasibilityEvaluation, grounding: GroundingEvaluation) -> Self {
		let overall_score = (feasibility.score + grounding.score) / 2.0;
		Self { feasibility, grounding, edit_correctness: None, overall_score }
	}

	pub fn with_edit_correctness(mut self, edit_correctness: EditCorrectnessEvaluation) -> Self {
		let ec_score = if edit_correctness.is_correct { 1.0 } else { 0.0 };
		self.overall_score = (self.feasibility.score + self.grounding.score + ec_score) / 3.0;
		self.edit_correctness = Some(edit_correctness);
		self
	}
}

/// User preferences accrued across the dialogue (§4.8). Every field is
/// optional because slots fill incrementally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
	pub city: Option<String>,
	pub country: Option<String>,
	pub state: Option<String>,
	pub duration_days: Option<u32>,
	pub travel_mode: Option<TravelMode>,
	pub travel_dates: Option<Vec<NaiveDate>>,
	#[serde(default)]
	pub interests: Vec<String>,
	pub pace: Option<Pace>,
}

impl Preferences {
	/// Merge-only: never overwrite a non-empty slot with null; union
	/// interests (§4.8, §4.9 `update_preferences`).
	pub fn merge(&mut self, other: &Preferences) {
		if other.city.is_some() {
			self.city = other.city.clone();
		}
		if other.country.is_some() {
			self.country = other.country.clone();
		}
		if other.state.is_some() {
			self.state = other.state.clone();
		}
		if other.duration_days.is_some() {
			self.duration_days = other.duration_days;
		}
		if other.travel_mode.is_some() {
			self.travel_mode = other.travel_mode;
		}
		if other.travel_dates.is_some() {
			self.travel_dates = other.travel_dates.clone();
		}
		if other.pace.is_some() {
			self.pace = other.pace;
		}
		for interest in &other.interests {
			if !self.interests.iter().any(|i| i.eq_ignore_ascii_case(interest)) {
				self.interests.push(interest.clone());
			}
		}
	}

	/// city and duration_days are the only absolute minimum slots (§4.8).
	pub fn missing_required_slots(&self) -> Vec<&'static str> {
		let mut missing = Vec::new();
		if self.city.is_none() {
			missing.push("city");
		}
		if self.duration_days.is_none() {
			missing.push("duration_days");
		}
		missing
	}

	/// Full priority order used for clarification selection (§4.8).
	pub fn priority_missing_slots(&self) -> Vec<&'static str> {
		let order = ["city", "duration_days", "travel_mode", "travel_dates", "interests", "pace"];
		order
			.into_iter()
			.filter(|slot| match *slot {
				"city" => self.city.is_none(),
				"duration_days" => self.duration_days.is_none(),
				"travel_mode" => self.travel_mode.is_none(),
				"travel_dates" => self.travel_dates.is_none(),
				"interests" => self.interests.is_empty(),
				"pace" => self.pace.is_none(),
				_ => false,
			})
			.collect()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	User,
	Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
	pub role: Role,
	pub content: String,
	pub ts: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
	pub id: String,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub last_activity_at: chrono::DateTime<chrono::Utc>,
	pub preferences: Preferences,
	pub itinerary: Option<Itinerary>,
	pub history: Vec<HistoryEntry>,
	pub clarifying_questions_asked: Vec<String>,
	pub sources: Vec<Source>,
	pub evaluation: Option<Evaluation>,
	pub state: DialogueState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
	Collecting,
	Confirming,
	Planning,
	Steady,
}

impl Session {
	pub fn new(id: String, now: chrono::DateTime<chrono::Utc>) -> Self {
		Self {
			id,
			created_at: now,
			last_activity_at: now,
			preferences: Preferences::default(),
			itinerary: None,
			history: Vec::new(),
			clarifying_questions_asked: Vec::new(),
			sources: Vec::new(),
			evaluation: None,
			state: DialogueState::Collecting,
		}
	}
}

/// A day-keyed `{morning, afternoon, evening}` structure the LLM selection
/// pass parses into, before the deterministic enrichment pass runs (§4.4).
/// Kept distinct from `DayItinerary` because its activities are raw,
/// unenriched candidates keyed by a bare name rather than canonical POI
/// fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDayPlan {
	#[serde(default)]
	pub morning: Vec<RawActivity>,
	#[serde(default)]
	pub afternoon: Vec<RawActivity>,
	#[serde(default)]
	pub evening: Vec<RawActivity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawActivity {
	pub name: String,
	#[serde(default)]
	pub source_id: Option<String>,
	#[serde(default)]
	pub lat: Option<f64>,
	#[serde(default)]
	pub lon: Option<f64>,
}

pub type RawPlan = HashMap<String, RawDayPlan>;
