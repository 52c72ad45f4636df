/*
 * src/engine.rs
 *
 * §6: the three core operations - `turn`, `explain`, `edit` - wiring the
 * dialogue state machine, builder, edit engine, and evaluators against a
 * `Services` aggregate and a session id. This is the crate's public
 * entry point; callers never touch the pipeline modules directly.
 */

use crate::builder::{self, BuildRequest, DailyWindow};
use crate::dialogue::{self, Intent};
use crate::edit_engine::{self, EditContext};
use crate::error::{EngineError, EngineResult};
use crate::evaluators;
use crate::explanation::{self, ExplanationContext, ExplanationResult};
use crate::models::{DialogueState, Evaluation, Role};
use crate::poi_search::{self, PoiSearchRequest};
use crate::services::Services;
use chrono::{NaiveTime, Utc};

const DAILY_WINDOW_START_HOUR: u32 = 9;
const DAILY_WINDOW_END_HOUR: u32 = 21;
const DEFAULT_POI_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub enum TurnOutcome {
	/// A clarifying question was asked; no itinerary change.
	Clarifying { question: String },
	/// All required slots are present; awaiting explicit confirmation.
	Confirming { summary: String },
	/// A new itinerary was built and evaluated.
	Planned { explanation: String },
	/// The dialogue is in `Steady` and nothing actionable happened (e.g.
	/// a reply that isn't a recognized intent).
	Acknowledged { message: String },
}

pub async fn start_session(services: &Services) -> String {
	let session = services.sessions.create(Utc::now()).await;
	session.id
}

/// Advances the dialogue by one user turn (§4.8).
pub async fn turn(services: &Services, session_id: &str, user_input: &str) -> EngineResult<TurnOutcome> {
	let now = Utc::now();
	let session = services.sessions.get(session_id, now).await?;
	services.sessions.append_message(session_id, Role::User, user_input.to_string(), now).await?;

	let intent = dialogue::classify_intent(services.llm.as_ref(), user_input).await;

	let outcome = match intent {
		Intent::PlanTrip | Intent::Other => handle_plan_trip(services, session_id, user_input, now).await?,
		Intent::Clarify if session.state == DialogueState::Confirming && dialogue::is_confirmation(user_input) => {
			services.sessions.set_state(session_id, DialogueState::Planning, now).await?;
			build_and_evaluate(services, session_id, now).await?
		}
		Intent::Clarify => handle_plan_trip(services, session_id, user_input, now).await?,
		Intent::EditItinerary => handle_edit(services, session_id, user_input, now).await?,
		Intent::Explain => {
			let result = explain(services, session_id, user_input).await?;
			TurnOutcome::Acknowledged { message: result.explanation }
		}
	};

	Ok(outcome)
}

async fn handle_plan_trip(services: &Services, session_id: &str, user_input: &str, now: chrono::DateTime<Utc>) -> EngineResult<TurnOutcome> {
	let extracted = dialogue::extract_preferences(services.llm.as_ref(), user_input).await;
	let mut preferences = services.sessions.update_preferences(session_id, extracted, now).await?;
	if let Some(city) = preferences.city.clone() {
		preferences.city = Some(poi_search::title_case(&city));
		services.sessions.update_preferences(session_id, preferences.clone(), now).await?;
	}

	let session = services.sessions.get(session_id, now).await?;

	if !preferences.missing_required_slots().is_empty() {
		if let Some(slot) = dialogue::next_clarification_slot(&preferences, &session.clarifying_questions_asked) {
			if dialogue::can_ask_more(&session, services.config.clarification_cap) {
				services.sessions.record_clarifying_question(session_id, slot.to_string(), now).await?;
				let question = dialogue::clarification_question(slot);
				services.sessions.append_message(session_id, Role::Assistant, question.clone(), now).await?;
				return Ok(TurnOutcome::Clarifying { question });
			}
		}
		// Every priority question already asked; proceed with what's known
		// unless the absolute minimum is still missing (§4.8).
		if !preferences.missing_required_slots().is_empty() {
			return Err(EngineError::ValidationError("missing required trip details (city, duration)".to_string()));
		}
	}

	if session.state != DialogueState::Confirming && session.state != DialogueState::Planning && session.state != DialogueState::Steady {
		services.sessions.set_state(session_id, DialogueState::Confirming, now).await?;
		let summary = confirmation_summary(&preferences);
		services.sessions.append_message(session_id, Role::Assistant, summary.clone(), now).await?;
		return Ok(TurnOutcome::Confirming { summary });
	}

	build_and_evaluate(services, session_id, now).await
}

fn confirmation_summary(preferences: &crate::models::Preferences) -> String {
	format!(
		"Planning a {}-day trip to {}, pace {}, interests: {}. Shall I go ahead?",
		preferences.duration_days.unwrap_or(0),
		preferences.city.clone().unwrap_or_default(),
		preferences.pace.map(|p| format!("{p:?}")).unwrap_or_else(|| "moderate".to_string()),
		if preferences.interests.is_empty() { "none specified".to_string() } else { preferences.interests.join(", ") }
	)
}

async fn build_and_evaluate(services: &Services, session_id: &str, now: chrono::DateTime<Utc>) -> EngineResult<TurnOutcome> {
	let session = services.sessions.get(session_id, now).await?;
	let preferences = session.preferences.clone();

	let city = preferences.city.clone().ok_or_else(|| EngineError::ValidationError("city is required".to_string()))?;
	let duration_days = preferences.duration_days.ok_or_else(|| EngineError::ValidationError("duration is required".to_string()))?;

	let poi_req = PoiSearchRequest {
		city: &city,
		interests: &preferences.interests,
		country: preferences.country.as_deref(),
		state: preferences.state.as_deref(),
		limit: DEFAULT_POI_LIMIT,
	};
	let pois = poi_search::search_pois(services.geocoder.as_ref(), services.primary_poi.as_ref(), services.fallback_poi.as_ref(), &poi_req).await?;

	let starting_point = pois.first().map(|p| p.location).unwrap_or(crate::models::Location::new(0.0, 0.0));
	let daily_windows: Vec<DailyWindow> = (0..duration_days)
		.map(|i| DailyWindow {
			day: i + 1,
			start: NaiveTime::from_hms_opt(DAILY_WINDOW_START_HOUR, 0, 0).unwrap(),
			end: NaiveTime::from_hms_opt(DAILY_WINDOW_END_HOUR, 0, 0).unwrap(),
		})
		.collect();

	let build_req = BuildRequest {
		pois: &pois,
		daily_windows: &daily_windows,
		pace: preferences.pace.unwrap_or(crate::models::Pace::Moderate),
		interests: &preferences.interests,
		starting_point,
		travel_mode: preferences.travel_mode,
		travel_dates: preferences.travel_dates.clone().unwrap_or_default(),
		city: city.clone(),
	};

	let built = builder::build(services.llm.as_ref(), services.router.as_ref(), &build_req).await;

	let feasibility = evaluators::evaluate_feasibility(&built.itinerary);
	let grounding = evaluators::evaluate_grounding(&built.itinerary);
	let evaluation = Evaluation::new(feasibility, grounding);

	services.sessions.set_itinerary(session_id, built.itinerary, now).await?;
	services.sessions.set_evaluation(session_id, evaluation, now).await?;
	services.sessions.set_state(session_id, DialogueState::Steady, now).await?;
	services.sessions.append_message(session_id, Role::Assistant, built.explanation.clone(), now).await?;

	Ok(TurnOutcome::Planned { explanation: built.explanation })
}

async fn handle_edit(services: &Services, session_id: &str, user_input: &str, now: chrono::DateTime<Utc>) -> EngineResult<TurnOutcome> {
	let session = services.sessions.get(session_id, now).await?;
	let itinerary = session.itinerary.clone().ok_or_else(|| EngineError::EditValidationFailed("no itinerary exists yet to edit".to_string()))?;

	let intent = edit_engine::parse_edit_command(services.llm.as_ref(), user_input).await;

	let ctx = EditContext {
		geocoder: services.geocoder.as_ref(),
		primary_poi: services.primary_poi.as_ref(),
		fallback_poi: services.fallback_poi.as_ref(),
		llm: services.llm.as_ref(),
		router: services.router.as_ref(),
		interests: &session.preferences.interests,
		rebalance_pace_on_change: services.config.rebalance_pace_on_change,
	};

	let edited = edit_engine::apply_edit(&ctx, &itinerary, &intent).await?;

	let feasibility = evaluators::evaluate_feasibility(&edited);
	let grounding = evaluators::evaluate_grounding(&edited);
	let edit_correctness = evaluators::evaluate_edit_correctness(&itinerary, &edited, &intent);
	let evaluation = Evaluation::new(feasibility, grounding).with_edit_correctness(edit_correctness);

	services.sessions.set_itinerary(session_id, edited, now).await?;
	services.sessions.set_evaluation(session_id, evaluation, now).await?;

	let message = "The itinerary has been updated.".to_string();
	services.sessions.append_message(session_id, Role::Assistant, message.clone(), now).await?;
	Ok(TurnOutcome::Acknowledged { message })
}

/// §4.7: answers a question about the current itinerary.
pub async fn explain(services: &Services, session_id: &str, question: &str) -> EngineResult<ExplanationResult> {
	let now = Utc::now();
	let session = services.sessions.get(session_id, now).await?;
	let itinerary = session.itinerary.as_ref().ok_or_else(|| EngineError::EvaluationFailed("no itinerary exists yet to explain".to_string()))?;

	let weather = fetch_weather(services, itinerary).await;
	let ctx = ExplanationContext { itinerary, evaluation: session.evaluation.as_ref(), weather: weather.as_deref() };

	let result = explanation::explain(services.llm.as_ref(), services.tips.as_ref(), &ctx, question).await;
	services.sessions.append_message(session_id, Role::Assistant, result.explanation.clone(), now).await?;
	Ok(result)
}

async fn fetch_weather(services: &Services, itinerary: &crate::models::Itinerary) -> Option<Vec<crate::providers::weather::DailyWeather>> {
	let start = *itinerary.travel_dates.first()?;
	let end = *itinerary.travel_dates.last()?;
	services.weather.forecast(itinerary.starting_point, start, end).await.ok()
}

/// Direct edit entry point (§6), bypassing intent classification for
/// callers that already know they are issuing an edit command.
pub async fn edit(services: &Services, session_id: &str, edit_command: &str) -> EngineResult<()> {
	match handle_edit(services, session_id, edit_command, Utc::now()).await? {
		TurnOutcome::Acknowledged { .. } => Ok(()),
		_ => Ok(()),
	}
}
