/*
 * src/explanation.rs
 *
 * §4.7: `explain(question, context) -> {explanation, sources,
 * question_type}`. Classifies the question type, then branches per type
 * - each branch grounds its answer differently (opening hours, cached
 * evaluation, cached weather, or tip retrieval).
 */

use crate::models::{Activity, Evaluation, Itinerary, Source};
use crate::providers::llm::{Llm, LlmTier};
use crate::providers::tips::{TipRetriever, INDOOR_ALTERNATIVES_QUERY};
use crate::providers::weather::DailyWeather;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
	WhyPoi,
	Timing,
	IsFeasible,
	WhatIfWeather,
	WhatIfOther,
	General,
}

pub struct ExplanationContext<'a> {
	pub itinerary: &'a Itinerary,
	pub evaluation: Option<&'a Evaluation>,
	pub weather: Option<&'a [DailyWeather]>,
}

pub struct ExplanationResult {
	pub explanation: String,
	pub sources: Vec<Source>,
	pub question_type: QuestionType,
}

/// Keyword classification; kept deterministic rather than LLM-routed
/// since misclassifying the question type changes which context is
/// consulted, and the keyword signal here is unambiguous enough.
pub fn classify_question(question: &str) -> QuestionType {
	let lower = question.to_ascii_lowercase();
	if lower.contains("rain") || lower.contains("weather") || lower.contains("sunny") || lower.contains("hot") || lower.contains("cold") {
		return QuestionType::WhatIfWeather;
	}
	if lower.contains("feasible") || lower.contains("realistic") || lower.contains("too much") || lower.contains("doable") {
		return QuestionType::IsFeasible;
	}
	if lower.contains("what if") {
		return QuestionType::WhatIfOther;
	}
	if lower.contains("when") || lower.contains("time") || lower.contains("hour") {
		return QuestionType::Timing;
	}
	if lower.contains("why") {
		return QuestionType::WhyPoi;
	}
	QuestionType::General
}

/// Fuzzy-matches the question text against every activity name in the
/// itinerary (substring either way, case-insensitive), returning the
/// longest matching name as the most specific hit.
fn resolve_poi_from_question<'a>(itinerary: &'a Itinerary, question: &str) -> Option<&'a Activity> {
	let lower = question.to_ascii_lowercase();
	itinerary
		.activities_in_order()
		.into_iter()
		.filter(|a| {
			let name_lower = a.name.to_ascii_lowercase();
			lower.contains(&name_lower) || name_lower.contains(&lower)
		})
		.max_by_key(|a| a.name.len())
}

pub async fn explain(llm: &dyn Llm, tips: &dyn TipRetriever, ctx: &ExplanationContext<'_>, question: &str) -> ExplanationResult {
	let question_type = classify_question(question);

	match question_type {
		QuestionType::WhyPoi => explain_why_poi(llm, tips, ctx, question).await,
		QuestionType::Timing => explain_timing(ctx, question),
		QuestionType::IsFeasible => explain_feasibility(ctx),
		QuestionType::WhatIfWeather => explain_weather(tips, ctx).await,
		QuestionType::WhatIfOther | QuestionType::General => explain_general(llm, tips, ctx, question).await,
	}
}

async fn explain_why_poi(llm: &dyn Llm, tips: &dyn TipRetriever, ctx: &ExplanationContext<'_>, question: &str) -> ExplanationResult {
	let Some(activity) = resolve_poi_from_question(ctx.itinerary, question) else {
		return ExplanationResult {
			explanation: "I couldn't match that question to a specific activity in the itinerary.".to_string(),
			sources: Vec::new(),
			question_type: QuestionType::WhyPoi,
		};
	};

	let chunks = tips.retrieve(&ctx.itinerary.city, &activity.name, 3).await;
	let context: String = chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>().join("\n");

	let system_prompt = "Answer why a specific point of interest is included in a travel itinerary, using only the provided context.";
	let user_prompt = format!("Activity: {}\nContext:\n{}\nQuestion: {}", activity.name, context, question);
	let explanation = llm
		.complete(LlmTier::Quality, system_prompt, &user_prompt)
		.await
		.unwrap_or_else(|| format!("{} was chosen for its relevance to your interests.", activity.name));

	let sources: Vec<Source> = chunks
		.into_iter()
		.map(|c| Source { source_type: crate::models::SourceType::Wikivoyage, poi_name: Some(activity.name.clone()), source_id: None, url: c.url, topic: Some(c.section), snippet: Some(c.text) })
		.collect();

	ExplanationResult { explanation, sources, question_type: QuestionType::WhyPoi }
}

fn explain_timing(ctx: &ExplanationContext<'_>, question: &str) -> ExplanationResult {
	let Some(activity) = resolve_poi_from_question(ctx.itinerary, question) else {
		return ExplanationResult { explanation: "I couldn't find that activity in the itinerary.".to_string(), sources: Vec::new(), question_type: QuestionType::Timing };
	};

	let hours = activity.opening_hours.clone().unwrap_or_else(|| "no listed opening hours".to_string());
	let explanation = format!("{} is scheduled for {} (travel time from the previous stop: {} min; {}).", activity.name, activity.time_slot, activity.travel_time_from_previous, hours);

	ExplanationResult { explanation, sources: Vec::new(), question_type: QuestionType::Timing }
}

fn explain_feasibility(ctx: &ExplanationContext<'_>) -> ExplanationResult {
	let explanation = match ctx.evaluation {
		Some(eval) if eval.feasibility.pass => "Yes, this itinerary is feasible within the daily time budgets and travel-time limits.".to_string(),
		Some(eval) => format!("This itinerary has feasibility concerns: {}", eval.feasibility.violations.join("; ")),
		None => "This itinerary hasn't been evaluated yet.".to_string(),
	};
	ExplanationResult { explanation, sources: Vec::new(), question_type: QuestionType::IsFeasible }
}

async fn explain_weather(tips: &dyn TipRetriever, ctx: &ExplanationContext<'_>) -> ExplanationResult {
	let Some(weather) = ctx.weather else {
		let chunks = tips.retrieve(&ctx.itinerary.city, INDOOR_ALTERNATIVES_QUERY, 3).await;
		let sources = tip_chunks_to_sources(chunks);
		return ExplanationResult {
			explanation: "No weather data is cached for this itinerary yet; here are some indoor alternatives in case of rain.".to_string(),
			sources,
			question_type: QuestionType::WhatIfWeather,
		};
	};

	let rainy_days: Vec<usize> = weather.iter().enumerate().filter(|(_, d)| d.is_rainy()).map(|(i, _)| i + 1).collect();

	if rainy_days.is_empty() {
		return ExplanationResult {
			explanation: "The forecast looks clear throughout your trip, so no changes are needed.".to_string(),
			sources: weather_sources(weather),
			question_type: QuestionType::WhatIfWeather,
		};
	}

	let chunks = tips.retrieve(&ctx.itinerary.city, INDOOR_ALTERNATIVES_QUERY, 3).await;
	let mut sources = weather_sources(weather);
	sources.extend(tip_chunks_to_sources(chunks));

	let days_list = rainy_days.iter().map(|d| format!("day {d}")).collect::<Vec<_>>().join(", ");
	ExplanationResult {
		explanation: format!("Rain is expected on {days_list}; consider the indoor alternatives noted below."),
		sources,
		question_type: QuestionType::WhatIfWeather,
	}
}

fn weather_sources(weather: &[DailyWeather]) -> Vec<Source> {
	weather
		.iter()
		.map(|day| Source {
			source_type: crate::models::SourceType::Weather,
			poi_name: None,
			source_id: None,
			url: None,
			topic: Some(day.date.to_string()),
			snippet: Some(format!("{} ({}% precip)", day.condition, day.precip_probability)),
		})
		.collect()
}

fn tip_chunks_to_sources(chunks: Vec<crate::providers::tips::TipChunk>) -> Vec<Source> {
	chunks
		.into_iter()
		.map(|c| Source { source_type: crate::models::SourceType::Wikivoyage, poi_name: None, source_id: None, url: c.url, topic: Some(c.section), snippet: Some(c.text) })
		.collect()
}

async fn explain_general(llm: &dyn Llm, tips: &dyn TipRetriever, ctx: &ExplanationContext<'_>, question: &str) -> ExplanationResult {
	let chunks = tips.retrieve(&ctx.itinerary.city, question, 3).await;
	let context: String = chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>().join("\n");

	let system_prompt = "Answer a general question about a travel itinerary using the provided context where relevant.";
	let user_prompt = format!("Context:\n{context}\nQuestion: {question}");
	let explanation = llm.complete(LlmTier::Quality, system_prompt, &user_prompt).await.unwrap_or_else(|| "I don't have enough information to answer that.".to_string());

	ExplanationResult { explanation, sources: tip_chunks_to_sources(chunks), question_type: QuestionType::General }
}
