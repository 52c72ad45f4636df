/*
 * src/error.rs
 *
 * Engine-native error type.
 *
 * The ten kinds distinguished here mirror the propagation policy: provider
 * failures are recovered locally when a fallback exists and only surfaced
 * once the whole chain is exhausted. Evaluator violations are never
 * represented as errors - they are attached to results instead.
 */

use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	#[error("city not found: {0}")]
	CityNotFound(String),

	#[error("no matching points of interest")]
	PoiNotFound,

	#[error("failed to generate itinerary: {0}")]
	ItineraryGenerationFailed(String),

	#[error("edit could not be validated: {0}")]
	EditValidationFailed(String),

	#[error("session not found: {0}")]
	SessionNotFound(String),

	#[error("external provider unavailable: {0}")]
	ExternalProviderUnavailable(String),

	#[error("evaluation failed: {0}")]
	EvaluationFailed(String),

	#[error("rate limited by provider: {0}")]
	RateLimited(String),

	#[error("operation timed out after {0:?}")]
	Timeout(Duration),

	#[error("validation error: {0}")]
	ValidationError(String),
}

impl EngineError {
	/// Stable machine code, independent of the display message.
	pub fn code(&self) -> &'static str {
		match self {
			EngineError::CityNotFound(_) => "CITY_NOT_FOUND",
			EngineError::PoiNotFound => "POI_NOT_FOUND",
			EngineError::ItineraryGenerationFailed(_) => "ITINERARY_GENERATION_FAILED",
			EngineError::EditValidationFailed(_) => "EDIT_VALIDATION_FAILED",
			EngineError::SessionNotFound(_) => "SESSION_NOT_FOUND",
			EngineError::ExternalProviderUnavailable(_) => "EXTERNAL_PROVIDER_UNAVAILABLE",
			EngineError::EvaluationFailed(_) => "EVALUATION_FAILED",
			EngineError::RateLimited(_) => "RATE_LIMITED",
			EngineError::Timeout(_) => "TIMEOUT",
			EngineError::ValidationError(_) => "VALIDATION_ERROR",
		}
	}

	/// A details map suitable for the user-visible error object of §7.
	pub fn details(&self) -> Map<String, Value> {
		let mut map = Map::new();
		map.insert("code".into(), Value::String(self.code().into()));
		map.insert("message".into(), Value::String(self.to_string()));
		map
	}

	/// Whether the dialogue layer should suggest a next action to the user,
	/// rather than treat this as an internal failure.
	pub fn is_user_actionable(&self) -> bool {
		matches!(
			self,
			EngineError::CityNotFound(_)
				| EngineError::PoiNotFound
				| EngineError::EditValidationFailed(_)
				| EngineError::ValidationError(_)
		)
	}
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
