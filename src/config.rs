/*
 * src/config.rs
 *
 * Engine configuration, loaded from the environment.
 *
 * Purpose:
 *   Bundle every environment-tunable knob the engine reads so operations
 *   take a `Config` rather than reaching for env vars ad hoc.
 */

use crate::global::{DEFAULT_CLARIFICATION_CAP, DEFAULT_SESSION_TTL_MINUTES};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
	pub google_maps_api_key: Option<String>,
	pub openai_api_key: Option<String>,

	pub session_ttl_minutes: i64,
	pub clarification_cap: u32,

	/// `true` re-invokes the Builder for all days against a freshly
	/// searched POI pool on a pace change; `false` only updates the
	/// `pace` field and leaves activities untouched.
	pub rebalance_pace_on_change: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			google_maps_api_key: None,
			openai_api_key: None,
			session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
			clarification_cap: DEFAULT_CLARIFICATION_CAP,
			rebalance_pace_on_change: true,
		}
	}
}

impl Config {
	/// Loads `.env` (if present) then reads environment variables over the
	/// defaults above.
	pub fn from_env() -> Self {
		dotenvy::dotenv().ok();
		let mut cfg = Config::default();

		cfg.google_maps_api_key = env::var("GOOGLE_MAPS_API_KEY").ok();
		cfg.openai_api_key = env::var("OPENAI_API_KEY").ok();

		if let Ok(v) = env::var("SESSION_TTL_MINUTES") {
			if let Ok(n) = v.parse() {
				cfg.session_ttl_minutes = n;
			}
		}
		if let Ok(v) = env::var("CLARIFICATION_CAP") {
			if let Ok(n) = v.parse() {
				cfg.clarification_cap = n;
			}
		}
		if let Ok(v) = env::var("REBALANCE_PACE_ON_CHANGE") {
			cfg.rebalance_pace_on_change = matches!(v.as_str(), "1" | "true" | "TRUE" | "yes");
		}

		cfg
	}
}
