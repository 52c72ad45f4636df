/*
 * src/providers/weather.rs
 *
 * `(lat, lon, start_date, end_date) -> daily[{date, code, tmax, tmin,
 * precip_prob, precip_sum}]` against a fixed WMO weather-interpretation
 * code table (§6). No credential required - an Open-Meteo-class public
 * forecast API is the only variant, so there is no fallback cascade
 * here unlike geocoder/POI/router.
 */

use crate::error::{EngineError, EngineResult};
use crate::global::PAID_PROVIDER_RATE_LIMIT_MS;
use crate::models::Location;
use crate::providers::RateLimiter;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyWeather {
	pub date: NaiveDate,
	pub code: u16,
	pub condition: &'static str,
	pub tmax_c: f32,
	pub tmin_c: f32,
	pub precip_probability: u8,
	pub precip_sum_mm: f32,
}

impl DailyWeather {
	/// §8 S6: a day "marked rainy" is one whose precipitation probability
	/// clears this threshold or whose WMO code is itself a precipitation
	/// class.
	pub fn is_rainy(&self) -> bool {
		self.precip_probability >= 50 || is_precipitation_code(self.code)
	}
}

fn is_precipitation_code(code: u16) -> bool {
	matches!(code, 51..=67 | 80..=82 | 95..=99)
}

/// WMO weather interpretation codes (subset actually returned by
/// Open-Meteo-class providers), mapped to a short human condition label.
pub fn wmo_condition(code: u16) -> &'static str {
	match code {
		0 => "clear sky",
		1 | 2 => "mostly clear",
		3 => "overcast",
		45 | 48 => "fog",
		51 | 53 | 55 => "drizzle",
		56 | 57 => "freezing drizzle",
		61 | 63 | 65 => "rain",
		66 | 67 => "freezing rain",
		71 | 73 | 75 => "snow fall",
		77 => "snow grains",
		80 | 81 | 82 => "rain showers",
		85 | 86 => "snow showers",
		95 => "thunderstorm",
		96 | 99 => "thunderstorm with hail",
		_ => "unknown",
	}
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
	async fn forecast(&self, location: Location, start: NaiveDate, end: NaiveDate) -> EngineResult<Vec<DailyWeather>>;
}

pub struct OpenMeteoWeatherProvider {
	client: reqwest::Client,
	rate_limiter: RateLimiter,
}

impl OpenMeteoWeatherProvider {
	const API_URL: &'static str = "https://api.open-meteo.com/v1/forecast";

	pub fn new() -> Self {
		Self {
			client: reqwest::Client::new(),
			rate_limiter: RateLimiter::from_millis(PAID_PROVIDER_RATE_LIMIT_MS),
		}
	}
}

impl Default for OpenMeteoWeatherProvider {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl WeatherProvider for OpenMeteoWeatherProvider {
	async fn forecast(&self, location: Location, start: NaiveDate, end: NaiveDate) -> EngineResult<Vec<DailyWeather>> {
		self.rate_limiter.acquire().await;

		let resp = self
			.client
			.get(Self::API_URL)
			.query(&[
				("latitude", location.lat.to_string()),
				("longitude", location.lon.to_string()),
				("start_date", start.format("%Y-%m-%d").to_string()),
				("end_date", end.format("%Y-%m-%d").to_string()),
				(
					"daily",
					"weathercode,temperature_2m_max,temperature_2m_min,precipitation_probability_max,precipitation_sum".to_string(),
				),
				("timezone", "auto".to_string()),
			])
			.send()
			.await
			.map_err(|e| EngineError::ExternalProviderUnavailable(format!("weather: {e}")))?;

		let body: serde_json::Value = resp
			.json()
			.await
			.map_err(|e| EngineError::ExternalProviderUnavailable(format!("weather parse: {e}")))?;

		let daily = &body["daily"];
		let dates = daily["time"].as_array().cloned().unwrap_or_default();
		let codes = daily["weathercode"].as_array().cloned().unwrap_or_default();
		let tmax = daily["temperature_2m_max"].as_array().cloned().unwrap_or_default();
		let tmin = daily["temperature_2m_min"].as_array().cloned().unwrap_or_default();
		let precip_prob = daily["precipitation_probability_max"].as_array().cloned().unwrap_or_default();
		let precip_sum = daily["precipitation_sum"].as_array().cloned().unwrap_or_default();

		if dates.is_empty() {
			return Err(EngineError::ExternalProviderUnavailable("weather: empty response".to_string()));
		}

		let mut out = Vec::with_capacity(dates.len());
		for i in 0..dates.len() {
			let Some(date_str) = dates[i].as_str() else { continue };
			let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else { continue };
			let code = codes.get(i).and_then(|v| v.as_u64()).unwrap_or(0) as u16;
			out.push(DailyWeather {
				date,
				code,
				condition: wmo_condition(code),
				tmax_c: tmax.get(i).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
				tmin_c: tmin.get(i).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
				precip_probability: precip_prob.get(i).and_then(|v| v.as_u64()).unwrap_or(0) as u8,
				precip_sum_mm: precip_sum.get(i).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
			});
		}
		Ok(out)
	}
}

#[cfg(any(test, feature = "test-utils"))]
pub struct MockWeatherProvider {
	pub forecast: Vec<DailyWeather>,
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl WeatherProvider for MockWeatherProvider {
	async fn forecast(&self, _location: Location, _start: NaiveDate, _end: NaiveDate) -> EngineResult<Vec<DailyWeather>> {
		Ok(self.forecast.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rain_codes_are_marked_rainy() {
		let day = DailyWeather {
			date: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
			code: 63,
			condition: wmo_condition(63),
			tmax_c: 25.0,
			tmin_c: 18.0,
			precip_probability: 10,
			precip_sum_mm: 5.0,
		};
		assert!(day.is_rainy());
	}

	#[test]
	fn clear_day_is_not_rainy() {
		let day = DailyWeather {
			date: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
			code: 0,
			condition: wmo_condition(0),
			tmax_c: 30.0,
			tmin_c: 20.0,
			precip_probability: 5,
			precip_sum_mm: 0.0,
		};
		assert!(!day.is_rainy());
	}
}
