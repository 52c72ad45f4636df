/*
 * src/services.rs
 *
 * Bundles every provider client and the session store behind one
 * injectable aggregate, rather than process-wide singletons, so tests
 * can substitute mocks and multiple engines can run side by side in one
 * process.
 */

use crate::config::Config;
use crate::providers::geocoder::{Geocoder, NominatimGeocoder};
use crate::providers::llm::{LangchainLlm, Llm};
use crate::providers::poi::{GooglePlacesProvider, OverpassProvider, PoiProvider};
use crate::providers::router::{CascadingRouter, DirectionsRouter, HaversineRouter, OsrmRouter, Router};
use crate::providers::tips::{NullTipRetriever, TipRetriever};
use crate::providers::weather::{OpenMeteoWeatherProvider, WeatherProvider};
use crate::session::SessionStore;

pub struct Services {
	pub config: Config,
	pub geocoder: Box<dyn Geocoder>,
	pub primary_poi: Box<dyn PoiProvider>,
	pub fallback_poi: Box<dyn PoiProvider>,
	pub router: Box<dyn Router>,
	pub weather: Box<dyn WeatherProvider>,
	pub llm: Box<dyn Llm>,
	pub tips: Box<dyn TipRetriever>,
	pub sessions: SessionStore,
}

impl Services {
	pub fn from_config(config: Config) -> Self {
		let router = CascadingRouter::new(vec![
			Box::new(DirectionsRouter::new(config.google_maps_api_key.clone())),
			Box::new(OsrmRouter::new()),
			Box::new(HaversineRouter),
		]);

		Self {
			sessions: SessionStore::with_ttl_minutes(config.session_ttl_minutes),
			geocoder: Box::new(NominatimGeocoder::new()),
			primary_poi: Box::new(GooglePlacesProvider::new(config.google_maps_api_key.clone())),
			fallback_poi: Box::new(OverpassProvider::new()),
			router: Box::new(router),
			weather: Box::new(OpenMeteoWeatherProvider::new()),
			llm: Box::new(LangchainLlm::new()),
			tips: Box::new(NullTipRetriever),
			config,
		}
	}
}
