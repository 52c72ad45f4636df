pub const LOG_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/logs");
pub const CRASH_LOG: &str = "crash.log";
pub const LATEST_LOG: &str = "latest.log";

/// Nominatim-class public geocoder: 1 request per second, padded.
pub const GEOCODER_RATE_LIMIT_MS: u64 = 1100;
/// Public POI (Overpass-class) endpoint rate limit.
pub const POI_FALLBACK_RATE_LIMIT_MS: u64 = 1200;
/// Paid routing/places APIs.
pub const PAID_PROVIDER_RATE_LIMIT_MS: u64 = 100;

pub const ROUTING_CACHE_TTL_SECS: u64 = 3600;
pub const POI_CACHE_TTL_SECS: u64 = 24 * 3600;
pub const ROUTING_CACHE_SIZE: usize = 1000;
pub const POI_CACHE_SIZE: usize = 500;

pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;
pub const DEFAULT_CLARIFICATION_CAP: u32 = 6;

pub const MAX_BATCH_MATRIX_POINTS: usize = 25;
