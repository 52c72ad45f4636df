/*
 * src/providers/rate_limit.rs
 *
 * Per-provider rate limiter: a single shared "earliest next call time"
 * gate, the Rust translation of `geocoding.py`'s module-level
 * `_last_request_time` / `_rate_limit()` pair (§5: "the rate limiter per
 * provider is a process-wide serialization point").
 */

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateLimiter {
	interval: Duration,
	last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
	pub fn new(interval: Duration) -> Self {
		Self { interval, last_call: Mutex::new(None) }
	}

	pub fn from_millis(ms: u64) -> Self {
		Self::new(Duration::from_millis(ms))
	}

	/// Blocks the calling task until the rate limit permits another
	/// outbound request, then reserves the slot.
	pub async fn acquire(&self) {
		let mut last_call = self.last_call.lock().await;
		if let Some(last) = *last_call {
			let elapsed = last.elapsed();
			if elapsed < self.interval {
				tokio::time::sleep(self.interval - elapsed).await;
			}
		}
		*last_call = Some(Instant::now());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn serializes_concurrent_callers() {
		let limiter = RateLimiter::from_millis(20);
		let start = Instant::now();
		limiter.acquire().await;
		limiter.acquire().await;
		assert!(start.elapsed() >= Duration::from_millis(20));
	}
}
