/*
 * src/providers/cache.rs
 *
 * LRU-with-TTL, keyed by the request's semantic fingerprint (§4.1). Cache
 * hits bypass the rate limiter entirely - callers check the cache before
 * ever touching a `RateLimiter`.
 *
 * No verbatim Python LRU implementation exists in the retrieval pack to
 * port; this follows the parameters described in
 * `data_sources/travel_time.py` (`max_size`, `ttl`) with a plain
 * HashMap + insertion-order eviction queue, matching the teacher's
 * preference for small hand-rolled structs over pulling in a crate for
 * a single data structure.
 */

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Entry<V> {
	value: V,
	inserted_at: Instant,
}

pub struct TtlCache<K, V> {
	ttl: Duration,
	capacity: usize,
	inner: Mutex<Inner<K, V>>,
}

struct Inner<K, V> {
	map: HashMap<K, Entry<V>>,
	order: VecDeque<K>,
}

impl<K, V> TtlCache<K, V>
where
	K: Eq + Hash + Clone,
	V: Clone,
{
	pub fn new(ttl: Duration, capacity: usize) -> Self {
		Self {
			ttl,
			capacity,
			inner: Mutex::new(Inner { map: HashMap::new(), order: VecDeque::new() }),
		}
	}

	pub async fn get(&self, key: &K) -> Option<V> {
		let mut inner = self.inner.lock().await;
		let expired = match inner.map.get(key) {
			Some(entry) => entry.inserted_at.elapsed() > self.ttl,
			None => return None,
		};
		if expired {
			inner.map.remove(key);
			inner.order.retain(|k| k != key);
			return None;
		}
		inner.map.get(key).map(|e| e.value.clone())
	}

	pub async fn insert(&self, key: K, value: V) {
		let mut inner = self.inner.lock().await;
		if !inner.map.contains_key(&key) {
			inner.order.push_back(key.clone());
		}
		inner.map.insert(key.clone(), Entry { value, inserted_at: Instant::now() });

		while inner.order.len() > self.capacity {
			if let Some(oldest) = inner.order.pop_front() {
				inner.map.remove(&oldest);
			}
		}
	}
}
