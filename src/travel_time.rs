/*
 * src/travel_time.rs
 *
 * §4.3: `travel_time(origin, destination, mode) -> {duration_minutes,
 * distance_km, source}`; `travel_matrix(points, mode) ->
 * map[(i,j) -> duration_minutes]`. Batch path for <=25 points, bounded
 * worker-pool fan-out otherwise; matrix is symmetrized.
 */

use crate::global::MAX_BATCH_MATRIX_POINTS;
use crate::models::{Location, TravelMode};
use crate::providers::router::{haversine_km, Router};
use futures::future::join_all;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelResult {
	pub duration_minutes: u32,
	pub distance_km: f64,
	pub source: TravelSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelSource {
	Router,
	/// Every configured router returned `None`; zero duration is used by
	/// the caller (§4.4 failure semantics).
	Unavailable,
}

/// External `road|airplane|railway` modes collapse to "driving" for
/// intra-city calculation unless the caller explicitly requests walking
/// (§4.3). `Walking` is represented as a distinct mode purely at this
/// layer's API surface since `TravelMode` itself has no walking variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
	Walking,
	Travel(TravelMode),
}

pub async fn travel_time(router: &dyn Router, origin: Location, destination: Location, mode: RoutingMode) -> TravelResult {
	let distance_km = haversine_km(origin, destination);

	if let RoutingMode::Walking = mode {
		let minutes = crate::providers::router::walking_minutes(distance_km);
		return TravelResult { duration_minutes: minutes, distance_km, source: TravelSource::Router };
	}

	let RoutingMode::Travel(travel_mode) = mode else { unreachable!() };

	match router.travel_time_minutes(origin, destination, travel_mode).await {
		Some(minutes) => TravelResult { duration_minutes: minutes, distance_km, source: TravelSource::Router },
		None => TravelResult { duration_minutes: 0, distance_km, source: TravelSource::Unavailable },
	}
}

/// All-pairs matrix over `points`, keyed `(i, j)` with `i < points.len()`
/// and `j < points.len()`. Symmetrized: cell `(i, j)` and `(j, i)` are
/// computed once and mirrored (§4.3, §8 invariant 7).
pub async fn travel_matrix(router: &dyn Router, points: &[Location], mode: RoutingMode) -> HashMap<(usize, usize), u32> {
	let mut matrix = HashMap::new();
	for i in 0..points.len() {
		matrix.insert((i, i), 0);
	}

	let pairs: Vec<(usize, usize)> = (0..points.len())
		.flat_map(|i| (i + 1..points.len()).map(move |j| (i, j)))
		.collect();

	let results = if points.len() <= MAX_BATCH_MATRIX_POINTS {
		// Batch path: still one suspension point per cell here because no
		// external batch endpoint is wired into `Router`, but issued
		// concurrently rather than a bounded pool (§5).
		join_all(pairs.iter().map(|&(i, j)| travel_time(router, points[i], points[j], mode))).await
	} else {
		fan_out_bounded(router, points, &pairs, mode, 8).await
	};

	for ((i, j), result) in pairs.into_iter().zip(results) {
		matrix.insert((i, j), result.duration_minutes);
		matrix.insert((j, i), result.duration_minutes);
	}

	matrix
}

async fn fan_out_bounded(
	router: &dyn Router,
	points: &[Location],
	pairs: &[(usize, usize)],
	mode: RoutingMode,
	worker_count: usize,
) -> Vec<TravelResult> {
	let mut out = Vec::with_capacity(pairs.len());
	for chunk in pairs.chunks(worker_count.max(1)) {
		let batch = join_all(chunk.iter().map(|&(i, j)| travel_time(router, points[i], points[j], mode))).await;
		out.extend(batch);
	}
	out
}
