/*
 * src/providers/tips.rs
 *
 * `retrieve(city, query, k) -> [{text, metadata{section, url, city}}]`
 * (§6). The vector store backing this is out of core scope; this module
 * only draws the trait boundary the explanation and WHAT_IF_WEATHER
 * paths call through, plus a mock for tests.
 */

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct TipChunk {
	pub text: String,
	pub section: String,
	pub url: Option<String>,
	pub city: String,
}

#[async_trait]
pub trait TipRetriever: Send + Sync {
	async fn retrieve(&self, city: &str, query: &str, k: usize) -> Vec<TipChunk>;
}

/// Indoor-alternative tips are retrieved with this fixed query whenever
/// WHAT_IF_WEATHER needs them and no cached weather is available, or a
/// cached day is marked rainy (§4.7 supplement).
pub const INDOOR_ALTERNATIVES_QUERY: &str = "indoor activities rainy day alternative";

/// No-op retriever used when no tip store is configured; returns nothing
/// rather than failing, consistent with tip retrieval being best-effort
/// enrichment rather than a required dependency.
pub struct NullTipRetriever;

#[async_trait]
impl TipRetriever for NullTipRetriever {
	async fn retrieve(&self, _city: &str, _query: &str, _k: usize) -> Vec<TipChunk> {
		Vec::new()
	}
}

#[cfg(any(test, feature = "test-utils"))]
pub struct MockTipRetriever {
	pub chunks: Vec<TipChunk>,
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl TipRetriever for MockTipRetriever {
	async fn retrieve(&self, _city: &str, _query: &str, k: usize) -> Vec<TipChunk> {
		self.chunks.iter().take(k).cloned().collect()
	}
}
