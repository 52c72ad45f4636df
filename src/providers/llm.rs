/*
 * src/providers/llm.rs
 *
 * Chat-completion client with a *fast* variant (extraction/classification)
 * and a *quality* variant (itinerary prose), identical-prompt response
 * caching, wrapping `langchain_rust`'s `LLM` trait the way the teacher's
 * `agent/config.rs` / `agent/configs/mock.rs` wrap it (§4.1: "identical
 * prompt response caching").
 */

use crate::providers::TtlCache;
use async_trait::async_trait;
use langchain_rust::language_models::llm::LLM;
use langchain_rust::llm::openai::{OpenAI, OpenAIModel};
use langchain_rust::schemas::Message;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmTier {
	/// Cheap/low-latency: intent classification, entity extraction, edit
	/// command parsing.
	Fast,
	/// Itinerary prose, explanations.
	Quality,
}

#[async_trait]
pub trait Llm: Send + Sync {
	async fn complete(&self, tier: LlmTier, system_prompt: &str, user_prompt: &str) -> Option<String>;
}

pub struct LangchainLlm {
	fast: OpenAI<langchain_rust::llm::openai::OpenAIConfig>,
	quality: OpenAI<langchain_rust::llm::openai::OpenAIConfig>,
	cache: TtlCache<(String, String), String>,
}

impl LangchainLlm {
	pub fn new() -> Self {
		Self {
			fast: OpenAI::default().with_model(OpenAIModel::Gpt35),
			quality: OpenAI::default().with_model(OpenAIModel::Gpt4Turbo),
			cache: TtlCache::new(Duration::from_secs(3600), 256),
		}
	}
}

impl Default for LangchainLlm {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Llm for LangchainLlm {
	async fn complete(&self, tier: LlmTier, system_prompt: &str, user_prompt: &str) -> Option<String> {
		let cache_key = (system_prompt.to_string(), user_prompt.to_string());
		if let Some(cached) = self.cache.get(&cache_key).await {
			return Some(cached);
		}

		let messages = vec![Message::new_system_message(system_prompt), Message::new_human_message(user_prompt)];

		let model: &OpenAI<_> = match tier {
			LlmTier::Fast => &self.fast,
			LlmTier::Quality => &self.quality,
		};

		let result = model.generate(&messages).await.ok()?;
		self.cache.insert(cache_key, result.generation.clone()).await;
		Some(result.generation)
	}
}

/// Deterministic stand-in for tests: returns the configured response for
/// any prompt, mirroring the teacher's `MockLLM`. `fast_response`, when
/// set, is returned for `LlmTier::Fast` calls (intent classification,
/// entity extraction) instead of `response`, so a single mock can drive
/// both a builder pass and the extraction calls that precede it.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockLlm {
	pub response: String,
	pub fast_response: Option<String>,
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Llm for MockLlm {
	async fn complete(&self, tier: LlmTier, _system_prompt: &str, _user_prompt: &str) -> Option<String> {
		match tier {
			LlmTier::Fast => Some(self.fast_response.clone().unwrap_or_else(|| self.response.clone())),
			LlmTier::Quality => Some(self.response.clone()),
		}
	}
}
