/*
 * src/session.rs
 *
 * §4.9: in-memory session store. Sessions expire after
 * `DEFAULT_SESSION_TTL_MINUTES` of inactivity; expired entries are swept
 * opportunistically on access rather than via a background task, since
 * the teacher's own request-scoped state has no such sweeper to imitate
 * and a timer task would be unwarranted machinery for an in-memory map.
 */

use crate::error::{EngineError, EngineResult};
use crate::global::DEFAULT_SESSION_TTL_MINUTES;
use crate::models::{DialogueState, Evaluation, HistoryEntry, Itinerary, Preferences, Role, Session, Source};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct SessionStore {
	sessions: RwLock<HashMap<String, Session>>,
	ttl_minutes: i64,
}

impl SessionStore {
	pub fn new() -> Self {
		Self { sessions: RwLock::new(HashMap::new()), ttl_minutes: DEFAULT_SESSION_TTL_MINUTES }
	}

	pub fn with_ttl_minutes(ttl_minutes: i64) -> Self {
		Self { sessions: RwLock::new(HashMap::new()), ttl_minutes }
	}

	pub async fn create(&self, now: DateTime<Utc>) -> Session {
		let id = Uuid::new_v4().to_string();
		let session = Session::new(id.clone(), now);
		self.sessions.write().await.insert(id, session.clone());
		session
	}

	/// Fetches a live session, sweeping it first if it has expired.
	pub async fn get(&self, id: &str, now: DateTime<Utc>) -> EngineResult<Session> {
		self.expire_if_stale(id, now).await;
		self.sessions.read().await.get(id).cloned().ok_or_else(|| EngineError::SessionNotFound(id.to_string()))
	}

	async fn expire_if_stale(&self, id: &str, now: DateTime<Utc>) {
		let stale = self
			.sessions
			.read()
			.await
			.get(id)
			.map(|s| now.signed_duration_since(s.last_activity_at).num_minutes() >= self.ttl_minutes)
			.unwrap_or(false);
		if stale {
			self.sessions.write().await.remove(id);
		}
	}

	pub async fn append_message(&self, id: &str, role: Role, content: String, now: DateTime<Utc>) -> EngineResult<()> {
		self.mutate(id, now, |session| {
			session.history.push(HistoryEntry { role, content, ts: now });
		})
		.await
	}

	pub async fn update_preferences(&self, id: &str, incoming: Preferences, now: DateTime<Utc>) -> EngineResult<Preferences> {
		let mut merged = None;
		self.mutate(id, now, |session| {
			session.preferences.merge(&incoming);
			merged = Some(session.preferences.clone());
		})
		.await?;
		Ok(merged.expect("mutate runs the closure before returning Ok"))
	}

	pub async fn set_itinerary(&self, id: &str, itinerary: Itinerary, now: DateTime<Utc>) -> EngineResult<()> {
		self.mutate(id, now, |session| session.itinerary = Some(itinerary)).await
	}

	pub async fn set_sources(&self, id: &str, sources: Vec<Source>, now: DateTime<Utc>) -> EngineResult<()> {
		self.mutate(id, now, |session| session.sources = sources).await
	}

	pub async fn set_evaluation(&self, id: &str, evaluation: Evaluation, now: DateTime<Utc>) -> EngineResult<()> {
		self.mutate(id, now, |session| session.evaluation = Some(evaluation)).await
	}

	pub async fn set_state(&self, id: &str, state: DialogueState, now: DateTime<Utc>) -> EngineResult<()> {
		self.mutate(id, now, |session| session.state = state).await
	}

	/// Records a clarifying question as asked; callers consult
	/// `clarifying_questions_asked` via `get()` to avoid re-asking (§8
	/// invariant: monotonic non-decreasing, bounded by the clarification
	/// cap).
	pub async fn record_clarifying_question(&self, id: &str, slot: String, now: DateTime<Utc>) -> EngineResult<()> {
		self.mutate(id, now, |session| {
			if !session.clarifying_questions_asked.iter().any(|s| s == &slot) {
				session.clarifying_questions_asked.push(slot);
			}
		})
		.await
	}

	/// Resets a session back to a fresh `Collecting` state while keeping
	/// its id, used when the user starts planning a new trip mid-session.
	pub async fn reset(&self, id: &str, now: DateTime<Utc>) -> EngineResult<()> {
		self.mutate(id, now, |session| {
			let fresh = Session::new(session.id.clone(), now);
			*session = fresh;
		})
		.await
	}

	pub async fn cleanup_expired(&self, now: DateTime<Utc>) {
		let mut sessions = self.sessions.write().await;
		sessions.retain(|_, s| now.signed_duration_since(s.last_activity_at).num_minutes() < self.ttl_minutes);
	}

	async fn mutate(&self, id: &str, now: DateTime<Utc>, f: impl FnOnce(&mut Session)) -> EngineResult<()> {
		self.expire_if_stale(id, now).await;
		let mut sessions = self.sessions.write().await;
		let session = sessions.get_mut(id).ok_or_else(|| EngineError::SessionNotFound(id.to_string()))?;
		f(session);
		session.last_activity_at = now;
		Ok(())
	}
}

impl Default for SessionStore {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn now() -> DateTime<Utc> {
		DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
	}

	#[tokio::test]
	async fn create_and_get_round_trips() {
		let store = SessionStore::new();
		let session = store.create(now()).await;
		let fetched = store.get(&session.id, now()).await.unwrap();
		assert_eq!(fetched.id, session.id);
		assert_eq!(fetched.state, DialogueState::Collecting);
	}

	#[tokio::test]
	async fn get_on_unknown_id_is_session_not_found() {
		let store = SessionStore::new();
		let err = store.get("missing", now()).await.unwrap_err();
		assert!(matches!(err, EngineError::SessionNotFound(_)));
	}

	#[tokio::test]
	async fn stale_session_expires_on_access() {
		let store = SessionStore::with_ttl_minutes(1);
		let session = store.create(now()).await;
		let later = now() + chrono::Duration::minutes(5);
		let err = store.get(&session.id, later).await.unwrap_err();
		assert!(matches!(err, EngineError::SessionNotFound(_)));
	}

	#[tokio::test]
	async fn record_clarifying_question_is_idempotent() {
		let store = SessionStore::new();
		let session = store.create(now()).await;
		store.record_clarifying_question(&session.id, "city".to_string(), now()).await.unwrap();
		store.record_clarifying_question(&session.id, "city".to_string(), now()).await.unwrap();
		let fetched = store.get(&session.id, now()).await.unwrap();
		assert_eq!(fetched.clarifying_questions_asked, vec!["city".to_string()]);
	}
}
