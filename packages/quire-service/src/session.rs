//! Per-(user, notebook) conversation memory shared across requests.
//!
//! Records live in a sharded [`DashMap`]; the entry guard makes append-then-trim atomic for one
//! key while other keys proceed independently. Expiry is checked lazily on access.

use std::{collections::VecDeque, sync::Arc};

use dashmap::DashMap;
use time::{Duration, OffsetDateTime};

use quire_domain::{Clock, ConversationTurn, SessionKey, ttl};

#[derive(Debug, Clone)]
pub struct SessionRecord {
	key: SessionKey,
	turns: VecDeque<ConversationTurn>,
	created_at: OffsetDateTime,
	last_accessed_at: OffsetDateTime,
}
impl SessionRecord {
	fn new(key: SessionKey, now: OffsetDateTime) -> Self {
		Self { key, turns: VecDeque::new(), created_at: now, last_accessed_at: now }
	}

	pub fn key(&self) -> &SessionKey {
		&self.key
	}

	pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
		self.turns.iter()
	}

	pub fn len(&self) -> usize {
		self.turns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.turns.is_empty()
	}

	pub fn created_at(&self) -> OffsetDateTime {
		self.created_at
	}

	pub fn last_accessed_at(&self) -> OffsetDateTime {
		self.last_accessed_at
	}

	fn is_expired(&self, ttl: Duration, now: OffsetDateTime) -> bool {
		ttl::is_expired(self.last_accessed_at, ttl, now)
	}

	fn push_exchange(&mut self, user: ConversationTurn, assistant: ConversationTurn, cap: usize) {
		push_bounded(&mut self.turns, [user, assistant], cap);
	}

	fn recent(&self, limit: Option<usize>) -> Vec<ConversationTurn> {
		let skip = limit.map(|limit| self.turns.len().saturating_sub(limit)).unwrap_or(0);

		self.turns.iter().skip(skip).cloned().collect()
	}
}

pub struct SessionStore {
	records: DashMap<SessionKey, SessionRecord>,
	max_messages: usize,
	ttl: Duration,
	clock: Arc<dyn Clock>,
}
impl SessionStore {
	pub fn new(cfg: &quire_config::Session, clock: Arc<dyn Clock>) -> Self {
		Self {
			records: DashMap::new(),
			max_messages: cfg.max_messages_per_session.max(1) as usize,
			ttl: ttl::session_ttl(cfg),
			clock,
		}
	}

	/// Full history in conversational order. Missing and expired records read as empty.
	pub fn get_history(&self, key: &SessionKey) -> Vec<ConversationTurn> {
		self.read(key, None)
	}

	/// The newest `limit` turns, oldest first.
	pub fn recent_history(&self, key: &SessionKey, limit: usize) -> Vec<ConversationTurn> {
		self.read(key, Some(limit))
	}

	/// Appends one user/assistant pair and trims the oldest turns past the cap. Returns the stored
	/// pair.
	pub fn append_exchange(
		&self,
		key: &SessionKey,
		user_message: &str,
		assistant_message: &str,
	) -> (ConversationTurn, ConversationTurn) {
		let now = self.clock.now();
		let user = ConversationTurn::user(user_message, now);
		let assistant = ConversationTurn::assistant(assistant_message, now);
		let mut record = self
			.records
			.entry(key.clone())
			.or_insert_with(|| SessionRecord::new(key.clone(), now));

		if record.is_expired(self.ttl, now) {
			tracing::debug!(session = %key, "Replacing expired session record.");

			*record = SessionRecord::new(key.clone(), now);
		}

		record.push_exchange(user.clone(), assistant.clone(), self.max_messages);
		record.last_accessed_at = now;

		(user, assistant)
	}

	/// Removes the record. Returns whether one existed.
	pub fn clear(&self, key: &SessionKey) -> bool {
		self.records.remove(key).is_some()
	}

	/// A copy of the live record. Unlike history reads this does not refresh the access time.
	pub fn record(&self, key: &SessionKey) -> Option<SessionRecord> {
		let now = self.clock.now();

		self.records
			.get(key)
			.filter(|record| !record.is_expired(self.ttl, now))
			.map(|record| record.value().clone())
	}

	pub fn message_count(&self, key: &SessionKey) -> usize {
		let now = self.clock.now();

		self.records
			.get(key)
			.filter(|record| !record.is_expired(self.ttl, now))
			.map(|record| record.len())
			.unwrap_or(0)
	}

	/// Number of records held, expired ones included until they are touched or purged.
	pub fn session_count(&self) -> usize {
		self.records.len()
	}

	/// Drops every expired record and returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		let now = self.clock.now();
		let before = self.records.len();

		self.records.retain(|_, record| !record.is_expired(self.ttl, now));

		let purged = before.saturating_sub(self.records.len());

		if purged > 0 {
			tracing::info!(purged, "Purged expired sessions.");
		}

		purged
	}

	fn read(&self, key: &SessionKey, limit: Option<usize>) -> Vec<ConversationTurn> {
		let now = self.clock.now();

		{
			let Some(mut record) = self.records.get_mut(key) else {
				return Vec::new();
			};

			if !record.is_expired(self.ttl, now) {
				record.last_accessed_at = now;

				return record.recent(limit);
			}
		}

		self.records.remove_if(key, |_, record| record.is_expired(self.ttl, now));

		tracing::debug!(session = %key, "Session expired; treating as empty.");

		Vec::new()
	}
}

/// Appends `turns` and evicts from the front until at most `cap` remain.
pub(crate) fn push_bounded<I>(buffer: &mut VecDeque<ConversationTurn>, turns: I, cap: usize)
where
	I: IntoIterator<Item = ConversationTurn>,
{
	buffer.extend(turns);

	while buffer.len() > cap {
		buffer.pop_front();
	}
}
