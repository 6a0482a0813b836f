//! The single active chat engine of a pipeline and the rules for rebuilding it.

use std::{
	collections::VecDeque,
	fmt::{Debug, Formatter, Result as FmtResult},
	sync::{
		Arc, Mutex, RwLock,
		atomic::{AtomicU64, Ordering},
	},
};

use uuid::Uuid;

use quire_config::Config;
use quire_domain::{ConversationTurn, DocumentNode, EngineScope, SessionKey};

use crate::{DocumentSource, Error, Result, SessionStore, session, within};

/// A retrieval and chat engine bound to one scope.
///
/// The node set is fixed at build time. The memory buffer holds the turns this engine replays
/// into prompts and is bounded like a session record.
pub struct ChatEngine {
	engine_id: Uuid,
	generation: u64,
	scope: EngineScope,
	nodes: Vec<DocumentNode>,
	memory: Mutex<EngineMemory>,
	max_messages: usize,
}
impl ChatEngine {
	fn new(
		generation: u64,
		scope: EngineScope,
		nodes: Vec<DocumentNode>,
		history_key: Option<SessionKey>,
		history: Vec<ConversationTurn>,
		max_messages: usize,
	) -> Self {
		let mut turns = VecDeque::with_capacity(history.len());

		session::push_bounded(&mut turns, history, max_messages);

		Self {
			engine_id: Uuid::new_v4(),
			generation,
			scope,
			nodes,
			memory: Mutex::new(EngineMemory { key: history_key, turns }),
			max_messages,
		}
	}

	pub fn engine_id(&self) -> Uuid {
		self.engine_id
	}

	/// Monotonic build number within the owning manager. The first build is 1.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn scope(&self) -> &EngineScope {
		&self.scope
	}

	pub fn nodes(&self) -> &[DocumentNode] {
		&self.nodes
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// The conversation whose history this engine is replaying, if any.
	pub fn history_key(&self) -> Option<SessionKey> {
		self.lock_memory().key.clone()
	}

	pub fn serves(&self, key: &SessionKey) -> bool {
		self.lock_memory().key.as_ref() == Some(key)
	}

	pub fn memory(&self) -> Vec<ConversationTurn> {
		self.lock_memory().turns.iter().cloned().collect()
	}

	/// The newest `limit` turns, oldest first.
	pub fn recent_memory(&self, limit: usize) -> Vec<ConversationTurn> {
		let memory = self.lock_memory();
		let skip = memory.turns.len().saturating_sub(limit);

		memory.turns.iter().skip(skip).cloned().collect()
	}

	pub fn push_exchange(&self, user: ConversationTurn, assistant: ConversationTurn) {
		let mut memory = self.lock_memory();

		session::push_bounded(&mut memory.turns, [user, assistant], self.max_messages);
	}

	pub fn clear_memory(&self) {
		self.lock_memory().turns.clear();
	}

	/// Rebinds the memory to `key` and replaces its turns.
	pub fn reset_memory(&self, key: Option<SessionKey>, history: Vec<ConversationTurn>) {
		let mut memory = self.lock_memory();

		memory.key = key;
		memory.turns.clear();

		session::push_bounded(&mut memory.turns, history, self.max_messages);
	}

	fn lock_memory(&self) -> std::sync::MutexGuard<'_, EngineMemory> {
		self.memory.lock().unwrap_or_else(|err| err.into_inner())
	}
}

impl Debug for ChatEngine {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("ChatEngine")
			.field("engine_id", &self.engine_id)
			.field("generation", &self.generation)
			.field("scope", &self.scope)
			.field("nodes", &self.nodes.len())
			.finish_non_exhaustive()
	}
}

struct EngineMemory {
	key: Option<SessionKey>,
	turns: VecDeque<ConversationTurn>,
}

/// What readers observe: the active scope and the engine built for it.
///
/// `handle` is `None` only before the first build. Contexts are replaced whole, never mutated.
#[derive(Clone, Default)]
pub struct EngineContext {
	pub scope: EngineScope,
	pub handle: Option<Arc<ChatEngine>>,
}
impl EngineContext {
	pub fn initialized(&self) -> bool {
		self.handle.is_some()
	}
}

pub struct EngineManager {
	sessions: Arc<SessionStore>,
	documents: Arc<dyn DocumentSource>,
	load_nodes_ms: u64,
	max_messages: usize,
	context: RwLock<Arc<EngineContext>>,
	/// Serialises compare, rebuild, and swap. Also guards the tracked conversation.
	tracking: tokio::sync::Mutex<Option<SessionKey>>,
	rebuilds: AtomicU64,
}
impl EngineManager {
	pub fn new(cfg: &Config, sessions: Arc<SessionStore>, documents: Arc<dyn DocumentSource>) -> Self {
		Self {
			sessions,
			documents,
			load_nodes_ms: cfg.timeouts.load_nodes_ms,
			max_messages: cfg.session.max_messages_per_session.max(1) as usize,
			context: RwLock::new(Arc::new(EngineContext::default())),
			tracking: tokio::sync::Mutex::new(None),
			rebuilds: AtomicU64::new(0),
		}
	}

	/// Returns the engine for `filter`, rebuilding only when the scope differs, nothing has been
	/// built yet, or `force_reset` is set.
	pub async fn ensure_engine(
		&self,
		filter: EngineScope,
		force_reset: bool,
	) -> Result<Arc<ChatEngine>> {
		let tracking = self.tracking.lock().await;
		let (engine, _) = self.ensure_locked(tracking.as_ref(), filter, force_reset).await?;

		Ok(engine)
	}

	/// Makes `key` the tracked conversation and scopes the engine to its notebook.
	///
	/// When the engine already serves that notebook its memory is reseeded from the session store
	/// instead of rebuilding. A failed rebuild restores the previous tracking.
	pub async fn switch_notebook(&self, key: SessionKey) -> Result<Arc<ChatEngine>> {
		let (engine, _) = self.switch_with_history(key, 0).await?;

		Ok(engine)
	}

	/// Switches like [`Self::switch_notebook`] and returns the newest `history_window` turns the
	/// engine replays for `key`, read before the tracking lock is released.
	pub(crate) async fn switch_with_history(
		&self,
		key: SessionKey,
		history_window: usize,
	) -> Result<(Arc<ChatEngine>, Vec<ConversationTurn>)> {
		let mut tracking = self.tracking.lock().await;
		let previous = tracking.replace(key.clone());
		let filter = EngineScope::notebook(key.notebook_id.clone());
		let outcome = self.ensure_locked(tracking.as_ref(), filter, false).await;
		let (engine, rebuilt) = match outcome {
			Ok(outcome) => outcome,
			Err(err) => {
				*tracking = previous;

				return Err(err);
			},
		};

		if !rebuilt {
			engine.reset_memory(Some(key.clone()), self.sessions.get_history(&key));
		}

		tracing::info!(
			session = %key,
			rebuilt,
			generation = engine.generation(),
			"Switched notebook."
		);

		let history = engine.recent_memory(history_window);

		Ok((engine, history))
	}

	/// Persists a finished exchange and mirrors it into the live engine when that engine replays
	/// the same conversation.
	pub fn record_exchange(&self, key: &SessionKey, user_message: &str, assistant_message: &str) {
		let (user, assistant) = self.sessions.append_exchange(key, user_message, assistant_message);

		if let Some(engine) = self.current_engine().filter(|engine| engine.serves(key)) {
			engine.push_exchange(user, assistant);
		}
	}

	/// Drops the stored conversation and the live engine's copy of it. Returns whether a record
	/// existed.
	pub fn clear_session(&self, key: &SessionKey) -> bool {
		let existed = self.sessions.clear(key);

		if let Some(engine) = self.current_engine().filter(|engine| engine.serves(key)) {
			engine.clear_memory();
		}

		tracing::info!(session = %key, existed, "Cleared session.");

		existed
	}

	pub fn snapshot(&self) -> Arc<EngineContext> {
		self.context.read().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn current_scope(&self) -> EngineScope {
		self.snapshot().scope.clone()
	}

	pub fn current_engine(&self) -> Option<Arc<ChatEngine>> {
		self.snapshot().handle.clone()
	}

	pub fn rebuild_count(&self) -> u64 {
		self.rebuilds.load(Ordering::SeqCst)
	}

	async fn ensure_locked(
		&self,
		tracked: Option<&SessionKey>,
		filter: EngineScope,
		force_reset: bool,
	) -> Result<(Arc<ChatEngine>, bool)> {
		let context = self.snapshot();

		if let Some(handle) = context.handle.as_ref()
			&& context.scope == filter
			&& !force_reset
		{
			tracing::debug!(scope = %filter, generation = handle.generation(), "Reusing engine.");

			return Ok((handle.clone(), false));
		}

		let history_key = resolve_history_key(tracked, &filter);
		let history = history_key
			.as_ref()
			.map(|key| self.sessions.get_history(key))
			.unwrap_or_default();
		let nodes = if filter.is_none() { Vec::new() } else { self.load_nodes(&filter).await? };
		let generation = self.rebuilds.fetch_add(1, Ordering::SeqCst) + 1;
		let restored = history.len();
		let engine = Arc::new(ChatEngine::new(
			generation,
			filter.clone(),
			nodes,
			history_key,
			history,
			self.max_messages,
		));

		{
			let mut slot = self.context.write().unwrap_or_else(|err| err.into_inner());

			*slot = Arc::new(EngineContext { scope: filter.clone(), handle: Some(engine.clone()) });
		}

		tracing::info!(
			scope = %filter,
			previous_scope = %context.scope,
			generation,
			nodes = engine.node_count(),
			restored_turns = restored,
			force_reset,
			"Rebuilt engine."
		);

		Ok((engine, true))
	}

	async fn load_nodes(&self, filter: &EngineScope) -> Result<Vec<DocumentNode>> {
		let notebooks = filter.notebooks();
		let nodes = within("load_nodes", self.load_nodes_ms, self.documents.load_nodes(&notebooks))
			.await
			.map_err(|err| {
				tracing::warn!(error = %err, scope = %filter, "Failed to load scoped nodes.");

				Error::Rebuild { message: err.to_string() }
			})?;
		let total = nodes.len();
		let scoped =
			nodes.into_iter().filter(|node| filter.contains(&node.notebook_id)).collect::<Vec<_>>();

		if scoped.len() != total {
			tracing::warn!(
				scope = %filter,
				dropped = total - scoped.len(),
				"Document source returned nodes outside the requested scope."
			);
		}
		if scoped.is_empty() {
			tracing::info!(scope = %filter, "Scope has no document nodes.");
		}

		Ok(scoped)
	}
}

/// The tracked notebook wins when the filter includes it. Otherwise only a single-notebook filter
/// names a conversation. Without a tracked user there is no history to restore.
fn resolve_history_key(tracked: Option<&SessionKey>, filter: &EngineScope) -> Option<SessionKey> {
	let tracked = tracked?;

	if filter.contains(&tracked.notebook_id) {
		return Some(tracked.clone());
	}

	filter
		.single_notebook()
		.map(|notebook_id| SessionKey::new(tracked.user_id.clone(), notebook_id.clone()))
}
