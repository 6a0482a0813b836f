pub mod chat;
pub mod engine;
pub mod rerank;
pub mod retrieval;
pub mod session;

mod error;

pub use chat::{ChatRequest, ChatResponse, SourceCitation};
pub use engine::{ChatEngine, EngineContext, EngineManager};
pub use error::{Error, Result};
pub use quire_providers::completion::{ChatMessage, ChatRole};
pub use rerank::ScoreReranker;
pub use retrieval::FusionEngine;
pub use session::{SessionRecord, SessionStore};

use std::{collections::BTreeSet, future::Future, pin::Pin, sync::Arc, time::Duration};

use quire_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use quire_domain::{
	Clock, ConversationTurn, DocumentNode, EngineScope, NotebookId, RetrievalRequest,
	RetrievalResult, ScoredCandidate, SessionKey, SystemClock, TaggedCandidate,
};
use quire_providers::{completion, embedding};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Vector and summary-tree search over the indexed notebooks.
pub trait CandidateRetriever
where
	Self: Send + Sync,
{
	fn has_candidates<'a>(&'a self, notebook_id: &'a NotebookId) -> BoxFuture<'a, Result<bool>>;

	fn fetch_chunks<'a>(
		&'a self,
		query: &'a str,
		notebook_id: &'a NotebookId,
		source_ids: Option<&'a BTreeSet<String>>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredCandidate>>>;

	fn fetch_summaries<'a>(
		&'a self,
		query_embedding: &'a [f32],
		notebook_id: &'a NotebookId,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredCandidate>>>;
}

/// Reorders a tagged pool by relevance to the query. Implementations must keep the input order
/// for equal scores.
pub trait Reranker
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		query: &'a str,
		pool: Vec<TaggedCandidate>,
	) -> BoxFuture<'a, Result<Vec<TaggedCandidate>>>;
}

/// Loads the document nodes an engine is bound to.
pub trait DocumentSource
where
	Self: Send + Sync,
{
	fn load_nodes<'a>(
		&'a self,
		notebook_ids: &'a [NotebookId],
	) -> BoxFuture<'a, Result<Vec<DocumentNode>>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub completion: Arc<dyn CompletionProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		completion: Arc<dyn CompletionProvider>,
	) -> Self {
		Self { embedding, rerank, completion }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider.clone(), completion: provider }
	}
}

/// The capabilities a pipeline borrows from the rest of the application.
#[derive(Clone)]
pub struct Collaborators {
	pub retriever: Arc<dyn CandidateRetriever>,
	pub documents: Arc<dyn DocumentSource>,
	/// Overrides the reranker built from `providers.rerank`.
	pub reranker: Option<Arc<dyn Reranker>>,
	pub clock: Arc<dyn Clock>,
}
impl Collaborators {
	pub fn new(retriever: Arc<dyn CandidateRetriever>, documents: Arc<dyn DocumentSource>) -> Self {
		Self { retriever, documents, reranker: None, clock: Arc::new(SystemClock) }
	}

	pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
		self.reranker = Some(reranker);

		self
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}
}

/// One notebook chat pipeline: a session store, a fusion engine, and the single active engine.
pub struct QuirePipeline {
	pub cfg: Config,
	pub providers: Providers,
	sessions: Arc<SessionStore>,
	fusion: FusionEngine,
	engines: EngineManager,
}
impl QuirePipeline {
	pub fn new(cfg: Config, collaborators: Collaborators) -> Self {
		Self::with_providers(cfg, collaborators, Providers::default())
	}

	pub fn with_providers(cfg: Config, collaborators: Collaborators, providers: Providers) -> Self {
		let Collaborators { retriever, documents, reranker, clock } = collaborators;
		let reranker = reranker.or_else(|| {
			cfg.providers.rerank.clone().map(|rerank_cfg| {
				Arc::new(ScoreReranker::new(providers.rerank.clone(), rerank_cfg))
					as Arc<dyn Reranker>
			})
		});
		let sessions = Arc::new(SessionStore::new(&cfg.session, clock));
		let fusion = FusionEngine::new(&cfg, retriever, reranker, providers.embedding.clone());
		let engines = EngineManager::new(&cfg, sessions.clone(), documents);

		Self { cfg, providers, sessions, fusion, engines }
	}

	pub fn sessions(&self) -> &SessionStore {
		&self.sessions
	}

	pub fn engines(&self) -> &EngineManager {
		&self.engines
	}

	pub async fn retrieve(&self, req: &RetrievalRequest) -> Result<RetrievalResult> {
		self.fusion.retrieve(req).await
	}

	pub async fn ensure_engine(
		&self,
		filter: EngineScope,
		force_reset: bool,
	) -> Result<Arc<ChatEngine>> {
		self.engines.ensure_engine(filter, force_reset).await
	}

	pub async fn switch_notebook(
		&self,
		notebook_id: &str,
		user_id: &str,
	) -> Result<Arc<ChatEngine>> {
		let key = SessionKey::parse(user_id, notebook_id)?;

		self.engines.switch_notebook(key).await
	}

	pub fn record_exchange(
		&self,
		notebook_id: &str,
		user_id: &str,
		user_message: &str,
		assistant_message: &str,
	) -> Result<()> {
		let key = SessionKey::parse(user_id, notebook_id)?;

		self.engines.record_exchange(&key, user_message, assistant_message);

		Ok(())
	}

	pub fn get_history(
		&self,
		notebook_id: &str,
		user_id: &str,
		limit: Option<usize>,
	) -> Result<Vec<ConversationTurn>> {
		let key = SessionKey::parse(user_id, notebook_id)?;

		Ok(match limit {
			Some(limit) => self.sessions.recent_history(&key, limit),
			None => self.sessions.get_history(&key),
		})
	}

	/// Idempotent. Returns whether a stored conversation existed.
	pub fn clear_session(&self, notebook_id: &str, user_id: &str) -> Result<bool> {
		let key = SessionKey::parse(user_id, notebook_id)?;

		Ok(self.engines.clear_session(&key))
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(quire_providers::rerank::rerank(cfg, query, docs).await?) })
	}
}
impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(completion::complete(cfg, messages).await?) })
	}
}

/// Runs `fut` under a deadline, mapping expiry to [`Error::Timeout`] for `stage`.
pub(crate) async fn within<F, T>(stage: &'static str, timeout_ms: u64, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
		Ok(result) => result,
		Err(_) => Err(Error::Timeout { stage, timeout_ms }),
	}
}
