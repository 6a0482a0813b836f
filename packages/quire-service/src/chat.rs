use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quire_domain::{
	CandidateKind, ConversationTurn, EngineScope, NotebookId, RetrievalRequest, RetrievalResult,
	RetrievalStage, RetrievalStrategy, Role, ScoredCandidate, SessionKey, UserId,
};

use crate::{ChatMessage, Error, QuirePipeline, Result, within};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a study assistant for the user's notebook. Answer \
	from the numbered context passages when they are present and cite them as [n]. If the context \
	does not contain the answer, say so plainly.";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
	pub user_id: String,
	/// General chat without retrieval when absent.
	pub notebook_id: Option<String>,
	pub message: String,
	pub use_raptor: Option<bool>,
	pub use_reranker: Option<bool>,
	pub top_k: Option<u32>,
	pub source_ids: Option<Vec<String>>,
}
impl ChatRequest {
	pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			user_id: user_id.into(),
			notebook_id: None,
			message: message.into(),
			use_raptor: None,
			use_reranker: None,
			top_k: None,
			source_ids: None,
		}
	}

	pub fn in_notebook(mut self, notebook_id: impl Into<String>) -> Self {
		self.notebook_id = Some(notebook_id.into());

		self
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceCitation {
	pub node_id: String,
	pub source_id: Option<String>,
	pub source_name: Option<String>,
	pub kind: CandidateKind,
	pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
	pub answer: String,
	pub sources: Vec<SourceCitation>,
	pub strategy_used: RetrievalStrategy,
	pub reranker_applied: bool,
	pub timings: BTreeMap<RetrievalStage, Duration>,
	pub engine_id: Uuid,
	pub engine_generation: u64,
}

impl QuirePipeline {
	/// Answers one user message: scope the engine, retrieve, complete, then record the exchange.
	///
	/// The exchange is written to the session store only after the completion succeeds. General
	/// chat has no conversation key, so it neither replays nor keeps history.
	pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
		let message = req.message.trim();

		if message.is_empty() {
			return Err(Error::InvalidRequest { message: "message must be non-empty.".to_string() });
		}

		let user_id = UserId::parse(&req.user_id)?;
		let scoped = match req.notebook_id.as_deref() {
			Some(raw) => {
				let notebook_id = NotebookId::parse(raw)?;
				let retrieval = self.retrieval_request(&req, message, notebook_id.clone());

				retrieval.validate()?;

				Some((SessionKey::new(user_id, notebook_id), retrieval))
			},
			None => None,
		};
		let (engine, history, result) = match scoped.as_ref() {
			Some((key, retrieval)) => {
				let (engine, history) = self
					.engines
					.switch_with_history(key.clone(), self.cfg.engine.history_window as usize)
					.await?;
				let result = self.fusion.retrieve(retrieval).await?;

				(engine, history, result)
			},
			None => {
				let engine = self.engines.ensure_engine(EngineScope::none(), false).await?;

				(engine, Vec::new(), RetrievalResult::empty())
			},
		};
		let system_prompt = self.cfg.engine.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT);
		let messages = build_messages(system_prompt, &result, &history, message);
		let answer = within(
			"completion",
			self.cfg.timeouts.completion_ms,
			self.providers.completion.complete(&self.cfg.providers.llm, &messages),
		)
		.await
		.map_err(|err| match err {
			Error::Timeout { .. } => err,
			err => Error::Completion { message: err.to_string() },
		})?;

		if let Some((key, _)) = scoped.as_ref() {
			self.engines.record_exchange(key, message, &answer);
		}

		Ok(ChatResponse {
			sources: citations(&result),
			answer,
			strategy_used: result.strategy_used,
			reranker_applied: result.reranker_applied,
			timings: result.timings,
			engine_id: engine.engine_id(),
			engine_generation: engine.generation(),
		})
	}

	fn retrieval_request(
		&self,
		req: &ChatRequest,
		message: &str,
		notebook_id: NotebookId,
	) -> RetrievalRequest {
		let mut retrieval = RetrievalRequest::from_config(message, notebook_id, &self.cfg.retrieval);

		if let Some(use_raptor) = req.use_raptor {
			retrieval.use_raptor = use_raptor;
		}
		if let Some(use_reranker) = req.use_reranker {
			retrieval.use_reranker = use_reranker;
		}
		if let Some(top_k) = req.top_k {
			retrieval.top_k = top_k;
		}
		if let Some(source_ids) = req.source_ids.clone() {
			retrieval = retrieval.with_source_ids(source_ids);
		}

		retrieval
	}
}

fn citations(result: &RetrievalResult) -> Vec<SourceCitation> {
	context_entries(result)
		.map(|(kind, item)| SourceCitation {
			node_id: item.candidate.node_id.clone(),
			source_id: item.candidate.source_id.clone(),
			source_name: item.candidate.source_name.clone(),
			kind,
			score: item.score,
		})
		.collect()
}

/// Summaries first, then chunks. Citation numbers follow this order.
fn context_entries(
	result: &RetrievalResult,
) -> impl Iterator<Item = (CandidateKind, &ScoredCandidate)> {
	result
		.raptor_summaries
		.iter()
		.map(|item| (CandidateKind::Summary, item))
		.chain(result.chunks.iter().map(|item| (CandidateKind::Chunk, item)))
}

fn build_messages(
	system_prompt: &str,
	result: &RetrievalResult,
	history: &[ConversationTurn],
	message: &str,
) -> Vec<ChatMessage> {
	let mut system = system_prompt.to_string();

	if !result.is_empty() {
		system.push_str("\n\nContext:");

		for (idx, (kind, item)) in context_entries(result).enumerate() {
			let label = item.candidate.source_name.as_deref().unwrap_or(kind.as_str());

			system.push_str(&format!("\n[{}] ({label}) {}", idx + 1, item.candidate.text.trim()));
		}
	}

	let mut messages = Vec::with_capacity(history.len() + 2);

	messages.push(ChatMessage::system(system));
	messages.extend(history.iter().map(|turn| match turn.role() {
		Role::User => ChatMessage::user(turn.content()),
		Role::Assistant => ChatMessage::assistant(turn.content()),
	}));
	messages.push(ChatMessage::user(message));

	messages
}
