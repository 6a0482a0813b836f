//! Shared fixtures for the quire test suites.

use std::sync::Mutex;

use serde_json::Map;
use time::{Duration, OffsetDateTime, macros::datetime};
use tracing_subscriber::EnvFilter;

use quire_domain::{CandidateRef, Clock, DocumentNode, NotebookId, ScoredCandidate};

pub const EPOCH: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

/// A clock that only moves when told to.
pub struct ManualClock {
	now: Mutex<OffsetDateTime>,
}
impl ManualClock {
	pub fn new() -> Self {
		Self::at(EPOCH)
	}

	pub fn at(now: OffsetDateTime) -> Self {
		Self { now: Mutex::new(now) }
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock().unwrap_or_else(|err| err.into_inner());

		*now += by;
	}

	pub fn set(&self, at: OffsetDateTime) {
		*self.now.lock().unwrap_or_else(|err| err.into_inner()) = at;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new()
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.now.lock().unwrap_or_else(|err| err.into_inner())
	}
}

pub fn notebook(raw: &str) -> NotebookId {
	NotebookId::parse(raw).expect("Fixture notebook id must be valid.")
}

pub fn chunk(node_id: &str, notebook_id: &str, score: f32) -> ScoredCandidate {
	ScoredCandidate::new(
		CandidateRef {
			node_id: node_id.to_string(),
			notebook_id: notebook(notebook_id),
			source_id: Some(format!("doc-{node_id}")),
			source_name: Some(format!("{node_id}.pdf")),
			text: format!("Chunk {node_id}."),
			level: None,
		},
		score,
	)
}

pub fn summary(node_id: &str, notebook_id: &str, score: f32) -> ScoredCandidate {
	ScoredCandidate::new(
		CandidateRef {
			node_id: node_id.to_string(),
			notebook_id: notebook(notebook_id),
			source_id: None,
			source_name: None,
			text: format!("Summary {node_id}."),
			level: Some(1),
		},
		score,
	)
}

pub fn node(node_id: &str, notebook_id: &str) -> DocumentNode {
	DocumentNode {
		node_id: node_id.to_string(),
		notebook_id: notebook(notebook_id),
		source_id: Some(format!("doc-{node_id}")),
		source_name: Some(format!("{node_id}.pdf")),
	}
}

/// A complete config with short timeouts and a rerank section.
pub fn test_config() -> quire_config::Config {
	quire_config::Config {
		service: quire_config::Service { log_level: "debug".to_string() },
		session: quire_config::Session { max_messages_per_session: 100, ttl_hours: 24 },
		retrieval: quire_config::Retrieval {
			top_k: 6,
			raptor_top_k: 5,
			min_raptor_score: 0.3,
			use_raptor: true,
			use_reranker: true,
			candidate_k: 20,
			raptor_candidate_k: 10,
		},
		engine: quire_config::Engine { history_window: 20, system_prompt: None },
		timeouts: quire_config::Timeouts {
			probe_ms: 200,
			chunk_fetch_ms: 200,
			summary_fetch_ms: 200,
			rerank_ms: 100,
			load_nodes_ms: 200,
			completion_ms: 200,
		},
		providers: quire_config::Providers {
			embedding: quire_config::EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embedding".to_string(),
				dimensions: 4,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			llm: quire_config::LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "test-llm".to_string(),
				temperature: 0.1,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: Some(quire_config::ProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/rerank".to_string(),
				model: "test-rerank".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			}),
		},
	}
}

/// Installs a test-writer subscriber once per process. Later calls are no-ops.
pub fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}
