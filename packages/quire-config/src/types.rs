use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub session: Session,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub engine: Engine,
	#[serde(default)]
	pub timeouts: Timeouts,
	pub providers: Providers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Session {
	pub max_messages_per_session: u32,
	pub ttl_hours: i64,
}
impl Default for Session {
	fn default() -> Self {
		Self { max_messages_per_session: 100, ttl_hours: 24 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub top_k: u32,
	pub raptor_top_k: u32,
	pub min_raptor_score: f32,
	pub use_raptor: bool,
	pub use_reranker: bool,
	/// Chunk candidates fetched before fusion. Raised to `top_k` when smaller.
	pub candidate_k: u32,
	/// Summary candidates fetched before fusion. Raised to `raptor_top_k` when smaller.
	pub raptor_candidate_k: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			top_k: 6,
			raptor_top_k: 5,
			min_raptor_score: 0.3,
			use_raptor: true,
			use_reranker: true,
			candidate_k: 20,
			raptor_candidate_k: 10,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Engine {
	/// Number of most recent turns replayed into a completion prompt.
	pub history_window: u32,
	pub system_prompt: Option<String>,
}
impl Default for Engine {
	fn default() -> Self {
		Self { history_window: 20, system_prompt: None }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
	pub probe_ms: u64,
	pub chunk_fetch_ms: u64,
	pub summary_fetch_ms: u64,
	pub rerank_ms: u64,
	pub load_nodes_ms: u64,
	pub completion_ms: u64,
}
impl Default for Timeouts {
	fn default() -> Self {
		Self {
			probe_ms: 2_000,
			chunk_fetch_ms: 10_000,
			summary_fetch_ms: 5_000,
			rerank_ms: 5_000,
			load_nodes_ms: 30_000,
			completion_ms: 60_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
	/// Absent when no reranker is deployed; fusion then always skips the rerank stage.
	pub rerank: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
