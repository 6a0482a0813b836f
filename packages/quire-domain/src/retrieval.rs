use std::{
	collections::{BTreeMap, BTreeSet},
	time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{Error, NotebookId, Result, ScoredCandidate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
	pub query: String,
	pub notebook_id: NotebookId,
	pub use_raptor: bool,
	pub use_reranker: bool,
	/// Cap on returned chunks.
	pub top_k: u32,
	/// Cap on returned summaries.
	pub raptor_top_k: u32,
	pub min_raptor_score: f32,
	/// Restricts chunk candidates to these documents when present.
	pub source_ids: Option<BTreeSet<String>>,
}
impl RetrievalRequest {
	pub fn from_config(
		query: impl Into<String>,
		notebook_id: NotebookId,
		cfg: &quire_config::Retrieval,
	) -> Self {
		Self {
			query: query.into(),
			notebook_id,
			use_raptor: cfg.use_raptor,
			use_reranker: cfg.use_reranker,
			top_k: cfg.top_k,
			raptor_top_k: cfg.raptor_top_k,
			min_raptor_score: cfg.min_raptor_score,
			source_ids: None,
		}
	}

	pub fn with_source_ids<I>(mut self, source_ids: I) -> Self
	where
		I: IntoIterator<Item = String>,
	{
		let set = source_ids.into_iter().collect::<BTreeSet<_>>();

		self.source_ids = if set.is_empty() { None } else { Some(set) };

		self
	}

	/// Rejects requests that could never satisfy the result invariants. Runs before any I/O.
	pub fn validate(&self) -> Result<()> {
		if self.query.trim().is_empty() {
			return Err(Error::InvalidArgument {
				field: "query",
				message: "must be non-empty.".to_string(),
			});
		}
		if self.top_k == 0 {
			return Err(Error::InvalidArgument {
				field: "top_k",
				message: "must be greater than zero.".to_string(),
			});
		}
		if self.use_raptor && self.raptor_top_k == 0 {
			return Err(Error::InvalidArgument {
				field: "raptor_top_k",
				message: "must be greater than zero when summaries are requested.".to_string(),
			});
		}
		if !self.min_raptor_score.is_finite() {
			return Err(Error::InvalidArgument {
				field: "min_raptor_score",
				message: "must be a finite number.".to_string(),
			});
		}

		Ok(())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
	Empty,
	Simple,
	Hybrid,
	RaptorAware,
	HybridReranked,
}
impl RetrievalStrategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Empty => "empty",
			Self::Simple => "simple",
			Self::Hybrid => "hybrid",
			Self::RaptorAware => "raptor_aware",
			Self::HybridReranked => "hybrid_reranked",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStage {
	Probe,
	Chunks,
	Summaries,
	Rerank,
	Total,
}
impl RetrievalStage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Probe => "probe",
			Self::Chunks => "chunks",
			Self::Summaries => "summaries",
			Self::Rerank => "rerank",
			Self::Total => "total",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
	pub chunks: Vec<ScoredCandidate>,
	pub raptor_summaries: Vec<ScoredCandidate>,
	pub strategy_used: RetrievalStrategy,
	pub reranker_applied: bool,
	pub timings: BTreeMap<RetrievalStage, Duration>,
}
impl RetrievalResult {
	pub fn empty() -> Self {
		Self {
			chunks: Vec::new(),
			raptor_summaries: Vec::new(),
			strategy_used: RetrievalStrategy::Empty,
			reranker_applied: false,
			timings: BTreeMap::new(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty() && self.raptor_summaries.is_empty()
	}

	pub fn timing(&self, stage: RetrievalStage) -> Option<Duration> {
		self.timings.get(&stage).copied()
	}
}
