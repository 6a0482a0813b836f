use serde::{Deserialize, Serialize};

use crate::NotebookId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
	Chunk,
	Summary,
}
impl CandidateKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Chunk => "chunk",
			Self::Summary => "summary",
		}
	}
}

/// A retrievable unit: a document chunk or a hierarchical summary node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRef {
	pub node_id: String,
	pub notebook_id: NotebookId,
	pub source_id: Option<String>,
	pub source_name: Option<String>,
	pub text: String,
	/// Tree level for summaries; chunks leave it unset.
	pub level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
	pub candidate: CandidateRef,
	pub score: f32,
}
impl ScoredCandidate {
	pub fn new(candidate: CandidateRef, score: f32) -> Self {
		Self { candidate, score }
	}
}

/// A candidate carried through the combined rerank pool with its origin attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedCandidate {
	pub kind: CandidateKind,
	pub candidate: CandidateRef,
	pub score: f32,
}
impl TaggedCandidate {
	pub fn tag(kind: CandidateKind, scored: ScoredCandidate) -> Self {
		Self { kind, candidate: scored.candidate, score: scored.score }
	}

	pub fn into_scored(self) -> ScoredCandidate {
		ScoredCandidate { candidate: self.candidate, score: self.score }
	}
}

/// A document node an engine is bound to when it is built for a notebook scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
	pub node_id: String,
	pub notebook_id: NotebookId,
	pub source_id: Option<String>,
	pub source_name: Option<String>,
}
