//! Pure ranking steps shared by the fusion engine and rerankers.

use std::cmp::Ordering;

use quire_domain::{CandidateKind, RetrievalStrategy, ScoredCandidate, TaggedCandidate};

/// Descending score order with NaN sorted last.
pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Stable sort by native score, then cap.
pub fn sort_and_truncate(mut items: Vec<ScoredCandidate>, limit: u32) -> Vec<ScoredCandidate> {
	items.sort_by(|a, b| cmp_f32_desc(a.score, b.score));
	items.truncate(limit as usize);

	items
}

pub fn filter_min_score(items: Vec<ScoredCandidate>, min_score: f32) -> Vec<ScoredCandidate> {
	items.into_iter().filter(|item| item.score >= min_score).collect()
}

/// Chunks first, then summaries, each in retriever order.
pub fn build_pool(
	chunks: Vec<ScoredCandidate>,
	summaries: Vec<ScoredCandidate>,
) -> Vec<TaggedCandidate> {
	let mut pool = Vec::with_capacity(chunks.len() + summaries.len());

	pool.extend(chunks.into_iter().map(|item| TaggedCandidate::tag(CandidateKind::Chunk, item)));
	pool.extend(
		summaries.into_iter().map(|item| TaggedCandidate::tag(CandidateKind::Summary, item)),
	);

	pool
}

/// Walks a reranked pool in order and fills each kind up to its cap.
///
/// Entries that no longer fit their kind's budget are skipped, as are summaries scoring below
/// `min_summary_score`. The walk stops as soon as both budgets are full.
pub fn split_ranked(
	ranked: Vec<TaggedCandidate>,
	top_k: u32,
	raptor_top_k: u32,
	min_summary_score: f32,
) -> (Vec<ScoredCandidate>, Vec<ScoredCandidate>) {
	let chunk_cap = top_k as usize;
	let summary_cap = raptor_top_k as usize;
	let mut chunks = Vec::with_capacity(chunk_cap);
	let mut summaries = Vec::with_capacity(summary_cap);

	for item in ranked {
		if chunks.len() >= chunk_cap && summaries.len() >= summary_cap {
			break;
		}

		match item.kind {
			CandidateKind::Chunk if chunks.len() < chunk_cap => chunks.push(item.into_scored()),
			CandidateKind::Summary
				if summaries.len() < summary_cap && item.score >= min_summary_score =>
				summaries.push(item.into_scored()),
			_ => {},
		}
	}

	(chunks, summaries)
}

pub fn resolve_strategy(
	has_chunks: bool,
	has_summaries: bool,
	reranker_applied: bool,
) -> RetrievalStrategy {
	match (reranker_applied, has_summaries) {
		(true, true) => RetrievalStrategy::RaptorAware,
		(true, false) => RetrievalStrategy::HybridReranked,
		(false, true) if has_chunks => RetrievalStrategy::Hybrid,
		(false, _) => RetrievalStrategy::Simple,
	}
}
