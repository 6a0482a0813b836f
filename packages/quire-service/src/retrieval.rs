pub mod fusion;

use std::{
	collections::BTreeMap,
	sync::Arc,
	time::{Duration, Instant},
};

use quire_config::{Config, EmbeddingProviderConfig, Timeouts};
use quire_domain::{
	RetrievalRequest, RetrievalResult, RetrievalStage, ScoredCandidate, TaggedCandidate,
};

use crate::{CandidateRetriever, EmbeddingProvider, Error, Reranker, Result, within};

/// Fuses chunk and summary candidates into one bounded result.
pub struct FusionEngine {
	retriever: Arc<dyn CandidateRetriever>,
	reranker: Option<Arc<dyn Reranker>>,
	embedding: Arc<dyn EmbeddingProvider>,
	embedding_cfg: EmbeddingProviderConfig,
	candidate_k: u32,
	raptor_candidate_k: u32,
	timeouts: Timeouts,
}
impl FusionEngine {
	pub fn new(
		cfg: &Config,
		retriever: Arc<dyn CandidateRetriever>,
		reranker: Option<Arc<dyn Reranker>>,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		Self {
			retriever,
			reranker,
			embedding,
			embedding_cfg: cfg.providers.embedding.clone(),
			candidate_k: cfg.retrieval.candidate_k,
			raptor_candidate_k: cfg.retrieval.raptor_candidate_k,
			timeouts: cfg.timeouts.clone(),
		}
	}

	/// Fails only on an invalid request or a chunk fetch timeout. Every other upstream failure
	/// degrades the strategy and is logged.
	pub async fn retrieve(&self, req: &RetrievalRequest) -> Result<RetrievalResult> {
		req.validate()?;

		let started = Instant::now();
		let mut timings = BTreeMap::new();

		if !self.probe(req, &mut timings).await {
			tracing::info!(notebook_id = %req.notebook_id, "Notebook has no indexed candidates.");

			timings.insert(RetrievalStage::Total, started.elapsed());

			return Ok(RetrievalResult { timings, ..RetrievalResult::empty() });
		}

		let chunks = self.fetch_chunks(req, &mut timings).await?;
		let summaries = if req.use_raptor {
			self.fetch_summaries(req, &mut timings).await
		} else {
			Vec::new()
		};
		let mut result = match self.reranker.as_ref() {
			Some(reranker)
				if req.use_reranker && !(chunks.is_empty() && summaries.is_empty()) =>
			{
				let pool = fusion::build_pool(chunks.clone(), summaries.clone());
				let rerank_started = Instant::now();
				let ranked =
					within("rerank", self.timeouts.rerank_ms, reranker.rerank(&req.query, pool))
						.await;

				timings.insert(RetrievalStage::Rerank, rerank_started.elapsed());

				match ranked {
					Ok(ranked) => Self::reranked(req, ranked),
					Err(err) => {
						tracing::warn!(
							error = %err,
							notebook_id = %req.notebook_id,
							"Reranker failed. Falling back to native scores."
						);

						Self::unranked(req, chunks, summaries)
					},
				}
			},
			_ => Self::unranked(req, chunks, summaries),
		};

		timings.insert(RetrievalStage::Total, started.elapsed());

		result.timings = timings;

		tracing::debug!(
			notebook_id = %req.notebook_id,
			strategy = result.strategy_used.as_str(),
			chunks = result.chunks.len(),
			summaries = result.raptor_summaries.len(),
			reranker_applied = result.reranker_applied,
			"Retrieval finished."
		);

		Ok(result)
	}

	async fn probe(
		&self,
		req: &RetrievalRequest,
		timings: &mut BTreeMap<RetrievalStage, Duration>,
	) -> bool {
		let started = Instant::now();
		let probed = within(
			"probe",
			self.timeouts.probe_ms,
			self.retriever.has_candidates(&req.notebook_id),
		)
		.await;

		timings.insert(RetrievalStage::Probe, started.elapsed());

		match probed {
			Ok(found) => found,
			Err(err) => {
				tracing::warn!(
					error = %err,
					notebook_id = %req.notebook_id,
					"Candidate probe failed. Continuing with retrieval."
				);

				true
			},
		}
	}

	async fn fetch_chunks(
		&self,
		req: &RetrievalRequest,
		timings: &mut BTreeMap<RetrievalStage, Duration>,
	) -> Result<Vec<ScoredCandidate>> {
		let started = Instant::now();
		let limit = self.candidate_k.max(req.top_k);
		let fetched = within(
			"chunks",
			self.timeouts.chunk_fetch_ms,
			self.retriever.fetch_chunks(
				&req.query,
				&req.notebook_id,
				req.source_ids.as_ref(),
				limit,
			),
		)
		.await;

		timings.insert(RetrievalStage::Chunks, started.elapsed());

		match fetched {
			Ok(chunks) => Ok(chunks),
			Err(err @ Error::Timeout { .. }) => Err(err),
			Err(err) => {
				tracing::warn!(
					error = %err,
					notebook_id = %req.notebook_id,
					"Chunk fetch failed. Continuing without chunks."
				);

				Ok(Vec::new())
			},
		}
	}

	async fn fetch_summaries(
		&self,
		req: &RetrievalRequest,
		timings: &mut BTreeMap<RetrievalStage, Duration>,
	) -> Vec<ScoredCandidate> {
		let started = Instant::now();
		let limit = self.raptor_candidate_k.max(req.raptor_top_k);
		let fetched = within("summaries", self.timeouts.summary_fetch_ms, async {
			let vector = self.embed_query(&req.query).await?;

			self.retriever.fetch_summaries(&vector, &req.notebook_id, limit).await
		})
		.await;

		timings.insert(RetrievalStage::Summaries, started.elapsed());

		match fetched {
			Ok(summaries) => fusion::filter_min_score(summaries, req.min_raptor_score),
			Err(err) => {
				tracing::warn!(
					error = %err,
					notebook_id = %req.notebook_id,
					"Summary fetch failed. Continuing without summaries."
				);

				Vec::new()
			},
		}
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let texts = [query.to_string()];
		let mut vectors = self.embedding.embed(&self.embedding_cfg, &texts).await?;

		if vectors.len() != 1 {
			return Err(Error::Provider {
				message: format!("Expected one query embedding, got {}.", vectors.len()),
			});
		}

		Ok(vectors.remove(0))
	}

	fn reranked(req: &RetrievalRequest, ranked: Vec<TaggedCandidate>) -> RetrievalResult {
		let (chunks, summaries) =
			fusion::split_ranked(ranked, req.top_k, req.raptor_top_k, req.min_raptor_score);
		let strategy_used = fusion::resolve_strategy(!chunks.is_empty(), !summaries.is_empty(), true);

		RetrievalResult {
			chunks,
			raptor_summaries: summaries,
			strategy_used,
			reranker_applied: true,
			..RetrievalResult::empty()
		}
	}

	fn unranked(
		req: &RetrievalRequest,
		chunks: Vec<ScoredCandidate>,
		summaries: Vec<ScoredCandidate>,
	) -> RetrievalResult {
		let chunks = fusion::sort_and_truncate(chunks, req.top_k);
		let summaries = fusion::sort_and_truncate(summaries, req.raptor_top_k);
		let strategy_used =
			fusion::resolve_strategy(!chunks.is_empty(), !summaries.is_empty(), false);

		RetrievalResult {
			chunks,
			raptor_summaries: summaries,
			strategy_used,
			reranker_applied: false,
			..RetrievalResult::empty()
		}
	}
}
