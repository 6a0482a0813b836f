use std::sync::Arc;

use quire_config::ProviderConfig;
use quire_domain::TaggedCandidate;

use crate::{BoxFuture, Error, RerankProvider, Reranker, Result, retrieval::fusion};

/// Scores a mixed pool with a cross-encoder provider and sorts by the returned relevance.
pub struct ScoreReranker {
	provider: Arc<dyn RerankProvider>,
	cfg: ProviderConfig,
}
impl ScoreReranker {
	pub fn new(provider: Arc<dyn RerankProvider>, cfg: ProviderConfig) -> Self {
		Self { provider, cfg }
	}

	async fn rerank_pool(
		&self,
		query: &str,
		mut pool: Vec<TaggedCandidate>,
	) -> Result<Vec<TaggedCandidate>> {
		if pool.is_empty() {
			return Ok(pool);
		}

		let docs = pool.iter().map(|item| item.candidate.text.clone()).collect::<Vec<_>>();
		let scores = self.provider.rerank(&self.cfg, query, &docs).await?;

		if scores.len() != pool.len() {
			return Err(Error::Provider {
				message: format!(
					"Rerank provider returned {} scores for {} documents.",
					scores.len(),
					pool.len()
				),
			});
		}

		for (item, score) in pool.iter_mut().zip(scores) {
			item.score = score;
		}

		pool.sort_by(|a, b| fusion::cmp_f32_desc(a.score, b.score));

		Ok(pool)
	}
}
impl Reranker for ScoreReranker {
	fn rerank<'a>(
		&'a self,
		query: &'a str,
		pool: Vec<TaggedCandidate>,
	) -> BoxFuture<'a, Result<Vec<TaggedCandidate>>> {
		Box::pin(self.rerank_pool(query, pool))
	}
}
