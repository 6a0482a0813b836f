use std::{sync::Arc, time::Duration};

use quire_domain::{RetrievalRequest, RetrievalStage, RetrievalStrategy};
use quire_service::Error;
use quire_testkit::{chunk, notebook, summary};

use super::{
	FailingReranker, SlowReranker, StaticRetriever, StubDocuments, config_without_rerank, harness,
	node_ids,
};

const NB: &str = "nb-chem";

fn retriever() -> StaticRetriever {
	StaticRetriever::new()
		.with_chunks(NB, vec![chunk("c0", NB, 0.4), chunk("c1", NB, 0.8), chunk("c2", NB, 0.6)])
		.with_summaries(NB, vec![summary("s0", NB, 0.5), summary("s1", NB, 0.9)])
}

fn request(cfg: &quire_config::Config) -> RetrievalRequest {
	let mut req =
		RetrievalRequest::from_config("Balance this equation.", notebook(NB), &cfg.retrieval);

	req.top_k = 2;
	req.raptor_top_k = 1;

	req
}

#[tokio::test]
async fn reranker_timeout_degrades_to_hybrid() {
	let cfg = config_without_rerank();
	let h = harness(
		cfg.clone(),
		retriever(),
		StubDocuments::default(),
		Some(Arc::new(SlowReranker { delay: Duration::from_millis(cfg.timeouts.rerank_ms * 5) })),
	);
	let result = h.pipeline.retrieve(&request(&cfg)).await.expect("Reranker timeout must degrade.");

	assert!(!result.reranker_applied);
	assert_eq!(result.strategy_used, RetrievalStrategy::Hybrid);
	assert_eq!(node_ids(&result.chunks), vec!["c1", "c2"]);
	assert_eq!(node_ids(&result.raptor_summaries), vec!["s1"]);

	let rerank_time = result.timing(RetrievalStage::Rerank).expect("Rerank stage must be timed.");

	assert!(rerank_time >= Duration::from_millis(cfg.timeouts.rerank_ms));
}

#[tokio::test]
async fn reranker_error_degrades_to_hybrid() {
	let cfg = config_without_rerank();
	let h = harness(
		cfg.clone(),
		retriever(),
		StubDocuments::default(),
		Some(Arc::new(FailingReranker)),
	);
	let result = h.pipeline.retrieve(&request(&cfg)).await.expect("Reranker error must degrade.");

	assert!(!result.reranker_applied);
	assert_eq!(result.strategy_used, RetrievalStrategy::Hybrid);
}

#[tokio::test]
async fn summary_failure_degrades_to_simple() {
	let cfg = config_without_rerank();
	let h = harness(cfg.clone(), retriever().failing_summaries(), StubDocuments::default(), None);
	let result = h.pipeline.retrieve(&request(&cfg)).await.expect("Summary failure must degrade.");

	assert_eq!(result.strategy_used, RetrievalStrategy::Simple);
	assert!(result.raptor_summaries.is_empty());
	assert_eq!(node_ids(&result.chunks), vec!["c1", "c2"]);
}

#[tokio::test]
async fn chunk_error_degrades_to_empty_chunk_list() {
	let cfg = config_without_rerank();
	let h = harness(cfg.clone(), retriever().failing_chunks(), StubDocuments::default(), None);
	let result = h.pipeline.retrieve(&request(&cfg)).await.expect("Chunk error must degrade.");

	assert!(result.chunks.is_empty());
	assert_eq!(node_ids(&result.raptor_summaries), vec!["s1"]);
	assert_eq!(result.strategy_used, RetrievalStrategy::Simple);
}

#[tokio::test]
async fn chunk_timeout_fails_the_request() {
	let cfg = config_without_rerank();
	let h = harness(
		cfg.clone(),
		retriever().with_chunk_delay(Duration::from_millis(cfg.timeouts.chunk_fetch_ms * 5)),
		StubDocuments::default(),
		None,
	);
	let err = h.pipeline.retrieve(&request(&cfg)).await.expect_err("Chunk timeout must fail.");

	assert!(matches!(err, Error::Timeout { stage: "chunks", .. }));
}
