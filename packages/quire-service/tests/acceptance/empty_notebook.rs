use std::sync::atomic::Ordering;

use quire_domain::{RetrievalRequest, RetrievalStage, RetrievalStrategy};
use quire_testkit::{chunk, notebook};

use super::{StaticRetriever, StubDocuments, TableReranker, config_without_rerank, harness};

#[tokio::test]
async fn notebook_without_candidates_returns_empty_strategy() {
	let cfg = config_without_rerank();
	let h = harness(
		cfg.clone(),
		StaticRetriever::new().with_chunks("nb-full", vec![chunk("c1", "nb-full", 0.9)]),
		StubDocuments::default(),
		Some(std::sync::Arc::new(TableReranker::new(&[]))),
	);
	let req = RetrievalRequest::from_config("What is osmosis?", notebook("nb-empty"), &cfg.retrieval);
	let result = h.pipeline.retrieve(&req).await.expect("Empty notebook must not fail.");

	assert_eq!(result.strategy_used, RetrievalStrategy::Empty);
	assert!(result.chunks.is_empty());
	assert!(result.raptor_summaries.is_empty());
	assert!(!result.reranker_applied);
	assert!(result.timing(RetrievalStage::Probe).is_some());
	assert!(result.timing(RetrievalStage::Total).is_some());
	assert_eq!(h.retriever.chunk_calls.load(Ordering::SeqCst), 0);
	assert_eq!(h.retriever.summary_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_request_is_rejected_before_any_fetch() {
	let cfg = config_without_rerank();
	let h = harness(
		cfg.clone(),
		StaticRetriever::new().with_chunks("nb-full", vec![chunk("c1", "nb-full", 0.9)]),
		StubDocuments::default(),
		None,
	);
	let mut req = RetrievalRequest::from_config("question", notebook("nb-full"), &cfg.retrieval);

	req.top_k = 0;

	let err = h.pipeline.retrieve(&req).await.expect_err("Expected top_k rejection.");

	assert!(matches!(err, quire_service::Error::InvalidRequest { .. }));
	assert_eq!(h.retriever.chunk_calls.load(Ordering::SeqCst), 0);
}
