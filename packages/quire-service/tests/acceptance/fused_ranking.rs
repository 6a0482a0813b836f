use std::sync::Arc;

use quire_domain::{RetrievalRequest, RetrievalStage, RetrievalStrategy, ScoredCandidate};
use quire_testkit::{chunk, notebook, summary};

use super::{
	StaticRetriever, StubDocuments, TableReranker, config_without_rerank, harness, node_ids,
};

const NB: &str = "nb-bio";

fn ten_chunks() -> Vec<ScoredCandidate> {
	(0..10).map(|idx| chunk(&format!("c{idx}"), NB, 0.9 - idx as f32 * 0.05)).collect()
}

fn five_summaries() -> Vec<ScoredCandidate> {
	(0..5).map(|idx| summary(&format!("s{idx}"), NB, 0.8 - idx as f32 * 0.1)).collect()
}

fn request(cfg: &quire_config::Config) -> RetrievalRequest {
	let mut req =
		RetrievalRequest::from_config("How do cells divide?", notebook(NB), &cfg.retrieval);

	req.top_k = 3;
	req.raptor_top_k = 2;

	req
}

#[tokio::test]
async fn combined_pool_order_decides_both_lists() {
	let cfg = config_without_rerank();
	let reranker = Arc::new(TableReranker::new(&[
		("s3", 0.99),
		("c7", 0.95),
		("c2", 0.90),
		("s0", 0.85),
		("s1", 0.84),
		("c9", 0.80),
		("c0", 0.70),
		("c1", 0.60),
	]));
	let h = harness(
		cfg.clone(),
		StaticRetriever::new()
			.with_chunks(NB, ten_chunks())
			.with_summaries(NB, five_summaries()),
		StubDocuments::default(),
		Some(reranker.clone()),
	);
	let result = h.pipeline.retrieve(&request(&cfg)).await.expect("Retrieval failed.");

	assert_eq!(node_ids(&result.chunks), vec!["c7", "c2", "c9"]);
	assert_eq!(node_ids(&result.raptor_summaries), vec!["s3", "s0"]);
	assert_eq!(result.strategy_used, RetrievalStrategy::RaptorAware);
	assert!(result.reranker_applied);
	assert!(result.timing(RetrievalStage::Rerank).is_some());

	// All five summaries clear the floor natively.
	assert_eq!(*reranker.pool_sizes.lock().expect("pool size lock"), vec![15]);
}

#[tokio::test]
async fn summaries_below_floor_never_reach_the_pool() {
	let cfg = config_without_rerank();
	let reranker = Arc::new(TableReranker::new(&[("low", 0.99), ("high", 0.5), ("c0", 0.4)]));
	let h = harness(
		cfg.clone(),
		StaticRetriever::new()
			.with_chunks(NB, vec![chunk("c0", NB, 0.7)])
			.with_summaries(NB, vec![summary("low", NB, 0.25), summary("high", NB, 0.31)]),
		StubDocuments::default(),
		Some(reranker.clone()),
	);
	let result = h.pipeline.retrieve(&request(&cfg)).await.expect("Retrieval failed.");

	assert_eq!(node_ids(&result.raptor_summaries), vec!["high"]);
	assert_eq!(*reranker.pool_sizes.lock().expect("pool size lock"), vec![2]);
	assert!(result.raptor_summaries.iter().all(|item| item.score >= cfg.retrieval.min_raptor_score));
}

#[tokio::test]
async fn reranked_summaries_below_floor_are_dropped() {
	let cfg = config_without_rerank();
	let reranker = Arc::new(TableReranker::new(&[("c0", 0.9), ("s0", 0.1)]));
	let h = harness(
		cfg.clone(),
		StaticRetriever::new()
			.with_chunks(NB, vec![chunk("c0", NB, 0.7)])
			.with_summaries(NB, vec![summary("s0", NB, 0.8)]),
		StubDocuments::default(),
		Some(reranker),
	);
	let result = h.pipeline.retrieve(&request(&cfg)).await.expect("Retrieval failed.");

	assert!(result.raptor_summaries.is_empty());
	assert_eq!(result.strategy_used, RetrievalStrategy::HybridReranked);
}

#[tokio::test]
async fn without_reranker_each_list_keeps_native_order() {
	let cfg = config_without_rerank();
	let h = harness(
		cfg.clone(),
		StaticRetriever::new()
			.with_chunks(
				NB,
				vec![
					chunk("c0", NB, 0.2),
					chunk("c1", NB, 0.9),
					chunk("c2", NB, 0.5),
					chunk("c3", NB, 0.9),
				],
			)
			.with_summaries(NB, five_summaries()),
		StubDocuments::default(),
		None,
	);
	let result = h.pipeline.retrieve(&request(&cfg)).await.expect("Retrieval failed.");

	assert_eq!(node_ids(&result.chunks), vec!["c1", "c3", "c2"]);
	assert_eq!(node_ids(&result.raptor_summaries), vec!["s0", "s1"]);
	assert_eq!(result.strategy_used, RetrievalStrategy::Hybrid);
	assert!(!result.reranker_applied);
	assert!(result.timing(RetrievalStage::Rerank).is_none());
}

#[tokio::test]
async fn disabled_reranker_flag_skips_configured_reranker() {
	let cfg = config_without_rerank();
	let reranker = Arc::new(TableReranker::new(&[]));
	let h = harness(
		cfg.clone(),
		StaticRetriever::new().with_chunks(NB, ten_chunks()),
		StubDocuments::default(),
		Some(reranker.clone()),
	);
	let mut req = request(&cfg);

	req.use_reranker = false;
	req.use_raptor = false;

	let result = h.pipeline.retrieve(&req).await.expect("Retrieval failed.");

	assert_eq!(node_ids(&result.chunks), vec!["c0", "c1", "c2"]);
	assert_eq!(result.strategy_used, RetrievalStrategy::Simple);
	assert!(reranker.pool_sizes.lock().expect("pool size lock").is_empty());
	assert_eq!(h.retriever.summary_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn source_filter_restricts_chunks() {
	let cfg = config_without_rerank();
	let h = harness(
		cfg.clone(),
		StaticRetriever::new().with_chunks(NB, ten_chunks()),
		StubDocuments::default(),
		None,
	);
	let req = request(&cfg).with_source_ids(["doc-c4".to_string(), "doc-c8".to_string()]);
	let result = h.pipeline.retrieve(&req).await.expect("Retrieval failed.");

	assert_eq!(node_ids(&result.chunks), vec!["c4", "c8"]);
}
