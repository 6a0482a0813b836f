use std::sync::{Arc, atomic::Ordering};

use quire_domain::EngineScope;
use quire_service::Error;
use quire_testkit::{node, notebook};

use super::{StaticRetriever, StubDocuments, config_without_rerank, harness};

fn documents() -> StubDocuments {
	StubDocuments::new(vec![node("a1", "nb-a"), node("a2", "nb-a"), node("b1", "nb-b")])
}

fn scope(ids: &[&str]) -> EngineScope {
	EngineScope::from_notebooks(ids.iter().map(|id| notebook(id)))
}

#[tokio::test]
async fn same_scope_twice_rebuilds_once() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);
	let first =
		h.pipeline.ensure_engine(scope(&["nb-a"]), false).await.expect("First build failed.");
	let second = h.pipeline.ensure_engine(scope(&["nb-a"]), false).await.expect("Reuse failed.");

	assert_eq!(h.pipeline.engines().rebuild_count(), 1);
	assert_eq!(first.engine_id(), second.engine_id());
	assert_eq!(h.documents.requested().len(), 1);
}

#[tokio::test]
async fn scope_change_rebuilds_and_installs_new_scope() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);

	h.pipeline.ensure_engine(scope(&["nb-a"]), false).await.expect("Build for nb-a failed.");

	let engine =
		h.pipeline.ensure_engine(scope(&["nb-b"]), false).await.expect("Build for nb-b failed.");

	assert_eq!(h.pipeline.engines().rebuild_count(), 2);
	assert_eq!(h.pipeline.engines().current_scope(), scope(&["nb-b"]));
	assert_eq!(engine.generation(), 2);
	assert!(engine.nodes().iter().all(|node| node.notebook_id.as_str() == "nb-b"));
	assert_eq!(h.documents.requested(), vec![vec!["nb-a".to_string()], vec!["nb-b".to_string()]]);
}

#[tokio::test]
async fn filter_order_does_not_force_rebuild() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);

	h.pipeline.ensure_engine(scope(&["nb-a", "nb-b"]), false).await.expect("Build failed.");
	h.pipeline.ensure_engine(scope(&["nb-b", "nb-a"]), false).await.expect("Reuse failed.");

	assert_eq!(h.pipeline.engines().rebuild_count(), 1);
}

#[tokio::test]
async fn force_reset_rebuilds_same_scope() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);
	let first = h.pipeline.ensure_engine(scope(&["nb-a"]), false).await.expect("Build failed.");
	let second = h.pipeline.ensure_engine(scope(&["nb-a"]), true).await.expect("Reset failed.");

	assert_eq!(h.pipeline.engines().rebuild_count(), 2);
	assert_ne!(first.engine_id(), second.engine_id());
}

#[tokio::test]
async fn failed_rebuild_keeps_previous_context() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);
	let original = h.pipeline.ensure_engine(scope(&["nb-a"]), false).await.expect("Build failed.");

	h.documents.fail.store(true, Ordering::SeqCst);

	let err = h
		.pipeline
		.ensure_engine(scope(&["nb-b"]), false)
		.await
		.expect_err("Expected rebuild failure.");

	assert!(matches!(err, Error::Rebuild { .. }));
	assert_eq!(h.pipeline.engines().current_scope(), scope(&["nb-a"]));
	assert_eq!(h.pipeline.engines().rebuild_count(), 1);

	let current = h.pipeline.engines().current_engine().expect("Previous engine must remain.");

	assert_eq!(current.engine_id(), original.engine_id());

	let reused = h
		.pipeline
		.ensure_engine(scope(&["nb-a"]), false)
		.await
		.expect("Unchanged scope must still be served.");

	assert_eq!(reused.engine_id(), original.engine_id());
}

#[tokio::test]
async fn empty_scoped_load_is_authoritative() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);
	let engine =
		h.pipeline.ensure_engine(scope(&["nb-new"]), false).await.expect("Build failed.");

	assert_eq!(engine.node_count(), 0);
	assert_eq!(h.documents.requested(), vec![vec!["nb-new".to_string()]]);
}

#[tokio::test]
async fn nodes_outside_the_scope_are_never_installed() {
	let h = harness(
		config_without_rerank(),
		StaticRetriever::new(),
		StubDocuments::leaky(vec![node("a1", "nb-a"), node("b1", "nb-b")]),
		None,
	);
	let engine = h.pipeline.ensure_engine(scope(&["nb-a"]), false).await.expect("Build failed.");
	let ids = engine.nodes().iter().map(|node| node.node_id.as_str()).collect::<Vec<_>>();

	assert_eq!(ids, vec!["a1"]);
}

#[tokio::test]
async fn empty_scope_builds_without_loading_nodes() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);
	let engine = h.pipeline.ensure_engine(EngineScope::none(), false).await.expect("Build failed.");

	assert!(engine.scope().is_none());
	assert!(h.documents.requested().is_empty());
	assert!(h.pipeline.engines().snapshot().initialized());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_one_scope_share_one_build() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);
	let mut tasks = Vec::new();

	for _ in 0..8 {
		let pipeline = Arc::clone(&h.pipeline);

		tasks.push(tokio::spawn(async move {
			pipeline.ensure_engine(scope(&["nb-a"]), false).await.map(|engine| engine.engine_id())
		}));
	}

	let mut ids = Vec::new();

	for task in tasks {
		ids.push(task.await.expect("Task panicked.").expect("Build failed."));
	}

	assert_eq!(h.pipeline.engines().rebuild_count(), 1);
	assert!(ids.iter().all(|id| *id == ids[0]));
}

#[tokio::test]
async fn switching_notebooks_restores_each_history() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);

	h.pipeline.switch_notebook("nb-a", "u1").await.expect("Switch to nb-a failed.");
	h.pipeline
		.record_exchange("nb-a", "u1", "What is ATP?", "Energy currency.")
		.expect("Record failed.");
	h.pipeline.switch_notebook("nb-b", "u1").await.expect("Switch to nb-b failed.");

	let engine = h.pipeline.engines().current_engine().expect("Engine must be active.");

	assert!(engine.memory().is_empty());

	let engine = h.pipeline.switch_notebook("nb-a", "u1").await.expect("Switch back failed.");
	let contents =
		engine.memory().iter().map(|turn| turn.content().to_string()).collect::<Vec<_>>();

	assert_eq!(h.pipeline.engines().rebuild_count(), 3);
	assert_eq!(contents, vec!["What is ATP?", "Energy currency."]);
}

#[tokio::test]
async fn switching_user_on_same_notebook_reseeds_without_rebuild() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);

	h.pipeline.switch_notebook("nb-a", "u1").await.expect("Switch failed.");
	h.pipeline.record_exchange("nb-a", "u1", "Mine?", "Yours.").expect("Record failed.");

	let engine = h.pipeline.switch_notebook("nb-a", "u2").await.expect("Switch failed.");

	assert_eq!(h.pipeline.engines().rebuild_count(), 1);
	assert!(engine.memory().is_empty());

	h.pipeline.record_exchange("nb-a", "u1", "Still there?", "Yes.").expect("Record failed.");

	assert!(engine.memory().is_empty());
	assert_eq!(h.pipeline.sessions().message_count(&key("u1", "nb-a")), 4);
}

#[tokio::test]
async fn failed_switch_keeps_previous_conversation() {
	let h = harness(config_without_rerank(), StaticRetriever::new(), documents(), None);

	h.pipeline.switch_notebook("nb-a", "u1").await.expect("Switch failed.");
	h.pipeline.record_exchange("nb-a", "u1", "Q", "A").expect("Record failed.");
	h.documents.fail.store(true, Ordering::SeqCst);

	let err = h.pipeline.switch_notebook("nb-b", "u1").await.expect_err("Expected failure.");

	assert!(matches!(err, Error::Rebuild { .. }));

	let engine = h.pipeline.engines().current_engine().expect("Engine must remain.");

	assert_eq!(engine.memory().len(), 2);
	assert_eq!(engine.history_key(), Some(key("u1", "nb-a")));
}

fn key(user: &str, notebook_id: &str) -> quire_domain::SessionKey {
	quire_domain::SessionKey::parse(user, notebook_id).expect("valid key")
}
