//! Wiring tests: config in, working discovery passes out.

use std::time::Duration;

use daemon::{Services, discovery_pass};
use inlet_core::{Config, ScopeConfig};
use store::DocumentStore;
use tokio_util::sync::CancellationToken;

fn config(root: &std::path::Path) -> Config {
  let mut config = Config::default();
  config.storage.root = root.to_path_buf();
  config.ingestion.stagger_delay_ms = 0;
  config.scopes.push(ScopeConfig {
    id: "contracts".to_string(),
    short_name: None,
    kind: inlet_core::ScopeKind::DocumentLibrary,
  });
  config
}

#[tokio::test]
async fn test_discovery_pass_ingests_local_files() {
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("auto-import").join("contracts");
  std::fs::create_dir_all(&source).unwrap();
  std::fs::write(source.join("a.txt"), "a local contract document").unwrap();

  let cancel = CancellationToken::new();
  let services = Services::build(&config(dir.path()), cancel.child_token());
  let scope = services.scopes[0].id.clone();

  let found = discovery_pass(&services.router, &scope).await;
  assert!(found);

  // Wait for the dispatched file to settle
  let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
  loop {
    let complete = services.ctx.documents.list_complete(&scope).await.unwrap();
    if complete.len() == 1 {
      assert!(complete[0].is_vector_indexed);
      break;
    }
    assert!(tokio::time::Instant::now() < deadline, "file never completed");
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  // The source file moved into the target container on disk
  assert!(!source.join("a.txt").exists());
  assert!(dir.path().join("docs-contracts").is_dir());

  // A second pass finds nothing new
  let found = discovery_pass(&services.router, &scope).await;
  assert!(!found);
  cancel.cancel();
}

#[tokio::test]
async fn test_reindexer_runs_against_built_services() {
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("auto-import").join("contracts");
  std::fs::create_dir_all(&source).unwrap();
  std::fs::write(source.join("a.txt"), "reindex me later").unwrap();

  let cancel = CancellationToken::new();
  let services = Services::build(&config(dir.path()), cancel.child_token());
  let scope = services.scopes[0].id.clone();

  discovery_pass(&services.router, &scope).await;
  let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
  while services.ctx.documents.list_complete(&scope).await.unwrap().is_empty() {
    assert!(tokio::time::Instant::now() < deadline, "file never completed");
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  let outcome = services.reindexer(&scope).start().await.unwrap();
  let ingest::ReindexOutcome::Finished(summary) = outcome else {
    panic!("expected a finished reindex run");
  };
  assert_eq!((summary.total, summary.processed, summary.failed), (1, 1, 0));

  // The ingested chunk is findable; its own text is the closest match
  let hits = services.search(&scope, "reindex me later", 5).await.unwrap();
  assert!(!hits.is_empty());
  assert!(hits[0].score > 0.99);
  cancel.cancel();
}
