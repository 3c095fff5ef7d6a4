//! One-shot CLI commands. Each builds the service stack in-process and
//! runs a single operation against it.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use daemon::{Daemon, Services};
use ingest::{ReindexOutcome, StartOutcome};
use inlet_core::{Config, ScopeId};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Start the daemon and run until ctrl-c.
pub async fn cmd_daemon(config: Config) -> Result<()> {
  info!("starting inlet daemon");
  Daemon::new(config).run().await.context("daemon exited with error")?;
  Ok(())
}

/// Run one ingestion pass for a scope and wait for every dispatched file
/// to settle.
pub async fn cmd_ingest(config: Config, scope: &str) -> Result<()> {
  let scope = ScopeId::from(scope);
  let services = Services::build(&config, CancellationToken::new());

  let handle = services.router.get_or_create(&scope);
  match handle.start_and_wait().await.context("orchestrator unavailable")? {
    StartOutcome::Started { dispatched } => {
      println!("ingestion started: {dispatched} file(s) dispatched");
      wait_for_settle(&services, &scope).await?;
      let (active, complete, failed) = services.scope_summary(&scope).await?;
      println!("ingestion finished: {complete} complete, {failed} failed, {active} still active");
      if failed > 0 {
        bail!("{failed} file(s) failed ingestion");
      }
    }
    StartOutcome::Finalized => println!("stale run finalized; nothing left to ingest"),
    StartOutcome::AlreadyRunning => println!("a run is already in progress for {scope}"),
    StartOutcome::Failed { reason } => bail!("ingestion run failed: {reason}"),
  }

  services.router.shutdown_all().await;
  Ok(())
}

/// Rebuild the vector index for a scope from its completed documents.
pub async fn cmd_reindex(config: Config, scope: &str) -> Result<()> {
  let scope = ScopeId::from(scope);
  let services = Services::build(&config, CancellationToken::new());

  match services.reindexer(&scope).start().await? {
    ReindexOutcome::AlreadyRunning => println!("a reindex is already in progress for {scope}"),
    ReindexOutcome::Finished(summary) => {
      println!(
        "reindex {}: {} of {} document(s) reindexed, {} failed",
        summary.run_id, summary.processed, summary.total, summary.failed
      );
      if !summary.success {
        bail!("reindex completed with failures");
      }
    }
  }
  Ok(())
}

/// Search a scope's vector index and print the best-matching chunks.
pub async fn cmd_search(config: Config, scope: &str, query: &str, limit: usize) -> Result<()> {
  let scope = ScopeId::from(scope);
  let services = Services::build(&config, CancellationToken::new());

  let hits = services.search(&scope, query, limit).await?;
  if hits.is_empty() {
    println!("no matches");
    return Ok(());
  }
  for (rank, hit) in hits.iter().enumerate() {
    let preview: String = hit.text.chars().take(120).collect();
    println!("{:>2}. [{:.3}] {}#{}", rank + 1, hit.score, hit.vector_document_id, hit.chunk_index);
    println!("    {preview}");
  }
  Ok(())
}

/// Print document counts for a scope.
pub async fn cmd_status(config: Config, scope: &str) -> Result<()> {
  let scope = ScopeId::from(scope);
  let services = Services::build(&config, CancellationToken::new());

  let (active, complete, failed) = services.scope_summary(&scope).await?;
  println!("scope {scope}");
  println!("  active:   {active}");
  println!("  complete: {complete}");
  println!("  failed:   {failed}");
  Ok(())
}

/// Poll until no document in the scope is in a non-terminal state.
async fn wait_for_settle(services: &Services, scope: &ScopeId) -> Result<()> {
  loop {
    if services.ctx.documents.list_active(scope).await?.is_empty() {
      return Ok(());
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
  }
}
