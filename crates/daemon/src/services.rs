//! Backend construction shared by the daemon and the one-shot CLI
//! commands.
//!
//! Local single-process mode: object storage is directory-backed, document
//! and run state live in the in-memory stores, and the text pipeline uses
//! the deterministic hash embedder. Swapping real backends in means
//! swapping the trait objects built here.

use std::sync::Arc;

use ingest::{
  ConcurrencyCoordinator, LoggingSink, OrchestratorContext, OrchestratorRouter, ReindexOrchestrator, StartOutcome,
};
use inlet_core::{Config, IngestionState, ScopeDescriptor, ScopeId};
use store::{DocumentStore, LocalStorage, MemoryDocumentStore, MemoryRunStore, StaticScopeResolver};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vector::{Embedder, EmbeddingPipeline, HashEmbedder, MemoryVectorStore, SearchHit, VectorStore};

/// Everything a running deployment needs, built once from config.
pub struct Services {
  pub scopes: Vec<ScopeDescriptor>,
  pub ctx: Arc<OrchestratorContext>,
  pub coordinator: Arc<ConcurrencyCoordinator>,
  pub router: Arc<OrchestratorRouter>,
  embedder: Arc<dyn Embedder>,
  config: Config,
}

impl Services {
  pub fn build(config: &Config, cancel: CancellationToken) -> Self {
    let scopes: Vec<ScopeDescriptor> = config.scopes.iter().map(|s| s.descriptor()).collect();

    let documents = Arc::new(MemoryDocumentStore::new());
    let runs = Arc::new(MemoryRunStore::new());
    let storage = Arc::new(LocalStorage::new(&config.storage.root));
    let vectors = Arc::new(MemoryVectorStore::new());
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
    let pipeline = Arc::new(EmbeddingPipeline::new(embedder.clone(), vectors.clone()));
    let resolver = Arc::new(StaticScopeResolver::new(scopes.clone()));

    let ctx = Arc::new(OrchestratorContext {
      documents,
      runs,
      storage,
      resolver,
      pipeline,
      vectors,
      notifier: Arc::new(LoggingSink),
    });
    let coordinator = Arc::new(ConcurrencyCoordinator::new(config.coordinator.clone()));
    let router = Arc::new(OrchestratorRouter::new(ctx.clone(), config.ingestion.clone(), cancel));

    Self {
      scopes,
      ctx,
      coordinator,
      router,
      embedder,
      config: config.clone(),
    }
  }

  /// Semantic search over a scope's vector index.
  pub async fn search(&self, scope: &ScopeId, query: &str, limit: usize) -> ingest::Result<Vec<SearchHit>> {
    let descriptor = self.ctx.resolver.resolve(scope).await?;
    let batch = vec![query.to_string()];
    let embeddings = self.embedder.embed(&batch).await?;
    let Some(embedding) = embeddings.into_iter().next() else {
      return Ok(Vec::new());
    };
    self
      .ctx
      .vectors
      .ensure_index(&descriptor.target_index, self.embedder.dimensions())
      .await?;
    let hits = self
      .ctx
      .vectors
      .search(&descriptor.target_index, &embedding, limit, 0.0)
      .await?;
    Ok(hits)
  }

  /// Reindex orchestrator for one scope.
  pub fn reindexer(&self, scope: &ScopeId) -> Arc<ReindexOrchestrator> {
    ReindexOrchestrator::new(
      scope.clone(),
      self.ctx.clone(),
      self.coordinator.clone(),
      self.config.reindex.clone(),
    )
  }

  /// Per-scope document counts by state, for status reporting.
  pub async fn scope_summary(&self, scope: &ScopeId) -> ingest::Result<(usize, usize, usize)> {
    let active = self.ctx.documents.list_active(scope).await?.len();
    let complete = self.ctx.documents.list_complete(scope).await?.len();
    let failed = self
      .ctx
      .documents
      .list_for_scope(scope)
      .await?
      .iter()
      .filter(|d| d.state == IngestionState::Failed)
      .count();
    Ok((active, complete, failed))
  }
}

/// One scheduler-driven discovery cycle: start an ingestion pass and
/// report whether it dispatched any work.
pub async fn discovery_pass(router: &Arc<OrchestratorRouter>, scope: &ScopeId) -> bool {
  let handle = router.get_or_create(scope);
  match handle.start_and_wait().await {
    Ok(StartOutcome::Started { dispatched }) => {
      if dispatched > 0 {
        info!(scope = %scope, dispatched, "discovery found work");
      }
      dispatched > 0
    }
    Ok(_) => false,
    Err(e) => {
      error!(scope = %scope, error = %e, "discovery pass failed");
      false
    }
  }
}
