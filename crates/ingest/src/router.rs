//! Routes work to per-scope orchestrator actors, spawning them on demand.

use std::sync::Arc;

use dashmap::DashMap;
use inlet_core::{IngestionConfig, ScopeId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::handle::OrchestratorHandle;
use crate::orchestrator::{IngestionOrchestrator, OrchestratorContext};

/// Registry of live orchestrator actors, keyed by scope.
///
/// Safe to share as `Arc<OrchestratorRouter>`; `get_or_create` is atomic per
/// key so a race to spawn the same scope yields one actor.
pub struct OrchestratorRouter {
  orchestrators: DashMap<ScopeId, OrchestratorHandle>,
  ctx: Arc<OrchestratorContext>,
  config: IngestionConfig,
  cancel: CancellationToken,
}

impl OrchestratorRouter {
  pub fn new(ctx: Arc<OrchestratorContext>, config: IngestionConfig, cancel: CancellationToken) -> Self {
    Self {
      orchestrators: DashMap::new(),
      ctx,
      config,
      cancel,
    }
  }

  /// Handle for a scope's orchestrator, spawning the actor on first use.
  pub fn get_or_create(&self, scope: &ScopeId) -> OrchestratorHandle {
    self
      .orchestrators
      .entry(scope.clone())
      .or_insert_with(|| {
        debug!(scope = %scope, "spawning orchestrator");
        IngestionOrchestrator::spawn(
          scope.clone(),
          self.ctx.clone(),
          self.config.clone(),
          self.cancel.child_token(),
        )
      })
      .clone()
  }

  /// Handle without spawning, if the scope's actor is live.
  pub fn get(&self, scope: &ScopeId) -> Option<OrchestratorHandle> {
    self.orchestrators.get(scope).map(|h| h.clone())
  }

  pub fn len(&self) -> usize {
    self.orchestrators.len()
  }

  pub fn is_empty(&self) -> bool {
    self.orchestrators.is_empty()
  }

  /// Ask every actor to stop. In-flight file work still runs to completion;
  /// only new dispatch stops.
  pub async fn shutdown_all(&self) {
    info!(count = self.orchestrators.len(), "shutting down all orchestrators");
    for entry in self.orchestrators.iter() {
      let _ = entry.value().shutdown().await;
    }
    self.orchestrators.clear();
  }
}
