//! Run-state repository: one persistent aggregate per orchestration scope.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use inlet_core::{OrchestrationRun, ScopeId};

use crate::error::{Result, StoreError};

/// Durable run-state repository.
#[async_trait]
pub trait RunStore: Send + Sync {
  /// Load the aggregate for a scope, if one was ever persisted.
  async fn load(&self, scope: &ScopeId) -> Result<Option<OrchestrationRun>>;

  /// Persist the aggregate (insert or overwrite).
  async fn save(&self, run: OrchestrationRun) -> Result<()>;
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
  StoreError::LockPoisoned
}

/// In-memory run store for tests and local mode.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
  runs: RwLock<HashMap<ScopeId, OrchestrationRun>>,
}

impl MemoryRunStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl RunStore for MemoryRunStore {
  async fn load(&self, scope: &ScopeId) -> Result<Option<OrchestrationRun>> {
    let runs = self.runs.read().map_err(poisoned)?;
    Ok(runs.get(scope).cloned())
  }

  async fn save(&self, run: OrchestrationRun) -> Result<()> {
    let mut runs = self.runs.write().map_err(poisoned)?;
    runs.insert(run.scope_id.clone(), run);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use inlet_core::{RunId, RunStatus};

  #[tokio::test]
  async fn test_load_missing_is_none() {
    let store = MemoryRunStore::new();
    assert!(store.load(&ScopeId::from("nope")).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_save_then_load() {
    let store = MemoryRunStore::new();
    let scope = ScopeId::from("s");
    let mut run = OrchestrationRun::new(scope.clone());
    run.begin(RunId::new());
    store.save(run).await.unwrap();

    let loaded = store.load(&scope).await.unwrap().unwrap();
    assert_eq!(loaded.status, RunStatus::Running);
  }
}
