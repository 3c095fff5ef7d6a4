//! Scope resolution: mapping a scope id to its full descriptor.
//!
//! Resolution failing is treated as a run-level failure upstream, so the
//! error here carries the offending id verbatim.

use std::collections::HashMap;

use async_trait::async_trait;
use inlet_core::{ScopeDescriptor, ScopeId};

use crate::error::{Result, StoreError};

/// Resolves a scope id to its descriptor.
#[async_trait]
pub trait ScopeResolver: Send + Sync {
  async fn resolve(&self, scope: &ScopeId) -> Result<ScopeDescriptor>;

  /// Every scope this resolver knows about, for discovery scheduling.
  async fn list(&self) -> Result<Vec<ScopeDescriptor>>;
}

/// Fixed set of scopes, typically loaded from configuration at startup.
#[derive(Debug, Default)]
pub struct StaticScopeResolver {
  scopes: HashMap<ScopeId, ScopeDescriptor>,
}

impl StaticScopeResolver {
  pub fn new(scopes: impl IntoIterator<Item = ScopeDescriptor>) -> Self {
    Self {
      scopes: scopes.into_iter().map(|s| (s.id.clone(), s)).collect(),
    }
  }
}

#[async_trait]
impl ScopeResolver for StaticScopeResolver {
  async fn resolve(&self, scope: &ScopeId) -> Result<ScopeDescriptor> {
    self
      .scopes
      .get(scope)
      .cloned()
      .ok_or_else(|| StoreError::UnknownScope(scope.to_string()))
  }

  async fn list(&self) -> Result<Vec<ScopeDescriptor>> {
    Ok(self.scopes.values().cloned().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use inlet_core::ScopeKind;

  #[tokio::test]
  async fn test_resolve_known_and_unknown() {
    let resolver = StaticScopeResolver::new([ScopeDescriptor::new(
      "contracts",
      "contracts",
      ScopeKind::DocumentLibrary,
    )]);

    let found = resolver.resolve(&ScopeId::from("contracts")).await.unwrap();
    assert_eq!(found.short_name, "contracts");

    let err = resolver.resolve(&ScopeId::from("missing")).await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownScope(id) if id == "missing"));
  }
}
