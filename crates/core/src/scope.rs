//! Orchestration scopes: the logical unit one ingestion run tracks.
//!
//! A scope maps a source container+prefix (where raw files land) to a target
//! container (canonical storage) and a vector index name. The kind is a
//! closed set; downstream code matches on it instead of inspecting source
//! objects at runtime.

use serde::{Deserialize, Serialize};

/// Stable identity of an orchestration scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(String);

impl ScopeId {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for ScopeId {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

impl From<String> for ScopeId {
  fn from(s: String) -> Self {
    Self(s)
  }
}

impl std::fmt::Display for ScopeId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

/// The closed set of source kinds a scope can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
  /// A document library with its own vector index.
  DocumentLibrary,
  /// A shared storage source serving several logical libraries.
  SharedDrive,
  /// One-shot archive imports; copied and extracted but never reindexed
  /// from the vector store.
  ArchiveImport,
}

impl ScopeKind {
  /// Whether documents of this kind can be rebuilt from the vector store.
  pub fn supports_vector_reindex(self) -> bool {
    !matches!(self, ScopeKind::ArchiveImport)
  }
}

/// Everything an orchestrator needs to know about its scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeDescriptor {
  pub id: ScopeId,
  /// Short name used for target-container resolution.
  pub short_name: String,
  /// Container files are discovered in (the staging / auto-import source).
  pub source_container: String,
  /// Prefix within the source container to enumerate under.
  pub source_prefix: String,
  /// Canonical container copied files land in.
  pub target_container: String,
  /// Vector index documents of this scope are embedded into.
  pub target_index: String,
  pub kind: ScopeKind,
}

impl ScopeDescriptor {
  pub fn new(id: impl Into<ScopeId>, short_name: impl Into<String>, kind: ScopeKind) -> Self {
    let id = id.into();
    let short_name = short_name.into();
    Self {
      source_container: "auto-import".to_string(),
      source_prefix: format!("{short_name}/"),
      target_container: format!("docs-{short_name}"),
      target_index: format!("idx-{short_name}"),
      id,
      short_name,
      kind,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reindex_support() {
    assert!(ScopeKind::DocumentLibrary.supports_vector_reindex());
    assert!(ScopeKind::SharedDrive.supports_vector_reindex());
    assert!(!ScopeKind::ArchiveImport.supports_vector_reindex());
  }

  #[test]
  fn test_descriptor_defaults() {
    let scope = ScopeDescriptor::new("contracts", "contracts", ScopeKind::DocumentLibrary);
    assert_eq!(scope.source_container, "auto-import");
    assert_eq!(scope.source_prefix, "contracts/");
    assert_eq!(scope.target_container, "docs-contracts");
    assert_eq!(scope.target_index, "idx-contracts");
  }
}
