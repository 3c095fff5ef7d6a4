use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorError>;

#[derive(Debug, Error)]
pub enum VectorError {
  #[error("index not found: {0}")]
  IndexNotFound(String),

  #[error("index {index} expects {expected}-dimension embeddings, got {got}")]
  DimensionMismatch {
    index: String,
    expected: usize,
    got: usize,
  },

  #[error("extraction failed: {0}")]
  Extraction(String),

  #[error("embedding failed: {0}")]
  Embedding(String),

  #[error("lock poisoned")]
  LockPoisoned,
}
