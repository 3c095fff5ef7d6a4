use thiserror::Error;

use crate::coordinator::CoordinatorError;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
  #[error(transparent)]
  Store(#[from] store::StoreError),

  #[error(transparent)]
  Vector(#[from] vector::VectorError),

  #[error(transparent)]
  State(#[from] inlet_core::Error),

  #[error(transparent)]
  Lease(#[from] CoordinatorError),

  #[error("scope {scope} does not support vector reindexing")]
  UnsupportedScope { scope: String },
}
