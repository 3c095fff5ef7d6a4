use inlet_core::IngestionState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("Not found: {entity} {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Invalid state transition: {from:?} -> {to:?}")]
  InvalidTransition { from: IngestionState, to: IngestionState },

  #[error("Unknown scope: {0}")]
  UnknownScope(String),

  #[error("Store lock poisoned")]
  LockPoisoned,

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
