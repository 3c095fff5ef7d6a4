use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Not found: {entity} {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("Validation: {0}")]
  Validation(String),

  #[error("Invalid state transition: {from:?} -> {to:?}")]
  InvalidTransition {
    from: crate::document::IngestionState,
    to: crate::document::IngestionState,
  },

  #[error("Config: {0}")]
  Config(String),

  #[error("IO: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
