//! Vector indexing for ingested documents.
//!
//! An index holds embedded chunks keyed by a vector document id. The store
//! trait is the seam swapped between the in-memory backend (tests, local
//! mode) and a real vector database; the pipeline turns raw object bytes
//! into chunks and embeddings before they reach the store.

mod error;

pub mod chunk;
pub mod embed;
pub mod pipeline;
pub mod store;

pub use chunk::{Chunk, chunk_text};
pub use embed::{Embedder, HashEmbedder};
pub use error::{Result, VectorError};
pub use pipeline::{DocumentPipeline, EmbeddingPipeline, IndexedDocument};
pub use store::{MemoryVectorStore, SearchHit, VectorRecord, VectorStore};
