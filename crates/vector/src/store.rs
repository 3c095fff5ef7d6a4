//! Vector store seam and the in-memory reference backend.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{Result, VectorError};

/// One embedded chunk as stored in an index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
  /// Groups all chunks of one source document for bulk delete.
  pub vector_document_id: String,
  pub chunk_index: usize,
  pub text: String,
  pub embedding: Vec<f32>,
}

/// One search result, best first.
#[derive(Debug, Clone)]
pub struct SearchHit {
  pub vector_document_id: String,
  pub chunk_index: usize,
  pub text: String,
  /// Cosine similarity in `[-1, 1]`.
  pub score: f32,
}

/// Index-of-embedded-chunks storage.
#[async_trait]
pub trait VectorStore: Send + Sync {
  /// Create the index if it does not exist yet, pinned to an embedding
  /// width. Re-ensuring with the same width is idempotent; a different
  /// width is an error.
  async fn ensure_index(&self, index: &str, dimensions: usize) -> Result<()>;

  /// Replace all chunks of each record's document, then insert. Upserting
  /// the same document twice leaves one copy.
  async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> Result<()>;

  /// Drop every chunk belonging to a vector document id. Unknown ids are
  /// a no-op.
  async fn delete_document(&self, index: &str, vector_document_id: &str) -> Result<()>;

  /// Drop every record in the index but keep the index itself.
  async fn clear_index(&self, index: &str) -> Result<()>;

  /// Total chunk count in an index.
  async fn count(&self, index: &str) -> Result<usize>;

  /// Nearest chunks to `query` by cosine similarity, best first, dropping
  /// hits below `min_score`.
  async fn search(&self, index: &str, query: &[f32], limit: usize, min_score: f32) -> Result<Vec<SearchHit>>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() || a.is_empty() {
    return 0.0;
  }
  let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
  let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
  let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
  if norm_a == 0.0 || norm_b == 0.0 {
    return 0.0;
  }
  dot / (norm_a * norm_b)
}

fn poisoned<T>(_: PoisonError<T>) -> VectorError {
  VectorError::LockPoisoned
}

#[derive(Debug, Default)]
struct IndexState {
  dimensions: usize,
  records: Vec<VectorRecord>,
}

/// In-memory vector store for tests and local mode.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
  indices: RwLock<HashMap<String, IndexState>>,
}

impl MemoryVectorStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Chunk count for one document, for assertions in tests.
  pub fn document_chunks(&self, index: &str, vector_document_id: &str) -> Result<usize> {
    let indices = self.indices.read().map_err(poisoned)?;
    Ok(
      indices
        .get(index)
        .map(|state| {
          state
            .records
            .iter()
            .filter(|r| r.vector_document_id == vector_document_id)
            .count()
        })
        .unwrap_or(0),
    )
  }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
  async fn ensure_index(&self, index: &str, dimensions: usize) -> Result<()> {
    let mut indices = self.indices.write().map_err(poisoned)?;
    let state = indices.entry(index.to_string()).or_default();
    if state.dimensions == 0 {
      state.dimensions = dimensions;
    } else if state.dimensions != dimensions {
      return Err(VectorError::DimensionMismatch {
        index: index.to_string(),
        expected: state.dimensions,
        got: dimensions,
      });
    }
    Ok(())
  }

  async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> Result<()> {
    let mut indices = self.indices.write().map_err(poisoned)?;
    let state = indices
      .get_mut(index)
      .ok_or_else(|| VectorError::IndexNotFound(index.to_string()))?;

    for record in records {
      if state.dimensions != 0 && record.embedding.len() != state.dimensions {
        return Err(VectorError::DimensionMismatch {
          index: index.to_string(),
          expected: state.dimensions,
          got: record.embedding.len(),
        });
      }
      state.records.retain(|r| {
        !(r.vector_document_id == record.vector_document_id && r.chunk_index == record.chunk_index)
      });
      state.records.push(record);
    }
    Ok(())
  }

  async fn delete_document(&self, index: &str, vector_document_id: &str) -> Result<()> {
    let mut indices = self.indices.write().map_err(poisoned)?;
    if let Some(state) = indices.get_mut(index) {
      state.records.retain(|r| r.vector_document_id != vector_document_id);
    }
    Ok(())
  }

  async fn clear_index(&self, index: &str) -> Result<()> {
    let mut indices = self.indices.write().map_err(poisoned)?;
    if let Some(state) = indices.get_mut(index) {
      state.records.clear();
    }
    Ok(())
  }

  async fn count(&self, index: &str) -> Result<usize> {
    let indices = self.indices.read().map_err(poisoned)?;
    Ok(indices.get(index).map(|state| state.records.len()).unwrap_or(0))
  }

  async fn search(&self, index: &str, query: &[f32], limit: usize, min_score: f32) -> Result<Vec<SearchHit>> {
    let indices = self.indices.read().map_err(poisoned)?;
    let state = indices
      .get(index)
      .ok_or_else(|| VectorError::IndexNotFound(index.to_string()))?;

    let mut hits: Vec<SearchHit> = state
      .records
      .iter()
      .map(|r| SearchHit {
        vector_document_id: r.vector_document_id.clone(),
        chunk_index: r.chunk_index,
        text: r.text.clone(),
        score: cosine_similarity(query, &r.embedding),
      })
      .filter(|h| h.score >= min_score)
      .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    Ok(hits)
  }
}
