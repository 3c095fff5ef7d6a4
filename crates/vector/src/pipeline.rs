//! Bytes-to-index pipeline: extract, chunk, embed, upsert.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::chunk::chunk_text;
use crate::embed::Embedder;
use crate::error::Result;
use crate::store::{VectorRecord, VectorStore};

/// Result of indexing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
  /// Groups the document's chunks in the vector store.
  pub vector_document_id: String,
  pub chunk_count: usize,
}

/// Turns one document's raw bytes into indexed chunks.
#[async_trait]
pub trait DocumentPipeline: Send + Sync {
  /// Width of the embeddings this pipeline writes.
  fn dimensions(&self) -> usize;

  async fn index_document(&self, index: &str, source_key: &str, bytes: &[u8]) -> Result<IndexedDocument>;
}

const DEFAULT_CHUNK_CHARS: usize = 1_500;
const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Standard pipeline: lossy UTF-8 extraction, windowed chunking, batch
/// embedding, then an upsert keyed by the content hash of the source key
/// so re-ingesting the same path replaces its previous chunks.
pub struct EmbeddingPipeline {
  embedder: Arc<dyn Embedder>,
  store: Arc<dyn VectorStore>,
  max_chars: usize,
  overlap: usize,
}

impl EmbeddingPipeline {
  pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
    Self {
      embedder,
      store,
      max_chars: DEFAULT_CHUNK_CHARS,
      overlap: DEFAULT_CHUNK_OVERLAP,
    }
  }

  pub fn with_chunking(mut self, max_chars: usize, overlap: usize) -> Self {
    self.max_chars = max_chars;
    self.overlap = overlap;
    self
  }
}

#[async_trait]
impl DocumentPipeline for EmbeddingPipeline {
  fn dimensions(&self) -> usize {
    self.embedder.dimensions()
  }

  async fn index_document(&self, index: &str, source_key: &str, bytes: &[u8]) -> Result<IndexedDocument> {
    let vector_document_id = store::content_hash(source_key.as_bytes());
    let text = String::from_utf8_lossy(bytes);
    let chunks = chunk_text(&text, self.max_chars, self.overlap);

    self.store.ensure_index(index, self.embedder.dimensions()).await?;
    // Replace rather than append so re-ingestion cannot leave stale chunks
    self.store.delete_document(index, &vector_document_id).await?;

    if chunks.is_empty() {
      debug!(index, source_key, "document produced no chunks");
      return Ok(IndexedDocument {
        vector_document_id,
        chunk_count: 0,
      });
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = self.embedder.embed(&texts).await?;

    let records: Vec<VectorRecord> = chunks
      .into_iter()
      .zip(embeddings)
      .map(|(chunk, embedding)| VectorRecord {
        vector_document_id: vector_document_id.clone(),
        chunk_index: chunk.index,
        text: chunk.text,
        embedding,
      })
      .collect();

    let chunk_count = records.len();
    self.store.upsert(index, records).await?;
    debug!(index, source_key, chunk_count, "indexed document");

    Ok(IndexedDocument {
      vector_document_id,
      chunk_count,
    })
  }
}
