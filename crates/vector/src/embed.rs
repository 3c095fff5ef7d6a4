//! Embedding seam.
//!
//! Real deployments plug a remote model in behind [`Embedder`]; the hash
//! embedder gives deterministic vectors so the rest of the system can be
//! exercised without a model endpoint.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Produces fixed-dimension embeddings for batches of text.
#[async_trait]
pub trait Embedder: Send + Sync {
  fn dimensions(&self) -> usize;

  /// Embed a batch. The output is position-aligned with the input.
  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic embedder derived from a SHA-256 digest of the text.
///
/// Identical text always embeds to the identical vector, which is what the
/// idempotency tests rely on.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
  dimensions: usize,
}

impl HashEmbedder {
  pub fn new(dimensions: usize) -> Self {
    Self { dimensions }
  }

  fn embed_one(&self, text: &str) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    (0..self.dimensions)
      .map(|i| {
        let byte = digest[i % digest.len()];
        // Fold the dimension index in so vectors are not periodic in 32
        let mixed = byte.wrapping_add((i / digest.len()) as u8);
        (mixed as f32 / 255.0) * 2.0 - 1.0
      })
      .collect()
  }
}

impl Default for HashEmbedder {
  fn default() -> Self {
    Self::new(128)
  }
}

#[async_trait]
impl Embedder for HashEmbedder {
  fn dimensions(&self) -> usize {
    self.dimensions
  }

  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    Ok(texts.iter().map(|t| self.embed_one(t)).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_deterministic_and_dimensioned() {
    let embedder = HashEmbedder::new(64);
    let a = embedder.embed(&["hello".to_string()]).await.unwrap();
    let b = embedder.embed(&["hello".to_string()]).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a[0].len(), 64);

    let c = embedder.embed(&["world".to_string()]).await.unwrap();
    assert_ne!(a, c);
  }

  #[tokio::test]
  async fn test_values_in_unit_range() {
    let embedder = HashEmbedder::default();
    let out = embedder.embed(&["range check".to_string()]).await.unwrap();
    assert!(out[0].iter().all(|v| (-1.0..=1.0).contains(v)));
  }
}
