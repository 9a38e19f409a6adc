//! Abstract interface over the vector database backing retrieval.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

/// A stored chunk of corpus text with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub content: String,
    /// Document title or filename the chunk came from.
    pub source: String,
    pub metadata: Option<serde_json::Value>,
}

/// Result of a similarity search.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub chunk: StoredChunk,
    /// Higher is more similar.
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert chunks with their embedding vectors.
    async fn upsert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError>;

    /// Top-k similarity search against the query embedding.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ChunkHit>, ApiError>;

    /// Number of chunks in the collection.
    async fn count(&self) -> Result<usize, ApiError>;
}
