//! ChromaDB HTTP client implementing [`VectorStore`].
//!
//! Talks to a Chroma server over its REST API. The collection is resolved
//! (or created) lazily on first use and the id cached, so an unreachable
//! Chroma at boot degrades the RAG tool instead of failing startup.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::config::ChromaConfig;
use crate::errors::ApiError;

use super::store::{ChunkHit, StoredChunk, VectorStore};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ChromaStore {
    client: reqwest::Client,
    base_url: String,
    collection_name: String,
    collection_id: RwLock<Option<String>>,
}

impl ChromaStore {
    pub fn new(config: &ChromaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        ChromaStore {
            client,
            base_url: config.base_url(),
            collection_name: config.collection.clone(),
            collection_id: RwLock::new(None),
        }
    }

    /// Resolves the collection id, creating the collection if needed.
    async fn collection_id(&self) -> Result<String, ApiError> {
        if let Some(id) = self.collection_id.read().await.clone() {
            return Ok(id);
        }

        let url = format!("{}/api/v1/collections", self.base_url);
        let body = json!({
            "name": self.collection_name,
            "get_or_create": true,
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                ApiError::ServiceUnavailable(format!("ChromaDB unreachable: {}", err))
            })?;

        if !response.status().is_success() {
            return Err(ApiError::ServiceUnavailable(format!(
                "ChromaDB returned {} while opening collection '{}'",
                response.status(),
                self.collection_name
            )));
        }

        let value: Value = response.json().await.map_err(ApiError::internal)?;
        let id = value
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::Internal("ChromaDB collection has no id".to_string()))?
            .to_string();

        tracing::info!(
            "Connected to ChromaDB collection '{}' at {}",
            self.collection_name,
            self.base_url
        );
        *self.collection_id.write().await = Some(id.clone());
        Ok(id)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                ApiError::ServiceUnavailable(format!("ChromaDB request failed: {}", err))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "ChromaDB returned {}: {}",
                status, detail
            )));
        }

        response.json::<Value>().await.map_err(ApiError::internal)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn upsert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }
        let id = self.collection_id().await?;

        let mut ids = Vec::with_capacity(items.len());
        let mut embeddings = Vec::with_capacity(items.len());
        let mut documents = Vec::with_capacity(items.len());
        let mut metadatas = Vec::with_capacity(items.len());
        for (chunk, embedding) in items {
            ids.push(chunk.chunk_id.clone());
            embeddings.push(embedding);
            documents.push(chunk.content);
            metadatas.push(chunk.metadata.unwrap_or_else(|| {
                json!({ "source": chunk.source, "chunk_id": chunk.chunk_id })
            }));
        }

        let body = json!({
            "ids": ids,
            "embeddings": embeddings,
            "documents": documents,
            "metadatas": metadatas,
        });
        self.post(&format!("/api/v1/collections/{}/upsert", id), &body)
            .await?;
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ChunkHit>, ApiError> {
        let id = self.collection_id().await?;
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });
        let value = self
            .post(&format!("/api/v1/collections/{}/query", id), &body)
            .await?;

        Ok(parse_query_response(&value))
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let id = self.collection_id().await?;
        let url = format!("{}/api/v1/collections/{}/count", self.base_url, id);
        let response = self.client.get(&url).send().await.map_err(|err| {
            ApiError::ServiceUnavailable(format!("ChromaDB request failed: {}", err))
        })?;
        let value: Value = response.json().await.map_err(ApiError::internal)?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }
}

/// Chroma answers queries in column form: parallel arrays nested per query.
fn parse_query_response(value: &Value) -> Vec<ChunkHit> {
    let ids = first_row(value, "ids");
    let documents = first_row(value, "documents");
    let metadatas = first_row(value, "metadatas");
    let distances = first_row(value, "distances");

    let mut hits = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let chunk_id = id.as_str().unwrap_or_default().to_string();
        let content = documents
            .get(i)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let metadata = metadatas
            .get(i)
            .map(|v| (*v).clone())
            .filter(|v| !v.is_null());
        let source = metadata
            .as_ref()
            .and_then(|m| m.get("source"))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string();
        let distance = distances.get(i).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;

        hits.push(ChunkHit {
            chunk: StoredChunk {
                chunk_id,
                content,
                source,
                metadata,
            },
            // cosine distance -> similarity
            score: 1.0 - distance,
        });
    }
    hits
}

fn first_row<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .and_then(|rows| rows.first())
        .and_then(|row| row.as_array())
        .map(|row| row.iter().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_columnar_query_response() {
        let response = json!({
            "ids": [["c1", "c2"]],
            "documents": [["alpha text", "beta text"]],
            "metadatas": [[{"source": "Alpha"}, null]],
            "distances": [[0.25, 0.75]],
        });

        let hits = parse_query_response(&response);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.chunk_id, "c1");
        assert_eq!(hits[0].chunk.source, "Alpha");
        assert_eq!(hits[0].chunk.metadata, Some(json!({"source": "Alpha"})));
        assert!((hits[0].score - 0.75).abs() < 1e-6);
        assert_eq!(hits[1].chunk.source, "Unknown");
        assert_eq!(hits[1].chunk.metadata, None);
    }

    #[test]
    fn empty_response_yields_no_hits() {
        assert!(parse_query_response(&json!({})).is_empty());
    }
}
