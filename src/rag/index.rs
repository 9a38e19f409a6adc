//! Startup indexing: populate the vector store from the corpus directory
//! if it has not been indexed yet.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::llm::LlmProvider;

use super::splitter::TextSplitter;
use super::store::{StoredChunk, VectorStore};

/// Documents shorter than this are noise and skipped outright.
const MIN_DOCUMENT_CHARS: usize = 100;
/// Fragments shorter than this are dropped rather than indexed.
const MIN_CHUNK_CHARS: usize = 50;

/// Checks whether the collection already holds data and, if not, ingests
/// the corpus directory. Returns the number of chunks indexed.
pub async fn check_and_index(
    config: &AppConfig,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmProvider>,
) -> Result<usize, ApiError> {
    let existing = store.count().await?;
    if existing > 0 {
        tracing::info!("Index already contains {} chunks; skipping ingestion", existing);
        return Ok(0);
    }

    let corpus_dir = &config.indexing.corpus_dir;
    if !corpus_dir.is_dir() {
        tracing::warn!(
            "Corpus directory {} does not exist; starting with an empty index",
            corpus_dir.display()
        );
        return Ok(0);
    }

    tracing::info!(
        "Starting data indexing: chunk_size={}, chunk_overlap={}, batch_size={}, max_documents={}",
        config.indexing.chunk_size,
        config.indexing.chunk_overlap,
        config.indexing.batch_size,
        config.indexing.max_documents
    );

    let splitter = TextSplitter::new(config.indexing.chunk_size, config.indexing.chunk_overlap);
    let documents = collect_documents(corpus_dir, config.indexing.max_documents)?;

    let mut pending: Vec<StoredChunk> = Vec::new();
    let mut total = 0usize;
    for (title, text) in documents {
        tracing::info!("Processing document: {}", title);
        for (position, fragment) in splitter.split(&text).into_iter().enumerate() {
            if fragment.trim().chars().count() < MIN_CHUNK_CHARS {
                continue;
            }
            let chunk_id = Uuid::new_v4().to_string();
            pending.push(StoredChunk {
                metadata: Some(json!({
                    "source": title,
                    "chunk_id": format!("chunk_{}", position),
                })),
                chunk_id,
                content: fragment,
                source: title.clone(),
            });

            if pending.len() >= config.indexing.batch_size {
                total += flush_batch(&mut pending, store.as_ref(), llm.as_ref()).await?;
            }
        }
    }
    total += flush_batch(&mut pending, store.as_ref(), llm.as_ref()).await?;

    tracing::info!("Indexing finished: {} chunks stored", total);
    Ok(total)
}

/// Reads up to `max_documents` `.txt`/`.md` files, sorted by name so the
/// selection is stable across restarts.
fn collect_documents(dir: &Path, max_documents: usize) -> Result<Vec<(String, String)>, ApiError> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .map_err(ApiError::internal)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("txt") | Some("md")
            )
        })
        .collect();
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        if documents.len() >= max_documents {
            break;
        }
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!("Skipping unreadable file {}: {}", path.display(), err);
                continue;
            }
        };
        if text.trim().chars().count() < MIN_DOCUMENT_CHARS {
            continue;
        }
        let title = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("Unknown")
            .to_string();
        documents.push((title, text));
    }
    Ok(documents)
}

async fn flush_batch(
    pending: &mut Vec<StoredChunk>,
    store: &dyn VectorStore,
    llm: &dyn LlmProvider,
) -> Result<usize, ApiError> {
    if pending.is_empty() {
        return Ok(0);
    }
    let batch: Vec<StoredChunk> = pending.drain(..).collect();
    let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
    let embeddings = llm.embed(&texts).await?;
    if embeddings.len() != batch.len() {
        return Err(ApiError::Internal(format!(
            "embedding count mismatch: {} texts, {} vectors",
            batch.len(),
            embeddings.len()
        )));
    }
    let count = batch.len();
    store
        .upsert_batch(batch.into_iter().zip(embeddings).collect())
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::ApiError;
    use crate::llm::{ChatRequest, LlmReply};
    use crate::rag::store::ChunkHit;

    struct MemoryStore {
        chunks: Mutex<Vec<StoredChunk>>,
    }

    #[async_trait]
    impl VectorStore for MemoryStore {
        async fn upsert_batch(
            &self,
            items: Vec<(StoredChunk, Vec<f32>)>,
        ) -> Result<(), ApiError> {
            let mut chunks = self.chunks.lock().expect("lock");
            chunks.extend(items.into_iter().map(|(chunk, _)| chunk));
            Ok(())
        }

        async fn query(&self, _embedding: &[f32], _k: usize) -> Result<Vec<ChunkHit>, ApiError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<usize, ApiError> {
            Ok(self.chunks.lock().expect("lock").len())
        }
    }

    struct FakeEmbedder;

    #[async_trait]
    impl LlmProvider for FakeEmbedder {
        fn name(&self) -> &str {
            "fake"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<LlmReply, ApiError> {
            Ok(LlmReply::default())
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(inputs.iter().map(|_| vec![0.0, 1.0]).collect())
        }
    }

    fn test_config(corpus_dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.indexing.corpus_dir = corpus_dir.to_path_buf();
        config.indexing.chunk_size = 200;
        config.indexing.chunk_overlap = 20;
        config.indexing.batch_size = 2;
        config.indexing.max_documents = 10;
        config
    }

    #[tokio::test]
    async fn indexes_corpus_files_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let article = "Alan Turing was an English mathematician and computer scientist. \
            He was highly influential in the development of theoretical computer science, \
            providing a formalisation of the concepts of algorithm and computation."
            .repeat(2);
        fs::write(dir.path().join("turing.txt"), &article).expect("write fixture");
        fs::write(dir.path().join("tiny.txt"), "too short").expect("write fixture");
        fs::write(dir.path().join("notes.json"), "{}").expect("write fixture");

        let store = Arc::new(MemoryStore {
            chunks: Mutex::new(Vec::new()),
        });
        let llm = Arc::new(FakeEmbedder);
        let config = test_config(dir.path());

        let indexed = check_and_index(&config, store.clone(), llm.clone())
            .await
            .expect("indexing succeeds");
        assert!(indexed > 0);
        assert_eq!(store.count().await.expect("count"), indexed);
        let sources: Vec<String> = store
            .chunks
            .lock()
            .expect("lock")
            .iter()
            .map(|chunk| chunk.source.clone())
            .collect();
        assert!(sources.iter().all(|source| source == "turing"));

        // a second pass sees the populated collection and skips ingestion
        let again = check_and_index(&config, store, llm).await.expect("skip pass");
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn missing_corpus_directory_is_not_fatal() {
        let store = Arc::new(MemoryStore {
            chunks: Mutex::new(Vec::new()),
        });
        let config = test_config(Path::new("/nonexistent/corpus"));
        let indexed = check_and_index(&config, store, Arc::new(FakeEmbedder))
            .await
            .expect("missing corpus tolerated");
        assert_eq!(indexed, 0);
    }
}
