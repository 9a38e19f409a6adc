//! Retrieval chain: embed the query, fetch the top-k chunks, stuff them
//! into a prompt, and ask the model for a grounded answer.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

use super::store::{ChunkHit, VectorStore};

const ANSWER_PROMPT: &str = "You are a helpful assistant answering questions from a Wikipedia \
knowledge base. Use only the provided context to answer. If the context does not contain the \
answer, say so instead of guessing.";

/// Narrow boundary the rest of the application sees: a query in, text out.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn invoke(&self, query: &str) -> Result<String, ApiError>;
}

pub struct RagChain {
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmProvider>,
    retrieval_k: usize,
}

impl RagChain {
    pub fn new(store: Arc<dyn VectorStore>, llm: Arc<dyn LlmProvider>, retrieval_k: usize) -> Self {
        RagChain {
            store,
            llm,
            retrieval_k: retrieval_k.max(1),
        }
    }
}

#[async_trait]
impl Retriever for RagChain {
    async fn invoke(&self, query: &str) -> Result<String, ApiError> {
        let embeddings = self.llm.embed(&[query.to_string()]).await?;
        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("embedding response was empty".to_string()))?;

        let hits = self.store.query(&embedding, self.retrieval_k).await?;
        if hits.is_empty() {
            return Ok("I couldn't find anything relevant in the knowledge base.".to_string());
        }

        let context = build_context(&hits);
        tracing::debug!("RAG retrieved {} chunks for '{}'", hits.len(), query);

        let messages = vec![
            ChatMessage::system(ANSWER_PROMPT),
            ChatMessage::user(format!("Context:\n{}\n\nQuestion: {}", context, query)),
        ];
        let reply = self.llm.chat(ChatRequest::new(messages)).await?;
        Ok(reply
            .content
            .unwrap_or_else(|| "No response generated".to_string()))
    }
}

fn build_context(hits: &[ChunkHit]) -> String {
    hits.iter()
        .map(|hit| format!("[{}] {}", hit.chunk.source, hit.chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::store::StoredChunk;

    fn hit(source: &str, content: &str) -> ChunkHit {
        ChunkHit {
            chunk: StoredChunk {
                chunk_id: "c".to_string(),
                content: content.to_string(),
                source: source.to_string(),
                metadata: None,
            },
            score: 0.9,
        }
    }

    #[test]
    fn context_lists_sources_with_content() {
        let context = build_context(&[hit("Alan Turing", "born 1912"), hit("Enigma", "cipher")]);
        assert_eq!(context, "[Alan Turing] born 1912\n\n[Enigma] cipher");
    }
}
