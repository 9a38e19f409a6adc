pub mod chain;
pub mod chroma;
pub mod index;
pub mod splitter;
pub mod store;

pub use chain::{RagChain, Retriever};
pub use chroma::ChromaStore;
pub use splitter::TextSplitter;
pub use store::{ChunkHit, StoredChunk, VectorStore};
