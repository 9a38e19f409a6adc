//! Chat-agent backend over a Wikipedia knowledge base.
//!
//! An axum HTTP server fronts a tool-calling agent: the model decides per
//! turn whether to consult the RAG pipeline, the weather client, or the
//! calculator, and per-session memory keeps conversations coherent.

pub mod agent;
pub mod config;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod server;
pub mod state;
pub mod tools;
