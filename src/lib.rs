//! Chatbot RAG sobre condiciones de pólizas de seguro.
//!
//! Indexa documentos en Pinecone (embedding integrado) y responde preguntas
//! con Gemini usando los chunks recuperados como contexto.

pub mod api;
pub mod app_state;
pub mod chunking;
pub mod config;
pub mod error;
pub mod extract;
pub mod generator;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod rag;
pub mod retriever;
pub mod search_response;
pub mod vector_store;

pub use error::{RagError, Result};
