//! Consulta RAG sobre las condiciones de la póliza.
//!
//! Flujo:
//!   1. Búsqueda semántica de los `top_k` chunks más relevantes.
//!   2. Si no hay resultados, respuesta fija sin llamar al modelo.
//!   3. Generación de la respuesta con los chunks como contexto.
//!   4. Empaquetado de las fuentes como vistas previas truncadas.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::{
    config::AppConfig,
    error::Result,
    generator::AnswerGenerator,
    llm::GenerationModel,
    models::{ChatTurn, SourcePreview},
    retriever::Retriever,
    vector_store::{self, IndexCatalog},
};

/// Orquestador de una consulta. No guarda estado mutable entre llamadas, así
/// que puede compartirse entre peticiones concurrentes.
#[derive(Clone)]
pub struct RagChatbot {
    retriever: Retriever,
    generator: AnswerGenerator,
    top_k: usize,
}

impl RagChatbot {
    pub fn new(retriever: Retriever, generator: AnswerGenerator, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k,
        }
    }

    /// Conecta con el índice configurado; falla si todavía no existe.
    pub async fn connect(
        cfg: &AppConfig,
        catalog: Arc<dyn IndexCatalog>,
        model: Arc<dyn GenerationModel>,
    ) -> Result<Self> {
        vector_store::require_index(catalog.as_ref(), cfg).await?;
        let index = catalog.index(&cfg.index_name).await?;
        info!("Conectado al índice '{}'", cfg.index_name);

        Ok(Self::new(
            Retriever::new(index, &cfg.namespace),
            AnswerGenerator::new(model, cfg.prompt_language),
            cfg.top_k,
        ))
    }

    /// Lanza una consulta RAG y devuelve la respuesta con sus fuentes.
    pub async fn chat(&self, query: &str) -> ChatTurn {
        let hits = self.retriever.search(query, self.top_k).await;

        if hits.is_empty() {
            return ChatTurn {
                query: query.to_string(),
                response: self.generator.language().no_content_message().to_string(),
                sources: Vec::new(),
                created_at: Utc::now(),
            };
        }

        let response = self.generator.generate(query, &hits).await;
        ChatTurn {
            query: query.to_string(),
            response,
            sources: hits.iter().map(SourcePreview::from_hit).collect(),
            created_at: Utc::now(),
        }
    }
}
