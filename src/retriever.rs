//! Recuperación semántica de chunks relevantes para una consulta.

use std::sync::Arc;

use tracing::{debug, error};

use crate::{
    error::{RagError, Result},
    models::RetrievalHit,
    vector_store::{RecordIndex, SearchQuery},
};

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn RecordIndex>,
    namespace: String,
}

impl Retriever {
    pub fn new(index: Arc<dyn RecordIndex>, namespace: &str) -> Self {
        Self {
            index,
            namespace: namespace.to_string(),
        }
    }

    /// Devuelve como mucho `top_k` hits en el orden del proveedor. Cualquier
    /// fallo se registra y se trata como "sin contexto": lista vacía.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<RetrievalHit> {
        match self.try_search(query, top_k).await {
            Ok(hits) => {
                debug!("{} chunks recuperados para la consulta", hits.len());
                hits
            }
            Err(err) => {
                error!("Error de búsqueda: {err:?}");
                Vec::new()
            }
        }
    }

    /// Como `search`, pero sin degradar: todo fallo es `RagError::Retrieval`.
    pub async fn try_search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalHit>> {
        let response = self
            .index
            .search(&self.namespace, &SearchQuery::chunk_text(query, top_k))
            .await
            .map_err(|e| RagError::Retrieval(e.to_string()))?;
        let mut hits = response
            .normalize()
            .map_err(|e| RagError::Retrieval(e.to_string()))?;
        hits.truncate(top_k);
        Ok(hits)
    }
}
