//! Dobles en memoria de los proveedores vectorial y de generación.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use insurance_rag_chatbot::{
    config::AppConfig,
    error::{RagError, Result},
    llm::{FragmentStream, GenerateRequest, GenerationModel},
    models::IndexedRecord,
    search_response::SearchResponse,
    vector_store::{IndexCatalog, IntegratedIndexSpec, RecordIndex, SearchQuery},
};

/// Índice que registra cada upsert y responde búsquedas con un JSON fijo.
#[derive(Default)]
pub struct RecordingIndex {
    pub upserts: Mutex<Vec<Vec<IndexedRecord>>>,
    pub searches: Mutex<Vec<SearchQuery>>,
    pub search_reply: Mutex<Option<Value>>,
    pub fail_search: bool,
    /// Número de upsert (base 1) que debe fallar.
    pub fail_on_upsert: Option<usize>,
}

impl RecordingIndex {
    pub fn replying(reply: Value) -> Self {
        Self {
            search_reply: Mutex::new(Some(reply)),
            ..Self::default()
        }
    }

    pub fn upsert_sizes(&self) -> Vec<usize> {
        self.upserts.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn uploaded(&self) -> Vec<IndexedRecord> {
        self.upserts.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl RecordIndex for RecordingIndex {
    async fn upsert_records(&self, _namespace: &str, records: &[IndexedRecord]) -> Result<()> {
        let mut upserts = self.upserts.lock().unwrap();
        if self.fail_on_upsert == Some(upserts.len() + 1) {
            return Err(RagError::Http {
                status: 500,
                body: "upsert rejected".to_string(),
            });
        }
        upserts.push(records.to_vec());
        Ok(())
    }

    async fn search(&self, _namespace: &str, query: &SearchQuery) -> Result<SearchResponse> {
        self.searches.lock().unwrap().push(query.clone());
        if self.fail_search {
            return Err(RagError::Http {
                status: 503,
                body: "search unavailable".to_string(),
            });
        }
        let reply = self
            .search_reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| json!({"result": {"hits": []}}));
        SearchResponse::from_json(reply)
    }
}

/// Catálogo que crea índices en memoria y siempre devuelve el mismo handle.
pub struct RecordingCatalog {
    pub indexes: Mutex<Vec<String>>,
    pub created: Mutex<Vec<IntegratedIndexSpec>>,
    pub index: Arc<RecordingIndex>,
}

impl RecordingCatalog {
    pub fn empty(index: Arc<RecordingIndex>) -> Self {
        Self {
            indexes: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            index,
        }
    }

    pub fn with_index(name: &str, index: Arc<RecordingIndex>) -> Self {
        let catalog = Self::empty(index);
        catalog.indexes.lock().unwrap().push(name.to_string());
        catalog
    }
}

#[async_trait]
impl IndexCatalog for RecordingCatalog {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        Ok(self.indexes.lock().unwrap().clone())
    }

    async fn create_index_for_model(&self, spec: &IntegratedIndexSpec) -> Result<()> {
        self.created.lock().unwrap().push(spec.clone());
        self.indexes.lock().unwrap().push(spec.name.clone());
        Ok(())
    }

    async fn index(&self, _name: &str) -> Result<Arc<dyn RecordIndex>> {
        Ok(self.index.clone())
    }
}

/// Modelo que emite fragmentos fijos y cuenta las llamadas.
pub struct CountingModel {
    pub calls: AtomicUsize,
    pub fragments: Vec<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl CountingModel {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationModel for CountingModel {
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .contents
            .iter()
            .flat_map(|c| c.parts.iter().map(|p| p.text.clone()))
            .collect::<String>();
        self.prompts.lock().unwrap().push(prompt);
        let fragments: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        Ok(futures::stream::iter(fragments).boxed())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        pinecone_api_key: Some("test-pinecone".to_string()),
        gemini_api_key: Some("test-gemini".to_string()),
        open_browser: false,
        ..AppConfig::default()
    }
}

pub fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}
