//! Integración con Pinecone como vector store con embedding integrado.
//!
//! API pública:
//!   - traits `IndexCatalog` (plano de control) y `RecordIndex` (plano de datos),
//!   - `ensure_index(&dyn IndexCatalog, &AppConfig)`,
//!   - `PineconeClient` / `PineconeIndex`, implementación REST sobre `reqwest`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::config::AppConfig;
use crate::error::{RagError, Result};
use crate::models::{IndexedRecord, TEXT_FIELD};
use crate::search_response::SearchResponse;

pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2025-01";
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const READY_MAX_POLLS: usize = 60;

/// Petición de creación de un índice con embedding integrado.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegratedIndexSpec {
    pub name: String,
    pub cloud: String,
    pub region: String,
    pub embed: EmbedSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedSpec {
    pub model: String,
    /// Qué campo del registro contiene el texto a embeber.
    pub field_map: HashMap<String, String>,
}

impl IntegratedIndexSpec {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            name: cfg.index_name.clone(),
            cloud: cfg.cloud.clone(),
            region: cfg.region.clone(),
            embed: EmbedSpec {
                model: cfg.embedding_model.clone(),
                field_map: HashMap::from([("text".to_string(), TEXT_FIELD.to_string())]),
            },
        }
    }
}

/// Búsqueda semántica por texto; el proveedor embebe la consulta.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    pub fields: Vec<String>,
}

impl SearchQuery {
    pub fn chunk_text(text: &str, top_k: usize) -> Self {
        Self {
            text: text.to_string(),
            top_k,
            fields: vec![TEXT_FIELD.to_string()],
        }
    }
}

#[async_trait]
pub trait IndexCatalog: Send + Sync {
    async fn list_indexes(&self) -> Result<Vec<String>>;

    async fn create_index_for_model(&self, spec: &IntegratedIndexSpec) -> Result<()>;

    /// Devuelve un handle al plano de datos del índice.
    async fn index(&self, name: &str) -> Result<Arc<dyn RecordIndex>>;
}

#[async_trait]
pub trait RecordIndex: Send + Sync {
    async fn upsert_records(&self, namespace: &str, records: &[IndexedRecord]) -> Result<()>;

    async fn search(&self, namespace: &str, query: &SearchQuery) -> Result<SearchResponse>;
}

/// Garantiza que el índice con embedding integrado exista. Idempotente.
/// Devuelve `true` si lo ha tenido que crear.
pub async fn ensure_index(catalog: &dyn IndexCatalog, cfg: &AppConfig) -> Result<bool> {
    let existing = catalog.list_indexes().await?;
    if existing.iter().any(|name| name == &cfg.index_name) {
        info!("Índice '{}' ya existe.", cfg.index_name);
        return Ok(false);
    }

    info!(
        "Creando índice '{}' (modelo {}, {}/{})...",
        cfg.index_name, cfg.embedding_model, cfg.cloud, cfg.region
    );
    catalog
        .create_index_for_model(&IntegratedIndexSpec::from_config(cfg))
        .await?;
    info!("Índice '{}' creado.", cfg.index_name);
    Ok(true)
}

/// Comprueba que el índice exista antes de atender consultas.
pub async fn require_index(catalog: &dyn IndexCatalog, cfg: &AppConfig) -> Result<()> {
    let existing = catalog.list_indexes().await?;
    if existing.iter().any(|name| name == &cfg.index_name) {
        Ok(())
    } else {
        Err(RagError::Configuration(format!(
            "No se encontró el índice '{}'. Ejecuta primero el comando `index`.",
            cfg.index_name
        )))
    }
}

// ---------------------------------------------------------------------
// PINECONE (REST)
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

/// Cliente del plano de control de Pinecone.
#[derive(Clone)]
pub struct PineconeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: Url,
}

impl PineconeClient {
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Self::new(cfg.require_pinecone_key()?, CONTROL_PLANE_URL)
    }

    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: Url::parse(base_url)?,
        })
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let url = endpoint(&self.base_url, &["indexes", name])?;
        let response = authorized(&self.http, Method::GET, url, &self.api_key)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Espera a que el índice recién creado acepte escrituras.
    async fn wait_until_ready(&self, name: &str) -> Result<()> {
        for _ in 0..READY_MAX_POLLS {
            let description = self.describe_index(name).await?;
            if description.status.map(|s| s.ready).unwrap_or(false) {
                return Ok(());
            }
            debug!("Índice '{name}' aún no está listo...");
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        Err(RagError::Configuration(format!(
            "El índice '{name}' no quedó listo a tiempo"
        )))
    }
}

#[async_trait]
impl IndexCatalog for PineconeClient {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let url = endpoint(&self.base_url, &["indexes"])?;
        let response = authorized(&self.http, Method::GET, url, &self.api_key)
            .send()
            .await?;
        let list: IndexList = check_status(response).await?.json().await?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    async fn create_index_for_model(&self, spec: &IntegratedIndexSpec) -> Result<()> {
        let url = endpoint(&self.base_url, &["indexes", "create-for-model"])?;
        let response = authorized(&self.http, Method::POST, url, &self.api_key)
            .json(spec)
            .send()
            .await?;
        check_status(response).await?;
        self.wait_until_ready(&spec.name).await
    }

    async fn index(&self, name: &str) -> Result<Arc<dyn RecordIndex>> {
        let description = self.describe_index(name).await?;
        if description.host.is_empty() {
            return Err(RagError::Configuration(format!(
                "El índice '{name}' no tiene host asignado"
            )));
        }
        Ok(Arc::new(PineconeIndex::new(
            self.http.clone(),
            &self.api_key,
            &description.host,
        )?))
    }
}

/// Handle al plano de datos de un índice concreto.
#[derive(Clone)]
pub struct PineconeIndex {
    http: reqwest::Client,
    api_key: String,
    host: Url,
}

impl PineconeIndex {
    pub fn new(http: reqwest::Client, api_key: &str, host: &str) -> Result<Self> {
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            Url::parse(host)?
        } else {
            Url::parse(&format!("https://{host}"))?
        };
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            host,
        })
    }
}

#[async_trait]
impl RecordIndex for PineconeIndex {
    async fn upsert_records(&self, namespace: &str, records: &[IndexedRecord]) -> Result<()> {
        let url = endpoint(&self.host, &["records", "namespaces", namespace, "upsert"])?;
        let response = authorized(&self.http, Method::POST, url, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(ndjson_body(records)?)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn search(&self, namespace: &str, query: &SearchQuery) -> Result<SearchResponse> {
        let url = endpoint(&self.host, &["records", "namespaces", namespace, "search"])?;
        let body = json!({
            "query": {
                "inputs": { "text": query.text },
                "top_k": query.top_k,
            },
            "fields": query.fields,
        });
        let response = authorized(&self.http, Method::POST, url, &self.api_key)
            .json(&body)
            .send()
            .await?;
        let raw: serde_json::Value = check_status(response).await?.json().await?;
        SearchResponse::from_json(raw)
    }
}

fn authorized(http: &reqwest::Client, method: Method, url: Url, api_key: &str) -> RequestBuilder {
    http.request(method, url)
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
}

pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RagError::Configuration(format!("URL base inválida: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Un registro JSON por línea, como exige el upsert de registros.
fn ndjson_body(records: &[IndexedRecord]) -> Result<String> {
    let lines = records
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RagError::Http {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_built_from_segments() {
        let base = Url::parse(CONTROL_PLANE_URL).unwrap();
        assert_eq!(
            endpoint(&base, &["indexes", "insurance-terms"]).unwrap().as_str(),
            "https://api.pinecone.io/indexes/insurance-terms"
        );

        let host = PineconeIndex::new(reqwest::Client::new(), "k", "terms-abc.svc.pinecone.io")
            .unwrap()
            .host;
        assert_eq!(
            endpoint(&host, &["records", "namespaces", "__default__", "search"])
                .unwrap()
                .as_str(),
            "https://terms-abc.svc.pinecone.io/records/namespaces/__default__/search"
        );
    }

    #[test]
    fn index_spec_maps_text_to_chunk_field() {
        let spec = IntegratedIndexSpec::from_config(&AppConfig::default());
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["name"], "insurance-terms");
        assert_eq!(json["cloud"], "aws");
        assert_eq!(json["region"], "us-east-1");
        assert_eq!(json["embed"]["model"], "multilingual-e5-large");
        assert_eq!(json["embed"]["field_map"]["text"], "chunk_text");
    }

    #[test]
    fn ndjson_has_one_record_per_line() {
        let records: Vec<IndexedRecord> = (0..3)
            .map(|i| IndexedRecord {
                id: format!("id-{i}"),
                text: format!("chunk {i}"),
                chunk_index: i,
                source: "terms.pdf".to_string(),
            })
            .collect();
        let body = ndjson_body(&records).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["_id"], "id-1");
        assert_eq!(second["chunk_text"], "chunk 1");
    }

    #[test]
    fn search_query_requests_only_the_chunk_field() {
        let query = SearchQuery::chunk_text("해지환급금", 5);
        assert_eq!(query.fields, vec!["chunk_text".to_string()]);
        assert_eq!(query.top_k, 5);
    }
}
