//! Modelos de dominio: chunks, registros indexados, resultados de búsqueda y
//! turnos de chat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Nombre del campo que el proveedor embebe automáticamente.
pub const TEXT_FIELD: &str = "chunk_text";

/// Longitud máxima (en caracteres) de la vista previa de una fuente.
pub const PREVIEW_CHARS: usize = 200;
pub const PREVIEW_ELLIPSIS: &str = "...";

/// Trozo ordenado de un documento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub source: String,
}

/// Registro que se sube al índice vectorial con embedding integrado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "chunk_text")]
    pub text: String,
    pub chunk_index: usize,
    pub source: String,
}

impl IndexedRecord {
    /// Crea el registro de un chunk con un identificador nuevo.
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: chunk.text.clone(),
            chunk_index: chunk.index,
            source: chunk.source.clone(),
        }
    }
}

/// Resultado de búsqueda normalizado.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub text: String,
    pub score: f64,
    pub metadata: Map<String, Value>,
}

/// Vista previa de una fuente citada en la respuesta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePreview {
    pub text: String,
    pub score: f64,
}

impl SourcePreview {
    /// Primeros 200 caracteres del chunk más `...`, siempre, aunque el texto
    /// sea más corto.
    pub fn from_hit(hit: &RetrievalHit) -> Self {
        let mut text: String = hit.text.chars().take(PREVIEW_CHARS).collect();
        text.push_str(PREVIEW_ELLIPSIS);
        Self {
            text,
            score: hit.score,
        }
    }
}

/// Un intercambio pregunta/respuesta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub query: String,
    pub response: String,
    pub sources: Vec<SourcePreview>,
    pub created_at: DateTime<Utc>,
}
