//! Taxonomía de errores del núcleo RAG.
//!
//! Sólo `Extraction` y `Upload` llegan al llamador de la indexación; los
//! errores de recuperación y de generación se degradan localmente.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Credenciales ausentes, parámetros inválidos o índice inexistente.
    #[error("Error de configuración: {0}")]
    Configuration(String),

    /// El documento no produjo texto utilizable.
    #[error("Error de extracción ({path}): {message}")]
    Extraction { path: String, message: String },

    /// Búsqueda fallida o respuesta ilegible; el `Retriever` la degrada a
    /// una lista vacía.
    #[error("Error de recuperación: {0}")]
    Retrieval(String),

    #[error("Error de generación: {0}")]
    Generation(String),

    /// Fallo de un upsert por lotes; los lotes anteriores ya quedaron subidos.
    #[error("Error subiendo el lote {batch} ({records} registros): {message}")]
    Upload {
        batch: usize,
        records: usize,
        message: String,
    },

    /// La respuesta de búsqueda no coincide con ninguna forma conocida.
    #[error("Forma de respuesta de búsqueda no reconocida: {0}")]
    UnrecognizedResponseShape(String),

    #[error("Error HTTP ({status}): {body}")]
    Http { status: u16, body: String },

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, RagError>;
