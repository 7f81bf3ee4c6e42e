//! Formas de respuesta de búsqueda del proveedor vectorial y su normalización.
//!
//! El proveedor puede responder con:
//!   1. `result.hits[]`, cada hit con `fields` y `_score`.
//!   2. `matches[]`, cada match con `metadata` y `score`.
//!   3. Un mapa genérico que contiene alguna de las dos listas anteriores,
//!      con entradas que pueden usar `fields` o `metadata` y `score` o `_score`.
//!
//! La forma se elige por inspección estructural de las claves presentes.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{RagError, Result};
use crate::models::{RetrievalHit, TEXT_FIELD};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HitsEnvelope {
    pub result: HitsResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HitsResult {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_score", alias = "score", default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchesEnvelope {
    #[serde(default)]
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Match {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Respuesta de búsqueda tal como la devuelve el proveedor.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResponse {
    Hits(HitsEnvelope),
    Matches(MatchesEnvelope),
    Mapping(Map<String, Value>),
}

impl SearchResponse {
    /// Decodifica el JSON crudo eligiendo la forma tipada cuando encaja; si no,
    /// lo conserva como mapa genérico.
    pub fn from_json(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(RagError::UnrecognizedResponseShape(format!(
                    "se esperaba un objeto JSON, se recibió: {other}"
                )));
            }
        };

        if map.get("result").and_then(|r| r.get("hits")).is_some() {
            if let Ok(envelope) = serde_json::from_value(Value::Object(map.clone())) {
                return Ok(Self::Hits(envelope));
            }
        } else if map.contains_key("matches") {
            if let Ok(envelope) = serde_json::from_value(Value::Object(map.clone())) {
                return Ok(Self::Matches(envelope));
            }
        }
        Ok(Self::Mapping(map))
    }

    /// Convierte cualquier forma en una lista uniforme de `RetrievalHit`,
    /// conservando el orden del proveedor.
    pub fn normalize(self) -> Result<Vec<RetrievalHit>> {
        match self {
            Self::Hits(envelope) => Ok(envelope
                .result
                .hits
                .into_iter()
                .map(|hit| to_retrieval_hit(hit.fields, hit.score))
                .collect()),
            Self::Matches(envelope) => Ok(envelope
                .matches
                .into_iter()
                .map(|m| to_retrieval_hit(m.metadata, m.score))
                .collect()),
            Self::Mapping(map) => normalize_mapping(&map),
        }
    }
}

fn to_retrieval_hit(fields: Option<Map<String, Value>>, score: Option<f64>) -> RetrievalHit {
    let metadata = fields.unwrap_or_default();
    let text = metadata
        .get(TEXT_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    RetrievalHit {
        text,
        score: score.unwrap_or(0.0),
        metadata,
    }
}

fn normalize_mapping(map: &Map<String, Value>) -> Result<Vec<RetrievalHit>> {
    let nested_hits = map
        .get("result")
        .and_then(|r| r.get("hits"))
        .and_then(Value::as_array)
        .filter(|hits| !hits.is_empty());
    let entries = match nested_hits.or_else(|| map.get("matches").and_then(Value::as_array)) {
        Some(entries) => entries,
        None if map.get("result").and_then(|r| r.get("hits")).is_some() => {
            return Ok(Vec::new());
        }
        None => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            return Err(RagError::UnrecognizedResponseShape(format!(
                "ni 'result.hits' ni 'matches' presentes (claves: {keys:?})"
            )));
        }
    };

    entries
        .iter()
        .map(|entry| {
            let entry = entry.as_object().ok_or_else(|| {
                RagError::UnrecognizedResponseShape(format!("entrada no es un objeto: {entry}"))
            })?;
            Ok(to_retrieval_hit(entry_fields(entry), entry_score(entry)))
        })
        .collect()
}

/// `fields` si existe y no está vacío; si no, `metadata`.
fn entry_fields(entry: &Map<String, Value>) -> Option<Map<String, Value>> {
    let non_empty = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_object)
            .filter(|m| !m.is_empty())
            .cloned()
    };
    non_empty("fields").or_else(|| non_empty("metadata"))
}

/// `score` tiene prioridad sobre `_score`; un `null` cuenta como ausente.
fn entry_score(entry: &Map<String, Value>) -> Option<f64> {
    match entry.get("score") {
        Some(score) => score.as_f64(),
        None => entry.get("_score").and_then(Value::as_f64),
    }
}
