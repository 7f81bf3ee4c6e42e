//! Carga y gestión de configuración de la aplicación (Pinecone + Gemini).
//!
//! La configuración se construye una sola vez al arrancar el proceso y se
//! pasa por referencia a cada componente; no hay estado global.

use std::env;
use std::str::FromStr;

use crate::error::{RagError, Result};

/// Idioma de la plantilla de prompt y de los mensajes fijos al usuario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PromptLanguage {
    #[default]
    Korean,
    English,
}

impl FromStr for PromptLanguage {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ko" | "korean" => Ok(Self::Korean),
            "en" | "english" => Ok(Self::English),
            other => Err(RagError::Configuration(format!(
                "Idioma de prompt no soportado: {other}"
            ))),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub pinecone_api_key: Option<String>,
    pub gemini_api_key: Option<String>,

    pub index_name: String,
    pub embedding_model: String,
    pub cloud: String,
    pub region: String,
    pub namespace: String,

    pub chat_model: String,
    pub prompt_language: PromptLanguage,

    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub upsert_batch_size: usize,
    pub top_k: usize,

    pub server_addr: String,
    pub open_browser: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pinecone_api_key: None,
            gemini_api_key: None,
            index_name: "insurance-terms".to_string(),
            embedding_model: "multilingual-e5-large".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            namespace: "__default__".to_string(),
            chat_model: "gemini-flash-latest".to_string(),
            prompt_language: PromptLanguage::Korean,
            chunk_size: 500,
            chunk_overlap: 50,
            upsert_batch_size: 96,
            top_k: 5,
            server_addr: "127.0.0.1:3322".to_string(),
            open_browser: true,
        }
    }
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero leyendo de una función arbitraria; permite
    /// probar el parseo sin tocar el entorno del proceso.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let text = |key: &str, default: String| non_empty(key).unwrap_or(default);

        let cfg = Self {
            pinecone_api_key: non_empty("PINECONE_API_KEY"),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            index_name: text("PINECONE_INDEX_NAME", defaults.index_name),
            embedding_model: text("EMBEDDING_MODEL", defaults.embedding_model),
            cloud: text("PINECONE_CLOUD", defaults.cloud),
            region: text("PINECONE_REGION", defaults.region),
            namespace: text("PINECONE_NAMESPACE", defaults.namespace),
            chat_model: text("GEMINI_MODEL", defaults.chat_model),
            prompt_language: match non_empty("PROMPT_LANGUAGE") {
                Some(raw) => raw.parse()?,
                None => defaults.prompt_language,
            },
            chunk_size: parse_var(&non_empty, "CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var(&non_empty, "CHUNK_OVERLAP", defaults.chunk_overlap)?,
            upsert_batch_size: parse_var(
                &non_empty,
                "UPSERT_BATCH_SIZE",
                defaults.upsert_batch_size,
            )?,
            top_k: parse_var(&non_empty, "TOP_K", defaults.top_k)?,
            server_addr: text("SERVER_ADDR", defaults.server_addr),
            open_browser: parse_var(&non_empty, "OPEN_BROWSER", defaults.open_browser)?,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Comprueba los invariantes numéricos antes de construir ningún componente.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "CHUNK_OVERLAP ({}) debe ser menor que CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.upsert_batch_size == 0 {
            return Err(RagError::Configuration(
                "UPSERT_BATCH_SIZE debe ser mayor que 0".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(RagError::Configuration("TOP_K debe ser mayor que 0".to_string()));
        }
        Ok(())
    }

    pub fn require_pinecone_key(&self) -> Result<&str> {
        self.pinecone_api_key
            .as_deref()
            .ok_or_else(|| RagError::Configuration("Falta PINECONE_API_KEY en el entorno".into()))
    }

    pub fn require_gemini_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .ok_or_else(|| RagError::Configuration("Falta GEMINI_API_KEY en el entorno".into()))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            RagError::Configuration(format!("Valor inválido para {key} ('{raw}'): {e}"))
        }),
        None => Ok(default),
    }
}
