//! Abstracción sobre el proveedor de generación de texto.
//! De momento se implementa Gemini (`streamGenerateContent` vía SSE).

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures::{future, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::AppConfig;
use crate::error::{RagError, Result};
use crate::vector_store::{check_status, endpoint};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Presupuesto de razonamiento sin límite (el modelo decide).
pub const UNBOUNDED_THINKING_BUDGET: i32 = -1;

/// Fragmentos de texto en orden de llegada.
pub type FragmentStream = BoxStream<'static, Result<String>>;

// --- Petición ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<GoogleSearch>,
}

impl Tool {
    pub fn google_search() -> Self {
        Self {
            google_search: Some(GoogleSearch {}),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    pub generation_config: GenerationConfig,
}

// --- Respuesta (un chunk por evento SSE) ---

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

/// Texto visible de un chunk: partes de texto del primer candidato,
/// excluyendo las de razonamiento.
fn chunk_text(data: &str) -> Result<String> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    if let Some(err) = chunk.error {
        return Err(RagError::Generation(format!(
            "Gemini devolvió un error ({}): {}",
            err.code.unwrap_or_default(),
            err.message
        )));
    }
    Ok(chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default())
}

#[async_trait]
pub trait GenerationModel: Send + Sync {
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<FragmentStream>;
}

/// Cliente de Gemini sobre la API REST.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: Url,
    model: String,
}

impl GeminiClient {
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Self::new(cfg.require_gemini_key()?, GEMINI_BASE_URL, &cfg.chat_model)
    }

    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: Url::parse(base_url)?,
            model: model.to_string(),
        })
    }

    fn stream_url(&self) -> Result<Url> {
        let method = format!("{}:streamGenerateContent", self.model);
        let mut url = endpoint(&self.base_url, &["models", method.as_str()])?;
        url.query_pairs_mut().append_pair("alt", "sse");
        Ok(url)
    }
}

#[async_trait]
impl GenerationModel for GeminiClient {
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<FragmentStream> {
        debug!("Streaming desde Gemini con el modelo {}", self.model);
        let response = self
            .http
            .post(self.stream_url()?)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let fragments = response
            .bytes_stream()
            .eventsource()
            .map(|event| match event {
                Ok(event) => chunk_text(&event.data),
                Err(e) => Err(RagError::Generation(format!("Error leyendo el stream SSE: {e}"))),
            })
            .try_filter(|text| future::ready(!text.is_empty()));

        Ok(fragments.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_gemini_wire_format() {
        let request = GenerateRequest {
            contents: vec![Content::user_text("질문")],
            tools: vec![Tool::google_search()],
            generation_config: GenerationConfig {
                thinking_config: Some(ThinkingConfig {
                    thinking_budget: UNBOUNDED_THINKING_BUDGET,
                }),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "질문");
        assert_eq!(json["tools"][0]["googleSearch"], serde_json::json!({}));
        assert_eq!(json["generationConfig"]["thinkingConfig"]["thinkingBudget"], -1);
    }

    #[test]
    fn stream_url_targets_sse_endpoint() {
        let client = GeminiClient::new("key", GEMINI_BASE_URL, "gemini-flash-latest").unwrap();
        assert_eq!(
            client.stream_url().unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-flash-latest:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn chunk_text_skips_thought_parts() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[
            {"text":"생각 중...","thought":true},
            {"text":"제3조에 따르면 "},
            {"text":"보험금이 지급됩니다."}
        ]}}]}"#;
        assert_eq!(chunk_text(data).unwrap(), "제3조에 따르면 보험금이 지급됩니다.");
    }

    #[test]
    fn chunk_without_text_is_empty() {
        let data = r#"{"candidates":[{"finishReason":"STOP"}],"usageMetadata":{"totalTokenCount":10}}"#;
        assert_eq!(chunk_text(data).unwrap(), "");
    }

    #[test]
    fn api_error_in_stream_is_a_generation_error() {
        let data = r#"{"error":{"code":429,"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = chunk_text(data).unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn malformed_chunk_is_reported() {
        assert!(matches!(chunk_text("not json"), Err(RagError::Json(_))));
    }
}
