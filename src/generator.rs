//! Generación de la respuesta: prompt de anclaje a partir de los chunks
//! recuperados y acumulación del stream del modelo.

use std::sync::Arc;

use futures::StreamExt;
use tracing::warn;

use crate::{
    config::PromptLanguage,
    error::Result,
    llm::{
        Content, GenerateRequest, GenerationConfig, GenerationModel, ThinkingConfig, Tool,
        UNBOUNDED_THINKING_BUDGET,
    },
    models::RetrievalHit,
};

/// Plantilla de prompt partida alrededor del contexto y de la pregunta.
struct Template {
    intro: &'static str,
    question_heading: &'static str,
    guidelines: &'static str,
}

const KOREAN_TEMPLATE: Template = Template {
    intro: "당신은 보험약관 전문가입니다. 다음 보험약관 문서를 참고하여 사용자의 질문에 정확하고 친절하게 답변해주세요.

[보험약관 문서]
",
    question_heading: "

[사용자 질문]
",
    guidelines: "

[답변 지침]
- 제공된 보험약관 문서의 내용을 기반으로 답변하세요.
- 문서에 없는 내용은 추측하지 말고, 문서에 명시된 내용만을 인용하세요.
- 답변은 명확하고 이해하기 쉽게 작성하세요.
- 필요시 관련 조항의 번호나 위치를 언급하세요.

답변:",
};

const ENGLISH_TEMPLATE: Template = Template {
    intro: "You are an expert on insurance policy terms. Using the policy documents below, answer the user's question accurately and helpfully.

[Policy documents]
",
    question_heading: "

[User question]
",
    guidelines: "

[Answer guidelines]
- Base your answer on the supplied policy documents.
- Do not speculate about anything the documents do not say; quote only what they state.
- Write the answer clearly and in an easy-to-understand way.
- Mention the relevant clause numbers or locations when useful.

Answer:",
};

impl PromptLanguage {
    fn template(self) -> &'static Template {
        match self {
            Self::Korean => &KOREAN_TEMPLATE,
            Self::English => &ENGLISH_TEMPLATE,
        }
    }

    fn document_label(self, position: usize) -> String {
        match self {
            Self::Korean => format!("[문서 {position}]"),
            Self::English => format!("[Document {position}]"),
        }
    }

    /// Mensaje que sustituye a la respuesta cuando la generación falla.
    pub fn generation_error_message(self, error: &str) -> String {
        match self {
            Self::Korean => format!("응답 생성 중 오류가 발생했습니다: {error}"),
            Self::English => format!("An error occurred while generating the answer: {error}"),
        }
    }

    /// Respuesta fija cuando la recuperación no encuentra nada.
    pub fn no_content_message(self) -> &'static str {
        match self {
            Self::Korean => "관련된 보험약관 내용을 찾을 수 없습니다.",
            Self::English => "No relevant insurance policy content was found.",
        }
    }
}

/// Construye el prompt: cada chunk bajo `[Documento i]` (base 1), separados
/// por líneas en blanco, seguido de la pregunta literal.
pub fn build_prompt(query: &str, chunks: &[RetrievalHit], language: PromptLanguage) -> String {
    let context = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("{}\n{}", language.document_label(i + 1), chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let template = language.template();
    format!(
        "{}{context}{}{query}{}",
        template.intro, template.question_heading, template.guidelines
    )
}

#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn GenerationModel>,
    language: PromptLanguage,
    web_search: bool,
    thinking_budget: Option<i32>,
}

impl AnswerGenerator {
    /// Generador con búsqueda web y razonamiento sin límite activados.
    pub fn new(model: Arc<dyn GenerationModel>, language: PromptLanguage) -> Self {
        Self {
            model,
            language,
            web_search: true,
            thinking_budget: Some(UNBOUNDED_THINKING_BUDGET),
        }
    }

    pub fn language(&self) -> PromptLanguage {
        self.language
    }

    pub fn request_for(&self, query: &str, chunks: &[RetrievalHit]) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content::user_text(&build_prompt(query, chunks, self.language))],
            tools: if self.web_search {
                vec![Tool::google_search()]
            } else {
                Vec::new()
            },
            generation_config: GenerationConfig {
                thinking_config: self
                    .thinking_budget
                    .map(|thinking_budget| ThinkingConfig { thinking_budget }),
            },
        }
    }

    /// Devuelve la respuesta completa. Nunca falla: un error se convierte en
    /// un mensaje legible que ocupa el lugar de la respuesta.
    pub async fn generate(&self, query: &str, chunks: &[RetrievalHit]) -> String {
        match self.try_generate(query, chunks).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!("Error generando respuesta: {err:?}");
                self.language.generation_error_message(&err.to_string())
            }
        }
    }

    async fn try_generate(&self, query: &str, chunks: &[RetrievalHit]) -> Result<String> {
        let request = self.request_for(query, chunks);
        let mut fragments = self.model.generate_stream(&request).await?;

        let mut answer = String::new();
        while let Some(fragment) = fragments.next().await {
            answer.push_str(&fragment?);
        }
        Ok(answer)
    }
}
