use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::spawn;
use tracing::{error, info};

use crate::{
    app_state::{AppState, Status},
    ingest::Indexer,
    models::ChatTurn,
};

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct ChatPayload {
    question: String,
}

#[derive(Deserialize)]
pub struct IndexPayload {
    path: String,
}

#[derive(Serialize)]
pub struct ConfigInfo {
    gemini_api_key_set: bool,
    pinecone_api_key_set: bool,
    index_name: String,
    embedding_model: String,
    chat_model: String,
    top_k: usize,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/history", get(history_handler).delete(clear_history_handler))
        .route("/api/index", post(index_handler))
        .route("/api/status", get(status_handler))
        .route("/api/config-info", get(config_info_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatTurn>, ApiError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "La pregunta está vacía."));
    }

    let turn = state.chatbot.chat(question).await;
    lock(&state.history).push(turn.clone());
    Ok(Json(turn))
}

#[axum::debug_handler]
async fn history_handler(State(state): State<AppState>) -> Json<Vec<ChatTurn>> {
    Json(lock(&state.history).clone())
}

#[axum::debug_handler]
async fn clear_history_handler(State(state): State<AppState>) -> StatusCode {
    lock(&state.history).clear();
    StatusCode::NO_CONTENT
}

/// Indexa un fichero o un directorio en segundo plano; el progreso se
/// consulta en `/api/status`.
#[axum::debug_handler]
async fn index_handler(
    State(state): State<AppState>,
    Json(payload): Json<IndexPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let path = PathBuf::from(&payload.path);
    if !path.exists() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "La ruta proporcionada no existe.",
        ));
    }
    {
        let mut status = lock(&state.status);
        if status.is_busy {
            return Err(api_error(
                StatusCode::CONFLICT,
                "Ya hay una indexación en curso.",
            ));
        }
        status.is_busy = true;
        status.message = "Iniciando indexación...".to_string();
        status.progress = 0.0;
    }

    // El supervisor libera `is_busy` aunque la tarea de indexación entre en pánico.
    spawn(async move {
        let outcome = spawn(run_indexing(state.clone(), path)).await;
        let message = match outcome {
            Ok(Ok(summary)) => format!("¡Indexación completada! {summary}"),
            Ok(Err(err)) => {
                error!("Error de indexación: {err}");
                format!("Error en la indexación: {err}")
            }
            Err(join_err) => {
                error!("La tarea de indexación terminó de forma anómala: {join_err}");
                format!("Error en la indexación: {join_err}")
            }
        };

        let mut status = lock(&state.status);
        status.is_busy = false;
        status.progress = 0.0;
        status.message = message;
    });

    Ok(StatusCode::ACCEPTED)
}

async fn run_indexing(state: AppState, path: PathBuf) -> crate::error::Result<String> {
    let indexer = Indexer::new(state.catalog.clone(), &state.config);
    if path.is_dir() {
        indexer
            .build_index_dir(&path, state.status.clone())
            .await
            .map(|summary| summary.to_string())
    } else {
        indexer
            .build_index(&path)
            .await
            .map(|uploaded| format!("{uploaded} registros subidos desde {}", path.display()))
    }
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(lock(&state.status).clone())
}

#[axum::debug_handler]
async fn config_info_handler(State(state): State<AppState>) -> Json<ConfigInfo> {
    let cfg = &state.config;
    Json(ConfigInfo {
        gemini_api_key_set: cfg.gemini_api_key.is_some(),
        pinecone_api_key_set: cfg.pinecone_api_key.is_some(),
        index_name: cfg.index_name.clone(),
        embedding_model: cfg.embedding_model.clone(),
        chat_model: cfg.chat_model.clone(),
        top_k: cfg.top_k,
    })
}

// --- Handler de Apagado ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = lock(&state.shutdown_sender).take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}
