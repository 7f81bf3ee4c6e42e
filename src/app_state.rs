use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::{config::AppConfig, models::ChatTurn, rag::RagChatbot, vector_store::IndexCatalog};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub chatbot: RagChatbot,
    pub catalog: Arc<dyn IndexCatalog>,
    /// Historial lineal de la sesión; el núcleo no lo usa para responder.
    pub history: Arc<Mutex<Vec<ChatTurn>>>,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        chatbot: RagChatbot,
        catalog: Arc<dyn IndexCatalog>,
        shutdown_sender: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            config,
            chatbot,
            catalog,
            history: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(Mutex::new(Status::ready())),
            shutdown_sender: Arc::new(Mutex::new(shutdown_sender)),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}

impl Status {
    pub fn ready() -> Self {
        Self {
            is_busy: false,
            message: "Servidor listo.".to_string(),
            progress: 0.0,
        }
    }
}
