use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::Router;
use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use insurance_rag_chatbot::{
    api,
    app_state::{AppState, Status},
    config::AppConfig,
    ingest::Indexer,
    llm::GeminiClient,
    rag::RagChatbot,
    vector_store::PineconeClient,
};

#[derive(Parser)]
#[command(name = "insurance-rag", about = "Chatbot RAG sobre condiciones de pólizas de seguro")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Arranca el servidor web del chatbot (por defecto).
    Serve,
    /// Indexa un documento o un directorio en Pinecone.
    Index { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env().context("Error al cargar la configuración")?;
    report_missing_keys(&cfg);

    match Cli::parse().command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg).await,
        Command::Index { path } => index(cfg, path).await,
    }
}

/// Avisa al operador de las claves que faltan; el comando que las necesite
/// fallará después con un error de configuración.
fn report_missing_keys(cfg: &AppConfig) {
    if cfg.pinecone_api_key.is_none() {
        warn!("❌ PINECONE_API_KEY no está configurada");
    }
    if cfg.gemini_api_key.is_none() {
        warn!("❌ GEMINI_API_KEY no está configurada");
    }
}

async fn index(cfg: AppConfig, path: PathBuf) -> Result<()> {
    let catalog = Arc::new(PineconeClient::from_config(&cfg)?);
    let indexer = Indexer::new(catalog, &cfg);

    if path.is_dir() {
        let status = Arc::new(Mutex::new(Status::ready()));
        let summary = indexer.build_index_dir(&path, status).await?;
        info!("✅ Indexación completada. {summary}");
    } else {
        let uploaded = indexer
            .build_index(&path)
            .await
            .with_context(|| format!("Error indexando {}", path.display()))?;
        info!("✅ Subida completada: {uploaded} registros.");
    }
    Ok(())
}

async fn serve(cfg: AppConfig) -> Result<()> {
    // 3. Conectar con Pinecone y Gemini; el índice debe existir
    let catalog = Arc::new(PineconeClient::from_config(&cfg)?);
    let model = Arc::new(GeminiClient::from_config(&cfg)?);
    let chatbot = RagChatbot::connect(&cfg, catalog.clone(), model)
        .await
        .context("Error inicializando el chatbot")?;

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 4. Crear estado compartido de la aplicación
    let app_state = AppState::new(cfg.clone(), chatbot, catalog, Some(shutdown_tx));

    // 5. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&cfg.server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {}", cfg.server_addr))?;
    let server_url = format!("http://{}", cfg.server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if cfg.open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .map_err(|e| {
            error!("Error del servidor: {e}");
            e
        })?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
