//! Indexación de documentos de póliza en el índice vectorial: extracción,
//! chunking, construcción de registros y subida por lotes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::task;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::{
    app_state::Status,
    chunking,
    config::AppConfig,
    error::{RagError, Result},
    extract::{self, DocumentKind},
    models::IndexedRecord,
    vector_store::{self, IndexCatalog, RecordIndex},
};

/// Resumen de los resultados de una operación de ingesta.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionSummary {
    pub files_scanned: u32,
    pub files_ingested: u32,
    pub files_skipped: u32,
    pub records_uploaded: usize,
}

/// Implementa cómo se mostrará el resumen como texto.
impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} ficheros escaneados, {} indexados, {} omitidos. {} registros subidos.",
            self.files_scanned, self.files_ingested, self.files_skipped, self.records_uploaded
        )
    }
}

pub struct Indexer {
    catalog: Arc<dyn IndexCatalog>,
    cfg: AppConfig,
}

impl Indexer {
    pub fn new(catalog: Arc<dyn IndexCatalog>, cfg: &AppConfig) -> Self {
        Self {
            catalog,
            cfg: cfg.clone(),
        }
    }

    /// Indexa un documento y devuelve el número de registros subidos.
    pub async fn build_index(&self, path: &Path) -> Result<usize> {
        let index = self.prepare_index().await?;
        self.index_document(index.as_ref(), path).await
    }

    /// Recorre recursivamente un directorio e indexa cada PDF o fichero de
    /// texto. Un fichero que falla se registra y cuenta como omitido.
    pub async fn build_index_dir(
        &self,
        root: &Path,
        status_arc: Arc<Mutex<Status>>,
    ) -> Result<IngestionSummary> {
        if !root.is_dir() {
            return Err(RagError::Configuration(format!(
                "La ruta no es un directorio: {}",
                root.display()
            )));
        }

        let index = self.prepare_index().await?;
        let mut summary = IngestionSummary::default();
        let file_entries: Vec<_> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .collect();
        let total_files = file_entries.len();

        for (i, entry) in file_entries.iter().enumerate() {
            summary.files_scanned += 1;
            let path = entry.path();
            let progress = (i + 1) as f32 / total_files as f32;
            update_status(&status_arc, progress, || {
                format!("[{}/{}] Procesando: {}...", i + 1, total_files, path.display())
            });

            if DocumentKind::detect(path).is_none() {
                info!("Saltando fichero con formato no soportado: {}", path.display());
                summary.files_skipped += 1;
                continue;
            }

            match self.index_document(index.as_ref(), path).await {
                Ok(uploaded) => {
                    summary.files_ingested += 1;
                    summary.records_uploaded += uploaded;
                }
                Err(err) => {
                    summary.files_skipped += 1;
                    error!("Error indexando {}: {err}", path.display());
                    update_status(&status_arc, progress, || {
                        format!("ERROR en {}: {}", path.display(), err)
                    });
                }
            }
        }

        Ok(summary)
    }

    async fn prepare_index(&self) -> Result<Arc<dyn RecordIndex>> {
        vector_store::ensure_index(self.catalog.as_ref(), &self.cfg).await?;
        self.catalog.index(&self.cfg.index_name).await
    }

    async fn index_document(&self, index: &dyn RecordIndex, path: &Path) -> Result<usize> {
        info!("Leyendo documento: {}", path.display());
        let text = extract_blocking(path).await?;

        let source = path.to_string_lossy();
        let chunks = chunking::chunk_document(
            &text,
            &source,
            self.cfg.chunk_size,
            self.cfg.chunk_overlap,
        )?;
        if chunks.is_empty() {
            warn!("Documento sin chunks útiles: {}", path.display());
            return Ok(0);
        }
        info!("{} chunks generados para {}", chunks.len(), path.display());

        let records: Vec<IndexedRecord> = chunks.iter().map(IndexedRecord::from_chunk).collect();
        upload_records(
            index,
            &self.cfg.namespace,
            &records,
            self.cfg.upsert_batch_size,
        )
        .await
    }
}

/// Lectura y parseo de PDF son bloqueantes: van al pool de `spawn_blocking`.
async fn extract_blocking(path: &Path) -> Result<String> {
    let owned = path.to_path_buf();
    task::spawn_blocking(move || extract::extract_text(&owned))
        .await
        .map_err(|e| RagError::Extraction {
            path: path.display().to_string(),
            message: format!("la tarea de extracción terminó de forma anómala: {e}"),
        })?
}

/// Sube los registros en lotes de como mucho `batch_size`: un upsert por
/// lote completo y uno final con el resto. Un fallo aborta la subida; los
/// lotes ya confirmados se quedan en el índice.
pub async fn upload_records(
    index: &dyn RecordIndex,
    namespace: &str,
    records: &[IndexedRecord],
    batch_size: usize,
) -> Result<usize> {
    if batch_size == 0 {
        return Err(RagError::Configuration(
            "El tamaño de lote debe ser mayor que 0".to_string(),
        ));
    }

    let mut uploaded = 0;
    for (batch, batch_records) in records.chunks(batch_size).enumerate() {
        index
            .upsert_records(namespace, batch_records)
            .await
            .map_err(|e| RagError::Upload {
                batch: batch + 1,
                records: batch_records.len(),
                message: e.to_string(),
            })?;
        uploaded += batch_records.len();
        info!(
            "{} registros subidos ({uploaded}/{})",
            batch_records.len(),
            records.len()
        );
    }
    Ok(uploaded)
}

fn update_status<F: FnOnce() -> String>(status_arc: &Mutex<Status>, progress: f32, message: F) {
    let mut status = status_arc.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    status.message = message();
    status.progress = progress;
}
