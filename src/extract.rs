//! Extracción de texto plano de los documentos de póliza.

use std::fs;
use std::path::Path;

use mime_guess::MimeGuess;
use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// Tipo de documento soportado según su MIME.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    /// Detecta el tipo a partir de la extensión; `None` si no es soportado.
    pub fn detect(path: &Path) -> Option<Self> {
        let mime = MimeGuess::from_path(path).first()?;
        match (mime.type_().as_str(), mime.subtype().as_str()) {
            ("application", "pdf") => Some(Self::Pdf),
            ("text", _) => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Lee el documento y devuelve su texto. Un documento sin texto utilizable
/// es un `RagError::Extraction`.
pub fn extract_text(path: &Path) -> Result<String> {
    let shown = path.display().to_string();
    let extraction_error = |message: String| RagError::Extraction {
        path: shown.clone(),
        message,
    };

    let kind = DocumentKind::detect(path)
        .ok_or_else(|| extraction_error("extensión no soportada".to_string()))?;

    let text = match kind {
        DocumentKind::Pdf => pdf_extract::extract_text(path).map_err(|e| {
            warn!("No se pudo extraer texto del PDF {}: {}", shown, e);
            extraction_error(e.to_string())
        })?,
        DocumentKind::PlainText => fs::read_to_string(path).map_err(|e| {
            warn!("No se pudo leer el fichero de texto {}: {}", shown, e);
            extraction_error(e.to_string())
        })?,
    };

    if text.trim().is_empty() {
        return Err(extraction_error("el documento no contiene texto".to_string()));
    }

    debug!("Extraídos {} caracteres de {}", text.chars().count(), shown);
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_supported_kinds() {
        assert_eq!(DocumentKind::detect(Path::new("a.pdf")), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::detect(Path::new("a.txt")), Some(DocumentKind::PlainText));
        assert_eq!(DocumentKind::detect(Path::new("a.md")), Some(DocumentKind::PlainText));
        assert_eq!(DocumentKind::detect(Path::new("a.png")), None);
        assert_eq!(DocumentKind::detect(Path::new("no_extension")), None);
    }

    #[test]
    fn reads_plain_text() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "제1조 보험금의 지급사유").unwrap();
        assert_eq!(extract_text(file.path()).unwrap(), "제1조 보험금의 지급사유");
    }

    #[test]
    fn blank_document_is_an_extraction_error() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "   \n ").unwrap();
        assert!(matches!(
            extract_text(file.path()),
            Err(RagError::Extraction { .. })
        ));
    }

    #[test]
    fn malformed_pdf_error_names_the_file() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        write!(file, "esto no es un PDF").unwrap();
        match extract_text(file.path()) {
            Err(RagError::Extraction { path, .. }) => {
                assert_eq!(path, file.path().display().to_string());
            }
            other => panic!("resultado inesperado: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_extraction_error() {
        let err = extract_text(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }
}
