//! División del texto en ventanas de palabras solapadas.

use crate::error::{RagError, Result};
use crate::models::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Divide `text` en ventanas de hasta `window_size` palabras, avanzando
/// `window_size - overlap` palabras cada vez. La última ventana puede ser
/// más corta. Falla si el paso no es positivo.
pub fn chunk_text(text: &str, window_size: usize, overlap: usize) -> Result<Vec<String>> {
    if window_size == 0 || overlap >= window_size {
        return Err(RagError::Configuration(format!(
            "Parámetros de chunking inválidos: ventana={window_size}, solapamiento={overlap}"
        )));
    }
    let step = window_size - overlap;
    let words: Vec<&str> = text.split_whitespace().collect();

    let chunks = (0..words.len())
        .step_by(step)
        .map(|start| {
            let end = (start + window_size).min(words.len());
            words[start..end].join(" ")
        })
        .filter(|chunk| !chunk.trim().is_empty())
        .collect();

    Ok(chunks)
}

/// Igual que `chunk_text`, pero devuelve chunks con índice y documento de origen.
pub fn chunk_document(
    text: &str,
    source: &str,
    window_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    Ok(chunk_text(text, window_size, overlap)?
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            index,
            text,
            source: source.to_string(),
        })
        .collect())
}
