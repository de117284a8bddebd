//! Document ingestion: fixed-window chunking with overlap.

use mathwiz_core::{DocumentChunk, IngestError, MathWizResult};
use std::path::Path;

/// Default chunk window in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap carried between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Splits document text into overlapping fixed-size windows. Windows are
/// measured in characters, never splitting a UTF-8 code point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for DocumentChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl DocumentChunker {
    /// Create a chunker. A `chunk_overlap >= chunk_size` is clamped so the
    /// window always advances by at least one character.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    /// How far the window advances per chunk.
    fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }

    /// Split `text` into chunks. Empty text yields no chunks.
    pub fn chunk_text(&self, document_id: &str, text: &str) -> Vec<DocumentChunk> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.step();
        let mut chunks = Vec::new();
        let mut start = 0;
        // The window advances by `step` until it has passed the end of the
        // text, so a trailing window holding only overlap is still emitted.
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let piece: String = chars[start..end].iter().collect();
            chunks.push(DocumentChunk::new(document_id, chunks.len(), &piece));
            start += step;
        }
        chunks
    }

    /// Read a file from disk and chunk it. The file stem becomes the
    /// document id.
    pub fn chunk_file(&self, path: &Path) -> MathWizResult<Vec<DocumentChunk>> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(IngestError::DocumentNotFound { path: display }.into());
        }
        let text = std::fs::read_to_string(path).map_err(|e| IngestError::DocumentUnreadable {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        if text.trim().is_empty() {
            return Err(IngestError::EmptyDocument { path: display }.into());
        }
        let document_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        Ok(self.chunk_text(&document_id, &text))
    }
}
