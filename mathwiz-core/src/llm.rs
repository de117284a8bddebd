//! Backend-facing primitive types.
//!
//! Pure data types for generation and retrieval calls. The provider traits
//! and registry live in mathwiz-llm.

use crate::EntityKey;
use serde::{Deserialize, Serialize};

/// Options for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    pub max_tokens: i32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.7,
        }
    }
}

impl GenerationOptions {
    /// Options used by agents when solving (long, focused output).
    pub fn solving() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.3,
        }
    }

    /// Options used by agents when reflecting (short critique).
    pub fn reflecting() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.3,
        }
    }
}

/// A passage returned by the retrieval backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Passage text
    pub text: String,
    /// Source metadata (document id, chunk index, ...)
    pub metadata: serde_json::Value,
    /// Distance from the query; lower is closer
    pub distance: f32,
}

impl RetrievedPassage {
    /// Create a passage with empty metadata.
    pub fn new(text: &str, distance: f32) -> Self {
        Self {
            text: text.to_string(),
            metadata: serde_json::Value::Null,
            distance,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One chunk of an ingested document, handed to the retrieval backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: EntityKey,
    pub document_id: EntityKey,
    /// Position of this chunk within the document
    pub index: usize,
    pub text: String,
    pub metadata: serde_json::Value,
}

impl DocumentChunk {
    /// Create a chunk with a deterministic `{document_id}_chunk_{index}` id.
    pub fn new(document_id: &str, index: usize, text: &str) -> Self {
        Self {
            chunk_id: format!("{document_id}_chunk_{index}"),
            document_id: document_id.to_string(),
            index,
            text: text.to_string(),
            metadata: serde_json::json!({
                "document_id": document_id,
                "chunk_index": index,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_default() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.max_tokens, 2000);
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_generation_options_reflecting_is_short() {
        let opts = GenerationOptions::reflecting();
        assert_eq!(opts.max_tokens, 500);
    }

    #[test]
    fn test_document_chunk_id_format() {
        let chunk = DocumentChunk::new("doc-1", 3, "some text");
        assert_eq!(chunk.chunk_id, "doc-1_chunk_3");
        assert_eq!(chunk.metadata["chunk_index"], 3);
    }
}
