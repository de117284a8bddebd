//! Configuration types

use crate::{ConfigError, MathWizResult};
use serde::{Deserialize, Serialize};

/// Generation backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifier, e.g. "gpt-4"
    pub model: String,
    /// Base URL of an OpenAI-compatible endpoint
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            endpoint: None,
            api_key: None,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of passages fetched per question
    pub top_n: usize,
    /// Logical collection the passages belong to
    pub collection: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            collection: "math_textbooks".to_string(),
        }
    }
}

/// Conversation history configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of recent messages included in context
    pub last_n: usize,
    /// Per-message truncation length when rendering history
    pub max_message_chars: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            last_n: 3,
            max_message_chars: 200,
        }
    }
}

/// Document chunking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive windows in characters
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MathWizConfig {
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub history: HistoryConfig,
    pub ingest: IngestConfig,
}

impl MathWizConfig {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> MathWizResult<()> {
        if self.generation.model.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "generation.model".to_string(),
            }
            .into());
        }
        if self.retrieval.top_n == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.top_n".to_string(),
                value: "0".to_string(),
                reason: "must fetch at least one passage".to_string(),
            }
            .into());
        }
        if self.ingest.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingest.chunk_size".to_string(),
                value: "0".to_string(),
                reason: "chunks must be non-empty".to_string(),
            }
            .into());
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(ConfigError::InvalidValue {
                field: "ingest.chunk_overlap".to_string(),
                value: self.ingest.chunk_overlap.to_string(),
                reason: "must be smaller than chunk_size".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
