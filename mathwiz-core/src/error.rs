//! Error types for MathWiz operations

use crate::EntityType;
use thiserror::Error;

/// Session store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with key {key}")]
    NotFound { entity_type: EntityType, key: String },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Generation backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No generation provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Retrieval backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("No retrieval provider configured")]
    ProviderNotConfigured,

    #[error("Retrieval query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Adding chunks failed: {reason}")]
    AddFailed { reason: String },
}

/// Document ingestion errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("Document not found: {path}")]
    DocumentNotFound { path: String },

    #[error("Document unreadable: {path}: {reason}")]
    DocumentUnreadable { path: String, reason: String },

    #[error("Document is empty: {path}")]
    EmptyDocument { path: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Agent pipeline errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent {agent} failed to solve: {reason}")]
    SolveFailed { agent: String, reason: String },

    #[error("Agent {agent} failed to reflect: {reason}")]
    ReflectFailed { agent: String, reason: String },
}

/// Master error type for all MathWiz errors.
#[derive(Debug, Clone, Error)]
pub enum MathWizError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generation error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Result type alias for MathWiz operations.
pub type MathWizResult<T> = Result<T, MathWizError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity_type: EntityType::Conversation,
            key: "c-42".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("Conversation"));
        assert!(msg.contains("c-42"));
    }

    #[test]
    fn test_llm_error_display_request_failed() {
        let err = LlmError::RequestFailed {
            provider: "openai".to_string(),
            status: 429,
            message: "too many requests".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("openai"));
        assert!(msg.contains("429"));
        assert!(msg.contains("too many requests"));
    }

    #[test]
    fn test_ingest_error_display_not_found() {
        let err = IngestError::DocumentNotFound {
            path: "/tmp/missing.txt".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Document not found"));
        assert!(msg.contains("/tmp/missing.txt"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "chunk_overlap".to_string(),
            value: "600".to_string(),
            reason: "must be smaller than chunk_size".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("chunk_overlap"));
        assert!(msg.contains("600"));
    }

    #[test]
    fn test_mathwiz_error_from_variants() {
        let storage = MathWizError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, MathWizError::Storage(_)));

        let llm = MathWizError::from(LlmError::ProviderNotConfigured);
        assert!(matches!(llm, MathWizError::Llm(_)));

        let retrieval = MathWizError::from(RetrievalError::QueryFailed {
            reason: "index offline".to_string(),
        });
        assert!(matches!(retrieval, MathWizError::Retrieval(_)));

        let ingest = MathWizError::from(IngestError::EmptyDocument {
            path: "doc.txt".to_string(),
        });
        assert!(matches!(ingest, MathWizError::Ingest(_)));

        let config = MathWizError::from(ConfigError::MissingRequired {
            field: "model".to_string(),
        });
        assert!(matches!(config, MathWizError::Config(_)));

        let agent = MathWizError::from(AgentError::SolveFailed {
            agent: "Calculus Agent".to_string(),
            reason: "timeout".to_string(),
        });
        assert!(matches!(agent, MathWizError::Agent(_)));
    }
}
