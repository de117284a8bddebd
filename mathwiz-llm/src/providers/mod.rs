//! Backend provider implementations
//!
//! Concrete implementations of the GenerationProvider and RetrievalProvider
//! traits: an OpenAI-compatible HTTP provider and an in-memory retrieval
//! index that lets the full pipeline run without an external vector store.

pub mod memory;
pub mod openai;

use mathwiz_core::{LlmError, MathWizError};

/// Build a request-failed generation error.
pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> MathWizError {
    MathWizError::Llm(LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

/// Build an invalid-response generation error.
pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> MathWizError {
    MathWizError::Llm(LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}
