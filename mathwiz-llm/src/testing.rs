//! Deterministic provider doubles for tests across the workspace.

use crate::{GenerationProvider, RetrievalProvider};
use async_trait::async_trait;
use mathwiz_core::{
    DocumentChunk, GenerationOptions, LlmError, MathWizResult, RetrievalError, RetrievedPassage,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Generation provider that always returns a fixed reply.
#[derive(Debug)]
pub struct MockGenerationProvider {
    reply: String,
    calls: AtomicUsize,
}

impl MockGenerationProvider {
    /// Create a provider returning `reply` for every prompt.
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of generate calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn generate(&self, _prompt: &str, _opts: &GenerationOptions) -> MathWizResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

/// Generation provider that fails every call, for exercising fallback paths.
#[derive(Debug, Default)]
pub struct FailingGenerationProvider;

#[async_trait]
impl GenerationProvider for FailingGenerationProvider {
    async fn generate(&self, _prompt: &str, _opts: &GenerationOptions) -> MathWizResult<String> {
        Err(LlmError::RequestFailed {
            provider: "failing".to_string(),
            status: 500,
            message: "simulated backend failure".to_string(),
        }
        .into())
    }

    fn model_id(&self) -> &str {
        "failing-model"
    }
}

/// Retrieval provider that returns a fixed passage list.
#[derive(Debug, Default)]
pub struct CannedRetrievalProvider {
    passages: Vec<RetrievedPassage>,
}

impl CannedRetrievalProvider {
    /// Create a provider returning `passages` for every query.
    pub fn new(passages: Vec<RetrievedPassage>) -> Self {
        Self { passages }
    }
}

#[async_trait]
impl RetrievalProvider for CannedRetrievalProvider {
    async fn query(&self, _text: &str, n: usize) -> MathWizResult<Vec<RetrievedPassage>> {
        Ok(self.passages.iter().take(n).cloned().collect())
    }

    async fn add(&self, chunks: &[DocumentChunk]) -> MathWizResult<Vec<String>> {
        Ok(chunks.iter().map(|c| c.chunk_id.clone()).collect())
    }
}

/// Retrieval provider that fails every call.
#[derive(Debug, Default)]
pub struct FailingRetrievalProvider;

#[async_trait]
impl RetrievalProvider for FailingRetrievalProvider {
    async fn query(&self, _text: &str, _n: usize) -> MathWizResult<Vec<RetrievedPassage>> {
        Err(RetrievalError::QueryFailed {
            reason: "simulated backend failure".to_string(),
        }
        .into())
    }

    async fn add(&self, _chunks: &[DocumentChunk]) -> MathWizResult<Vec<String>> {
        Err(RetrievalError::AddFailed {
            reason: "simulated backend failure".to_string(),
        }
        .into())
    }
}
