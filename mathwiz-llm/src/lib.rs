//! MathWiz LLM - Backend Abstraction Layer
//!
//! Provider-agnostic traits for text generation and passage retrieval.
//! Backends are optional capabilities injected at construction time: an
//! absent backend is a normal, statically-known state, not an error path.
//! Callers that need fail-soft behavior check presence and substitute
//! clearly-labeled mock output.

use async_trait::async_trait;
use mathwiz_core::{DocumentChunk, GenerationOptions, MathWizResult, RetrievedPassage};
use std::sync::Arc;

pub mod providers;
pub mod testing;

pub use providers::memory::InMemoryRetrievalIndex;
pub use providers::openai::OpenAiGenerationProvider;

// ============================================================================
// GENERATION PROVIDER TRAIT
// ============================================================================

/// Trait for text-generation backends.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct MyProvider { /* ... */ }
///
/// #[async_trait]
/// impl GenerationProvider for MyProvider {
///     async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> MathWizResult<String> {
///         // Call the model API
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for the given prompt.
    ///
    /// # Returns
    /// * `Ok(String)` - The generated text
    /// * `Err(MathWizError::Llm)` - If the backend call fails
    async fn generate(&self, prompt: &str, opts: &GenerationOptions) -> MathWizResult<String>;

    /// Get the model identifier for this provider.
    fn model_id(&self) -> &str;
}

// ============================================================================
// RETRIEVAL PROVIDER TRAIT
// ============================================================================

/// Trait for nearest-neighbor passage retrieval backends.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    /// Query for the `n` passages most relevant to `text`.
    ///
    /// # Returns
    /// * `Ok(Vec<RetrievedPassage>)` - At most `n` passages, closest first
    /// * `Err(MathWizError::Retrieval)` - If the backend call fails
    async fn query(&self, text: &str, n: usize) -> MathWizResult<Vec<RetrievedPassage>>;

    /// Add document chunks to the index.
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` - The chunk ids that were added
    /// * `Err(MathWizError::Retrieval)` - If the backend call fails
    async fn add(&self, chunks: &[DocumentChunk]) -> MathWizResult<Vec<String>>;
}

// ============================================================================
// PROVIDER REGISTRY
// ============================================================================

/// Registry for backend providers.
/// Providers must be explicitly registered - no auto-discovery.
///
/// # Example
/// ```ignore
/// let mut registry = ProviderRegistry::new();
/// registry.register_generation(Box::new(my_generation_provider));
///
/// if let Some(provider) = registry.generation() {
///     let answer = provider.generate("hello", &GenerationOptions::default()).await?;
/// }
/// ```
pub struct ProviderRegistry {
    /// Registered generation provider (optional capability)
    generation: Option<Arc<dyn GenerationProvider>>,
    /// Registered retrieval provider (optional capability)
    retrieval: Option<Arc<dyn RetrievalProvider>>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry.
    /// No providers are registered by default.
    pub fn new() -> Self {
        Self {
            generation: None,
            retrieval: None,
        }
    }

    /// Register a generation provider.
    /// Replaces any previously registered generation provider.
    pub fn register_generation(&mut self, provider: Box<dyn GenerationProvider>) {
        self.generation = Some(Arc::from(provider));
    }

    /// Register a retrieval provider.
    /// Replaces any previously registered retrieval provider.
    pub fn register_retrieval(&mut self, provider: Box<dyn RetrievalProvider>) {
        self.retrieval = Some(Arc::from(provider));
    }

    /// Get the registered generation provider, if any.
    pub fn generation(&self) -> Option<Arc<dyn GenerationProvider>> {
        self.generation.clone()
    }

    /// Get the registered retrieval provider, if any.
    pub fn retrieval(&self) -> Option<Arc<dyn RetrievalProvider>> {
        self.retrieval.clone()
    }

    /// Check if a generation provider is registered.
    pub fn has_generation(&self) -> bool {
        self.generation.is_some()
    }

    /// Check if a retrieval provider is registered.
    pub fn has_retrieval(&self) -> bool {
        self.retrieval.is_some()
    }

    /// Clear the generation provider registration.
    pub fn clear_generation(&mut self) {
        self.generation = None;
    }

    /// Clear the retrieval provider registration.
    pub fn clear_retrieval(&mut self) {
        self.retrieval = None;
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("generation", &self.generation.is_some())
            .field("retrieval", &self.retrieval.is_some())
            .finish()
    }
}

// ============================================================================
// MOCK OUTPUT
// ============================================================================

/// Marker prefix for text produced without a working generation backend.
pub const MOCK_RESPONSE_MARKER: &str = "[Mock Response]";

/// Stand-in completion used when a generation call fails.
/// Clearly labeled so it is never mistaken for a real solution.
pub fn mock_response() -> String {
    format!(
        "{MOCK_RESPONSE_MARKER}\n\
         For the problem in the prompt, here is a sample solution:\n\n\
         Step 1: Analyze the problem\n\
         Step 2: Apply relevant mathematical principles\n\
         Step 3: Perform calculations\n\
         Step 4: Verify the answer\n\n\
         (Note: this is a mock response. Configure a generation backend for actual solutions.)"
    )
}

/// Stand-in passage used when the retrieval backend is absent or fails.
pub fn mock_passage(question: &str) -> RetrievedPassage {
    RetrievedPassage::new(
        &format!("[Mock Context] Relevant information about: {question}"),
        0.5,
    )
    .with_metadata(serde_json::json!({ "source": "mock" }))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingGenerationProvider, MockGenerationProvider};

    #[test]
    fn test_registry_starts_empty() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_generation());
        assert!(!registry.has_retrieval());
        assert!(registry.generation().is_none());
        assert!(registry.retrieval().is_none());
    }

    #[test]
    fn test_registry_register_and_clear_generation() {
        let mut registry = ProviderRegistry::new();
        registry.register_generation(Box::new(MockGenerationProvider::new("42")));
        assert!(registry.has_generation());

        registry.clear_generation();
        assert!(!registry.has_generation());
    }

    #[tokio::test]
    async fn test_mock_generation_provider_returns_reply() -> MathWizResult<()> {
        let provider = MockGenerationProvider::new("the answer is 4");
        let text = provider
            .generate("what is 2+2?", &GenerationOptions::default())
            .await?;
        assert_eq!(text, "the answer is 4");
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_generation_provider_errors() {
        let provider = FailingGenerationProvider::default();
        let result = provider
            .generate("anything", &GenerationOptions::default())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_mock_response_is_labeled() {
        assert!(mock_response().starts_with(MOCK_RESPONSE_MARKER));
    }

    #[test]
    fn test_mock_passage_mentions_question() {
        let passage = mock_passage("integrate x^2");
        assert!(passage.text.contains("integrate x^2"));
        assert!(passage.text.contains("[Mock Context]"));
    }
}
