//! MathWiz Context - Context Assembly
//!
//! Merges retrieval results and recent conversation turns into a single
//! transient bundle handed to an agent for one question. The assembler never
//! fails: backend errors degrade to clearly-labeled placeholder content.

use mathwiz_core::{MathWizResult, Message, RetrievedPassage};
use mathwiz_llm::{mock_passage, RetrievalProvider};
use mathwiz_storage::SessionStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod ingest;

pub use ingest::DocumentChunker;

/// Default number of passages fetched per question.
pub const DEFAULT_TOP_N: usize = 3;
/// Default number of prior messages included as history.
pub const DEFAULT_HISTORY_LIMIT: usize = 3;
/// Default per-message truncation length when rendering history.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 200;

/// Header line prefixing rendered conversation history.
const HISTORY_HEADER: &str = "Previous conversation context:";

// ============================================================================
// QUESTION CONTEXT
// ============================================================================

/// Transient context bundle for one question. Built fresh per question and
/// discarded after the agent consumes it; never persisted as its own entity.
/// Both fields are optional and agents must tolerate either being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QuestionContext {
    /// Retrieved passages formatted as numbered `Context i:` blocks
    pub retrieval_text: Option<String>,
    /// The raw passage records behind `retrieval_text`
    pub passages: Vec<RetrievedPassage>,
    /// Rendered prior-turn summary, separate from the retrieval text
    pub conversation_history: Option<String>,
}

impl QuestionContext {
    /// An empty context with neither retrieval nor history.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the context carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.retrieval_text.is_none() && self.conversation_history.is_none()
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Format retrieved passages into one newline-joined string of
/// `Context i: <text>` blocks, numbered from 1.
pub fn format_passages(passages: &[RetrievedPassage]) -> String {
    if passages.is_empty() {
        return "No relevant context found.".to_string();
    }
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("Context {}: {}", i + 1, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render prior messages as `Role: content` lines under a header, truncating
/// each message to `max_chars` characters.
pub fn render_history(messages: &[Message], max_chars: usize) -> String {
    if messages.is_empty() {
        return "No previous conversation context.".to_string();
    }
    let mut lines = vec![HISTORY_HEADER.to_string()];
    for message in messages {
        lines.push(format!(
            "{}: {}",
            message.role.display_label(),
            truncate_chars(&message.content, max_chars)
        ));
    }
    lines.join("\n")
}

/// Truncate a string to at most `max_chars` characters on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &s[..byte_index],
        None => s,
    }
}

// ============================================================================
// CONTEXT ASSEMBLER
// ============================================================================

/// Builds a [`QuestionContext`] from the retrieval backend and session store.
/// Both collaborators are optional capabilities; a missing or failing backend
/// degrades to placeholder content rather than an error.
pub struct ContextAssembler {
    retrieval: Option<Arc<dyn RetrievalProvider>>,
    store: Option<Arc<dyn SessionStore>>,
    top_n: usize,
    history_limit: usize,
    max_message_chars: usize,
}

impl ContextAssembler {
    /// Create an assembler with no backends attached.
    pub fn new() -> Self {
        Self {
            retrieval: None,
            store: None,
            top_n: DEFAULT_TOP_N,
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }

    /// Attach a retrieval backend.
    pub fn with_retrieval(mut self, retrieval: Arc<dyn RetrievalProvider>) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    /// Attach a session store for conversation history.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the number of passages fetched per question.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Set how many prior messages are included as history.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Set the per-message truncation length.
    pub fn with_max_message_chars(mut self, max_chars: usize) -> Self {
        self.max_message_chars = max_chars;
        self
    }

    /// Build the context for one question. Never fails: retrieval errors and
    /// store errors substitute placeholder or absent fields.
    pub async fn build(&self, question: &str, convo_id: Option<&str>) -> QuestionContext {
        let passages = self.fetch_passages(question).await;
        let retrieval_text = Some(format_passages(&passages));

        let conversation_history = match (convo_id, &self.store) {
            (Some(id), Some(store)) => Some(self.render_recent(store.as_ref(), id)),
            _ => None,
        };

        QuestionContext {
            retrieval_text,
            passages,
            conversation_history,
        }
    }

    /// Query the retrieval backend, substituting a single placeholder passage
    /// on error or absence.
    async fn fetch_passages(&self, question: &str) -> Vec<RetrievedPassage> {
        let Some(retrieval) = &self.retrieval else {
            return vec![mock_passage(question)];
        };
        match retrieval.query(question, self.top_n).await {
            Ok(passages) => passages,
            Err(_) => vec![mock_passage(question)],
        }
    }

    fn render_recent(&self, store: &dyn SessionStore, convo_id: &str) -> String {
        let messages = store
            .recent_messages(convo_id, self.history_limit)
            .unwrap_or_default();
        render_history(&messages, self.max_message_chars)
    }

    /// Ingest a document's text into the attached retrieval backend, returning
    /// the number of chunks added.
    pub async fn ingest_document(
        &self,
        chunker: &DocumentChunker,
        document_id: &str,
        text: &str,
    ) -> MathWizResult<usize> {
        let Some(retrieval) = &self.retrieval else {
            return Err(mathwiz_core::RetrievalError::ProviderNotConfigured.into());
        };
        let chunks = chunker.chunk_text(document_id, text);
        let ids = retrieval.add(&chunks).await?;
        Ok(ids.len())
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContextAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextAssembler")
            .field("retrieval", &self.retrieval.is_some())
            .field("store", &self.store.is_some())
            .field("top_n", &self.top_n)
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mathwiz_core::MessageRole;
    use mathwiz_llm::testing::{CannedRetrievalProvider, FailingRetrievalProvider};
    use mathwiz_storage::InMemorySessionStore;

    #[tokio::test]
    async fn test_build_without_backends_uses_placeholder() {
        let assembler = ContextAssembler::new();
        let context = assembler.build("integrate x^2", None).await;

        assert_eq!(context.passages.len(), 1);
        assert!(context.passages[0].text.contains("[Mock Context]"));
        assert!(context
            .retrieval_text
            .as_deref()
            .unwrap()
            .starts_with("Context 1:"));
        assert!(context.conversation_history.is_none());
    }

    #[tokio::test]
    async fn test_build_never_errors_when_retrieval_throws() {
        let assembler =
            ContextAssembler::new().with_retrieval(Arc::new(FailingRetrievalProvider));
        let context = assembler.build("integrate x^2", None).await;

        assert_eq!(context.passages.len(), 1);
        assert!(context.passages[0].text.contains("[Mock Context]"));
    }

    #[tokio::test]
    async fn test_build_formats_retrieved_passages() {
        let canned = CannedRetrievalProvider::new(vec![
            RetrievedPassage::new("power rule", 0.1),
            RetrievedPassage::new("chain rule", 0.2),
        ]);
        let assembler = ContextAssembler::new().with_retrieval(Arc::new(canned));
        let context = assembler.build("derivative", None).await;

        let text = context.retrieval_text.unwrap();
        assert!(text.contains("Context 1: power rule"));
        assert!(text.contains("Context 2: chain rule"));
    }

    #[tokio::test]
    async fn test_build_attaches_history_separately() -> MathWizResult<()> {
        let store = Arc::new(InMemorySessionStore::new());
        store.start_or_resume_conversation("u1", Some("c-1"))?;
        store.append_message("c-1", MessageRole::User, "what is a limit?")?;
        store.append_message("c-1", MessageRole::Agent, "a limit describes behavior")?;

        let assembler = ContextAssembler::new().with_store(store);
        let context = assembler.build("follow-up", Some("c-1")).await;

        let history = context.conversation_history.unwrap();
        assert!(history.starts_with("Previous conversation context:"));
        assert!(history.contains("User: what is a limit?"));
        assert!(history.contains("Assistant: a limit describes behavior"));
        // History is not merged into the retrieval text
        assert!(!context.retrieval_text.unwrap().contains("limit describes"));
        Ok(())
    }

    #[tokio::test]
    async fn test_history_absent_without_convo_id() {
        let store = Arc::new(InMemorySessionStore::new());
        let assembler = ContextAssembler::new().with_store(store);
        let context = assembler.build("q", None).await;
        assert!(context.conversation_history.is_none());
    }

    #[test]
    fn test_format_passages_empty() {
        assert_eq!(format_passages(&[]), "No relevant context found.");
    }

    #[test]
    fn test_render_history_truncates_long_messages() {
        let long = "x".repeat(500);
        let messages = vec![Message::new("c", MessageRole::User, &long)];
        let rendered = render_history(&messages, 200);
        let line = rendered.lines().nth(1).unwrap();
        assert_eq!(line.chars().count(), "User: ".len() + 200);
    }

    #[test]
    fn test_render_history_empty() {
        assert_eq!(render_history(&[], 200), "No previous conversation context.");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }

    #[tokio::test]
    async fn test_ingest_document_counts_chunks() -> MathWizResult<()> {
        let index = Arc::new(mathwiz_llm::InMemoryRetrievalIndex::new());
        let assembler = ContextAssembler::new().with_retrieval(index);
        let chunker = DocumentChunker::new(10, 2);

        let added = assembler
            .ingest_document(&chunker, "doc-1", &"a".repeat(25))
            .await?;
        assert_eq!(added, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_ingest_requires_retrieval_backend() {
        let assembler = ContextAssembler::new();
        let chunker = DocumentChunker::new(10, 2);
        let result = assembler.ingest_document(&chunker, "doc-1", "text").await;
        assert!(result.is_err());
    }
}
