//! MathWiz Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no business logic.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod llm;

pub use config::{GenerationConfig, HistoryConfig, IngestConfig, MathWizConfig, RetrievalConfig};
pub use entities::{Conversation, GenerationCall, Message, Reflection, Solution, Task, User};
pub use enums::{
    EntityType, MessageRole, MessageRoleParseError, PipelineStage, TaskStatus,
};
pub use error::{
    AgentError, ConfigError, IngestError, LlmError, MathWizError, MathWizResult, RetrievalError,
    StorageError,
};
pub use identity::{new_entity_key, EntityKey, Timestamp};
pub use llm::{DocumentChunk, GenerationOptions, RetrievedPassage};
