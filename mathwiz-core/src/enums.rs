//! Enum types shared across the MathWiz workspace

use serde::{Deserialize, Serialize};

/// Entity type discriminator for polymorphic references in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    User,
    Conversation,
    Message,
    Task,
    Solution,
    Reflection,
    GenerationCall,
}

/// Sender role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRole {
    /// Message sent by the end user
    User,
    /// Message produced by a solver agent
    Agent,
}

impl MessageRole {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, MessageRoleParseError> {
        match s {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            _ => Err(MessageRoleParseError(s.to_string())),
        }
    }

    /// Human-readable label used when rendering conversation history.
    pub fn display_label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Agent => "Assistant",
        }
    }
}

/// Error parsing MessageRole from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRoleParseError(pub String);

impl std::fmt::Display for MessageRoleParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid message role: {}", self.0)
    }
}

impl std::error::Error for MessageRoleParseError {}

/// Status of a question-processing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Task created but not yet finished
    Pending,
    /// Task finished with an answer
    Completed,
    /// Task aborted before producing an answer
    Failed,
}

impl TaskStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Stage of the per-question processing pipeline.
///
/// Transitions are strictly sequential; there is no branching and no
/// parallelism between stages for a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Received,
    Routed,
    ContextBuilt,
    Solved,
    Reflected,
    Persisted,
    Responded,
}

impl PipelineStage {
    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Routed),
            Self::Routed => Some(Self::ContextBuilt),
            Self::ContextBuilt => Some(Self::Solved),
            Self::Solved => Some(Self::Reflected),
            Self::Reflected => Some(Self::Persisted),
            Self::Persisted => Some(Self::Responded),
            Self::Responded => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_db_round_trip() {
        for role in [MessageRole::User, MessageRole::Agent] {
            assert_eq!(MessageRole::from_db_str(role.as_db_str()), Ok(role));
        }
    }

    #[test]
    fn test_message_role_parse_invalid() {
        let err = MessageRole::from_db_str("system").unwrap_err();
        assert!(err.to_string().contains("system"));
    }

    #[test]
    fn test_pipeline_stage_sequence() {
        let mut stage = PipelineStage::Received;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            stage = next;
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                PipelineStage::Received,
                PipelineStage::Routed,
                PipelineStage::ContextBuilt,
                PipelineStage::Solved,
                PipelineStage::Reflected,
                PipelineStage::Persisted,
                PipelineStage::Responded,
            ]
        );
    }
}
