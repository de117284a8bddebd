//! Core entity structures
//!
//! The entity graph is User → Conversation → Message/Task → Solution/Reflection.
//! Relations are plain id fields, never embedded object references, so the
//! session store can index each entity by its key without ownership cycles.

use crate::{new_entity_key, EntityKey, MessageRole, TaskStatus, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A user of the system. Created on first contact, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: EntityKey,
    /// Display name, lazily filled from the user id on first contact
    pub name: String,
    pub email: Option<String>,
    pub created_at: Timestamp,
}

impl User {
    /// Create a user with a display name derived from the id prefix.
    pub fn new(user_id: &str) -> Self {
        let prefix: String = user_id.chars().take(8).collect();
        Self {
            user_id: user_id.to_string(),
            name: format!("User {prefix}"),
            email: None,
            created_at: Utc::now(),
        }
    }

    /// Set an explicit display name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set an email address.
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
}

/// A conversation owned by exactly one user.
/// Ends only via explicit close; otherwise open indefinitely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub convo_id: EntityKey,
    pub user_id: EntityKey,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
}

impl Conversation {
    /// Start a new conversation for a user. Generates an id when none is given.
    pub fn new(user_id: &str, convo_id: Option<&str>) -> Self {
        Self {
            convo_id: convo_id.map_or_else(new_entity_key, str::to_string),
            user_id: user_id.to_string(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Whether the conversation is still open.
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// An append-only conversation message. Ordering within a conversation is by
/// timestamp, which the store keeps monotonic per conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: EntityKey,
    pub convo_id: EntityKey,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: Timestamp,
}

impl Message {
    /// Create a message with a generated id and the current time.
    pub fn new(convo_id: &str, role: MessageRole, content: &str) -> Self {
        Self {
            message_id: new_entity_key(),
            convo_id: convo_id.to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Record of one question's processing lifecycle.
/// Every task references exactly one conversation and one agent name,
/// produces exactly one Solution and at most one Reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: EntityKey,
    pub convo_id: EntityKey,
    pub agent_name: String,
    pub tool_used: String,
    pub task_type: String,
    pub status: TaskStatus,
    /// Confidence score in [0, 1]
    pub confidence: f32,
    pub created_at: Timestamp,
}

impl Task {
    /// Create a task log entry for a question handled by the named agent.
    pub fn new(task_id: &str, convo_id: &str, agent_name: &str, status: TaskStatus, confidence: f32) -> Self {
        Self {
            task_id: task_id.to_string(),
            convo_id: convo_id.to_string(),
            agent_name: agent_name.to_string(),
            tool_used: "generation + retrieval".to_string(),
            task_type: "math_problem_solving".to_string(),
            status,
            confidence,
            created_at: Utc::now(),
        }
    }
}

/// The answer produced for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub solution_id: EntityKey,
    pub task_id: EntityKey,
    pub question: String,
    pub answer: String,
    /// Provenance tag, e.g. "generation + calculus knowledge"
    pub method_source: String,
    /// Confidence score in [0, 1], a fixed prior per agent type
    pub confidence: f32,
    pub created_at: Timestamp,
}

impl Solution {
    /// Create a solution record with a generated id.
    pub fn new(task_id: &str, question: &str, answer: &str, method_source: &str, confidence: f32) -> Self {
        Self {
            solution_id: new_entity_key(),
            task_id: task_id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            method_source: method_source.to_string(),
            confidence,
            created_at: Utc::now(),
        }
    }
}

/// Post-hoc critique of a solution, either backend-generated or rule-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub reflect_id: EntityKey,
    pub task_id: EntityKey,
    pub evaluation: String,
    pub suggestion: String,
    /// Carried forward from the solution's confidence
    pub final_confidence: f32,
    pub created_at: Timestamp,
}

impl Reflection {
    /// Create a reflection record with a generated id.
    pub fn new(task_id: &str, evaluation: &str, suggestion: &str, final_confidence: f32) -> Self {
        Self {
            reflect_id: new_entity_key(),
            task_id: task_id.to_string(),
            evaluation: evaluation.to_string(),
            suggestion: suggestion.to_string(),
            final_confidence,
            created_at: Utc::now(),
        }
    }
}

/// Record of one call to the generation backend, for cost and audit tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationCall {
    pub call_id: EntityKey,
    pub task_id: EntityKey,
    pub model: String,
    pub prompt: String,
    pub response: String,
    pub created_at: Timestamp,
}

impl GenerationCall {
    /// Create a call record with a generated id.
    pub fn new(task_id: &str, model: &str, prompt: &str, response: &str) -> Self {
        Self {
            call_id: new_entity_key(),
            task_id: task_id.to_string(),
            model: model.to_string(),
            prompt: prompt.to_string(),
            response: response.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_default_display_name() {
        let user = User::new("student-42-abcdef");
        assert_eq!(user.name, "User student-");
        assert!(user.email.is_none());
    }

    #[test]
    fn test_user_builders() {
        let user = User::new("u1").with_name("Ada").with_email("ada@example.com");
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_conversation_generated_id() {
        let convo = Conversation::new("u1", None);
        assert!(!convo.convo_id.is_empty());
        assert!(convo.is_open());
    }

    #[test]
    fn test_conversation_explicit_id() {
        let convo = Conversation::new("u1", Some("c-7"));
        assert_eq!(convo.convo_id, "c-7");
        assert_eq!(convo.user_id, "u1");
    }

    #[test]
    fn test_task_defaults() {
        let task = Task::new("t1", "c1", "Calculus Agent", TaskStatus::Completed, 0.85);
        assert_eq!(task.task_type, "math_problem_solving");
        assert_eq!(task.status, TaskStatus::Completed);
        assert!((task.confidence - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn test_solution_links_task() {
        let solution = Solution::new("t1", "2+2?", "4", "generation", 0.8);
        assert_eq!(solution.task_id, "t1");
        assert!(!solution.solution_id.is_empty());
    }
}
