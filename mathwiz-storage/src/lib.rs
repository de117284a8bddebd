//! MathWiz Storage - Session Store
//!
//! Tracks users, conversations, messages, and per-question task records, and
//! supplies conversation history to the context assembler. Entities live in
//! indexed tables keyed by their identity string; relations are plain string
//! fields resolved through the store's query methods.
//!
//! Every logical operation takes its locks for the duration of that operation
//! only. Nothing here holds a lock across a backend call.

use chrono::{Duration, Utc};
use mathwiz_core::{
    Conversation, EntityType, GenerationCall, MathWizResult, Message, MessageRole, Reflection,
    Solution, StorageError, Task, Timestamp, User,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ============================================================================
// SUMMARY TYPES
// ============================================================================

/// Per-conversation summary returned by `conversations_for_user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub convo_id: String,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub message_count: usize,
}

// ============================================================================
// SESSION STORE TRAIT
// ============================================================================

/// Storage abstraction for the conversation state machine.
/// Implementations must be safe for concurrent callers: message and task
/// writes from different questions can interleave.
pub trait SessionStore: Send + Sync {
    /// Fetch a user, creating it on first contact.
    fn get_or_create_user(&self, user_id: &str) -> MathWizResult<User>;

    /// Resume the conversation if `convo_id` already exists, otherwise create
    /// one (with a generated identifier when none is given).
    fn start_or_resume_conversation(
        &self,
        user_id: &str,
        convo_id: Option<&str>,
    ) -> MathWizResult<Conversation>;

    /// Append a message to a conversation. Timestamps are kept strictly
    /// monotonic per conversation.
    fn append_message(&self, convo_id: &str, role: MessageRole, content: &str)
        -> MathWizResult<Message>;

    /// Persist a task with its solution and optional reflection atomically.
    /// Either all records are written or none are.
    fn persist_task(
        &self,
        task: &Task,
        solution: &Solution,
        reflection: Option<&Reflection>,
    ) -> MathWizResult<()>;

    /// Record one generation backend call for audit purposes.
    fn record_generation_call(&self, call: &GenerationCall) -> MathWizResult<()>;

    /// The last `limit` messages of a conversation, in chronological order.
    fn recent_messages(&self, convo_id: &str, limit: usize) -> MathWizResult<Vec<Message>>;

    /// Close a conversation. Idempotent: a no-op if already ended or missing.
    fn end_conversation(&self, convo_id: &str) -> MathWizResult<()>;

    /// Summaries of a user's conversations, most recently started first.
    fn conversations_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> MathWizResult<Vec<ConversationSummary>>;

    /// Fetch a task by id.
    fn task_get(&self, task_id: &str) -> MathWizResult<Option<Task>>;

    /// Fetch the solution belonging to a task.
    fn solution_for_task(&self, task_id: &str) -> MathWizResult<Option<Solution>>;

    /// Fetch the reflection belonging to a task.
    fn reflection_for_task(&self, task_id: &str) -> MathWizResult<Option<Reflection>>;
}

// ============================================================================
// IN-MEMORY SESSION STORE
// ============================================================================

/// In-memory session store backed by per-entity RwLock tables.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    conversations: Arc<RwLock<HashMap<String, Conversation>>>,
    messages: Arc<RwLock<HashMap<String, Message>>>,
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    solutions: Arc<RwLock<HashMap<String, Solution>>>,
    reflections: Arc<RwLock<HashMap<String, Reflection>>>,
    generation_calls: Arc<RwLock<HashMap<String, GenerationCall>>>,
    /// Last message timestamp per conversation, for monotonic ordering
    last_message_at: Arc<RwLock<HashMap<String, Timestamp>>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) -> MathWizResult<()> {
        self.users.write().map_err(poisoned)?.clear();
        self.conversations.write().map_err(poisoned)?.clear();
        self.messages.write().map_err(poisoned)?.clear();
        self.tasks.write().map_err(poisoned)?.clear();
        self.solutions.write().map_err(poisoned)?.clear();
        self.reflections.write().map_err(poisoned)?.clear();
        self.generation_calls.write().map_err(poisoned)?.clear();
        self.last_message_at.write().map_err(poisoned)?.clear();
        Ok(())
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.users.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Number of stored messages across all conversations.
    pub fn message_count(&self) -> usize {
        self.messages.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Number of stored tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Number of recorded generation calls.
    pub fn generation_call_count(&self) -> usize {
        self.generation_calls.read().map(|t| t.len()).unwrap_or(0)
    }

    fn conversation_exists(&self, convo_id: &str) -> MathWizResult<bool> {
        Ok(self
            .conversations
            .read()
            .map_err(poisoned)?
            .contains_key(convo_id))
    }
}

fn poisoned<T>(_: T) -> mathwiz_core::MathWizError {
    StorageError::LockPoisoned.into()
}

fn transaction_failed(reason: impl Into<String>) -> mathwiz_core::MathWizError {
    StorageError::TransactionFailed {
        reason: reason.into(),
    }
    .into()
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create_user(&self, user_id: &str) -> MathWizResult<User> {
        let mut users = self.users.write().map_err(poisoned)?;
        let user = users
            .entry(user_id.to_string())
            .or_insert_with(|| User::new(user_id));
        Ok(user.clone())
    }

    fn start_or_resume_conversation(
        &self,
        user_id: &str,
        convo_id: Option<&str>,
    ) -> MathWizResult<Conversation> {
        let mut conversations = self.conversations.write().map_err(poisoned)?;

        if let Some(id) = convo_id {
            if let Some(existing) = conversations.get(id) {
                return Ok(existing.clone());
            }
        }

        let conversation = Conversation::new(user_id, convo_id);
        conversations.insert(conversation.convo_id.clone(), conversation.clone());
        Ok(conversation)
    }

    fn append_message(
        &self,
        convo_id: &str,
        role: MessageRole,
        content: &str,
    ) -> MathWizResult<Message> {
        if !self.conversation_exists(convo_id)? {
            return Err(StorageError::NotFound {
                entity_type: EntityType::Conversation,
                key: convo_id.to_string(),
            }
            .into());
        }

        let mut message = Message::new(convo_id, role, content);

        // Wall clocks can repeat within a conversation; bump so ordering by
        // timestamp stays strict.
        let mut last_at = self.last_message_at.write().map_err(poisoned)?;
        if let Some(last) = last_at.get(convo_id) {
            if message.timestamp <= *last {
                message.timestamp = *last + Duration::microseconds(1);
            }
        }
        last_at.insert(convo_id.to_string(), message.timestamp);
        drop(last_at);

        self.messages
            .write()
            .map_err(poisoned)?
            .insert(message.message_id.clone(), message.clone());
        Ok(message)
    }

    fn persist_task(
        &self,
        task: &Task,
        solution: &Solution,
        reflection: Option<&Reflection>,
    ) -> MathWizResult<()> {
        if solution.task_id != task.task_id {
            return Err(transaction_failed(format!(
                "solution {} does not belong to task {}",
                solution.solution_id, task.task_id
            )));
        }
        if let Some(r) = reflection {
            if r.task_id != task.task_id {
                return Err(transaction_failed(format!(
                    "reflection {} does not belong to task {}",
                    r.reflect_id, task.task_id
                )));
            }
        }
        if !(0.0..=1.0).contains(&task.confidence) {
            return Err(transaction_failed(format!(
                "task confidence {} out of range [0, 1]",
                task.confidence
            )));
        }

        let mut tasks = self.tasks.write().map_err(poisoned)?;
        if tasks.contains_key(&task.task_id) {
            return Err(transaction_failed(format!(
                "task {} already persisted",
                task.task_id
            )));
        }
        tasks.insert(task.task_id.clone(), task.clone());
        drop(tasks);

        let mut solutions = self.solutions.write().map_err(poisoned)?;
        if solutions.contains_key(&solution.solution_id) {
            // Roll back the task row; a task without its solution is an orphan.
            drop(solutions);
            self.tasks.write().map_err(poisoned)?.remove(&task.task_id);
            return Err(transaction_failed(format!(
                "solution {} already persisted",
                solution.solution_id
            )));
        }
        solutions.insert(solution.solution_id.clone(), solution.clone());
        drop(solutions);

        if let Some(r) = reflection {
            let mut reflections = self.reflections.write().map_err(poisoned)?;
            if reflections.contains_key(&r.reflect_id) {
                drop(reflections);
                self.tasks.write().map_err(poisoned)?.remove(&task.task_id);
                self.solutions
                    .write()
                    .map_err(poisoned)?
                    .remove(&solution.solution_id);
                return Err(transaction_failed(format!(
                    "reflection {} already persisted",
                    r.reflect_id
                )));
            }
            reflections.insert(r.reflect_id.clone(), r.clone());
        }

        Ok(())
    }

    fn record_generation_call(&self, call: &GenerationCall) -> MathWizResult<()> {
        self.generation_calls
            .write()
            .map_err(poisoned)?
            .insert(call.call_id.clone(), call.clone());
        Ok(())
    }

    fn recent_messages(&self, convo_id: &str, limit: usize) -> MathWizResult<Vec<Message>> {
        let messages = self.messages.read().map_err(poisoned)?;
        let mut convo_messages: Vec<Message> = messages
            .values()
            .filter(|m| m.convo_id == convo_id)
            .cloned()
            .collect();
        // Most recent first to apply the limit, then back to chronological.
        convo_messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        convo_messages.truncate(limit);
        convo_messages.reverse();
        Ok(convo_messages)
    }

    fn end_conversation(&self, convo_id: &str) -> MathWizResult<()> {
        let mut conversations = self.conversations.write().map_err(poisoned)?;
        if let Some(conversation) = conversations.get_mut(convo_id) {
            if conversation.ended_at.is_none() {
                conversation.ended_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    fn conversations_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> MathWizResult<Vec<ConversationSummary>> {
        let conversations = self.conversations.read().map_err(poisoned)?;
        let messages = self.messages.read().map_err(poisoned)?;

        let mut owned: Vec<&Conversation> = conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .collect();
        owned.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        Ok(owned
            .into_iter()
            .take(limit)
            .map(|c| ConversationSummary {
                convo_id: c.convo_id.clone(),
                started_at: c.started_at,
                ended_at: c.ended_at,
                message_count: messages.values().filter(|m| m.convo_id == c.convo_id).count(),
            })
            .collect())
    }

    fn task_get(&self, task_id: &str) -> MathWizResult<Option<Task>> {
        Ok(self.tasks.read().map_err(poisoned)?.get(task_id).cloned())
    }

    fn solution_for_task(&self, task_id: &str) -> MathWizResult<Option<Solution>> {
        Ok(self
            .solutions
            .read()
            .map_err(poisoned)?
            .values()
            .find(|s| s.task_id == task_id)
            .cloned())
    }

    fn reflection_for_task(&self, task_id: &str) -> MathWizResult<Option<Reflection>> {
        Ok(self
            .reflections
            .read()
            .map_err(poisoned)?
            .values()
            .find(|r| r.task_id == task_id)
            .cloned())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mathwiz_core::TaskStatus;

    fn task(task_id: &str, convo_id: &str, confidence: f32) -> Task {
        Task::new(task_id, convo_id, "Calculus Agent", TaskStatus::Completed, confidence)
    }

    #[test]
    fn test_get_or_create_user_is_stable() -> MathWizResult<()> {
        let store = InMemorySessionStore::new();
        let first = store.get_or_create_user("u1")?;
        let second = store.get_or_create_user("u1")?;
        assert_eq!(first, second);
        assert_eq!(store.user_count(), 1);
        Ok(())
    }

    #[test]
    fn test_start_conversation_generates_id() -> MathWizResult<()> {
        let store = InMemorySessionStore::new();
        let convo = store.start_or_resume_conversation("u1", None)?;
        assert!(!convo.convo_id.is_empty());
        assert_eq!(convo.user_id, "u1");
        Ok(())
    }

    #[test]
    fn test_resume_existing_conversation() -> MathWizResult<()> {
        let store = InMemorySessionStore::new();
        let created = store.start_or_resume_conversation("u1", Some("c-1"))?;
        let resumed = store.start_or_resume_conversation("u1", Some("c-1"))?;
        assert_eq!(created, resumed);
        Ok(())
    }

    #[test]
    fn test_append_message_requires_conversation() {
        let store = InMemorySessionStore::new();
        let result = store.append_message("missing", MessageRole::User, "hi");
        assert!(result.is_err());
    }

    #[test]
    fn test_append_then_recent_round_trip() -> MathWizResult<()> {
        let store = InMemorySessionStore::new();
        store.start_or_resume_conversation("u1", Some("c-1"))?;
        store.append_message("c-1", MessageRole::User, "first")?;
        store.append_message("c-1", MessageRole::Agent, "second")?;

        let recent = store.recent_messages("c-1", 1)?;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "second");
        assert_eq!(recent[0].role, MessageRole::Agent);
        Ok(())
    }

    #[test]
    fn test_recent_messages_chronological() -> MathWizResult<()> {
        let store = InMemorySessionStore::new();
        store.start_or_resume_conversation("u1", Some("c-1"))?;
        for i in 0..5 {
            store.append_message("c-1", MessageRole::User, &format!("msg {i}"))?;
        }

        let recent = store.recent_messages("c-1", 3)?;
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
        // Timestamps strictly increasing
        assert!(recent.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Ok(())
    }

    #[test]
    fn test_persist_task_round_trip() -> MathWizResult<()> {
        let store = InMemorySessionStore::new();
        let t = task("t-1", "c-1", 0.85);
        let s = Solution::new("t-1", "q", "a", "generation", 0.85);
        let r = Reflection::new("t-1", "looks fine", "none", 0.85);

        store.persist_task(&t, &s, Some(&r))?;
        assert_eq!(store.task_get("t-1")?, Some(t));
        assert_eq!(store.solution_for_task("t-1")?.map(|s| s.answer), Some("a".to_string()));
        assert!(store.reflection_for_task("t-1")?.is_some());
        Ok(())
    }

    #[test]
    fn test_persist_task_rejects_mismatched_solution() {
        let store = InMemorySessionStore::new();
        let t = task("t-1", "c-1", 0.85);
        let s = Solution::new("other-task", "q", "a", "generation", 0.85);
        assert!(store.persist_task(&t, &s, None).is_err());
        assert_eq!(store.task_count(), 0);
    }

    #[test]
    fn test_persist_task_rejects_out_of_range_confidence() {
        let store = InMemorySessionStore::new();
        let t = task("t-1", "c-1", 1.5);
        let s = Solution::new("t-1", "q", "a", "generation", 1.5);
        assert!(store.persist_task(&t, &s, None).is_err());
        assert_eq!(store.task_count(), 0);
    }

    #[test]
    fn test_persist_task_rolls_back_on_solution_conflict() -> MathWizResult<()> {
        let store = InMemorySessionStore::new();

        let t1 = task("t-1", "c-1", 0.85);
        let mut s1 = Solution::new("t-1", "q", "a", "generation", 0.85);
        s1.solution_id = "s-dup".to_string();
        store.persist_task(&t1, &s1, None)?;

        // Second task reuses the solution id: the solution write fails after
        // the task row is in, which must leave zero rows for t-2.
        let t2 = task("t-2", "c-1", 0.85);
        let mut s2 = Solution::new("t-2", "q2", "a2", "generation", 0.85);
        s2.solution_id = "s-dup".to_string();

        assert!(store.persist_task(&t2, &s2, None).is_err());
        assert_eq!(store.task_get("t-2")?, None);
        assert!(store.solution_for_task("t-2")?.is_none());
        // The first task is untouched
        assert!(store.task_get("t-1")?.is_some());
        Ok(())
    }

    #[test]
    fn test_persist_task_rolls_back_on_reflection_conflict() -> MathWizResult<()> {
        let store = InMemorySessionStore::new();

        let t1 = task("t-1", "c-1", 0.85);
        let s1 = Solution::new("t-1", "q", "a", "generation", 0.85);
        let mut r1 = Reflection::new("t-1", "ok", "none", 0.85);
        r1.reflect_id = "r-dup".to_string();
        store.persist_task(&t1, &s1, Some(&r1))?;

        let t2 = task("t-2", "c-1", 0.85);
        let s2 = Solution::new("t-2", "q2", "a2", "generation", 0.85);
        let mut r2 = Reflection::new("t-2", "ok", "none", 0.85);
        r2.reflect_id = "r-dup".to_string();

        assert!(store.persist_task(&t2, &s2, Some(&r2)).is_err());
        assert_eq!(store.task_get("t-2")?, None);
        assert!(store.solution_for_task("t-2")?.is_none());
        assert!(store.reflection_for_task("t-2")?.is_none());
        Ok(())
    }

    #[test]
    fn test_end_conversation_idempotent() -> MathWizResult<()> {
        let store = InMemorySessionStore::new();
        store.start_or_resume_conversation("u1", Some("c-1"))?;

        store.end_conversation("c-1")?;
        let ended_at = store
            .start_or_resume_conversation("u1", Some("c-1"))?
            .ended_at;
        assert!(ended_at.is_some());

        // Second close keeps the original end time; missing convo is a no-op.
        store.end_conversation("c-1")?;
        store.end_conversation("never-existed")?;
        assert_eq!(
            store.start_or_resume_conversation("u1", Some("c-1"))?.ended_at,
            ended_at
        );
        Ok(())
    }

    #[test]
    fn test_conversations_for_user_counts_messages() -> MathWizResult<()> {
        let store = InMemorySessionStore::new();
        store.start_or_resume_conversation("u1", Some("c-1"))?;
        store.start_or_resume_conversation("u1", Some("c-2"))?;
        store.start_or_resume_conversation("u2", Some("c-3"))?;
        store.append_message("c-1", MessageRole::User, "hi")?;
        store.append_message("c-1", MessageRole::Agent, "hello")?;

        let summaries = store.conversations_for_user("u1", 10)?;
        assert_eq!(summaries.len(), 2);
        let c1 = summaries.iter().find(|s| s.convo_id == "c-1").unwrap();
        assert_eq!(c1.message_count, 2);
        Ok(())
    }

    #[test]
    fn test_concurrent_appends_stay_consistent() -> MathWizResult<()> {
        let store = Arc::new(InMemorySessionStore::new());
        store.start_or_resume_conversation("u1", Some("c-1"))?;

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        store
                            .append_message("c-1", MessageRole::User, &format!("{i}-{j}"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.message_count(), 100);
        let all = store.recent_messages("c-1", 100)?;
        assert_eq!(all.len(), 100);
        assert!(all.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Ok(())
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// recent_messages(limit) always returns the chronological tail.
        #[test]
        fn prop_recent_messages_is_chronological_tail(
            contents in proptest::collection::vec("[a-z]{1,12}", 1..20),
            limit in 1usize..25,
        ) {
            let store = InMemorySessionStore::new();
            store.start_or_resume_conversation("u", Some("c")).unwrap();
            for content in &contents {
                store.append_message("c", MessageRole::User, content).unwrap();
            }

            let recent = store.recent_messages("c", limit).unwrap();
            let expected: Vec<&String> = contents
                .iter()
                .skip(contents.len().saturating_sub(limit))
                .collect();
            let got: Vec<&String> = recent.iter().map(|m| &m.content).collect();
            prop_assert_eq!(got, expected);
        }
    }
}
