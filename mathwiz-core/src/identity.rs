//! Identity types for MathWiz entities

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Entity key. Entities are indexed by their identity string; foreign keys
/// are plain string fields resolved through the session store.
pub type EntityKey = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new entity key from a UUIDv7 (timestamp-sortable).
pub fn new_entity_key() -> EntityKey {
    Uuid::now_v7().to_string()
}
