//! Append-only tag index.
//!
//! Consensus-reached tag tasks register their winning label against the
//! task's target. Records are never updated or removed; repeat
//! registrations append, preserving the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TaskId;

/// One registered (target, label) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub target: String,
    pub label: String,
    /// The tag task whose consensus produced this record.
    pub task_id: TaskId,
    pub registered_at: DateTime<Utc>,
}

/// Append-only registry of consensus-approved tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagIndex {
    records: Vec<TagRecord>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. There is deliberately no update or delete.
    pub fn register(
        &mut self,
        target: impl Into<String>,
        label: impl Into<String>,
        task_id: TaskId,
        now: DateTime<Utc>,
    ) {
        self.records.push(TagRecord {
            target: target.into(),
            label: label.into(),
            task_id,
            registered_at: now,
        });
    }

    /// All records for a target, in registration order.
    pub fn for_target(&self, target: &str) -> Vec<&TagRecord> {
        self.records.iter().filter(|r| r.target == target).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_query() {
        let mut index = TagIndex::new();
        let now = Utc::now();
        index.register("thread-1", "rust", TaskId::new(), now);
        index.register("thread-2", "python", TaskId::new(), now);
        index.register("thread-1", "async", TaskId::new(), now);

        let tags = index.for_target("thread-1");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].label, "rust");
        assert_eq!(tags[1].label, "async");
        assert!(index.for_target("thread-9").is_empty());
    }

    #[test]
    fn test_repeat_registration_appends() {
        let mut index = TagIndex::new();
        let now = Utc::now();
        index.register("thread-1", "rust", TaskId::new(), now);
        index.register("thread-1", "rust", TaskId::new(), now);
        assert_eq!(index.len(), 2);
    }
}
