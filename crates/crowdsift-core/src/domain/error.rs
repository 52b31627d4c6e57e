//! Domain-level error taxonomy for Crowdsift.

use crate::domain::{AgentId, SubmissionId, TaskId, TaskStatus};

/// Coarse error category surfaced to callers alongside the concrete error.
///
/// Every [`CoreError`] maps onto exactly one kind; transport layers key
/// their status mapping off this rather than matching variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced entity does not exist.
    NotFound,
    /// The operation collides with existing state (duplicate submission,
    /// already-closed task, already-registered identity).
    Conflict,
    /// Unknown or blacklisted identity.
    Unauthorized,
    /// The operation is not valid in the entity's current state, or the
    /// request itself is malformed.
    InvalidState,
}

/// Crowdsift domain errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("submission not found: {0}")]
    SubmissionNotFound(SubmissionId),

    #[error("agent {agent_id} already submitted to task {task_id}")]
    DuplicateSubmission { agent_id: AgentId, task_id: TaskId },

    #[error("task {task_id} no longer accepts submissions (status {status})")]
    TaskClosed { task_id: TaskId, status: TaskStatus },

    #[error("agent already registered: {0}")]
    AgentExists(String),

    #[error("agent is blacklisted: {0}")]
    Blacklisted(AgentId),

    #[error("invalid task spec: {0}")]
    InvalidTaskSpec(String),

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("invalid decay rate: {0} (expected 0 < rate < 1)")]
    InvalidDecayRate(f64),

    #[error("task {task_id} cannot be archived from status {status}")]
    NotArchivable { task_id: TaskId, status: TaskStatus },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Map this error onto the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::TaskNotFound(_)
            | CoreError::AgentNotFound(_)
            | CoreError::SubmissionNotFound(_) => ErrorKind::NotFound,
            CoreError::DuplicateSubmission { .. }
            | CoreError::TaskClosed { .. }
            | CoreError::AgentExists(_) => ErrorKind::Conflict,
            CoreError::Blacklisted(_) => ErrorKind::Unauthorized,
            CoreError::InvalidTaskSpec(_)
            | CoreError::InvalidSubmission(_)
            | CoreError::InvalidDecayRate(_)
            | CoreError::NotArchivable { .. }
            | CoreError::Serialization(_)
            | CoreError::Io(_) => ErrorKind::InvalidState,
        }
    }
}

/// Result type for Crowdsift domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = TaskId::new();
        let err = CoreError::TaskNotFound(id);
        assert!(err.to_string().contains("task not found"));

        let err = CoreError::InvalidTaskSpec("quorum must be at least 1".to_string());
        assert!(err.to_string().contains("invalid task spec"));
    }

    #[test]
    fn test_taxonomy_mapping() {
        let agent_id = AgentId::new();
        let task_id = TaskId::new();

        assert_eq!(CoreError::TaskNotFound(task_id).kind(), ErrorKind::NotFound);
        assert_eq!(
            CoreError::DuplicateSubmission { agent_id, task_id }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CoreError::TaskClosed {
                task_id,
                status: TaskStatus::Flagged,
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CoreError::Blacklisted(agent_id).kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            CoreError::InvalidDecayRate(1.5).kind(),
            ErrorKind::InvalidState
        );
    }
}
