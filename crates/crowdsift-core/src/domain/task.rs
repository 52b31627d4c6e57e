//! Task records, the task-type table, and the lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{CoreError, Result};
use super::TaskId;

/// Default consensus threshold when a task does not override it.
pub const DEFAULT_CONSENSUS_THRESHOLD: f64 = 0.6;

/// Kind of judgment a task asks for.
///
/// A closed enumeration: each variant carries its own default reward,
/// default quorum, and instruction text as a compile-time lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Decide whether the target is signal or noise.
    Classify,
    /// Propose the best topic label for the target.
    Tag,
    /// Identify the most closely related target, if any.
    Link,
    /// Pull key structured facts out of the target.
    Extract,
    /// Write a short neutral summary of the target.
    Summarize,
    /// Answer a yes/no verification question about the target.
    Verify,
}

impl TaskType {
    /// All task types, in display order.
    pub const ALL: [TaskType; 6] = [
        TaskType::Classify,
        TaskType::Tag,
        TaskType::Link,
        TaskType::Extract,
        TaskType::Summarize,
        TaskType::Verify,
    ];

    /// Stable wire name.
    pub fn name(&self) -> &'static str {
        match self {
            TaskType::Classify => "classify",
            TaskType::Tag => "tag",
            TaskType::Link => "link",
            TaskType::Extract => "extract",
            TaskType::Summarize => "summarize",
            TaskType::Verify => "verify",
        }
    }

    /// Default reward points for this task type.
    pub fn default_reward(&self) -> f64 {
        match self {
            TaskType::Classify => 1.0,
            TaskType::Tag => 0.5,
            TaskType::Link => 0.5,
            TaskType::Extract => 3.0,
            TaskType::Summarize => 5.0,
            TaskType::Verify => 1.0,
        }
    }

    /// Default number of independent submissions required for resolution.
    pub fn default_quorum(&self) -> u32 {
        match self {
            TaskType::Classify => 5,
            TaskType::Tag => 5,
            TaskType::Link => 3,
            TaskType::Extract => 3,
            TaskType::Summarize => 1,
            TaskType::Verify => 3,
        }
    }

    /// Instruction text shown to agents alongside the target.
    pub fn instructions(&self) -> &'static str {
        match self {
            TaskType::Classify => "Vote whether the target is signal or noise.",
            TaskType::Tag => "Vote the single best topic label for the target.",
            TaskType::Link => "Vote the id of the most closely related target, or 'none'.",
            TaskType::Extract => {
                "Extract the key structured facts from the target into content, \
                 then vote a one-line verdict on extractability."
            }
            TaskType::Summarize => {
                "Write a short neutral summary of the target into content, \
                 then vote 'summarized'."
            }
            TaskType::Verify => {
                "Answer the task's yes/no verification question and vote \
                 'confirmed' or 'refuted'."
            }
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| CoreError::InvalidTaskSpec(format!("unknown task type: {s}")))
    }
}

/// Task lifecycle state.
///
/// `Pending → InProgress → {ConsensusReached | Flagged}`, with
/// `Completed` as a later, externally driven archival state. The
/// transition into a resolution state fires atomically with the
/// submission that reaches quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// No submissions accepted yet.
    Pending,
    /// Between one and quorum-minus-one submissions accepted.
    InProgress,
    /// A label cleared the consensus threshold.
    ConsensusReached,
    /// Quorum reached but no label cleared the threshold.
    Flagged,
    /// Archived after resolution by an external operator action.
    Completed,
}

impl TaskStatus {
    /// Whether the task still accepts submissions.
    pub fn accepting(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }

    /// Whether the task has been resolved (or archived afterwards).
    pub fn is_terminal(&self) -> bool {
        !self.accepting()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::ConsensusReached => "consensus_reached",
            TaskStatus::Flagged => "flagged",
            TaskStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// A work item agents submit judgments against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub task_type: TaskType,
    /// Opaque reference to the content item, uninterpreted by the core.
    pub target: String,
    /// Submissions required before resolution fires.
    pub quorum: u32,
    /// Minimum fraction of cast votes one label must reach.
    pub consensus_threshold: f64,
    /// Points credited to each submission matching the consensus label.
    pub reward: f64,
    /// Optional ground truth for the secondary verification signal.
    pub verification_answer: Option<bool>,
    pub status: TaskStatus,
    /// Winning label once consensus is reached; None otherwise.
    pub consensus_result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Validated parameters for creating a task. Unset fields fall back to
/// the [`TaskType`] table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSpec {
    pub quorum: Option<u32>,
    pub consensus_threshold: Option<f64>,
    pub reward: Option<f64>,
    pub verification_answer: Option<bool>,
}

impl Task {
    /// Build a new pending task, validating the spec against the type's
    /// defaults.
    pub fn new(
        task_type: TaskType,
        target: impl Into<String>,
        spec: TaskSpec,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let target = target.into();
        if target.is_empty() {
            return Err(CoreError::InvalidTaskSpec("target must not be empty".into()));
        }
        let quorum = spec.quorum.unwrap_or_else(|| task_type.default_quorum());
        if quorum == 0 {
            return Err(CoreError::InvalidTaskSpec("quorum must be at least 1".into()));
        }
        let consensus_threshold = spec
            .consensus_threshold
            .unwrap_or(DEFAULT_CONSENSUS_THRESHOLD);
        if !(consensus_threshold > 0.0 && consensus_threshold <= 1.0) {
            return Err(CoreError::InvalidTaskSpec(format!(
                "consensus threshold {consensus_threshold} outside (0, 1]"
            )));
        }
        let reward = spec.reward.unwrap_or_else(|| task_type.default_reward());
        if !(reward > 0.0) {
            return Err(CoreError::InvalidTaskSpec(format!(
                "reward {reward} must be positive"
            )));
        }
        Ok(Self {
            task_id: TaskId::new(),
            task_type,
            target,
            quorum,
            consensus_threshold,
            reward,
            verification_answer: spec.verification_answer,
            status: TaskStatus::Pending,
            consensus_result: None,
            created_at: now,
            resolved_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_table_is_total() {
        for t in TaskType::ALL {
            assert!(t.default_reward() > 0.0);
            assert!(t.default_quorum() >= 1);
            assert!(!t.instructions().is_empty());
            assert_eq!(t.name().parse::<TaskType>().unwrap(), t);
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = "triage".parse::<TaskType>().unwrap_err();
        assert!(err.to_string().contains("unknown task type"));
    }

    #[test]
    fn test_status_machine_flags() {
        assert!(TaskStatus::Pending.accepting());
        assert!(TaskStatus::InProgress.accepting());
        assert!(!TaskStatus::ConsensusReached.accepting());
        assert!(!TaskStatus::Flagged.accepting());
        assert!(!TaskStatus::Completed.accepting());
        assert!(TaskStatus::Flagged.is_terminal());
    }

    #[test]
    fn test_new_task_takes_type_defaults() {
        let task = Task::new(
            TaskType::Extract,
            "thread-42",
            TaskSpec::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(task.quorum, 3);
        assert_eq!(task.reward, 3.0);
        assert_eq!(task.consensus_threshold, DEFAULT_CONSENSUS_THRESHOLD);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.consensus_result.is_none());
    }

    #[test]
    fn test_new_task_validates_spec() {
        let bad_quorum = Task::new(
            TaskType::Classify,
            "thread-42",
            TaskSpec {
                quorum: Some(0),
                ..TaskSpec::default()
            },
            Utc::now(),
        );
        assert!(bad_quorum.is_err());

        let bad_threshold = Task::new(
            TaskType::Classify,
            "thread-42",
            TaskSpec {
                consensus_threshold: Some(1.2),
                ..TaskSpec::default()
            },
            Utc::now(),
        );
        assert!(bad_threshold.is_err());

        let empty_target = Task::new(TaskType::Classify, "", TaskSpec::default(), Utc::now());
        assert!(empty_target.is_err());
    }
}
