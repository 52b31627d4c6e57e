//! Submission records — one judgment per (agent, task), ever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{CoreError, Result};
use super::{AgentId, SubmissionId, TaskId};

/// Self-reported confidence attached to a judgment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Confidence {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(CoreError::InvalidSubmission(format!(
                "unknown confidence: {other}"
            ))),
        }
    }
}

/// The judgment an agent hands in for a task.
///
/// Either a vote label or a verification answer must be present; a
/// verify-style judgment may carry only the boolean.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Judgment {
    /// Vote label (signal/noise, a topic, a related id, ...).
    pub vote: Option<String>,
    pub confidence: Confidence,
    /// Free-text reasoning for the audit trail.
    pub reasoning: Option<String>,
    /// Answer to the task's verification question, if it carries one.
    pub verification_answer: Option<bool>,
    /// Structured payload for extract/summarize work.
    pub content: Option<String>,
}

impl Judgment {
    /// Reject judgments that carry neither signal.
    pub fn validate(&self) -> Result<()> {
        let empty_vote = self.vote.as_deref().map(str::is_empty).unwrap_or(true);
        if empty_vote && self.verification_answer.is_none() {
            return Err(CoreError::InvalidSubmission(
                "judgment carries neither a vote nor a verification answer".into(),
            ));
        }
        Ok(())
    }
}

/// An accepted submission.
///
/// Immutable once inserted, except `matched_consensus` and `karma_delta`,
/// which the resolver sets exactly once and never revises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: SubmissionId,
    pub agent_id: AgentId,
    pub task_id: TaskId,
    /// Store-assigned arrival counter; totals the tie-break ordering.
    pub seq: u64,
    pub vote: Option<String>,
    pub confidence: Confidence,
    pub reasoning: Option<String>,
    pub verification_answer: Option<bool>,
    pub content: Option<String>,
    pub submitted_at: DateTime<Utc>,
    /// Tri-state: Some(matched) after consensus, None after a flagged
    /// outcome (no label to match against).
    pub matched_consensus: Option<bool>,
    /// Net karma delta applied for this submission at resolution.
    pub karma_delta: Option<f64>,
}

impl Submission {
    /// Create an accepted, unresolved submission.
    pub fn new(
        agent_id: AgentId,
        task_id: TaskId,
        seq: u64,
        judgment: Judgment,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            submission_id: SubmissionId::new(),
            agent_id,
            task_id,
            seq,
            vote: judgment.vote,
            confidence: judgment.confidence,
            reasoning: judgment.reasoning,
            verification_answer: judgment.verification_answer,
            content: judgment.content,
            submitted_at: now,
            matched_consensus: None,
            karma_delta: None,
        }
    }

    /// Whether the resolver has already scored this submission.
    pub fn is_resolved(&self) -> bool {
        self.karma_delta.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judgment(vote: &str) -> Judgment {
        Judgment {
            vote: Some(vote.to_string()),
            ..Judgment::default()
        }
    }

    #[test]
    fn test_judgment_requires_a_signal() {
        assert!(Judgment::default().validate().is_err());
        assert!(judgment("signal").validate().is_ok());

        let verification_only = Judgment {
            verification_answer: Some(true),
            ..Judgment::default()
        };
        assert!(verification_only.validate().is_ok());

        let empty_label = Judgment {
            vote: Some(String::new()),
            ..Judgment::default()
        };
        assert!(empty_label.validate().is_err());
    }

    #[test]
    fn test_new_submission_is_unresolved() {
        let s = Submission::new(
            AgentId::new(),
            TaskId::new(),
            0,
            judgment("signal"),
            Utc::now(),
        );
        assert!(!s.is_resolved());
        assert!(s.matched_consensus.is_none());
        assert_eq!(s.confidence, Confidence::Medium);
    }

    #[test]
    fn test_serde_roundtrip() {
        let s = Submission::new(
            AgentId::new(),
            TaskId::new(),
            3,
            judgment("noise"),
            Utc::now(),
        );
        let json = serde_json::to_string(&s).unwrap();
        let back: Submission = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
