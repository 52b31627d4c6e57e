//! Consensus resolver — turns a quorum of submissions into an outcome
//! and a batch of per-agent karma deltas.
//!
//! Resolution is planned as pure data: [`resolve`] inspects the task and
//! its submissions and returns a [`ResolutionPlan`] without touching any
//! state. The admission service validates and applies the plan inside
//! its critical section, so a task is never observably resolved with
//! partially applied karma.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AgentId, Submission, SubmissionId, Task, TaskId};
use crate::karma::KarmaReason;

/// Penalty for a submission whose vote missed the consensus label.
pub const MISS_PENALTY: f64 = 0.5;

/// No-fault participation reward when a task resolves flagged.
pub const PARTICIPATION_REWARD: f64 = 0.5;

/// Penalty for disagreeing with the task's ground-truth verification
/// answer, applied on top of the consensus term.
pub const VERIFICATION_PENALTY: f64 = 1.0;

/// How a resolved task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// One label cleared the consensus threshold.
    ConsensusReached,
    /// No label cleared the threshold (or no votes were cast).
    Flagged,
}

/// Scoring decision for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionVerdict {
    pub submission_id: SubmissionId,
    pub agent_id: AgentId,
    /// Tri-state: None when the task was flagged.
    pub matched_consensus: Option<bool>,
    /// Net delta, combining the consensus term and the verification term.
    pub karma_delta: f64,
    pub reason: KarmaReason,
}

/// The full, not-yet-applied result of resolving one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPlan {
    pub task_id: TaskId,
    pub outcome: Outcome,
    /// Winning label on consensus; None when flagged.
    pub consensus_result: Option<String>,
    /// Votes carried by the winning label.
    pub majority_count: usize,
    /// Non-null vote labels cast across all submissions.
    pub votes_cast: usize,
    /// `majority_count / votes_cast`; 0 when no votes were cast.
    pub ratio: f64,
}

impl ResolutionPlan {
    /// Sum of the deltas in `verdicts` — reproducible later from the
    /// stored submissions.
    pub fn total_delta(verdicts: &[SubmissionVerdict]) -> f64 {
        verdicts.iter().map(|v| v.karma_delta).sum()
    }
}

/// Tally of one candidate label.
#[derive(Debug, Clone, PartialEq)]
struct LabelTally {
    label: String,
    count: usize,
    /// Arrival key of the earliest submission carrying this label.
    earliest: (DateTime<Utc>, u64),
}

/// Count non-null vote labels and find the majority.
///
/// Ties on count break toward the label whose earliest supporting
/// submission arrived first, ordered by `(submitted_at, seq)`; `seq` is
/// the store's arrival counter, so the rule is total even under equal
/// timestamps. Never dependent on map iteration order.
fn majority(submissions: &[Submission]) -> Option<LabelTally> {
    let mut tallies: Vec<LabelTally> = Vec::new();
    for s in submissions {
        let Some(label) = s.vote.as_deref() else {
            continue;
        };
        let key = (s.submitted_at, s.seq);
        match tallies.iter_mut().find(|t| t.label == label) {
            Some(t) => {
                t.count += 1;
                if key < t.earliest {
                    t.earliest = key;
                }
            }
            None => tallies.push(LabelTally {
                label: label.to_string(),
                count: 1,
                earliest: key,
            }),
        }
    }
    tallies.into_iter().reduce(|best, t| {
        if t.count > best.count || (t.count == best.count && t.earliest < best.earliest) {
            t
        } else {
            best
        }
    })
}

/// Resolve a task from its accepted submissions.
///
/// Implements the unified dual-signal policy: the consensus term
/// (reward / miss penalty / flat participation reward) plus a
/// verification term subtracted when the submission disagrees with the
/// task's ground-truth answer. A task with no `verification_answer`
/// degenerates to pure vote-majority scoring.
pub fn resolve(task: &Task, submissions: &[Submission]) -> (ResolutionPlan, Vec<SubmissionVerdict>) {
    let votes_cast = submissions.iter().filter(|s| s.vote.is_some()).count();
    let top = majority(submissions);

    let (outcome, winner, majority_count, ratio) = match top {
        Some(t) if votes_cast > 0 => {
            let ratio = t.count as f64 / votes_cast as f64;
            if ratio >= task.consensus_threshold {
                (Outcome::ConsensusReached, Some(t.label), t.count, ratio)
            } else {
                (Outcome::Flagged, None, t.count, ratio)
            }
        }
        // Zero votes cast: force flagged.
        _ => (Outcome::Flagged, None, 0, 0.0),
    };

    let verdicts = submissions
        .iter()
        .map(|s| {
            let mut delta = 0.0;

            if let (Some(expected), Some(answered)) = (task.verification_answer, s.verification_answer)
            {
                if answered != expected {
                    delta -= VERIFICATION_PENALTY;
                }
            }

            let (matched, reason) = match (&outcome, winner.as_deref()) {
                (Outcome::ConsensusReached, Some(label)) => {
                    if s.vote.as_deref() == Some(label) {
                        delta += task.reward;
                        (Some(true), KarmaReason::ConsensusMatched { task_id: task.task_id })
                    } else {
                        delta -= MISS_PENALTY;
                        (Some(false), KarmaReason::ConsensusMissed { task_id: task.task_id })
                    }
                }
                _ => {
                    delta += PARTICIPATION_REWARD;
                    (None, KarmaReason::Participation { task_id: task.task_id })
                }
            };

            SubmissionVerdict {
                submission_id: s.submission_id,
                agent_id: s.agent_id,
                matched_consensus: matched,
                karma_delta: delta,
                reason,
            }
        })
        .collect();

    let plan = ResolutionPlan {
        task_id: task.task_id,
        outcome,
        consensus_result: winner,
        majority_count,
        votes_cast,
        ratio,
    };
    (plan, verdicts)
}
