//! Karma ledger — balance arithmetic, decay, ranking, and the
//! append-only history that makes every balance auditable.
//!
//! All functions here are pure over the records they are handed; the
//! admission service owns locking and decides when a batch commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Agent, AgentId, TaskId};

/// Why a balance moved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KarmaReason {
    /// Vote matched the consensus label.
    ConsensusMatched { task_id: TaskId },
    /// Vote missed the consensus label (or no vote was cast).
    ConsensusMissed { task_id: TaskId },
    /// Flat no-fault reward for a flagged task.
    Participation { task_id: TaskId },
    /// Periodic proportional reduction of a positive balance.
    Decay { rate: f64 },
}

/// Immutable history record appended on every balance mutation.
///
/// `delta` is the requested delta, before the zero floor; replaying an
/// agent's events through [`recompute_balance`] reproduces the stored
/// balance exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KarmaEvent {
    pub agent_id: AgentId,
    pub delta: f64,
    pub reason: KarmaReason,
    pub recorded_at: DateTime<Utc>,
}

/// Apply one resolution delta to an agent.
///
/// `karma` is clamped at the zero floor; `total_earned` accumulates only
/// the positive part; `tasks_completed` always advances;
/// `consensus_matches` advances iff the delta was positive. Returns the
/// history record to append.
pub fn apply(agent: &mut Agent, delta: f64, reason: KarmaReason, now: DateTime<Utc>) -> KarmaEvent {
    agent.karma = (agent.karma + delta).max(0.0);
    agent.total_earned += delta.max(0.0);
    agent.tasks_completed += 1;
    if delta > 0.0 {
        agent.consensus_matches += 1;
    }
    KarmaEvent {
        agent_id: agent.agent_id,
        delta,
        reason,
        recorded_at: now,
    }
}

/// Decay one agent's positive balance by `rate`, rounding the new
/// balance to 2 decimals.
///
/// Agents at or under zero are unaffected. Returns the history record
/// iff the balance actually changed; decay does not advance the
/// activity counters.
pub fn decay_agent(agent: &mut Agent, rate: f64, now: DateTime<Utc>) -> Option<KarmaEvent> {
    if agent.karma <= 0.0 {
        return None;
    }
    let old = agent.karma;
    let new = round2(old * (1.0 - rate));
    if new == old {
        return None;
    }
    agent.karma = new;
    Some(KarmaEvent {
        agent_id: agent.agent_id,
        delta: new - old,
        reason: KarmaReason::Decay { rate },
        recorded_at: now,
    })
}

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rank of `subject` among `agents`: 1 + the number of other
/// non-blacklisted agents with strictly greater karma. Ties share a
/// rank.
pub fn rank<'a>(subject: &Agent, agents: impl IntoIterator<Item = &'a Agent>) -> u64 {
    1 + agents
        .into_iter()
        .filter(|a| {
            !a.blacklisted && a.agent_id != subject.agent_id && a.karma > subject.karma
        })
        .count() as u64
}

/// Replay an agent's full history with the zero-floor fold.
///
/// The result must equal the stored balance; [`crate::service::AdmissionService::audit_agent`]
/// exposes the comparison.
pub fn recompute_balance<'a>(events: impl IntoIterator<Item = &'a KarmaEvent>) -> f64 {
    events
        .into_iter()
        .fold(0.0_f64, |balance, e| (balance + e.delta).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with_karma(karma: f64) -> Agent {
        let mut a = Agent::new(AgentId::new(), "tester", Utc::now());
        a.karma = karma;
        a
    }

    fn reason() -> KarmaReason {
        KarmaReason::ConsensusMatched {
            task_id: TaskId::new(),
        }
    }

    #[test]
    fn test_apply_positive_delta() {
        let mut a = agent_with_karma(1.0);
        apply(&mut a, 2.0, reason(), Utc::now());
        assert_eq!(a.karma, 3.0);
        assert_eq!(a.total_earned, 2.0);
        assert_eq!(a.tasks_completed, 1);
        assert_eq!(a.consensus_matches, 1);
    }

    #[test]
    fn test_penalty_clamps_at_zero_floor() {
        let mut a = agent_with_karma(0.3);
        apply(
            &mut a,
            -0.5,
            KarmaReason::ConsensusMissed {
                task_id: TaskId::new(),
            },
            Utc::now(),
        );
        assert_eq!(a.karma, 0.0);
        assert_eq!(a.total_earned, 0.0);
        assert_eq!(a.tasks_completed, 1);
        assert_eq!(a.consensus_matches, 0);
    }

    #[test]
    fn test_decay_twenty_percent() {
        let now = Utc::now();
        let mut a = agent_with_karma(25.0);
        let event = decay_agent(&mut a, 0.20, now).expect("changed");
        assert_eq!(a.karma, 20.0);
        assert_eq!(event.delta, -5.0);
        assert_eq!(a.tasks_completed, 0);
    }

    #[test]
    fn test_decay_skips_zero_balance() {
        let mut a = agent_with_karma(0.0);
        assert!(decay_agent(&mut a, 0.20, Utc::now()).is_none());
        assert_eq!(a.karma, 0.0);
    }

    #[test]
    fn test_decay_rounds_to_two_decimals() {
        let mut a = agent_with_karma(1.11);
        decay_agent(&mut a, 0.20, Utc::now()).expect("changed");
        assert_eq!(a.karma, 0.89);
    }

    #[test]
    fn test_rank_ties_share_first_place() {
        let mut a = agent_with_karma(50.0);
        let mut b = agent_with_karma(50.0);
        let c = agent_with_karma(10.0);
        a.handle = "a".into();
        b.handle = "b".into();
        let all = [a.clone(), b.clone(), c.clone()];

        assert_eq!(rank(&a, &all), 1);
        assert_eq!(rank(&b, &all), 1);
        assert_eq!(rank(&c, &all), 3);
    }

    #[test]
    fn test_rank_ignores_blacklisted() {
        let top = agent_with_karma(100.0);
        let mut shadow = agent_with_karma(200.0);
        shadow.blacklisted = true;
        let all = [top.clone(), shadow];
        assert_eq!(rank(&top, &all), 1);
    }

    #[test]
    fn test_recompute_matches_stored_balance() {
        let now = Utc::now();
        let mut a = agent_with_karma(0.0);
        let mut history = Vec::new();

        history.push(apply(&mut a, 2.0, reason(), now));
        history.push(apply(
            &mut a,
            -0.5,
            KarmaReason::ConsensusMissed {
                task_id: TaskId::new(),
            },
            now,
        ));
        history.push(apply(
            &mut a,
            -5.0,
            KarmaReason::ConsensusMissed {
                task_id: TaskId::new(),
            },
            now,
        ));
        history.push(apply(&mut a, 1.0, reason(), now));
        if let Some(e) = decay_agent(&mut a, 0.20, now) {
            history.push(e);
        }

        assert_eq!(recompute_balance(&history), a.karma);
    }
}
