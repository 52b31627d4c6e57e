//! Task admission service — the exposed API surface.
//!
//! Owns the ledger state behind one exclusive lock. Every operation is
//! a single critical section, so submission-acceptance, quorum-check,
//! and resolution are serialized: two racing submissions can never both
//! trigger resolution, and duplicates are rejected deterministically.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::consensus::{self, Outcome};
use crate::domain::{
    Agent, AgentId, CoreError, Judgment, KarmaTier, Result, Submission, Task, TaskId, TaskSpec,
    TaskStatus, TaskType,
};
use crate::karma;
use crate::metrics::METRICS;
use crate::obs;
use crate::snapshot::Snapshot;
use crate::store::LedgerState;
use crate::tags::TagRecord;

/// Summary of an open task, as returned to listing agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub target: String,
    pub reward: f64,
    pub quorum: u32,
    pub submissions_so_far: u32,
    pub instructions: String,
}

/// Receipt for an accepted (or re-resolved) submission.
///
/// `submissions_needed` is the task's total quorum, not the remaining
/// count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub submissions_so_far: u32,
    pub submissions_needed: u32,
}

/// Karma standing for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KarmaReport {
    pub agent_id: AgentId,
    pub handle: String,
    pub karma: f64,
    pub total_earned: f64,
    pub tier: KarmaTier,
    pub rank: u64,
    pub perks: Vec<String>,
    pub tasks_completed: u64,
    pub consensus_matches: u64,
}

/// Result of a decay sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecayReport {
    pub agents_affected: u64,
}

/// Stored-vs-replayed balance comparison for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub agent_id: AgentId,
    pub stored_karma: f64,
    pub recomputed_karma: f64,
    pub events: usize,
    pub consistent: bool,
}

/// The admission service: creation, listing, submission, and the
/// quorum-triggered invocation of the consensus resolver.
#[derive(Debug, Default)]
pub struct AdmissionService {
    state: Mutex<LedgerState>,
}

impl AdmissionService {
    /// Service over empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Service over previously persisted state.
    pub fn from_state(state: LedgerState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Clone the full state, e.g. for persistence by the caller.
    pub async fn state_snapshot(&self) -> LedgerState {
        self.state.lock().await.clone()
    }

    // -- agent directory ----------------------------------------------------

    /// Admit an externally verified `(agent_id, handle)` pair into the
    /// directory.
    pub async fn register_agent(&self, agent_id: AgentId, handle: &str) -> Result<Agent> {
        if handle.is_empty() {
            return Err(CoreError::InvalidSubmission("handle must not be empty".into()));
        }
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let agent = Agent::new(agent_id, handle, now);
        state.insert_agent(agent.clone())?;
        obs::emit_agent_registered(&agent_id.to_string(), handle);
        Ok(agent)
    }

    /// Soft-disable (or re-enable) an agent. Admin operation.
    pub async fn set_blacklisted(&self, agent_id: AgentId, blacklisted: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.agent_mut(agent_id)?.blacklisted = blacklisted;
        Ok(())
    }

    /// Look up an agent without the blacklist gate (admin/read path).
    pub async fn get_agent(&self, agent_id: AgentId) -> Result<Agent> {
        Ok(self.state.lock().await.agent(agent_id)?.clone())
    }

    // -- task store ---------------------------------------------------------

    /// Create a task; unset spec fields fall back to the type table.
    pub async fn create_task(
        &self,
        task_type: TaskType,
        target: &str,
        spec: TaskSpec,
    ) -> Result<TaskId> {
        let now = Utc::now();
        let task = Task::new(task_type, target, spec, now)?;
        let task_id = task.task_id;
        let mut state = self.state.lock().await;
        state.insert_task(task);
        obs::emit_task_created(&task_id.to_string(), task_type.name());
        Ok(task_id)
    }

    pub async fn get_task(&self, task_id: TaskId) -> Result<Task> {
        Ok(self.state.lock().await.task(task_id)?.clone())
    }

    /// Accepting tasks the agent can still submit to.
    pub async fn list_open_tasks(
        &self,
        agent_id: AgentId,
        task_type: Option<TaskType>,
        limit: usize,
    ) -> Result<Vec<TaskSummary>> {
        let state = self.state.lock().await;
        Self::gate(&state, agent_id)?;
        let summaries = state
            .open_tasks(agent_id, task_type, limit)
            .into_iter()
            .map(|t| TaskSummary {
                task_id: t.task_id,
                task_type: t.task_type,
                target: t.target.clone(),
                reward: t.reward,
                quorum: t.quorum,
                submissions_so_far: state.submission_count(t.task_id) as u32,
                instructions: t.task_type.instructions().to_string(),
            })
            .collect();
        Ok(summaries)
    }

    /// Archive a resolved task. Externally driven; never part of
    /// resolution itself.
    pub async fn archive_task(&self, task_id: TaskId) -> Result<()> {
        let mut state = self.state.lock().await;
        let task = state.task_mut(task_id)?;
        match task.status {
            TaskStatus::ConsensusReached | TaskStatus::Flagged => {
                task.status = TaskStatus::Completed;
                Ok(())
            }
            status => Err(CoreError::NotArchivable { task_id, status }),
        }
    }

    // -- submission ledger --------------------------------------------------

    /// Accept a judgment for a task.
    ///
    /// Insert plus any triggered resolution is one atomic unit under the
    /// service lock. If this submission brings the count to quorum, the
    /// consensus resolver runs synchronously before the call returns. A
    /// retried call that finds its submission already inserted but the
    /// task still accepting re-runs resolution instead of inserting a
    /// duplicate record.
    pub async fn submit(
        &self,
        agent_id: AgentId,
        task_id: TaskId,
        judgment: Judgment,
    ) -> Result<SubmitReceipt> {
        judgment.validate()?;
        let now = Utc::now();
        let mut state = self.state.lock().await;
        Self::gate(&state, agent_id)?;

        let task = state.task(task_id)?;
        let quorum = task.quorum;
        let accepting = task.status.accepting();
        let status = task.status;

        if state.has_submission(agent_id, task_id) {
            let count = state.submission_count(task_id) as u32;
            if accepting && count >= quorum {
                // Insert landed earlier but resolution did not: the only
                // recovery is to re-run it, never to insert again.
                Self::resolve_task(&mut state, task_id, now)?;
                return Ok(SubmitReceipt {
                    submissions_so_far: count,
                    submissions_needed: quorum,
                });
            }
            METRICS.inc_duplicates_rejected();
            return Err(CoreError::DuplicateSubmission { agent_id, task_id });
        }

        if !accepting {
            return Err(CoreError::TaskClosed { task_id, status });
        }

        let seq = state.take_seq();
        state.insert_submission(Submission::new(agent_id, task_id, seq, judgment, now))?;
        state.agent_mut(agent_id)?.last_active = now;

        let task = state.task_mut(task_id)?;
        if task.status == TaskStatus::Pending {
            task.status = TaskStatus::InProgress;
        }

        let count = state.submission_count(task_id) as u32;
        METRICS.inc_submissions_accepted();
        obs::emit_submission_accepted(&task_id.to_string(), &agent_id.to_string(), count, quorum);

        if count >= quorum {
            Self::resolve_task(&mut state, task_id, now)?;
        }

        Ok(SubmitReceipt {
            submissions_so_far: count,
            submissions_needed: quorum,
        })
    }

    /// Run the resolver for a task at quorum and commit the outcome.
    ///
    /// The plan is computed as pure data and the whole karma batch is
    /// validated before the first write; on any error the task is left
    /// in its prior accepting state with its submissions intact.
    fn resolve_task(
        state: &mut LedgerState,
        task_id: TaskId,
        now: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let task = state.task(task_id)?.clone();
        if task.status.is_terminal() {
            // Exactly-once: a concurrent path already resolved it.
            return Ok(());
        }
        let _span = obs::TaskSpan::enter(&task_id.to_string());

        let submissions: Vec<Submission> = state
            .submissions_for(task_id)
            .into_iter()
            .cloned()
            .collect();
        let (plan, verdicts) = consensus::resolve(&task, &submissions);

        // All-or-nothing: the whole batch must be applicable before any
        // delta lands.
        for verdict in &verdicts {
            state.agent(verdict.agent_id)?;
        }

        for verdict in &verdicts {
            let agent = state.agent_mut(verdict.agent_id)?;
            let event = karma::apply(agent, verdict.karma_delta, verdict.reason, now);
            state.append_karma_event(event);
        }

        for submission in state.submissions_for_mut(task_id) {
            if let Some(verdict) = verdicts
                .iter()
                .find(|v| v.submission_id == submission.submission_id)
            {
                submission.matched_consensus = verdict.matched_consensus;
                submission.karma_delta = Some(verdict.karma_delta);
            }
        }

        let task = state.task_mut(task_id)?;
        task.status = match plan.outcome {
            Outcome::ConsensusReached => TaskStatus::ConsensusReached,
            Outcome::Flagged => TaskStatus::Flagged,
        };
        task.consensus_result = plan.consensus_result.clone();
        task.resolved_at = Some(now);
        let task_type = task.task_type;
        let target = task.target.clone();

        if task_type == TaskType::Tag && plan.outcome == Outcome::ConsensusReached {
            if let Some(label) = plan.consensus_result.as_deref() {
                state.tags_mut().register(target, label, task_id, now);
            }
        }

        METRICS.inc_tasks_resolved();
        obs::emit_task_resolved(
            &task_id.to_string(),
            match plan.outcome {
                Outcome::ConsensusReached => "consensus_reached",
                Outcome::Flagged => "flagged",
            },
            plan.votes_cast as u32,
            plan.ratio,
        );
        Ok(())
    }

    // -- karma ledger -------------------------------------------------------

    /// Karma standing, tier, and rank for an agent.
    pub async fn get_karma(&self, agent_id: AgentId) -> Result<KarmaReport> {
        let state = self.state.lock().await;
        let agent = Self::gate(&state, agent_id)?;
        let rank = karma::rank(agent, state.agents());
        Ok(KarmaReport {
            agent_id: agent.agent_id,
            handle: agent.handle.clone(),
            karma: agent.karma,
            total_earned: agent.total_earned,
            tier: agent.tier(),
            rank,
            perks: agent.tier().perks().iter().map(|p| p.to_string()).collect(),
            tasks_completed: agent.tasks_completed,
            consensus_matches: agent.consensus_matches,
        })
    }

    /// Decay every positive balance by `rate`. Cadence is the caller's
    /// responsibility.
    pub async fn decay(&self, rate: f64) -> Result<DecayReport> {
        if !(rate > 0.0 && rate < 1.0) {
            return Err(CoreError::InvalidDecayRate(rate));
        }
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let events: Vec<_> = state
            .agents_mut()
            .filter_map(|agent| karma::decay_agent(agent, rate, now))
            .collect();
        let agents_affected = events.len() as u64;
        for event in events {
            state.append_karma_event(event);
        }
        obs::emit_decay_applied(rate, agents_affected);
        Ok(DecayReport { agents_affected })
    }

    /// Replay an agent's history against its stored balance.
    pub async fn audit_agent(&self, agent_id: AgentId) -> Result<AuditReport> {
        let state = self.state.lock().await;
        let agent = state.agent(agent_id)?;
        let events = state.events_for(agent_id);
        let recomputed = karma::recompute_balance(events.iter().copied());
        Ok(AuditReport {
            agent_id,
            stored_karma: agent.karma,
            recomputed_karma: recomputed,
            events: events.len(),
            consistent: recomputed == agent.karma,
        })
    }

    // -- export -------------------------------------------------------------

    /// Point-in-time export of agents, resolved tasks, submissions, and
    /// the karma event log, digested for tamper evidence.
    pub async fn export_snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;
        let snapshot = Snapshot::capture(&state, Utc::now());
        obs::emit_snapshot_exported(snapshot.resolved_tasks.len(), &snapshot.content_digest);
        snapshot
    }

    /// Consensus-approved tags registered against a target.
    pub async fn tags_for(&self, target: &str) -> Vec<TagRecord> {
        self.state
            .lock()
            .await
            .tags()
            .for_target(target)
            .into_iter()
            .cloned()
            .collect()
    }

    // -- shared gates -------------------------------------------------------

    /// Identity gate for agent-facing operations: the agent must exist
    /// and not be blacklisted.
    fn gate(state: &LedgerState, agent_id: AgentId) -> Result<&Agent> {
        let agent = state.agent(agent_id)?;
        if agent.blacklisted {
            return Err(CoreError::Blacklisted(agent_id));
        }
        Ok(agent)
    }
}
