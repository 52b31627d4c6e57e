//! Structured observability hooks for the task/consensus lifecycle.
//!
//! This module provides:
//! - Task-scoped tracing spans via the `TaskSpan` RAII guard
//! - Emission functions for key lifecycle events: registration, task
//!   creation, submission acceptance, resolution, decay, export
//!
//! Events are emitted at `info!` level; filtering is controlled by the
//! subscriber installed via [`crate::telemetry::init_tracing`].

use tracing::info;

/// RAII guard that enters a task-scoped tracing span for the duration
/// of a resolution.
pub struct TaskSpan {
    _span: tracing::span::EnteredSpan,
}

impl TaskSpan {
    /// Create and enter a span tagged with the task id.
    pub fn enter(task_id: &str) -> Self {
        let span = tracing::info_span!("crowdsift.task", task_id = %task_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a verified agent joined the directory.
pub fn emit_agent_registered(agent_id: &str, handle: &str) {
    info!(event = "agent.registered", agent_id = %agent_id, handle = %handle);
}

/// Emit event: a task was created and is accepting submissions.
pub fn emit_task_created(task_id: &str, task_type: &str) {
    info!(event = "task.created", task_id = %task_id, task_type = %task_type);
}

/// Emit event: a submission was accepted into the ledger.
pub fn emit_submission_accepted(task_id: &str, agent_id: &str, count: u32, quorum: u32) {
    info!(
        event = "submission.accepted",
        task_id = %task_id,
        agent_id = %agent_id,
        count = count,
        quorum = quorum,
    );
}

/// Emit event: resolution ran and the task reached a terminal outcome.
pub fn emit_task_resolved(task_id: &str, outcome: &str, votes_cast: u32, ratio: f64) {
    info!(
        event = "task.resolved",
        task_id = %task_id,
        outcome = %outcome,
        votes_cast = votes_cast,
        ratio = ratio,
    );
}

/// Emit event: a decay sweep completed.
pub fn emit_decay_applied(rate: f64, agents_affected: u64) {
    info!(event = "karma.decayed", rate = rate, agents_affected = agents_affected);
}

/// Emit event: an audit snapshot was exported.
pub fn emit_snapshot_exported(resolved_tasks: usize, content_digest: &str) {
    info!(
        event = "snapshot.exported",
        resolved_tasks = resolved_tasks,
        content_digest = %content_digest,
    );
}
