//! Owned in-memory ledger state.
//!
//! One [`LedgerState`] holds every table the engine needs: the agent
//! directory, the task store, the submission ledger with its uniqueness
//! constraint, the karma history, and the tag index. The admission
//! service wraps it in an exclusive lock; tests construct isolated
//! instances directly. The whole state serializes to JSON, which is
//! what the CLI persists between invocations.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{
    Agent, AgentId, CoreError, Result, Submission, Task, TaskId, TaskType,
};
use crate::karma::KarmaEvent;
use crate::tags::TagIndex;

/// The full persistent state of one Crowdsift deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    agents: BTreeMap<AgentId, Agent>,
    tasks: BTreeMap<TaskId, Task>,
    /// Arrival-ordered submission ledger.
    submissions: Vec<Submission>,
    /// Uniqueness constraint: at most one submission per (agent, task).
    submitted: BTreeSet<(AgentId, TaskId)>,
    karma_events: Vec<KarmaEvent>,
    tags: TagIndex,
    next_seq: u64,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    // -- agent directory ----------------------------------------------------

    /// Insert a freshly verified agent. Fails with a conflict if the id
    /// or handle is already registered.
    pub fn insert_agent(&mut self, agent: Agent) -> Result<()> {
        if self.agents.contains_key(&agent.agent_id) {
            return Err(CoreError::AgentExists(agent.agent_id.to_string()));
        }
        if self.agents.values().any(|a| a.handle == agent.handle) {
            return Err(CoreError::AgentExists(agent.handle));
        }
        self.agents.insert(agent.agent_id, agent);
        Ok(())
    }

    pub fn agent(&self, agent_id: AgentId) -> Result<&Agent> {
        self.agents
            .get(&agent_id)
            .ok_or(CoreError::AgentNotFound(agent_id))
    }

    pub fn agent_mut(&mut self, agent_id: AgentId) -> Result<&mut Agent> {
        self.agents
            .get_mut(&agent_id)
            .ok_or(CoreError::AgentNotFound(agent_id))
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn agents_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.values_mut()
    }

    // -- task store ---------------------------------------------------------

    pub fn insert_task(&mut self, task: Task) {
        self.tasks.insert(task.task_id, task);
    }

    pub fn task(&self, task_id: TaskId) -> Result<&Task> {
        self.tasks
            .get(&task_id)
            .ok_or(CoreError::TaskNotFound(task_id))
    }

    pub fn task_mut(&mut self, task_id: TaskId) -> Result<&mut Task> {
        self.tasks
            .get_mut(&task_id)
            .ok_or(CoreError::TaskNotFound(task_id))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Accepting tasks the agent has not yet submitted to, optionally
    /// filtered by type, capped at `limit`.
    pub fn open_tasks(
        &self,
        agent_id: AgentId,
        task_type: Option<TaskType>,
        limit: usize,
    ) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.status.accepting())
            .filter(|t| task_type.map(|ty| t.task_type == ty).unwrap_or(true))
            .filter(|t| !self.submitted.contains(&(agent_id, t.task_id)))
            .take(limit)
            .collect()
    }

    // -- submission ledger --------------------------------------------------

    /// Next arrival counter value; advances on every accepted submission.
    pub fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn has_submission(&self, agent_id: AgentId, task_id: TaskId) -> bool {
        self.submitted.contains(&(agent_id, task_id))
    }

    /// Check-and-insert under the (agent, task) uniqueness constraint.
    pub fn insert_submission(&mut self, submission: Submission) -> Result<()> {
        let key = (submission.agent_id, submission.task_id);
        if !self.submitted.insert(key) {
            return Err(CoreError::DuplicateSubmission {
                agent_id: submission.agent_id,
                task_id: submission.task_id,
            });
        }
        self.submissions.push(submission);
        Ok(())
    }

    pub fn submissions(&self) -> impl Iterator<Item = &Submission> {
        self.submissions.iter()
    }

    /// All submissions for a task, in arrival order.
    pub fn submissions_for(&self, task_id: TaskId) -> Vec<&Submission> {
        self.submissions
            .iter()
            .filter(|s| s.task_id == task_id)
            .collect()
    }

    pub fn submissions_for_mut(&mut self, task_id: TaskId) -> Vec<&mut Submission> {
        self.submissions
            .iter_mut()
            .filter(|s| s.task_id == task_id)
            .collect()
    }

    pub fn submission_count(&self, task_id: TaskId) -> usize {
        self.submissions
            .iter()
            .filter(|s| s.task_id == task_id)
            .count()
    }

    // -- karma history & tags -----------------------------------------------

    pub fn append_karma_event(&mut self, event: KarmaEvent) {
        self.karma_events.push(event);
    }

    pub fn karma_events(&self) -> impl Iterator<Item = &KarmaEvent> {
        self.karma_events.iter()
    }

    pub fn events_for(&self, agent_id: AgentId) -> Vec<&KarmaEvent> {
        self.karma_events
            .iter()
            .filter(|e| e.agent_id == agent_id)
            .collect()
    }

    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagIndex {
        &mut self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Judgment, TaskSpec};
    use chrono::Utc;

    fn seeded() -> (LedgerState, AgentId, TaskId) {
        let mut state = LedgerState::new();
        let agent = Agent::new(AgentId::new(), "curator-1", Utc::now());
        let agent_id = agent.agent_id;
        state.insert_agent(agent).unwrap();
        let task = Task::new(
            TaskType::Classify,
            "thread-1",
            TaskSpec::default(),
            Utc::now(),
        )
        .unwrap();
        let task_id = task.task_id;
        state.insert_task(task);
        (state, agent_id, task_id)
    }

    fn judgment() -> Judgment {
        Judgment {
            vote: Some("signal".into()),
            ..Judgment::default()
        }
    }

    #[test]
    fn test_duplicate_handle_rejected() {
        let (mut state, _, _) = seeded();
        let dup = Agent::new(AgentId::new(), "curator-1", Utc::now());
        let err = state.insert_agent(dup).unwrap_err();
        assert!(matches!(err, CoreError::AgentExists(_)));
    }

    #[test]
    fn test_submission_uniqueness_constraint() {
        let (mut state, agent_id, task_id) = seeded();
        let seq = state.take_seq();
        state
            .insert_submission(Submission::new(agent_id, task_id, seq, judgment(), Utc::now()))
            .unwrap();

        let seq = state.take_seq();
        let err = state
            .insert_submission(Submission::new(agent_id, task_id, seq, judgment(), Utc::now()))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateSubmission { .. }));
        assert_eq!(state.submission_count(task_id), 1);
    }

    #[test]
    fn test_open_tasks_excludes_already_submitted() {
        let (mut state, agent_id, task_id) = seeded();
        assert_eq!(state.open_tasks(agent_id, None, 10).len(), 1);

        let seq = state.take_seq();
        state
            .insert_submission(Submission::new(agent_id, task_id, seq, judgment(), Utc::now()))
            .unwrap();
        assert!(state.open_tasks(agent_id, None, 10).is_empty());

        let other = AgentId::new();
        assert_eq!(state.open_tasks(other, None, 10).len(), 1);
    }

    #[test]
    fn test_open_tasks_type_filter_and_limit() {
        let (mut state, agent_id, _) = seeded();
        for _ in 0..3 {
            state.insert_task(
                Task::new(TaskType::Tag, "thread-2", TaskSpec::default(), Utc::now()).unwrap(),
            );
        }
        assert_eq!(state.open_tasks(agent_id, Some(TaskType::Tag), 10).len(), 3);
        assert_eq!(state.open_tasks(agent_id, Some(TaskType::Tag), 2).len(), 2);
        assert_eq!(
            state.open_tasks(agent_id, Some(TaskType::Verify), 10).len(),
            0
        );
    }

    #[test]
    fn test_state_serde_roundtrip() {
        let (mut state, agent_id, task_id) = seeded();
        let seq = state.take_seq();
        state
            .insert_submission(Submission::new(agent_id, task_id, seq, judgment(), Utc::now()))
            .unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let back: LedgerState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
