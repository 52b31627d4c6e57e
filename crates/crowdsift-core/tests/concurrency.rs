//! Races the critical section: concurrent duplicates, and concurrent
//! submissions around the quorum boundary.

use std::sync::Arc;

use crowdsift_core::{
    AdmissionService, AgentId, CoreError, Judgment, TaskSpec, TaskStatus, TaskType,
};

fn vote(label: &str) -> Judgment {
    Judgment {
        vote: Some(label.to_string()),
        ..Judgment::default()
    }
}

/// Concurrent duplicate attempts by the same agent: exactly one
/// succeeds, every other racer gets `DuplicateSubmission`.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicates_exactly_one_winner() {
    let service = Arc::new(AdmissionService::new());
    let agent = AgentId::new();
    service.register_agent(agent, "racer").await.expect("register");
    let task_id = service
        .create_task(
            TaskType::Classify,
            "thread-1",
            TaskSpec {
                quorum: Some(5),
                ..TaskSpec::default()
            },
        )
        .await
        .expect("create");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.submit(agent, task_id, vote("signal")).await
        }));
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => accepted += 1,
            Err(CoreError::DuplicateSubmission { .. }) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 7);

    let snapshot = service.export_snapshot().await;
    assert_eq!(snapshot.submissions.len(), 1);
}

/// Eight agents race a quorum-5 task: exactly five submissions are
/// accepted, the task resolves exactly once at the fifth, and the rest
/// are turned away with `TaskClosed`.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_submissions_resolve_exactly_once() {
    let service = Arc::new(AdmissionService::new());
    let mut agents = Vec::new();
    for i in 0..8 {
        let id = AgentId::new();
        service
            .register_agent(id, &format!("racer-{i}"))
            .await
            .expect("register");
        agents.push(id);
    }
    let reward = 2.0;
    let task_id = service
        .create_task(
            TaskType::Classify,
            "thread-2",
            TaskSpec {
                quorum: Some(5),
                reward: Some(reward),
                ..TaskSpec::default()
            },
        )
        .await
        .expect("create");

    let mut handles = Vec::new();
    for agent in &agents {
        let service = Arc::clone(&service);
        let agent = *agent;
        handles.push(tokio::spawn(async move {
            (agent, service.submit(agent, task_id, vote("signal")).await)
        }));
    }

    let mut accepted = Vec::new();
    let mut closed = Vec::new();
    for handle in handles {
        let (agent, result) = handle.await.expect("join");
        match result {
            Ok(receipt) => {
                assert!(receipt.submissions_so_far <= 5);
                assert_eq!(receipt.submissions_needed, 5);
                accepted.push(agent);
            }
            Err(CoreError::TaskClosed { .. }) => closed.push(agent),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(accepted.len(), 5);
    assert_eq!(closed.len(), 3);

    let task = service.get_task(task_id).await.expect("task");
    assert_eq!(task.status, TaskStatus::ConsensusReached);
    assert_eq!(task.consensus_result.as_deref(), Some("signal"));

    // Resolution ran exactly once: one delta per accepted submission,
    // nothing for the turned-away agents.
    let snapshot = service.export_snapshot().await;
    assert_eq!(snapshot.submissions.len(), 5);
    assert_eq!(snapshot.karma_events.len(), 5);

    for agent in &accepted {
        assert_eq!(service.get_karma(*agent).await.unwrap().karma, reward);
    }
    for agent in &closed {
        assert_eq!(service.get_karma(*agent).await.unwrap().karma, 0.0);
    }
}
