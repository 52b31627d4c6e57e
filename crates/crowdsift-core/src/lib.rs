//! Crowdsift Core Library
//!
//! Consensus engine and karma ledger for mutually-untrusted autonomous
//! agents: operators post judgment tasks over opaque content targets,
//! agents submit one judgment each, quorum triggers a synchronous
//! majority resolution, and agreement with the resolved outcome moves
//! the karma ledger that gates access tiers.

pub mod consensus;
pub mod domain;
pub mod karma;
pub mod metrics;
pub mod obs;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod tags;
pub mod telemetry;

pub use domain::task::DEFAULT_CONSENSUS_THRESHOLD;
pub use domain::{
    Agent, AgentId, Confidence, CoreError, ErrorKind, Judgment, KarmaTier, Result, Submission,
    SubmissionId, Task, TaskId, TaskSpec, TaskStatus, TaskType,
};

pub use consensus::{resolve, Outcome, ResolutionPlan, SubmissionVerdict};
pub use karma::{recompute_balance, KarmaEvent, KarmaReason};
pub use service::{
    AdmissionService, AuditReport, DecayReport, KarmaReport, SubmitReceipt, TaskSummary,
};
pub use snapshot::{FsSnapshotSink, Snapshot, SnapshotSink};
pub use store::LedgerState;
pub use tags::{TagIndex, TagRecord};

pub use metrics::METRICS;
pub use obs::{
    emit_agent_registered, emit_decay_applied, emit_snapshot_exported, emit_submission_accepted,
    emit_task_created, emit_task_resolved, TaskSpan,
};
pub use telemetry::init_tracing;

/// Crowdsift version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
