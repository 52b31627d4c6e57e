//! Point-in-time audit export.
//!
//! A [`Snapshot`] carries the agent directory, every terminal task, the
//! full submission ledger, and the karma event log, sealed with a
//! SHA-256 content digest for tamper evidence. [`FsSnapshotSink`]
//! persists a snapshot as the three-file audit layout (`karma.json`,
//! `consensus.json`, `contributions.json`) under a dated directory,
//! writing each file atomically.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::domain::{Agent, Result, Submission, Task};
use crate::karma::KarmaEvent;
use crate::store::LedgerState;

/// Immutable export of the ledger at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub agents: Vec<Agent>,
    /// Tasks in a resolution or archival state.
    pub resolved_tasks: Vec<Task>,
    pub submissions: Vec<Submission>,
    pub karma_events: Vec<KarmaEvent>,
    /// SHA-256 over the serialized snapshot (digest field excluded).
    pub content_digest: String,
}

impl Snapshot {
    /// Capture the current state and seal it with its digest.
    pub fn capture(state: &LedgerState, now: DateTime<Utc>) -> Self {
        let mut snapshot = Self {
            generated_at: now,
            agents: state.agents().cloned().collect(),
            resolved_tasks: state
                .tasks()
                .filter(|t| t.status.is_terminal())
                .cloned()
                .collect(),
            submissions: state.submissions().cloned().collect(),
            karma_events: state.karma_events().cloned().collect(),
            content_digest: String::new(),
        };
        snapshot.content_digest = snapshot.compute_digest();
        snapshot
    }

    fn compute_digest(&self) -> String {
        let mut unsigned = self.clone();
        unsigned.content_digest = String::new();
        let bytes = serde_json::to_vec(&unsigned).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    /// Verify the snapshot against its digest.
    pub fn verify_integrity(&self) -> bool {
        self.content_digest == self.compute_digest()
    }
}

/// Destination for exported snapshots.
pub trait SnapshotSink {
    /// Persist a snapshot, returning the paths written.
    fn write(&self, snapshot: &Snapshot) -> Result<Vec<PathBuf>>;
}

/// Filesystem sink writing the dated three-file audit layout.
///
/// Layout: `<root>/<YYYY-MM-DD>/{karma,consensus,contributions}.json`
pub struct FsSnapshotSink {
    root: PathBuf,
}

impl FsSnapshotSink {
    /// Create a sink rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn write_atomic(dir: &Path, name: &str, payload: &serde_json::Value) -> Result<PathBuf> {
        let path = dir.join(name);
        let json = serde_json::to_string_pretty(payload)?;
        // Atomic write: temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }
}

impl SnapshotSink for FsSnapshotSink {
    fn write(&self, snapshot: &Snapshot) -> Result<Vec<PathBuf>> {
        let date = snapshot.generated_at.format("%Y-%m-%d").to_string();
        let day_dir = self.root.join(&date);
        fs::create_dir_all(&day_dir)?;

        let karma = serde_json::json!({
            "date": date,
            "content_digest": snapshot.content_digest,
            "agents": snapshot.agents,
        });
        let consensus = serde_json::json!({
            "date": date,
            "content_digest": snapshot.content_digest,
            "tasks": snapshot.resolved_tasks,
        });
        let contributions = serde_json::json!({
            "date": date,
            "content_digest": snapshot.content_digest,
            "submissions": snapshot.submissions,
            "karma_events": snapshot.karma_events,
        });

        Ok(vec![
            Self::write_atomic(&day_dir, "karma.json", &karma)?,
            Self::write_atomic(&day_dir, "consensus.json", &consensus)?,
            Self::write_atomic(&day_dir, "contributions.json", &contributions)?,
        ])
    }
}
