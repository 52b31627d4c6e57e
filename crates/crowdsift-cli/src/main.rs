//! Crowdsift operator CLI.
//!
//! Drives the admission service against a JSON ledger state file: load,
//! run one operation, atomically rewrite. The state path comes from
//! `--state` or the `CROWDSIFT_STATE` environment variable.
//!
//! ## Commands
//!
//! - `register`: admit a verified agent into the directory
//! - `create-task`: post a judgment task
//! - `tasks`: list open tasks for an agent
//! - `submit`: hand in a judgment (may trigger resolution)
//! - `karma`: karma standing, tier, and rank
//! - `decay`: apply a decay sweep (run on a cron cadence)
//! - `export`: write the dated audit snapshot
//! - `audit`: replay an agent's history against its balance

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use crowdsift_core::{
    AdmissionService, AgentId, Confidence, FsSnapshotSink, Judgment, LedgerState, SnapshotSink,
    TaskId, TaskSpec, TaskType, METRICS,
};

#[derive(Parser)]
#[command(name = "crowdsift")]
#[command(author = "Crowdsift Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Consensus-verified judgment engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to the ledger state file
    #[arg(
        long,
        global = true,
        env = "CROWDSIFT_STATE",
        default_value = "crowdsift.json"
    )]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Admit an externally verified agent into the directory
    Register {
        /// Unique handle for the agent
        #[arg(long)]
        handle: String,

        /// Verified identity token (generated if omitted)
        #[arg(long)]
        agent_id: Option<AgentId>,
    },

    /// Blacklist (or un-blacklist) an agent
    Blacklist {
        /// Agent to update
        agent: AgentId,

        /// Clear the flag instead of setting it
        #[arg(long)]
        clear: bool,
    },

    /// Create a new judgment task
    CreateTask {
        /// Task type: classify, tag, link, extract, summarize, verify
        #[arg(long)]
        task_type: TaskType,

        /// Opaque target reference (thread id, URL, ...)
        #[arg(long)]
        target: String,

        /// Submissions required before resolution (default: type table)
        #[arg(long)]
        quorum: Option<u32>,

        /// Consensus threshold fraction (default: 0.6)
        #[arg(long)]
        threshold: Option<f64>,

        /// Reward points (default: type table)
        #[arg(long)]
        reward: Option<f64>,

        /// Ground-truth verification answer
        #[arg(long)]
        verification_answer: Option<bool>,
    },

    /// List open tasks for an agent
    Tasks {
        /// Requesting agent
        #[arg(long)]
        agent: AgentId,

        /// Filter by task type
        #[arg(long)]
        task_type: Option<TaskType>,

        /// Maximum number of tasks to list
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Submit a judgment for a task
    Submit {
        /// Submitting agent
        #[arg(long)]
        agent: AgentId,

        /// Task to submit to
        #[arg(long)]
        task: TaskId,

        /// Vote label
        #[arg(long)]
        vote: Option<String>,

        /// Confidence: low, medium, high
        #[arg(long, default_value = "medium")]
        confidence: Confidence,

        /// Free-text reasoning
        #[arg(long)]
        reasoning: Option<String>,

        /// Answer to the task's verification question
        #[arg(long)]
        verification_answer: Option<bool>,

        /// Structured content for extract/summarize tasks
        #[arg(long)]
        content: Option<String>,
    },

    /// Show an agent's karma standing
    Karma {
        /// Agent to report on
        agent: AgentId,
    },

    /// Apply a karma decay sweep to all agents
    Decay {
        /// Decay rate in (0, 1)
        #[arg(long, default_value = "0.2")]
        rate: f64,
    },

    /// Archive a resolved task
    Archive {
        /// Task to archive
        task: TaskId,
    },

    /// Export the audit snapshot to a directory
    Export {
        /// Output directory for the dated audit files
        #[arg(long, default_value = "audit")]
        out: PathBuf,
    },

    /// Show consensus-approved tags for a target
    Tags {
        /// Target reference to look up
        target: String,
    },

    /// Replay an agent's karma history against its stored balance
    Audit {
        /// Agent to audit
        agent: AgentId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    crowdsift_core::init_tracing(cli.json, level);

    let service = AdmissionService::from_state(load_state(&cli.state)?);

    let mutates = matches!(
        cli.command,
        Commands::Register { .. }
            | Commands::Blacklist { .. }
            | Commands::CreateTask { .. }
            | Commands::Submit { .. }
            | Commands::Decay { .. }
            | Commands::Archive { .. }
    );

    let outcome = run_command(&service, cli.command).await;

    // Persist even when the command failed: an accepted submission must
    // survive a failed resolution so a retry can re-resolve.
    if mutates {
        save_state(&cli.state, &service.state_snapshot().await)?;
    }
    METRICS.flush();
    outcome
}

async fn run_command(service: &AdmissionService, command: Commands) -> Result<()> {
    match command {
        Commands::Register { handle, agent_id } => {
            let agent_id = agent_id.unwrap_or_default();
            let agent = service
                .register_agent(agent_id, &handle)
                .await
                .context("Failed to register agent")?;
            print_json(&agent)
        }
        Commands::Blacklist { agent, clear } => {
            service
                .set_blacklisted(agent, !clear)
                .await
                .context("Failed to update blacklist flag")?;
            println!(
                "Agent {agent} {}",
                if clear { "removed from blacklist" } else { "blacklisted" }
            );
            Ok(())
        }
        Commands::CreateTask {
            task_type,
            target,
            quorum,
            threshold,
            reward,
            verification_answer,
        } => {
            let spec = TaskSpec {
                quorum,
                consensus_threshold: threshold,
                reward,
                verification_answer,
            };
            let task_id = service
                .create_task(task_type, &target, spec)
                .await
                .context("Failed to create task")?;
            let task = service.get_task(task_id).await?;
            print_json(&task)
        }
        Commands::Tasks {
            agent,
            task_type,
            limit,
        } => {
            let tasks = service
                .list_open_tasks(agent, task_type, limit)
                .await
                .context("Failed to list tasks")?;
            print_json(&tasks)
        }
        Commands::Submit {
            agent,
            task,
            vote,
            confidence,
            reasoning,
            verification_answer,
            content,
        } => {
            let judgment = Judgment {
                vote,
                confidence,
                reasoning,
                verification_answer,
                content,
            };
            let receipt = service
                .submit(agent, task, judgment)
                .await
                .context("Submission rejected")?;
            print_json(&receipt)?;
            let task = service.get_task(task).await?;
            if task.status.is_terminal() {
                println!(
                    "Task resolved: {} ({})",
                    task.status,
                    task.consensus_result.as_deref().unwrap_or("no consensus")
                );
            }
            Ok(())
        }
        Commands::Karma { agent } => {
            let report = service
                .get_karma(agent)
                .await
                .context("Failed to fetch karma")?;
            print_json(&report)
        }
        Commands::Decay { rate } => {
            let report = service.decay(rate).await.context("Decay sweep failed")?;
            print_json(&report)
        }
        Commands::Archive { task } => {
            service
                .archive_task(task)
                .await
                .context("Failed to archive task")?;
            println!("Task {task} archived");
            Ok(())
        }
        Commands::Export { out } => {
            let snapshot = service.export_snapshot().await;
            let sink = FsSnapshotSink::new(&out).context("Failed to open export directory")?;
            let paths = sink.write(&snapshot).context("Failed to write snapshot")?;
            for path in &paths {
                println!("Wrote {}", path.display());
            }
            println!("Snapshot digest: {}", snapshot.content_digest);
            Ok(())
        }
        Commands::Tags { target } => {
            let tags = service.tags_for(&target).await;
            print_json(&tags)
        }
        Commands::Audit { agent } => {
            let report = service
                .audit_agent(agent)
                .await
                .context("Failed to audit agent")?;
            print_json(&report)?;
            anyhow::ensure!(
                report.consistent,
                "stored balance {} diverges from replayed history {}",
                report.stored_karma,
                report.recomputed_karma
            );
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_state(path: &Path) -> Result<LedgerState> {
    if !path.exists() {
        info!(state = %path.display(), "state file not found, starting empty");
        return Ok(LedgerState::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse state file {}", path.display()))
}

fn save_state(path: &Path, state: &LedgerState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)?;
    }
    // Atomic rewrite: temp file next to the target, then rename.
    let mut tmp = tempfile::NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))?;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path)
        .with_context(|| format!("Failed to persist state file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let state = LedgerState::new();
        save_state(&path, &state).unwrap();
        let loaded = load_state(&path).unwrap();
        assert_eq!(state, loaded);
    }

    #[test]
    fn test_missing_state_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let loaded = load_state(&path).unwrap();
        assert_eq!(loaded, LedgerState::new());
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_state(&path).is_err());
    }
}
