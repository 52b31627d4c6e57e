//! Agent directory records and karma tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AgentId;

/// A verified agent contributor.
///
/// Created when the external identity collaborator hands over a verified
/// `(agent_id, handle)` pair. Balance and activity counters are mutated
/// only by the karma ledger; agents are never deleted — blacklisting is
/// the soft-disable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Opaque identity token supplied by the identity collaborator.
    pub agent_id: AgentId,
    /// Human-readable handle, unique across the directory.
    pub handle: String,
    /// Stored karma balance. Never negative.
    pub karma: f64,
    /// Lifetime sum of positive deltas. Monotonic.
    pub total_earned: f64,
    /// Number of resolved tasks this agent participated in.
    pub tasks_completed: u64,
    /// Number of resolutions where this agent came out ahead.
    pub consensus_matches: u64,
    /// Soft-disable flag. Blacklisted agents fail every gated operation.
    pub blacklisted: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Agent {
    /// Create a freshly verified agent with a zero balance.
    pub fn new(agent_id: AgentId, handle: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            agent_id,
            handle: handle.into(),
            karma: 0.0,
            total_earned: 0.0,
            tasks_completed: 0,
            consensus_matches: 0,
            blacklisted: false,
            created_at: now,
            last_active: now,
        }
    }

    /// Current access tier for this agent's balance.
    pub fn tier(&self) -> KarmaTier {
        KarmaTier::for_karma(self.karma)
    }
}

/// Named karma bracket controlling content-access gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KarmaTier {
    Newcomer,
    Contributor,
    Trusted,
}

impl KarmaTier {
    /// Map a balance onto its tier: >= 50 trusted, >= 10 contributor,
    /// everything else newcomer.
    pub fn for_karma(karma: f64) -> Self {
        if karma >= 50.0 {
            KarmaTier::Trusted
        } else if karma >= 10.0 {
            KarmaTier::Contributor
        } else {
            KarmaTier::Newcomer
        }
    }

    /// What this tier unlocks.
    pub fn perks(&self) -> &'static [&'static str] {
        match self {
            KarmaTier::Newcomer => &["Can contribute", "Limited access"],
            KarmaTier::Contributor => &["Full dataset access", "RSS feeds"],
            KarmaTier::Trusted => &["2x vote weight", "Analytics access"],
        }
    }
}

impl std::fmt::Display for KarmaTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KarmaTier::Newcomer => "newcomer",
            KarmaTier::Contributor => "contributor",
            KarmaTier::Trusted => "trusted",
        };
        write!(f, "{s}")
    }
}
