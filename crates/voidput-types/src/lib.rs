//! Shared entry identifiers and diagnostic snapshot types for voidput.
//!
//! The snapshot types live here so the index, the agent and anything reading
//! a stats dump can share them without depending on each other.

use std::fmt;

use facet::Facet;

mod report;

/// Separator between owner and member in a joined entry key.
pub const KEY_SEPARATOR: char = '#';

// ── Entry identity ───────────────────────────────────────────────

/// Identifies one candidate call site: a member (method) inside an owner
/// (class-like artifact).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Facet)]
pub struct EntryKey {
    pub owner: String,
    pub member: String,
}

impl EntryKey {
    pub fn new(owner: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            member: member.into(),
        }
    }

    /// The `owner#member` form used for existence tests.
    pub fn joined(&self) -> String {
        join_key(&self.owner, &self.member)
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.owner, self.member)
    }
}

/// Builds the joined `owner#member` key without an intermediate `EntryKey`.
pub fn join_key(owner: &str, member: &str) -> String {
    let mut key = String::with_capacity(owner.len() + member.len() + 1);
    key.push_str(owner);
    key.push(KEY_SEPARATOR);
    key.push_str(member);
    key
}

// ── Index snapshot types ─────────────────────────────────────────

/// Diagnostic counters kept by every entry index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Facet)]
pub struct RaceCounters {
    /// Reports for an entry that was already present.
    pub renotifications: u64,
    /// Two producers built a member set for the same owner at once.
    pub owner_group_races: u64,
    /// A member was already in its member set when a second insert landed.
    pub member_insert_races: u64,
}

/// Snapshot of one entry index.
#[derive(Debug, Clone, Facet)]
pub struct IndexStats {
    pub owner_count: u64,
    pub owners: Vec<String>,
    pub entry_count: u64,
    pub entries: Vec<EntrySnapshot>,
    pub counters: RaceCounters,
}

/// A single entry in an index snapshot.
#[derive(Debug, Clone, Facet)]
pub struct EntrySnapshot {
    /// Joined `owner#member` key.
    pub key: String,
    /// Lifecycle breakdown; only present for indexes that track rewrites.
    pub timing: Option<EntryTiming>,
}

/// Where an entry is in its lifecycle, with elapsed times in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum EntryTiming {
    /// Caught between being observed and having its staged time copied across.
    Transferring,
    /// Observed by the coordinator, no rewrite has landed yet.
    Observed {
        stage_to_observe_ms: u64,
        since_observed_ms: u64,
    },
    /// One or more rewrites landed; each is measured from observation.
    Rewritten {
        stage_to_observe_ms: u64,
        observe_to_rewrite_ms: Vec<u64>,
    },
}

// ── Agent snapshot types ─────────────────────────────────────────

/// Snapshot of the whole agent: both indexes plus pipeline counters.
#[derive(Debug, Clone, Facet)]
pub struct AgentStats {
    pub staging: IndexStats,
    pub installed: IndexStats,
    /// The host refused (or failed) a retransform request for an owner.
    pub rewrite_request_failures: u64,
    /// Rewriting or extending an artifact failed; original bytes were kept.
    pub rewrite_failures: u64,
    /// A rewrite ran but found no call site to patch.
    pub untransformed: u64,
}
