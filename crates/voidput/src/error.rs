use std::fmt;

/// Errors surfaced to whoever installs the agent or reports call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// A call site was reported before any agent was installed.
    NotInstalled,
    AlreadyInstalled,
    /// A base store implementation was loaded before the agent could extend
    /// it at definition time.
    BaseAlreadyLoaded { owner: String },
    InvalidCallSite(String),
    Spawn(String),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInstalled => write!(f, "no voidput agent installed"),
            Self::AlreadyInstalled => write!(f, "a voidput agent is already installed"),
            Self::BaseAlreadyLoaded { owner } => {
                write!(f, "base store implementation {owner} was loaded before the agent")
            }
            Self::InvalidCallSite(reason) => write!(f, "invalid call site: {reason}"),
            Self::Spawn(err) => write!(f, "failed to spawn coordinator thread: {err}"),
        }
    }
}

impl std::error::Error for AgentError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    NotLoaded { owner: String },
    Refused { owner: String, reason: String },
    Malformed { owner: String, reason: String },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoaded { owner } => write!(f, "{owner} is not loaded"),
            Self::Refused { owner, reason } => {
                write!(f, "host refused to retransform {owner}: {reason}")
            }
            Self::Malformed { owner, reason } => {
                write!(f, "artifact for {owner} is malformed: {reason}")
            }
        }
    }
}

impl std::error::Error for HostError {}
