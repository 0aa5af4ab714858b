//! Artifact transformations that route discarded-result `put` calls to a
//! void fast path.
//!
//! Two passes live here:
//!
//! - [`rewrite_call_sites`] patches callers. Each matched `put` becomes a
//!   runtime capability test that picks the fast path (result discarded) or
//!   the alternate default path (result used), falling back to the original
//!   call for stores without the capability.
//! - [`extend_store`] patches a base store implementation so it carries the
//!   capability and the entry points the patched callers invoke.

use std::fmt;

use voidput_wire::WireError;

mod extend;
mod rewrite;

pub use extend::{Extended, extend_store};
pub use rewrite::{Rewritten, rewrite_call_sites};

/// Member names, descriptors and type names shared by both passes and the
/// agent.
pub mod names {
    pub const PUT: &str = "put";
    pub const SET: &str = "set";
    pub const FAST_PATH: &str = "put$fastPath";
    pub const ORIGINAL_SLOW_PATH: &str = "put$originalSlowPath";
    pub const ALTERNATIVE_SLOW_PATH: &str = "put$alternativeSlowPath";

    /// `put(key, value)` returning the previous value.
    pub const PUT_DESC: &str = "(key,value)->value";
    /// `set(key, value)` returning nothing.
    pub const SET_DESC: &str = "(key,value)->void";

    pub const CAPABILITY_MARKER: &str = "voidput/NonReturnStore";

    pub const STORE_INTERFACE: &str = "voidput/Store";
    pub const CONCURRENT_STORE_INTERFACE: &str = "voidput/ConcurrentStore";

    pub const NOTIFY_OWNER: &str = "voidput/Agent";
    pub const NOTIFY_NAME: &str = "report_call_site";
    pub const NOTIFY_DESC: &str = "()->bool";
}

#[derive(Debug)]
pub enum RewriteError {
    Wire(WireError),
    MissingMember { owner: String, member: String },
    /// Every label id is taken, so the patched sequence cannot be emitted.
    LabelSpaceExhausted { owner: String, member: String },
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wire(err) => write!(f, "artifact codec: {err}"),
            Self::MissingMember { owner, member } => {
                write!(f, "{owner} has no member {member}")
            }
            Self::LabelSpaceExhausted { owner, member } => {
                write!(f, "{owner}#{member} has no free label ids")
            }
        }
    }
}

impl std::error::Error for RewriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Wire(err) => Some(err),
            Self::MissingMember { .. } | Self::LabelSpaceExhausted { .. } => None,
        }
    }
}

impl From<WireError> for RewriteError {
    fn from(value: WireError) -> Self {
        Self::Wire(value)
    }
}

/// Decides whether a concrete owner type carries the capability marker,
/// either directly or through a supertype.
pub trait OwnerResolver {
    fn is_capable(&self, owner: &str) -> bool;
}

impl<F> OwnerResolver for F
where
    F: Fn(&str) -> bool,
{
    fn is_capable(&self, owner: &str) -> bool {
        self(owner)
    }
}

/// Which receiver types count as stores when a `put` is dispatched through
/// an interface.
#[derive(Debug, Clone)]
pub struct RewriteConfig {
    pub store_interfaces: Vec<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            store_interfaces: vec![
                names::STORE_INTERFACE.to_string(),
                names::CONCURRENT_STORE_INTERFACE.to_string(),
            ],
        }
    }
}

impl RewriteConfig {
    pub fn is_store_interface(&self, owner: &str) -> bool {
        self.store_interfaces.iter().any(|s| s == owner)
    }
}
