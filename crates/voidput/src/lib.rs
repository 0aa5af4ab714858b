//! voidput - route discarded-result `put` calls to a fire-and-forget path
//!
//! Instrumented stores report each `put` call site to the agent. A single
//! coordinator thread batches new sites and asks the [`Host`] to retransform
//! their owners, patching calls whose result is thrown away to use the
//! store's void fast path.
//!
//! - [`install`] starts the process-wide agent.
//! - [`report_call_site`] is what instrumented `put` implementations call.
//! - [`Agent::stats`] / [`Agent::dump_stats`] expose the pipeline state.

use std::sync::Arc;

mod agent;
mod config;
mod coordinator;
mod error;
mod host;
mod notify;

pub use agent::{Agent, AgentSlot};
pub use config::{AgentConfig, BASE_IMPLS_ENV, DUMP_DIR_ENV};
pub use coordinator::COORDINATOR_THREAD;
pub use error::{AgentError, HostError};
pub use host::{Host, InMemoryHost, Transformer};
pub use notify::{CallSite, Frame, REQUIRED_DEPTH};
pub use voidput_rewrite::names;
pub use voidput_types::{AgentStats, EntryTiming, IndexStats, RaceCounters};

/// Stores that can skip computing the previous value of a `put`.
///
/// Store implementations extended by the agent carry this capability;
/// patched call sites test for it at run time.
pub trait NonReturnStore<K, V> {
    /// `put` without reporting the call site.
    fn put_alternative_slow_path(&self, key: K, value: V) -> Option<V>;

    /// `put` whose previous value is never observed.
    fn put_fast_path(&self, key: K, value: V);
}

static GLOBAL: AgentSlot = AgentSlot::new();

/// Installs the process-wide agent. Fails if one is already installed.
pub fn install(host: Arc<dyn Host>, config: AgentConfig) -> Result<Arc<Agent>, AgentError> {
    GLOBAL.install(host, config)
}

pub fn installed() -> Option<Arc<Agent>> {
    GLOBAL.get().cloned()
}

/// Reports a call site to the process-wide agent.
pub fn report_call_site(site: &CallSite) -> Result<bool, AgentError> {
    GLOBAL.report_call_site(site)
}
