use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use voidput_index::EntryIndex;

use crate::{Agent, AgentError};

pub const COORDINATOR_THREAD: &str = "voidput-coordinator";

/// Starts the single consumer of the staging index. The thread is detached
/// and runs for the life of the process.
pub(crate) fn spawn(agent: Arc<Agent>) -> Result<(), AgentError> {
    thread::Builder::new()
        .name(COORDINATOR_THREAD.to_string())
        .spawn(move || run(&agent))
        .map(|_| ())
        .map_err(|e| AgentError::Spawn(e.to_string()))
}

fn run(agent: &Agent) {
    tracing::debug!("coordinator started");
    loop {
        agent.staging().wait_for_work();
        let diff = agent.staging().transfer_to(agent.installed());
        request_rewrites(agent, &diff);
    }
}

/// Asks the host to retransform every loaded owner in `diff`. Owners that
/// are not loaded yet are picked up when they are defined.
fn request_rewrites(agent: &Agent, diff: &EntryIndex) {
    let Some(owners) = diff.owner_names() else {
        return;
    };

    let host = agent.host();
    let loaded: HashSet<String> = host.loaded_owners().into_iter().collect();
    for owner in owners.iter().filter(|owner| loaded.contains(*owner)) {
        tracing::debug!(%owner, members = ?diff.members_of(owner), "requesting rewrite");
        let outcome = catch_unwind(AssertUnwindSafe(|| host.retransform(owner, agent)));
        let failure = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => err.to_string(),
            Err(_) => "host panicked during retransform".to_string(),
        };
        tracing::warn!(%owner, %failure, "rewrite request failed");
        agent.record_request_failure();
    }
}
