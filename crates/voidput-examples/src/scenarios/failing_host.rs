use std::sync::Arc;

use voidput::{Agent, AgentConfig, CallSite, Frame, InMemoryHost};

use super::{Options, caller, print_stats, wait_until};

const HEALTHY: &str = "demo/Healthy";
const BROKEN: &str = "demo/Broken";

/// The host refuses to retransform one owner. The coordinator logs it,
/// counts it, and keeps patching everything else.
pub fn run(options: &Options) -> Result<(), String> {
    let host = Arc::new(InMemoryHost::new());
    let agent = Agent::start(host.clone(), AgentConfig::from_env()).map_err(|e| e.to_string())?;

    let members = vec!["save".to_string(), "flush".to_string()];
    for owner in [HEALTHY, BROKEN] {
        host.define_artifact(&caller(owner, &members))
            .map_err(|e| format!("define {owner}: {e}"))?;
    }
    host.fail_retransform(BROKEN, "verifier rejected patched code");

    for owner in [BROKEN, HEALTHY] {
        let site = CallSite::put(Frame::new(owner, "save"));
        agent.report_call_site(&site).map_err(|e| e.to_string())?;
    }
    wait_until("healthy owner to be patched", || {
        host.retransform_count(HEALTHY) == 1 && agent.stats().rewrite_request_failures == 1
    })?;

    // Once the host recovers, the next new site for the broken owner gets
    // it patched along with everything installed before.
    host.clear_failure(BROKEN);
    let site = CallSite::put(Frame::new(BROKEN, "flush"));
    agent.report_call_site(&site).map_err(|e| e.to_string())?;
    wait_until("broken owner to be patched", || {
        host.retransform_count(BROKEN) == 1
    })?;

    print_stats(&agent, options)
}
