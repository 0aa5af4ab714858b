use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use voidput::{Agent, AgentConfig, CallSite, Frame, InMemoryHost};

use super::{HASH_STORE, Options, caller, hash_store, print_stats, wait_until};

const OWNERS: usize = 4;
const MEMBERS: usize = 6;
const ROUNDS: usize = 50;

/// Many threads hammer a small set of call sites; every site ends up
/// installed exactly once and every owner is retransformed.
pub fn run(options: &Options) -> Result<(), String> {
    let host = Arc::new(InMemoryHost::new());
    let agent = Agent::start(
        host.clone(),
        AgentConfig::from_env().with_base_implementation(HASH_STORE),
    )
    .map_err(|e| e.to_string())?;

    host.define_artifact(&hash_store())
        .map_err(|e| format!("define {HASH_STORE}: {e}"))?;

    let members: Vec<String> = (0..MEMBERS).map(|m| format!("step{m}")).collect();
    let owners: Vec<String> = (0..OWNERS).map(|o| format!("demo/Worker{o}")).collect();
    for owner in &owners {
        host.define_artifact(&caller(owner, &members))
            .map_err(|e| format!("define {owner}: {e}"))?;
    }

    let barrier = Arc::new(Barrier::new(options.threads));
    let reporters: Vec<_> = (0..options.threads)
        .map(|t| {
            let agent = Arc::clone(&agent);
            let barrier = Arc::clone(&barrier);
            let owners = owners.clone();
            let members = members.clone();
            thread::Builder::new()
                .name(format!("reporter-{t}"))
                .spawn(move || {
                    barrier.wait();
                    let mut fresh = 0usize;
                    for round in 0..ROUNDS {
                        let (o, m) = site_of(t, round);
                        let (owner, member) = (&owners[o], &members[m]);
                        let site = CallSite::put(Frame::new(owner.as_str(), member.as_str()));
                        if agent.report_call_site(&site).unwrap_or(false) {
                            fresh += 1;
                        }
                    }
                    fresh
                })
                .map_err(|e| format!("spawn reporter: {e}"))
        })
        .collect::<Result<_, _>>()?;

    let mut fresh = 0;
    for reporter in reporters {
        fresh += reporter
            .join()
            .map_err(|_| "reporter thread panicked".to_string())?;
    }

    let expected: HashSet<(usize, usize)> = (0..options.threads)
        .flat_map(|t| (0..ROUNDS).map(move |round| site_of(t, round)))
        .collect();
    wait_until("every site to be installed", || {
        agent.installed().entry_count() == expected.len() && agent.staging().is_empty()
    })?;
    wait_until("every owner to be retransformed", || {
        owners.iter().all(|o| host.retransform_count(o) > 0)
    })?;

    tracing::info!(
        reports = options.threads * ROUNDS,
        fresh,
        installed = agent.installed().entry_count(),
        "scenario finished"
    );
    print_stats(&agent, options)
}

fn site_of(thread: usize, round: usize) -> (usize, usize) {
    ((round + thread) % OWNERS, round % MEMBERS)
}
