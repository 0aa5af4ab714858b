pub mod concurrent_reporters;
pub mod failing_host;
pub mod instrumented_store;

use std::thread;
use std::time::{Duration, Instant};

use voidput::Agent;
use voidput::names::{PUT, PUT_DESC, SET, SET_DESC, STORE_INTERFACE};
use voidput_wire::{Access, Artifact, Insn, InvokeKind, Member};

pub struct Options {
    pub json: bool,
    pub threads: usize,
}

pub const HASH_STORE: &str = "demo/HashStore";

/// Polls `check` until it holds or ten seconds pass.
pub fn wait_until(what: &str, mut check: impl FnMut() -> bool) -> Result<(), String> {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if check() {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(10));
    }
    Err(format!("timed out waiting for {what}"))
}

pub fn print_stats(agent: &Agent, options: &Options) -> Result<(), String> {
    let stats = agent.stats();
    if options.json {
        let json = facet_json::to_string(&stats).map_err(|e| format!("encode stats: {e}"))?;
        println!("{json}");
    } else {
        print!("{stats}");
    }
    Ok(())
}

/// A caller whose `members` each do one store `put` and discard the result.
pub fn caller(owner: &str, members: &[String]) -> Artifact {
    let mut artifact = Artifact::new(owner);
    for member in members {
        artifact.members.push(
            Member::new(member.as_str(), "(store,key,value)->void", Access::Public).with_code(
                vec![
                    Insn::Load { slot: 1 },
                    Insn::Load { slot: 2 },
                    Insn::Load { slot: 3 },
                    Insn::invoke(InvokeKind::Interface, STORE_INTERFACE, PUT, PUT_DESC),
                    Insn::Pop,
                    Insn::Return,
                ],
            ),
        );
    }
    artifact
}

pub fn hash_store() -> Artifact {
    let insert = || Insn::invoke(InvokeKind::Special, HASH_STORE, "insert", PUT_DESC);

    let mut artifact = Artifact::new(HASH_STORE);
    artifact.supertypes.push(STORE_INTERFACE.to_string());
    artifact.members.push(Member::new(PUT, PUT_DESC, Access::Public).with_code(vec![
        Insn::Load { slot: 0 },
        Insn::Load { slot: 1 },
        Insn::Load { slot: 2 },
        insert(),
        Insn::ReturnValue,
    ]));
    artifact.members.push(Member::new(SET, SET_DESC, Access::Public).with_code(vec![
        Insn::Load { slot: 0 },
        Insn::Load { slot: 1 },
        Insn::Load { slot: 2 },
        insert(),
        Insn::Pop,
        Insn::Return,
    ]));
    artifact
}
