#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

use voidput::names::{PUT, PUT_DESC, SET, SET_DESC, STORE_INTERFACE};
use voidput_wire::{Access, Artifact, Insn, InvokeKind, Member};

pub const ORDERS: &str = "acme/Orders";
pub const AUDIT: &str = "acme/Audit";
pub const HASH_STORE: &str = "acme/HashStore";

pub fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if check() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {what}");
}

fn store_put() -> Insn {
    Insn::invoke(InvokeKind::Interface, STORE_INTERFACE, PUT, PUT_DESC)
}

fn load_args() -> Vec<Insn> {
    vec![
        Insn::Load { slot: 1 },
        Insn::Load { slot: 2 },
        Insn::Load { slot: 3 },
    ]
}

/// `record` discards the result of its `put`, `replace` returns it.
pub fn orders() -> Artifact {
    let mut record = load_args();
    record.extend([store_put(), Insn::Pop, Insn::Return]);

    let mut replace = load_args();
    replace.extend([store_put(), Insn::ReturnValue]);

    let mut artifact = Artifact::new(ORDERS);
    artifact.members.extend([
        Member::new("record", "(store,key,value)->void", Access::Public).with_code(record),
        Member::new("replace", "(store,key,value)->value", Access::Public).with_code(replace),
    ]);
    artifact
}

/// No store calls at all.
pub fn audit() -> Artifact {
    let mut artifact = Artifact::new(AUDIT);
    artifact.members.push(
        Member::new("flush", "()->void", Access::Public).with_code(vec![Insn::Return]),
    );
    artifact
}

pub fn hash_store() -> Artifact {
    let insert = || Insn::invoke(InvokeKind::Special, HASH_STORE, "insert", PUT_DESC);

    let mut artifact = Artifact::new(HASH_STORE);
    artifact.supertypes.push(STORE_INTERFACE.to_string());
    artifact.members.extend([
        Member::new(PUT, PUT_DESC, Access::Public).with_code(vec![
            Insn::Load { slot: 0 },
            Insn::Load { slot: 1 },
            Insn::Load { slot: 2 },
            insert(),
            Insn::ReturnValue,
        ]),
        Member::new(SET, SET_DESC, Access::Public).with_code(vec![
            Insn::Load { slot: 0 },
            Insn::Load { slot: 1 },
            Insn::Load { slot: 2 },
            insert(),
            Insn::Pop,
            Insn::Return,
        ]),
    ]);
    artifact
}

pub fn code_of(artifact: &Artifact, member: &str) -> Vec<Insn> {
    artifact
        .members
        .iter()
        .find(|m| m.name == member)
        .map(|m| m.code.clone())
        .unwrap_or_default()
}
