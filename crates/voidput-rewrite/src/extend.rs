use voidput_wire::{
    Access, Insn, InvokeKind, Member, decode_artifact_default, encode_artifact_default,
};

use crate::RewriteError;
use crate::names::{
    ALTERNATIVE_SLOW_PATH, CAPABILITY_MARKER, FAST_PATH, NOTIFY_DESC, NOTIFY_NAME, NOTIFY_OWNER,
    ORIGINAL_SLOW_PATH, PUT, PUT_DESC, SET, SET_DESC,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extended {
    pub bytes: Vec<u8>,
    pub transformed: bool,
}

/// Gives a base store implementation the capability marker and the three
/// entry points patched callers rely on.
///
/// The existing `put` is kept as the private `put$originalSlowPath`. A new
/// public `put` reports its caller to the agent before delegating to it.
/// Artifacts that already declare the marker come back untouched.
pub fn extend_store(bytes: &[u8]) -> Result<Extended, RewriteError> {
    let mut artifact = decode_artifact_default(bytes)?;
    let owner = artifact.name.clone();

    if artifact.declares(CAPABILITY_MARKER) {
        tracing::debug!(%owner, "store already carries the capability marker");
        return Ok(Extended {
            bytes: bytes.to_vec(),
            transformed: false,
        });
    }

    if artifact.member(SET, SET_DESC).is_none() {
        return Err(missing(&owner, SET));
    }
    let original = artifact
        .member_mut(PUT, PUT_DESC)
        .ok_or_else(|| missing(&owner, PUT))?;
    original.name = ORIGINAL_SLOW_PATH.to_string();
    original.access = Access::Private;

    artifact.supertypes.push(CAPABILITY_MARKER.to_string());
    artifact.members.extend([
        instrumented_put(&owner),
        fast_path(&owner),
        alternative_slow_path(&owner),
    ]);

    tracing::debug!(%owner, "extended store implementation");
    Ok(Extended {
        bytes: encode_artifact_default(&artifact)?,
        transformed: true,
    })
}

fn missing(owner: &str, member: &str) -> RewriteError {
    RewriteError::MissingMember {
        owner: owner.to_string(),
        member: member.to_string(),
    }
}

fn delegate(owner: &str, target: &str, desc: &str) -> Vec<Insn> {
    vec![
        Insn::Load { slot: 0 },
        Insn::Load { slot: 1 },
        Insn::Load { slot: 2 },
        Insn::invoke(InvokeKind::Virtual, owner, target, desc),
    ]
}

fn instrumented_put(owner: &str) -> Member {
    let mut code = vec![
        Insn::invoke(InvokeKind::Static, NOTIFY_OWNER, NOTIFY_NAME, NOTIFY_DESC),
        Insn::Pop,
    ];
    code.extend(delegate(owner, ORIGINAL_SLOW_PATH, PUT_DESC));
    code.push(Insn::ReturnValue);
    Member::new(PUT, PUT_DESC, Access::Public).with_code(code)
}

fn fast_path(owner: &str) -> Member {
    let mut code = delegate(owner, SET, SET_DESC);
    code.push(Insn::Return);
    Member::new(FAST_PATH, SET_DESC, Access::Public).with_code(code)
}

fn alternative_slow_path(owner: &str) -> Member {
    let mut code = delegate(owner, ORIGINAL_SLOW_PATH, PUT_DESC);
    code.push(Insn::ReturnValue);
    Member::new(ALTERNATIVE_SLOW_PATH, PUT_DESC, Access::Public).with_code(code)
}
