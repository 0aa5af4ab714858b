use voidput_wire::{Insn, InvokeKind, decode_artifact_default, encode_artifact_default};

use crate::names::{
    ALTERNATIVE_SLOW_PATH, CAPABILITY_MARKER, FAST_PATH, PUT, PUT_DESC, SET_DESC,
};
use crate::{OwnerResolver, RewriteConfig, RewriteError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub bytes: Vec<u8>,
    /// Whether any call site was patched. When `false`, `bytes` are the
    /// input bytes unchanged.
    pub transformed: bool,
    pub sites: usize,
}

/// Patches every store `put` inside the named members of the artifact in
/// `bytes`.
pub fn rewrite_call_sites(
    bytes: &[u8],
    members: &[String],
    config: &RewriteConfig,
    resolver: &dyn OwnerResolver,
) -> Result<Rewritten, RewriteError> {
    let mut artifact = decode_artifact_default(bytes)?;

    let mut sites = 0;
    for member in artifact
        .members
        .iter_mut()
        .filter(|m| members.iter().any(|name| *name == m.name))
    {
        let next_label = member.next_label();
        let code = std::mem::take(&mut member.code);
        let (code, patched) = CallSiteRewriter::new(config, resolver, next_label)
            .run(code)
            .map_err(|LabelSpaceExhausted| RewriteError::LabelSpaceExhausted {
                owner: artifact.name.clone(),
                member: member.name.clone(),
            })?;
        if patched > 0 {
            tracing::debug!(
                owner = %artifact.name,
                member = %member.name,
                sites = patched,
                "patched put call sites"
            );
        }
        member.code = code;
        sites += patched;
    }

    if sites == 0 {
        return Ok(Rewritten {
            bytes: bytes.to_vec(),
            transformed: false,
            sites,
        });
    }

    Ok(Rewritten {
        bytes: encode_artifact_default(&artifact)?,
        transformed: true,
        sites,
    })
}

/// No label id is left for the sequence around a patched call.
struct LabelSpaceExhausted;

struct PendingPut {
    kind: InvokeKind,
    owner: String,
}

/// Single forward pass over one member's code. A matched `put` is held back
/// until the next instruction shows whether its result is discarded.
struct CallSiteRewriter<'a> {
    config: &'a RewriteConfig,
    resolver: &'a dyn OwnerResolver,
    out: Vec<Insn>,
    pending: Option<PendingPut>,
    next_label: Option<u32>,
    sites: usize,
}

impl<'a> CallSiteRewriter<'a> {
    fn new(
        config: &'a RewriteConfig,
        resolver: &'a dyn OwnerResolver,
        next_label: Option<u32>,
    ) -> Self {
        Self {
            config,
            resolver,
            out: Vec::new(),
            pending: None,
            next_label,
            sites: 0,
        }
    }

    fn run(mut self, code: Vec<Insn>) -> Result<(Vec<Insn>, usize), LabelSpaceExhausted> {
        self.out.reserve(code.len());
        for insn in code {
            if matches!(insn, Insn::Pop) && self.pending.is_some() {
                self.flush(true)?;
                continue;
            }
            self.flush(false)?;
            match insn {
                Insn::Invoke {
                    kind,
                    owner,
                    name,
                    desc,
                } if name == PUT && desc == PUT_DESC && self.targets_store(kind, &owner) => {
                    self.pending = Some(PendingPut { kind, owner });
                }
                other => self.out.push(other),
            }
        }
        self.flush(false)?;
        Ok((self.out, self.sites))
    }

    fn targets_store(&self, kind: InvokeKind, owner: &str) -> bool {
        match kind {
            InvokeKind::Interface => self.config.is_store_interface(owner),
            InvokeKind::Virtual => self.resolver.is_capable(owner),
            InvokeKind::Static | InvokeKind::Special => false,
        }
    }

    fn fresh_label(&mut self) -> Result<u32, LabelSpaceExhausted> {
        let id = self.next_label.ok_or(LabelSpaceExhausted)?;
        self.next_label = id.checked_add(1);
        Ok(id)
    }

    /// Emits the held-back `put`, if any. With `discarded` set, the `pop`
    /// that follows it is folded into the emitted sequence.
    fn flush(&mut self, discarded: bool) -> Result<(), LabelSpaceExhausted> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        self.sites += 1;

        let fallback = self.fresh_label()?;
        let done = self.fresh_label()?;

        // [store, key, value]
        self.out.extend([
            Insn::Dup2X1,
            Insn::Pop2,
            Insn::Dup,
            Insn::InstanceOf {
                ty: CAPABILITY_MARKER.to_string(),
            },
            Insn::IfEq { target: fallback },
            Insn::CheckCast {
                ty: CAPABILITY_MARKER.to_string(),
            },
            Insn::DupX2,
            Insn::Pop,
        ]);
        if discarded {
            self.out.push(Insn::invoke(
                InvokeKind::Interface,
                CAPABILITY_MARKER,
                FAST_PATH,
                SET_DESC,
            ));
        } else {
            self.out.push(Insn::invoke(
                InvokeKind::Interface,
                CAPABILITY_MARKER,
                ALTERNATIVE_SLOW_PATH,
                PUT_DESC,
            ));
        }
        self.out.extend([
            Insn::Goto { target: done },
            Insn::Label { id: fallback },
            Insn::DupX2,
            Insn::Pop,
            Insn::invoke(pending.kind, pending.owner, PUT, PUT_DESC),
        ]);
        if discarded {
            self.out.push(Insn::Pop);
        }
        self.out.push(Insn::Label { id: done });

        Ok(())
    }
}
