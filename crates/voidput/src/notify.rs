use voidput_rewrite::names::PUT;
use voidput_types::EntryKey;

use crate::AgentError;

/// Number of frames a host-provided stack must carry. Counting from the
/// innermost frame:
///
/// 0. the stack capture itself
/// 1. the notification entry point
/// 2. the instrumented `put`
/// 3. the code that called `put`
pub const REQUIRED_DEPTH: usize = 4;

const OPERATION_FRAME: usize = 2;
const CALLER_FRAME: usize = 3;

/// One frame of a stack snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub owner: String,
    pub member: String,
    /// Native frames have no artifact that could be rewritten.
    pub native: bool,
}

impl Frame {
    pub fn new(owner: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            member: member.into(),
            native: false,
        }
    }

    pub fn native(owner: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            native: true,
            ..Self::new(owner, member)
        }
    }
}

/// The instrumented operation together with the frame that invoked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    operation: String,
    caller: Frame,
}

impl CallSite {
    pub fn new(operation: impl Into<String>, caller: Frame) -> Self {
        Self {
            operation: operation.into(),
            caller,
        }
    }

    /// Call site of a `put` made by `caller`.
    pub fn put(caller: Frame) -> Self {
        Self::new(PUT, caller)
    }

    /// Derives the call site from a stack snapshot laid out as described on
    /// [`REQUIRED_DEPTH`].
    pub fn from_stack(frames: &[Frame]) -> Result<Self, AgentError> {
        if frames.len() < REQUIRED_DEPTH {
            return Err(invalid(format!(
                "stack has {} frames, need at least {REQUIRED_DEPTH}",
                frames.len()
            )));
        }

        let operation = &frames[OPERATION_FRAME];
        if operation.member != PUT {
            return Err(invalid(format!(
                "frame {OPERATION_FRAME} is {}#{}, expected {PUT}",
                operation.owner, operation.member
            )));
        }

        Ok(Self::new(
            operation.member.clone(),
            frames[CALLER_FRAME].clone(),
        ))
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn caller(&self) -> &Frame {
        &self.caller
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.caller.owner.clone(), self.caller.member.clone())
    }

    pub(crate) fn validate(&self) -> Result<(), AgentError> {
        if self.operation != PUT {
            return Err(invalid(format!(
                "operation is {}, expected {PUT}",
                self.operation
            )));
        }
        Ok(())
    }
}

fn invalid(reason: String) -> AgentError {
    tracing::error!(%reason, "invalid call site");
    AgentError::InvalidCallSite(reason)
}
