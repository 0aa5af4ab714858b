//! Boundary to the runtime that owns loaded artifacts.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use voidput_wire::{Artifact, WireError, decode_artifact_default, encode_artifact_default};

use crate::HostError;

/// Turns the bytes of an artifact being defined or retransformed into the
/// bytes that should be loaded. Returning the input unchanged is always
/// valid.
pub trait Transformer: Send + Sync {
    fn transform(&self, owner: &str, bytes: &[u8]) -> Vec<u8>;
}

/// A runtime that can replace the code of a loaded artifact.
pub trait Host: Send + Sync + 'static {
    fn loaded_owners(&self) -> Vec<String>;

    /// Direct supertypes of a loaded owner. Hosts that cannot tell return
    /// an empty list.
    fn supertypes(&self, owner: &str) -> Vec<String> {
        let _ = owner;
        Vec::new()
    }

    /// Runs `transformer` on every artifact defined from now on.
    fn register_transformer(&self, transformer: Arc<dyn Transformer>);

    /// Re-runs `transformer` on the originally defined bytes of `owner` and
    /// swaps in the result.
    fn retransform(&self, owner: &str, transformer: &dyn Transformer) -> Result<(), HostError>;
}

struct Loaded {
    original: Vec<u8>,
    current: Vec<u8>,
    retransforms: u64,
}

/// Host that keeps artifacts in memory. Retransform failures can be injected
/// per owner.
#[derive(Default)]
pub struct InMemoryHost {
    artifacts: Mutex<BTreeMap<String, Loaded>>,
    transformers: Mutex<Vec<Arc<dyn Transformer>>>,
    failures: Mutex<HashMap<String, String>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines `owner` from `bytes`, running every registered transformer.
    /// Returns the bytes that were loaded.
    pub fn define(&self, owner: &str, bytes: Vec<u8>) -> Vec<u8> {
        let transformers = self.transformers.lock().clone();
        let current = transformers
            .iter()
            .fold(bytes.clone(), |current, t| t.transform(owner, &current));

        self.artifacts.lock().insert(
            owner.to_string(),
            Loaded {
                original: bytes,
                current: current.clone(),
                retransforms: 0,
            },
        );
        tracing::debug!(%owner, "defined artifact");
        current
    }

    pub fn define_artifact(&self, artifact: &Artifact) -> Result<Vec<u8>, WireError> {
        let bytes = encode_artifact_default(artifact)?;
        Ok(self.define(&artifact.name, bytes))
    }

    pub fn current_bytes(&self, owner: &str) -> Option<Vec<u8>> {
        self.artifacts
            .lock()
            .get(owner)
            .map(|loaded| loaded.current.clone())
    }

    pub fn current_artifact(&self, owner: &str) -> Result<Artifact, HostError> {
        let bytes = self.current_bytes(owner).ok_or_else(|| HostError::NotLoaded {
            owner: owner.to_string(),
        })?;
        decode_artifact_default(&bytes).map_err(|e| HostError::Malformed {
            owner: owner.to_string(),
            reason: e.to_string(),
        })
    }

    /// Number of successful retransforms of `owner`.
    pub fn retransform_count(&self, owner: &str) -> u64 {
        self.artifacts
            .lock()
            .get(owner)
            .map_or(0, |loaded| loaded.retransforms)
    }

    pub fn fail_retransform(&self, owner: impl Into<String>, reason: impl Into<String>) {
        self.failures.lock().insert(owner.into(), reason.into());
    }

    pub fn clear_failure(&self, owner: &str) {
        self.failures.lock().remove(owner);
    }
}

impl Host for InMemoryHost {
    fn loaded_owners(&self) -> Vec<String> {
        self.artifacts.lock().keys().cloned().collect()
    }

    fn supertypes(&self, owner: &str) -> Vec<String> {
        self.current_artifact(owner)
            .map(|artifact| artifact.supertypes)
            .unwrap_or_default()
    }

    fn register_transformer(&self, transformer: Arc<dyn Transformer>) {
        self.transformers.lock().push(transformer);
    }

    fn retransform(&self, owner: &str, transformer: &dyn Transformer) -> Result<(), HostError> {
        if let Some(reason) = self.failures.lock().get(owner).cloned() {
            return Err(HostError::Refused {
                owner: owner.to_string(),
                reason,
            });
        }

        // Transformers may call back into the host, so no lock is held
        // while one runs.
        let original = self
            .artifacts
            .lock()
            .get(owner)
            .map(|loaded| loaded.original.clone())
            .ok_or_else(|| HostError::NotLoaded {
                owner: owner.to_string(),
            })?;

        let current = transformer.transform(owner, &original);

        let mut artifacts = self.artifacts.lock();
        let loaded = artifacts.get_mut(owner).ok_or_else(|| HostError::NotLoaded {
            owner: owner.to_string(),
        })?;
        loaded.current = current;
        loaded.retransforms += 1;
        Ok(())
    }
}
