use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use voidput_index::EntryIndex;
use voidput_rewrite::names::CAPABILITY_MARKER;
use voidput_rewrite::{OwnerResolver, RewriteError, extend_store, rewrite_call_sites};
use voidput_types::AgentStats;

use crate::{AgentConfig, AgentError, CallSite, Host, Transformer, coordinator};

#[derive(Debug, Default, Clone, Copy)]
struct PipelineCounters {
    rewrite_request_failures: u64,
    rewrite_failures: u64,
    untransformed: u64,
}

/// The running agent: both indexes, the host it patches, and the transform
/// pipeline the host calls back into.
pub struct Agent {
    staging: EntryIndex,
    installed: EntryIndex,
    host: Arc<dyn Host>,
    config: AgentConfig,
    counters: Mutex<PipelineCounters>,
}

impl Agent {
    /// Starts an agent on `host`: registers it as a transformer and spawns
    /// the coordinator thread.
    pub fn start(host: Arc<dyn Host>, config: AgentConfig) -> Result<Arc<Self>, AgentError> {
        let loaded = host.loaded_owners();
        if let Some(owner) = config
            .base_implementations
            .iter()
            .find(|base| loaded.contains(*base))
        {
            tracing::error!(%owner, "base store implementation already loaded");
            return Err(AgentError::BaseAlreadyLoaded {
                owner: owner.clone(),
            });
        }

        let agent = Arc::new(Self {
            staging: EntryIndex::staging(),
            installed: EntryIndex::installed(),
            host: Arc::clone(&host),
            config,
            counters: Mutex::new(PipelineCounters::default()),
        });

        coordinator::spawn(Arc::clone(&agent))?;
        host.register_transformer(Arc::clone(&agent) as Arc<dyn Transformer>);

        tracing::info!(
            base_implementations = ?agent.config.base_implementations,
            dump_dir = ?agent.config.dump_dir,
            "voidput agent started"
        );
        Ok(agent)
    }

    /// Reports a `put` call site. Returns `Ok(true)` the first time a given
    /// caller is seen.
    pub fn report_call_site(&self, site: &CallSite) -> Result<bool, AgentError> {
        site.validate()?;

        let caller = site.caller();
        if caller.native {
            tracing::warn!(
                owner = %caller.owner,
                member = %caller.member,
                "put called from a native frame, ignoring"
            );
            return Ok(false);
        }

        let fresh = self.staging.report(&caller.owner, &caller.member);
        if fresh {
            tracing::debug!(owner = %caller.owner, member = %caller.member, "staged call site");
            self.staging.wake_up();
        }
        Ok(fresh)
    }

    pub fn staging(&self) -> &EntryIndex {
        &self.staging
    }

    pub fn installed(&self) -> &EntryIndex {
        &self.installed
    }

    pub fn host(&self) -> &dyn Host {
        &*self.host
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn stats(&self) -> AgentStats {
        let counters = *self.counters.lock();
        AgentStats {
            staging: self.staging.stats(),
            installed: self.installed.stats(),
            rewrite_request_failures: counters.rewrite_request_failures,
            rewrite_failures: counters.rewrite_failures,
            untransformed: counters.untransformed,
        }
    }

    pub fn dump_stats(&self) -> String {
        self.stats().to_string()
    }

    pub(crate) fn record_request_failure(&self) {
        self.counters.lock().rewrite_request_failures += 1;
    }

    /// Extends base implementations, then patches the installed call sites
    /// of `owner`. `None` means nothing changed.
    fn try_transform(&self, owner: &str, bytes: &[u8]) -> Result<Option<Vec<u8>>, RewriteError> {
        let mut current = Cow::Borrowed(bytes);
        let mut changed = false;

        if self.config.is_base_implementation(owner) {
            let extended = extend_store(&current)?;
            if extended.transformed {
                tracing::info!(%owner, "extended base store implementation");
                current = Cow::Owned(extended.bytes);
                changed = true;
            }
        }

        if let Some(members) = self.installed.members_of(owner) {
            tracing::debug!(%owner, ?members, "transform");
            let resolver = HostResolver { host: self.host() };
            let rewritten =
                rewrite_call_sites(&current, &members, &self.config.rewrite, &resolver)?;
            if rewritten.transformed {
                self.installed.mark_rewritten(owner, &members);
                current = Cow::Owned(rewritten.bytes);
                changed = true;
            } else {
                tracing::info!(%owner, ?members, "no put call sites to patch");
                self.counters.lock().untransformed += 1;
            }
        }

        Ok(changed.then(|| current.into_owned()))
    }

    fn dump(&self, owner: &str, bytes: &[u8]) {
        let Some(dir) = &self.config.dump_dir else {
            return;
        };
        let path = dir.join(format!("{owner}.vpa"));
        let written = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&path, bytes));
        match written {
            Ok(()) => tracing::debug!(path = %path.display(), "dumped transformed artifact"),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "failed to dump transformed artifact")
            }
        }
    }
}

impl Transformer for Agent {
    fn transform(&self, owner: &str, bytes: &[u8]) -> Vec<u8> {
        match self.try_transform(owner, bytes) {
            Ok(Some(transformed)) => {
                self.dump(owner, &transformed);
                transformed
            }
            Ok(None) => bytes.to_vec(),
            Err(err) => {
                tracing::warn!(%owner, %err, "transform failed, keeping original artifact");
                self.counters.lock().rewrite_failures += 1;
                bytes.to_vec()
            }
        }
    }
}

/// Answers capability questions by walking supertypes the host knows about.
struct HostResolver<'a> {
    host: &'a dyn Host,
}

impl OwnerResolver for HostResolver<'_> {
    fn is_capable(&self, owner: &str) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![owner.to_string()];
        while let Some(ty) = pending.pop() {
            if ty == CAPABILITY_MARKER {
                return true;
            }
            if seen.insert(ty.clone()) {
                pending.extend(self.host.supertypes(&ty));
            }
        }
        false
    }
}

/// Holds at most one agent.
pub struct AgentSlot {
    agent: OnceLock<Arc<Agent>>,
    installing: Mutex<()>,
}

impl Default for AgentSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentSlot {
    pub const fn new() -> Self {
        Self {
            agent: OnceLock::new(),
            installing: parking_lot::const_mutex(()),
        }
    }

    pub fn install(&self, host: Arc<dyn Host>, config: AgentConfig) -> Result<Arc<Agent>, AgentError> {
        let _installing = self.installing.lock();
        if self.agent.get().is_some() {
            tracing::error!("voidput agent already installed");
            return Err(AgentError::AlreadyInstalled);
        }

        let agent = Agent::start(host, config)?;
        if self.agent.set(Arc::clone(&agent)).is_err() {
            return Err(AgentError::AlreadyInstalled);
        }
        Ok(agent)
    }

    pub fn get(&self) -> Option<&Arc<Agent>> {
        self.agent.get()
    }

    pub fn report_call_site(&self, site: &CallSite) -> Result<bool, AgentError> {
        match self.agent.get() {
            Some(agent) => agent.report_call_site(site),
            None => {
                tracing::error!(
                    owner = %site.caller().owner,
                    member = %site.caller().member,
                    "call site reported with no agent installed"
                );
                Err(AgentError::NotInstalled)
            }
        }
    }
}
