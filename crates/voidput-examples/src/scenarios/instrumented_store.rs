use std::collections::HashMap;
use std::hash::Hash;
use std::panic::Location;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use voidput::{AgentConfig, CallSite, Frame, InMemoryHost, NonReturnStore};

use super::{Options, print_stats, wait_until};

/// A store whose `put` reports where it was called from, the way an
/// extended base implementation does.
struct ReportingStore<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash, V> ReportingStore<K, V> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[track_caller]
    fn put(&self, key: K, value: V) -> Option<V> {
        let location = Location::caller();
        let site = CallSite::put(Frame::new(
            location.file(),
            format!("line{}", location.line()),
        ));
        if let Err(err) = voidput::report_call_site(&site) {
            tracing::warn!(%err, "call site not reported");
        }
        self.put_alternative_slow_path(key, value)
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl<K: Eq + Hash, V> NonReturnStore<K, V> for ReportingStore<K, V> {
    fn put_alternative_slow_path(&self, key: K, value: V) -> Option<V> {
        self.entries.lock().insert(key, value)
    }

    fn put_fast_path(&self, key: K, value: V) {
        self.entries.lock().insert(key, value);
    }
}

/// Installs the process-wide agent and drives a real store from several
/// threads. Sites are identified by source location.
pub fn run(options: &Options) -> Result<(), String> {
    let host = Arc::new(InMemoryHost::new());
    let agent = voidput::install(host, AgentConfig::from_env()).map_err(|e| e.to_string())?;

    let store = Arc::new(ReportingStore::<u64, u64>::new());
    let workers: Vec<_> = (0..options.threads as u64)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..100u64 {
                    store.put(t * 1000 + i, i);
                    let previous = store.put(t * 1000 + i, i + 1);
                    debug_assert_eq!(previous, Some(i));
                }
            })
        })
        .collect();
    for worker in workers {
        worker
            .join()
            .map_err(|_| "worker thread panicked".to_string())?;
    }

    wait_until("both call sites to be installed", || {
        agent.installed().entry_count() == 2 && agent.staging().is_empty()
    })?;
    store.put_fast_path(u64::MAX, 0);

    tracing::info!(entries = store.len(), "store populated");
    print_stats(&agent, options)
}
