use std::time::{Duration, Instant};

use dashmap::DashMap;
use voidput_types::EntryTiming;

use crate::Tracking;

/// Per-entry lifecycle times, keyed by joined `owner#member`.
pub(crate) struct Timestamps {
    tracking: Tracking,
    staged: DashMap<String, Instant>,
    observed: DashMap<String, Instant>,
    rewritten: DashMap<String, Vec<Instant>>,
}

impl Timestamps {
    pub(crate) fn new(tracking: Tracking) -> Self {
        Self {
            tracking,
            staged: DashMap::new(),
            observed: DashMap::new(),
            rewritten: DashMap::new(),
        }
    }

    pub(crate) fn tracking(&self) -> Tracking {
        self.tracking
    }

    pub(crate) fn record_first_report(&self, key: &str) {
        let now = Instant::now();
        match self.tracking {
            Tracking::Staged => {
                self.staged.insert(key.to_owned(), now);
            }
            Tracking::Rewrites => {
                self.observed.insert(key.to_owned(), now);
            }
        }
    }

    pub(crate) fn staged(&self, key: &str) -> Option<Instant> {
        self.staged.get(key).map(|at| *at.value())
    }

    pub(crate) fn set_staged(&self, key: &str, at: Instant) {
        self.staged.insert(key.to_owned(), at);
    }

    pub(crate) fn mark_rewritten(&self, key: &str) {
        if self.tracking != Tracking::Rewrites {
            return;
        }
        self.rewritten
            .entry(key.to_owned())
            .or_default()
            .push(Instant::now());
    }

    pub(crate) fn timing(&self, key: &str, now: Instant) -> Option<EntryTiming> {
        if self.tracking != Tracking::Rewrites {
            return None;
        }

        let observed = self.observed.get(key).map(|at| *at.value());
        let (Some(staged), Some(observed)) = (self.staged(key), observed) else {
            return Some(EntryTiming::Transferring);
        };

        let stage_to_observe_ms = millis(observed.saturating_duration_since(staged));
        let timing = match self.rewritten.get(key) {
            None => EntryTiming::Observed {
                stage_to_observe_ms,
                since_observed_ms: millis(now.saturating_duration_since(observed)),
            },
            Some(times) => EntryTiming::Rewritten {
                stage_to_observe_ms,
                observe_to_rewrite_ms: times
                    .iter()
                    .map(|at| millis(at.saturating_duration_since(observed)))
                    .collect(),
            },
        };
        Some(timing)
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
