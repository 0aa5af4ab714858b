//! Two-tier concurrent index of reported call sites.
//!
//! An [`EntryIndex`] holds `(owner, member)` entries. It is split in two tiers:
//!
//! - the **existence table**, a plain set of joined `owner#member` keys behind
//!   one narrow lock. The common case (an entry that is already known) costs a
//!   single insert-and-test under that lock. The same lock is the monitor the
//!   consumer sleeps on, so a producer's insert-then-notify can never slip
//!   between the consumer's emptiness check and its wait.
//! - the **owner group table**, a sharded concurrent map from owner to a
//!   [`MemberSet`]. Producers for different owners never contend here.
//!
//! The agent keeps two of these: a *staging* index fed by producers and an
//! *installed* index that the single consumer moves entries into with
//! [`EntryIndex::transfer_to`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Condvar, Mutex};
use voidput_types::{EntrySnapshot, IndexStats, RaceCounters, join_key};

mod member_set;
mod timestamps;

#[cfg(test)]
mod tests;

pub use member_set::MemberSet;
use timestamps::Timestamps;

/// Which lifecycle timestamps an index records when it first sees an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracking {
    /// Record when the entry was first staged.
    Staged,
    /// Record when the coordinator first observed the entry, and keep every
    /// rewrite completion time. Staged times are copied in on transfer.
    Rewrites,
}

pub struct EntryIndex {
    existence: Mutex<HashSet<String>>,
    work: Condvar,
    owners: DashMap<String, Arc<MemberSet>>,
    counters: Mutex<RaceCounters>,
    timestamps: Timestamps,
}

impl Default for EntryIndex {
    fn default() -> Self {
        Self::staging()
    }
}

impl EntryIndex {
    pub fn new(tracking: Tracking) -> Self {
        Self {
            existence: Mutex::new(HashSet::new()),
            work: Condvar::new(),
            owners: DashMap::new(),
            counters: Mutex::new(RaceCounters::default()),
            timestamps: Timestamps::new(tracking),
        }
    }

    /// Index receiving fresh reports from producer threads.
    pub fn staging() -> Self {
        Self::new(Tracking::Staged)
    }

    /// Index holding entries already handed to the rewrite pipeline.
    pub fn installed() -> Self {
        Self::new(Tracking::Rewrites)
    }

    pub fn tracking(&self) -> Tracking {
        self.timestamps.tracking()
    }

    // ── Producer side ────────────────────────────────────────────

    /// Records that the call site `(owner, member)` should be considered.
    ///
    /// Returns `true` for the first report of an entry and `false` for a
    /// re-report. Safe for any number of concurrent callers.
    pub fn report(&self, owner: &str, member: &str) -> bool {
        let key = join_key(owner, member);
        let fresh = {
            let mut existence = self.existence.lock();
            if existence.contains(&key) {
                false
            } else {
                existence.insert(key.clone())
            }
        };

        if !fresh {
            self.counters.lock().renotifications += 1;
            return false;
        }

        self.timestamps.record_first_report(&key);
        self.index_owner(owner, member)
    }

    fn index_owner(&self, owner: &str, member: &str) -> bool {
        let members = self.member_set(owner);

        // A repeat can land here when a report races the drain of an older
        // copy of the same entry.
        if !members.insert(member) {
            self.counters.lock().member_insert_races += 1;
            return false;
        }

        true
    }

    fn member_set(&self, owner: &str) -> Arc<MemberSet> {
        if let Some(existing) = self.owners.get(owner) {
            return Arc::clone(existing.value());
        }

        let candidate = Arc::new(MemberSet::new(owner));
        match self.owners.entry(owner.to_string()) {
            Entry::Occupied(occupied) => {
                self.counters.lock().owner_group_races += 1;
                Arc::clone(occupied.get())
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&candidate));
                candidate
            }
        }
    }

    /// Wakes every thread blocked in [`wait_for_work`](Self::wait_for_work).
    pub fn wake_up(&self) {
        let _existence = self.existence.lock();
        self.work.notify_all();
    }

    // ── Consumer side ────────────────────────────────────────────

    /// Blocks until the existence table is non-empty.
    pub fn wait_for_work(&self) {
        let mut existence = self.existence.lock();
        while existence.is_empty() {
            self.work.wait(&mut existence);
        }
    }

    /// Like [`wait_for_work`](Self::wait_for_work) but gives up after
    /// `timeout`. Returns whether there is work.
    pub fn wait_for_work_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut existence = self.existence.lock();
        while existence.is_empty() {
            if self.work.wait_until(&mut existence, deadline).timed_out() {
                return !existence.is_empty();
            }
        }
        true
    }

    /// Moves everything in this index into `target` and returns a fresh
    /// index holding exactly the entries `target` did not already have.
    ///
    /// Producers may keep reporting into `self` while this runs. `target`
    /// must not be mutated by anyone else for the duration of the call.
    pub fn transfer_to(&self, target: &EntryIndex) -> EntryIndex {
        let diff = EntryIndex::staging();
        let groups: Vec<Arc<MemberSet>> = self
            .owners
            .iter()
            .map(|group| Arc::clone(group.value()))
            .collect();

        let mut moved = 0usize;
        for group in groups {
            let owner = group.owner();
            for member in group.drain() {
                let key = join_key(owner, &member);

                // The key leaves the existence table before the entry is
                // handed on. Once the table is empty the consumer may sleep;
                // any report racing this removal either saw the key (and was
                // drained with it) or re-inserts it as new.
                self.existence.lock().remove(&key);
                moved += 1;

                if target.report(owner, &member) {
                    let staged = self.timestamps.staged(&key);
                    diff.report(owner, &member);
                    if let Some(staged) = staged {
                        target.timestamps.set_staged(&key, staged);
                        diff.timestamps.set_staged(&key, staged);
                    }
                }
            }
        }

        tracing::debug!(
            moved,
            newly_installed = diff.entry_count(),
            "transferred staged entries"
        );
        diff
    }

    /// Owner names present in the owner group table, or `None` when the
    /// existence table is empty.
    pub fn owner_names(&self) -> Option<Vec<String>> {
        if self.existence.lock().is_empty() {
            return None;
        }
        Some(self.owners.iter().map(|group| group.key().clone()).collect())
    }

    /// Members currently pending for `owner`, or `None` if there are none.
    pub fn members_of(&self, owner: &str) -> Option<Vec<String>> {
        let group = self.owners.get(owner).map(|g| Arc::clone(g.value()))?;
        group.snapshot()
    }

    /// Appends the current time to each member's rewrite history. Only
    /// indexes created with [`Tracking::Rewrites`] keep this history.
    pub fn mark_rewritten(&self, owner: &str, members: &[String]) {
        for member in members {
            self.timestamps.mark_rewritten(&join_key(owner, member));
        }
    }

    // ── Introspection ────────────────────────────────────────────

    pub fn contains(&self, owner: &str, member: &str) -> bool {
        self.existence.lock().contains(&join_key(owner, member))
    }

    pub fn entry_count(&self) -> usize {
        self.existence.lock().len()
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.existence.lock().is_empty()
    }

    pub fn counters(&self) -> RaceCounters {
        *self.counters.lock()
    }

    /// Structured snapshot for diagnostics.
    pub fn stats(&self) -> IndexStats {
        let now = Instant::now();

        let mut keys: Vec<String> = self.existence.lock().iter().cloned().collect();
        keys.sort();
        let mut owners: Vec<String> = self.owners.iter().map(|g| g.key().clone()).collect();
        owners.sort();

        let entry_count = keys.len() as u64;
        let entries = keys
            .into_iter()
            .map(|key| {
                let timing = self.timestamps.timing(&key, now);
                EntrySnapshot { key, timing }
            })
            .collect();

        IndexStats {
            owner_count: owners.len() as u64,
            owners,
            entry_count,
            entries,
            counters: self.counters(),
        }
    }

    /// Human-readable form of [`stats`](Self::stats).
    pub fn dump_stats(&self) -> String {
        self.stats().to_string()
    }
}
