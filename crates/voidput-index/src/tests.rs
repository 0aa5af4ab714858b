use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use voidput_types::EntryTiming;

use super::*;

fn report_from_threads(index: &Arc<EntryIndex>, threads: usize, owner: &str, member: &str) -> usize {
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let index = Arc::clone(index);
            let barrier = Arc::clone(&barrier);
            let owner = owner.to_string();
            let member = member.to_string();
            thread::spawn(move || {
                barrier.wait();
                index.report(&owner, &member)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().expect("reporter thread panicked"))
        .filter(|fresh| *fresh)
        .count()
}

#[test]
fn first_report_is_new_and_repeats_are_renotifications() {
    let index = EntryIndex::staging();

    assert!(index.report("Acme", "put"));
    assert!(!index.report("Acme", "put"));
    assert!(!index.report("Acme", "put"));
    assert!(index.report("Acme", "load"));

    assert_eq!(index.entry_count(), 2);
    assert_eq!(index.owner_count(), 1);
    assert_eq!(index.counters().renotifications, 2);

    let mut members = index.members_of("Acme").expect("Acme should have members");
    members.sort();
    assert_eq!(members, vec!["load".to_string(), "put".to_string()]);
    assert!(index.members_of("Other").is_none());
}

#[test]
fn concurrent_reports_of_one_entry_yield_exactly_one_new() {
    let index = Arc::new(EntryIndex::staging());

    let fresh = report_from_threads(&index, 3, "Acme", "put");

    assert_eq!(fresh, 1);
    assert_eq!(index.entry_count(), 1);
    assert_eq!(index.counters().renotifications, 2);
    assert_eq!(index.counters().member_insert_races, 0);
}

#[test]
fn concurrent_reports_across_owners_dedup_per_entry() {
    let index = Arc::new(EntryIndex::staging());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let index = Arc::clone(&index);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut fresh = Vec::new();
                for i in 0..200 {
                    let owner = format!("owner{}", (i + t) % 10);
                    let member = format!("m{}", i % 7);
                    if index.report(&owner, &member) {
                        fresh.push(format!("{owner}#{member}"));
                    }
                }
                fresh
            })
        })
        .collect();

    let mut all_fresh = Vec::new();
    for handle in handles {
        all_fresh.extend(handle.join().expect("reporter thread panicked"));
    }

    let distinct: BTreeSet<_> = all_fresh.iter().cloned().collect();
    assert_eq!(distinct.len(), all_fresh.len(), "an entry was reported new twice");
    assert_eq!(distinct.len(), index.entry_count());

    let counters = index.counters();
    let total = 8 * 200;
    assert_eq!(
        counters.renotifications + counters.member_insert_races,
        (total - all_fresh.len()) as u64
    );

    // Every fresh entry landed in the owner group that stayed in the table.
    let grouped: BTreeSet<String> = index
        .owner_names()
        .expect("index should not be empty")
        .into_iter()
        .flat_map(|owner| {
            index
                .members_of(&owner)
                .unwrap_or_default()
                .into_iter()
                .map(move |member| join_key(&owner, &member))
        })
        .collect();
    assert_eq!(grouped, distinct);

    let installed = EntryIndex::installed();
    let diff = index.transfer_to(&installed);
    assert_eq!(diff.entry_count(), distinct.len());
    assert_eq!(installed.entry_count(), distinct.len());
    for key in &distinct {
        let (owner, member) = key.split_once('#').expect("key has a separator");
        assert!(diff.contains(owner, member), "{key} was lost");
    }
    assert!(index.is_empty());
}

#[test]
fn racing_owner_group_creation_loses_no_member() {
    const THREADS: usize = 8;

    for round in 0..50 {
        let index = Arc::new(EntryIndex::staging());
        let barrier = Arc::new(Barrier::new(THREADS));
        let owner = format!("Fresh{round}");

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let index = Arc::clone(&index);
                let barrier = Arc::clone(&barrier);
                let owner = owner.clone();
                thread::spawn(move || {
                    barrier.wait();
                    index.report(&owner, &format!("m{t}"))
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().expect("reporter thread panicked"));
        }

        assert_eq!(index.owner_count(), 1);
        let mut members = index.members_of(&owner).expect("owner should have members");
        members.sort();
        let expected: Vec<String> = (0..THREADS).map(|t| format!("m{t}")).collect();
        assert_eq!(members, expected);

        let installed = EntryIndex::installed();
        let diff = index.transfer_to(&installed);
        assert_eq!(diff.entry_count(), THREADS);
        assert_eq!(installed.entry_count(), THREADS);
    }
}

#[test]
fn acme_scenario_end_to_end() {
    let staging = Arc::new(EntryIndex::staging());
    let installed = EntryIndex::installed();

    report_from_threads(&staging, 3, "Acme", "put");
    assert_eq!(staging.entry_count(), 1);
    assert_eq!(staging.counters().renotifications, 2);

    let diff = staging.transfer_to(&installed);

    assert_eq!(diff.owner_names(), Some(vec!["Acme".to_string()]));
    assert_eq!(diff.members_of("Acme"), Some(vec!["put".to_string()]));
    assert_eq!(diff.entry_count(), 1);
    assert_eq!(installed.entry_count(), 1);
    assert!(installed.contains("Acme", "put"));
    assert_eq!(staging.entry_count(), 0);

    assert!(!staging.wait_for_work_timeout(Duration::from_millis(50)));

    let producer = {
        let staging = Arc::clone(&staging);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            assert!(staging.report("Acme", "put"));
            staging.wake_up();
        })
    };
    assert!(staging.wait_for_work_timeout(Duration::from_secs(10)));
    producer.join().expect("producer panicked");
}

#[test]
fn transfer_returns_only_entries_new_to_target() {
    let staging = EntryIndex::staging();
    let installed = EntryIndex::installed();

    installed.report("Acme", "put");
    staging.report("Acme", "put");
    staging.report("Acme", "load");
    staging.report("Zed", "run");

    let diff = staging.transfer_to(&installed);

    let mut owners = diff.owner_names().expect("diff should not be empty");
    owners.sort();
    assert_eq!(owners, vec!["Acme".to_string(), "Zed".to_string()]);
    assert_eq!(diff.members_of("Acme"), Some(vec!["load".to_string()]));
    assert_eq!(diff.members_of("Zed"), Some(vec!["run".to_string()]));
    assert_eq!(diff.entry_count(), 2);

    assert_eq!(installed.entry_count(), 3);
    assert!(staging.is_empty());
    assert_eq!(installed.counters().renotifications, 1);
}

#[test]
fn drained_index_keeps_owner_groups_but_reports_no_owner_names() {
    let staging = EntryIndex::staging();
    let installed = EntryIndex::installed();
    staging.report("Acme", "put");

    staging.transfer_to(&installed);

    assert!(staging.owner_names().is_none());
    assert!(staging.members_of("Acme").is_none());
    assert_eq!(staging.owner_count(), 1);

    // The owner group is reused, so this is not an owner-group race.
    assert!(staging.report("Acme", "put"));
    assert_eq!(staging.counters().owner_group_races, 0);

    let diff = staging.transfer_to(&installed);
    assert!(diff.owner_names().is_none());
    assert_eq!(installed.counters().renotifications, 1);
}

#[test]
fn wait_returns_immediately_after_completed_report() {
    let index = EntryIndex::staging();
    index.report("Acme", "put");
    assert!(index.wait_for_work_timeout(Duration::from_millis(1)));
    index.wait_for_work();
}

#[test]
fn waiter_never_misses_a_wakeup() {
    let staging = Arc::new(EntryIndex::staging());
    let installed = EntryIndex::installed();
    let rounds = 200;

    let waiter = {
        let staging = Arc::clone(&staging);
        thread::spawn(move || {
            let mut drained = 0;
            while drained < rounds {
                assert!(
                    staging.wait_for_work_timeout(Duration::from_secs(10)),
                    "waiter slept through a report"
                );
                drained += staging.transfer_to(&installed).entry_count();
            }
            installed
        })
    };

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let staging = Arc::clone(&staging);
            thread::spawn(move || {
                for i in (p..rounds).step_by(4) {
                    if staging.report("Acme", &format!("m{i}")) {
                        staging.wake_up();
                    }
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().expect("producer panicked");
    }
    let installed = waiter.join().expect("waiter panicked");
    assert_eq!(installed.entry_count(), rounds);
}

#[test]
fn installed_index_tracks_lifecycle() {
    let staging = EntryIndex::staging();
    let installed = EntryIndex::installed();
    staging.report("Acme", "put");
    staging.transfer_to(&installed);

    let observed = installed.stats();
    assert!(matches!(
        observed.entries[0].timing,
        Some(EntryTiming::Observed { .. })
    ));

    installed.mark_rewritten("Acme", &["put".to_string()]);
    installed.mark_rewritten("Acme", &["put".to_string()]);

    let stats = installed.stats();
    assert_eq!(stats.entry_count, 1);
    match &stats.entries[0].timing {
        Some(EntryTiming::Rewritten {
            observe_to_rewrite_ms,
            ..
        }) => assert_eq!(observe_to_rewrite_ms.len(), 2),
        other => panic!("expected rewritten timing, got {other:?}"),
    }
}

#[test]
fn staging_stats_list_raw_names() {
    let staging = EntryIndex::staging();
    staging.report("Acme", "put");
    staging.report("Acme", "put");
    staging.mark_rewritten("Acme", &["put".to_string()]);

    let stats = staging.stats();
    assert_eq!(stats.owners, vec!["Acme".to_string()]);
    assert_eq!(stats.entries[0].key, "Acme#put");
    assert!(stats.entries[0].timing.is_none());

    let text = staging.dump_stats();
    assert!(text.contains("[Acme#put]"));
    assert!(text.contains("renotifications:     1"));
}

#[test]
fn rereports_racing_the_drain_are_never_stranded() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let staging = Arc::new(EntryIndex::staging());
    let installed = Arc::new(EntryIndex::installed());
    let stop = Arc::new(AtomicBool::new(false));

    let consumer = {
        let staging = Arc::clone(&staging);
        let installed = Arc::clone(&installed);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                if staging.wait_for_work_timeout(Duration::from_millis(5)) {
                    staging.transfer_to(&installed);
                }
            }
        })
    };

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let staging = Arc::clone(&staging);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    if staging.report("Acme", "put") {
                        staging.wake_up();
                    }
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer panicked");
    }
    stop.store(true, Ordering::Release);
    consumer.join().expect("consumer panicked");

    let diff = staging.transfer_to(&installed);

    assert!(installed.contains("Acme", "put"));
    assert_eq!(installed.entry_count(), 1);
    assert!(diff.is_empty() || diff.contains("Acme", "put"));
    assert!(staging.is_empty());
    assert!(staging.members_of("Acme").is_none());
    assert!(!staging.wait_for_work_timeout(Duration::from_millis(20)));
}

fn entry_strategy() -> impl Strategy<Value = (u8, u8)> {
    (0u8..4, 0u8..4)
}

proptest! {
    #[test]
    fn report_is_new_exactly_on_first_occurrence(reports in prop::collection::vec(entry_strategy(), 0..64)) {
        let index = EntryIndex::staging();
        let mut seen = BTreeSet::new();
        for (owner, member) in reports {
            let fresh = index.report(&format!("o{owner}"), &format!("m{member}"));
            prop_assert_eq!(fresh, seen.insert((owner, member)));
        }
        prop_assert_eq!(index.entry_count(), seen.len());
    }

    #[test]
    fn transfer_yields_union_and_difference(
        prior in prop::collection::vec(entry_strategy(), 0..32),
        staged in prop::collection::vec(entry_strategy(), 0..32),
    ) {
        let staging = EntryIndex::staging();
        let installed = EntryIndex::installed();
        for (owner, member) in &prior {
            installed.report(&format!("o{owner}"), &format!("m{member}"));
        }
        for (owner, member) in &staged {
            staging.report(&format!("o{owner}"), &format!("m{member}"));
        }

        let prior: BTreeSet<_> = prior.into_iter().collect();
        let staged: BTreeSet<_> = staged.into_iter().collect();

        let diff = staging.transfer_to(&installed);

        let expected_diff: BTreeSet<_> = staged.difference(&prior).cloned().collect();
        let expected_union: BTreeSet<_> = staged.union(&prior).cloned().collect();

        prop_assert_eq!(diff.entry_count(), expected_diff.len());
        for (owner, member) in &expected_diff {
            let (owner, member) = (format!("o{owner}"), format!("m{member}"));
            prop_assert!(diff.contains(&owner, &member));
        }
        prop_assert_eq!(installed.entry_count(), expected_union.len());
        prop_assert!(staging.is_empty());
    }
}
