//! Human-readable rendering of index and agent snapshots.

use std::fmt;

use crate::{AgentStats, EntrySnapshot, EntryTiming, IndexStats};

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "owner count:         {}", self.owner_count)?;
        writeln!(f, "[{}]", self.owners.join(", "))?;
        writeln!(f, "entry count:         {}", self.entry_count)?;

        let tracked = self.entries.iter().any(|e| e.timing.is_some());
        if tracked {
            writeln!(f, "  [")?;
            for entry in &self.entries {
                writeln!(f, "    {entry}")?;
            }
            writeln!(f, "  ]")?;
        } else {
            let names: Vec<&str> = self.entries.iter().map(|e| e.key.as_str()).collect();
            writeln!(f, "[{}]", names.join(", "))?;
        }

        writeln!(f, "renotifications:     {}", self.counters.renotifications)?;
        writeln!(f, "owner group races:   {}", self.counters.owner_group_races)?;
        writeln!(f, "member insert races: {}", self.counters.member_insert_races)
    }
}

impl fmt::Display for EntrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        match &self.timing {
            None => Ok(()),
            Some(timing) => write!(f, " {timing}"),
        }
    }
}

impl fmt::Display for EntryTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transferring => write!(f, "transferring"),
            Self::Observed {
                stage_to_observe_ms,
                since_observed_ms,
            } => write!(
                f,
                "staged {stage_to_observe_ms}ms observed {since_observed_ms}ms"
            ),
            Self::Rewritten {
                stage_to_observe_ms,
                observe_to_rewrite_ms,
            } => {
                write!(f, "staged {stage_to_observe_ms}ms observed")?;
                for ms in observe_to_rewrite_ms {
                    write!(f, " {ms}ms rewritten")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for AgentStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Staging")?;
        write!(f, "{}", self.staging)?;
        writeln!(f, "Updates")?;
        write!(f, "{}", self.installed)?;
        writeln!(f, "rewrite request failures: {}", self.rewrite_request_failures)?;
        writeln!(f, "rewrite failures:         {}", self.rewrite_failures)?;
        writeln!(f, "untransformed rewrites:   {}", self.untransformed)
    }
}

#[cfg(test)]
mod tests {
    use crate::RaceCounters;

    use super::*;

    fn stats(entries: Vec<EntrySnapshot>) -> IndexStats {
        IndexStats {
            owner_count: 1,
            owners: vec!["Acme".to_string()],
            entry_count: entries.len() as u64,
            entries,
            counters: RaceCounters {
                renotifications: 2,
                owner_group_races: 0,
                member_insert_races: 0,
            },
        }
    }

    #[test]
    fn untracked_index_lists_raw_names() {
        let text = stats(vec![EntrySnapshot {
            key: "Acme#put".to_string(),
            timing: None,
        }])
        .to_string();

        assert_eq!(
            text,
            "owner count:         1\n\
             [Acme]\n\
             entry count:         1\n\
             [Acme#put]\n\
             renotifications:     2\n\
             owner group races:   0\n\
             member insert races: 0\n"
        );
    }

    #[test]
    fn tracked_index_lists_timings() {
        let text = stats(vec![
            EntrySnapshot {
                key: "Acme#put".to_string(),
                timing: Some(EntryTiming::Rewritten {
                    stage_to_observe_ms: 3,
                    observe_to_rewrite_ms: vec![10, 25],
                }),
            },
            EntrySnapshot {
                key: "Acme#load".to_string(),
                timing: Some(EntryTiming::Transferring),
            },
        ])
        .to_string();

        assert!(text.contains("    Acme#put staged 3ms observed 10ms rewritten 25ms rewritten\n"));
        assert!(text.contains("    Acme#load transferring\n"));
    }
}
