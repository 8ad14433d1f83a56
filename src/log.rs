//! The replicated log (spec §4.1).
//!
//! 1-based indexing, no concurrent writers — the owning `Node` serialises
//! all mutations under its state lock.

use serde::{Deserialize, Serialize};

/// One entry in the replicated log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: u64,
    /// Opaque application command.
    pub command: Vec<u8>,
}

/// Ordered, append-only sequence of [`LogEntry`], indexed from 1.
///
/// Keeps no sentinel entry at index 0 (some Raft ports carry a dummy
/// `term: 0` row there to make 0-based `Vec` indexing line up with Raft's
/// 1-based log indices): `entries[0]` is index 1. Reading index 0 is
/// explicitly undefined per spec and modeled as `None`.
#[derive(Debug, Clone, Default)]
pub struct Log {
    entries: Vec<LogEntry>,
}

impl Log {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }

    pub fn as_entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Appends `entry`, returning its (1-based) index.
    pub fn push(&mut self, entry: LogEntry) -> u64 {
        self.entries.push(entry);
        self.entries.len() as u64
    }

    /// Highest assigned index, or 0 if the log is empty.
    pub fn length(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Entry at 1-based `index`. Reading index 0 returns `None`; per spec
    /// this case is undefined, and `None` is the safe Rust reading of that.
    pub fn at(&self, index: u64) -> Option<&LogEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get((index - 1) as usize)
    }

    /// Term of the entry at `index`, or 0 if `index` is 0 or out of range —
    /// the standard Raft sentinel meaning "nothing precedes this".
    pub fn term_at(&self, index: u64) -> u64 {
        self.at(index).map(|e| e.term).unwrap_or(0)
    }

    /// Term of the last entry, or 0 if the log is empty.
    pub fn last_term(&self) -> u64 {
        self.term_at(self.length())
    }

    /// All entries from 1-based `index` to the end, inclusive.
    pub fn entries_from(&self, index: u64) -> &[LogEntry] {
        if index == 0 || index > self.length() {
            return &[];
        }
        &self.entries[(index - 1) as usize..]
    }

    /// Drops the entry at 1-based `index` and everything after it.
    ///
    /// Used only by followers overwriting an uncommitted suffix with an
    /// authoritative `AppendEntries` from a later-term leader (invariant 4:
    /// a leader never calls this on its own log).
    pub fn truncate_from(&mut self, index: u64) {
        if index == 0 {
            self.entries.clear();
            return;
        }
        self.entries.truncate((index - 1) as usize);
    }

    /// True iff a candidate/leader whose log ends at `(candidate_last_index,
    /// candidate_last_term)` is at least as up-to-date as this log (spec
    /// §4.5 Follower vote-granting rule (c) and glossary "Up-to-date log").
    pub fn is_other_log_up_to_date(&self, candidate_last_term: u64, candidate_last_index: u64) -> bool {
        let my_last_term = self.last_term();
        candidate_last_term > my_last_term
            || (candidate_last_term == my_last_term && candidate_last_index >= self.length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(term: u64) -> LogEntry {
        LogEntry { term, command: vec![] }
    }

    #[test]
    fn empty_log_reads_as_zero() {
        let log = Log::new();
        assert_eq!(log.length(), 0);
        assert_eq!(log.last_term(), 0);
        assert_eq!(log.at(0), None);
        assert_eq!(log.at(1), None);
        assert!(log.entries_from(1).is_empty());
    }

    #[test]
    fn push_assigns_one_based_indices() {
        let mut log = Log::new();
        assert_eq!(log.push(entry(1)), 1);
        assert_eq!(log.push(entry(1)), 2);
        assert_eq!(log.push(entry(2)), 3);
        assert_eq!(log.at(1).unwrap().term, 1);
        assert_eq!(log.at(3).unwrap().term, 2);
        assert_eq!(log.length(), 3);
        assert_eq!(log.last_term(), 2);
    }

    #[test]
    fn entries_from_is_inclusive() {
        let mut log = Log::new();
        log.push(entry(1));
        log.push(entry(2));
        log.push(entry(3));
        assert_eq!(log.entries_from(2).len(), 2);
        assert_eq!(log.entries_from(1).len(), 3);
        assert_eq!(log.entries_from(4).len(), 0);
    }

    #[test]
    fn truncate_from_drops_index_and_after() {
        let mut log = Log::new();
        log.push(entry(1));
        log.push(entry(2));
        log.push(entry(2));
        log.truncate_from(2);
        assert_eq!(log.length(), 1);
        assert_eq!(log.last_term(), 1);
    }

    #[test]
    fn up_to_date_comparison() {
        let mut log = Log::new();
        log.push(entry(1));
        log.push(entry(2));
        // Higher last term wins regardless of length.
        assert!(log.is_other_log_up_to_date(3, 0));
        assert!(!log.is_other_log_up_to_date(1, 5));
        // Equal last term: longer-or-equal wins.
        assert!(log.is_other_log_up_to_date(2, 2));
        assert!(!log.is_other_log_up_to_date(2, 1));
    }
}
