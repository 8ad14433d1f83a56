//! External observer surface (spec §9 design note).
//!
//! The source's internal pub/sub bus (`election timeout`, `applied log`,
//! role transitions, ...) is reimplemented as explicit method calls between
//! `Node` and its role logic; only `applied log` and `error` are promoted
//! to an external observer interface a host application can hook into.

use crate::error::RaftError;

/// Hook for the two externally-visible events named in spec §9.
pub trait Observer: Send + Sync {
    /// An entry at `index`, written in `term`, was just applied to the
    /// state machine. `term` lets callers distinguish "my entry landed"
    /// from "a different leader's entry later occupied the same index".
    fn applied_log(&self, index: u64, term: u64);

    /// A `PersistenceError`/`ConfigError`/`UnknownRpc` was surfaced rather
    /// than swallowed (spec §7's propagation policy).
    fn error(&self, error: RaftError);
}

/// An observer that does nothing, for callers that don't need the hook.
pub struct NullObserver;

impl Observer for NullObserver {
    fn applied_log(&self, _index: u64, _term: u64) {}
    fn error(&self, _error: RaftError) {}
}
