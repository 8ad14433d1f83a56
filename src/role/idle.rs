//! The `Idle` role (spec §4.5).
//!
//! `Idle` defines no RPC handlers at all — `Node::handle_rpc` special-cases
//! it directly (queue-and-redispatch) rather than calling into this module,
//! since there is no per-role behavior to generalize beyond "wait". This
//! file exists to keep the role's presence explicit in the module layout
//! that spec §2's component table describes, and as the place a future
//! `Idle`-specific behavior (e.g. a load timeout) would go.
