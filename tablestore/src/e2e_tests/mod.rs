//! End-to-end tests through the migration façade.
//!
//! Each test file covers a specific scenario, using deterministic inputs
//! to verify the complete path from action to stored state.

#![cfg(test)]

mod test_cascade_eject;
mod test_determinism;
mod test_handles;
mod test_inject_and_query;
mod test_ledger_accounting;
mod test_rejections;
mod test_secondary_order;
mod test_snapshot_roundtrip;
