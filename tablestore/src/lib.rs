// Life of an action:
// 1. A migration tool hands the façade an inject, index store or eject
// 2. Validate the record size or secondary key
// 3. For injects:
//     - Store the record under (table, scope, id)
//     - Charge the payer
//    For index stores:
//     - Check the primary record exists
//     - Append to the typed index and its by-identity mirror
//    For ejects:
//     - Remove the record
//     - Sweep every secondary entry of the identity
//     - Credit each payer
//
// System components:
//  - In-memory B-tree shared by every structure
//  - Primary store, five secondary indexes, payer ledger
//  - Snapshot codec and offline consistency check

#![cfg_attr(
    test,
    allow(clippy::disallowed_methods, clippy::expect_used, clippy::unwrap_used)
)]

pub mod config;
pub mod consistency;
pub mod migrator;
pub mod simulation;
pub mod snapshot;
pub mod storage;
pub mod types;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod testing;

pub use migrator::{Action, Migrator, MigratorError, STATUS_OK};
