//! Record storage.
//!
//! Every structure is a view over the in-memory B-tree in `btree`:
//!
//! - `primary`: identity -> record, with revocable handles
//! - `secondary`: typed key -> identity, one index per key kind
//! - `ledger`: per-payer storage usage kept in step with both
//!
//! # Usage
//!
//! ```
//! use tablestore::config::StoreConfig;
//! use tablestore::storage::{Ledger, PrimaryStore};
//! use tablestore::types::Name;
//!
//! let mut ledger = Ledger::new();
//! let mut store = PrimaryStore::new(&StoreConfig::default());
//! let table = Name::parse("accounts").unwrap();
//! let scope = Name::parse("alice").unwrap();
//! let payer = Name::parse("bob").unwrap();
//!
//! store.store(&mut ledger, table, scope, payer, 1, &[1, 2]).unwrap();
//! let handle = store.find(table, scope, 1).unwrap().unwrap();
//! assert_eq!(store.read(&handle).unwrap().unwrap().data, vec![1, 2]);
//! ```

pub mod btree;
mod ledger;
mod primary;
mod secondary;

pub use ledger::{
    Ledger, PRIMARY_ROW_OVERHEAD, SECONDARY_ROW_OVERHEAD, primary_row_cost, secondary_row_cost,
};
pub use primary::{
    Handle, MAX_RECORD_SIZE, PrimaryStore, RECORD_HEADER_SIZE, Record, RemoveError, StoreError,
};
pub use secondary::{SecondaryEntry, SecondaryIndex};
