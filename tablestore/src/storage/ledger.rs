//! Per-payer storage usage.
//!
//! Every row is billed to the payer named when it was stored. The billable
//! size of a row is its payload plus a fixed overhead for the bookkeeping the
//! row costs the host:
//!
//! - Primary row: `PRIMARY_ROW_OVERHEAD + data.len()`
//! - Secondary entry: `SECONDARY_ROW_OVERHEAD + key width`

use std::collections::HashMap;

use crate::types::Name;

/// Billable overhead of one primary row, excluding its data.
pub const PRIMARY_ROW_OVERHEAD: u64 = 112;

/// Billable overhead of one secondary entry, excluding its key: the
/// identity it points at (24 bytes) plus index bookkeeping (96 bytes).
pub const SECONDARY_ROW_OVERHEAD: u64 = 24 + 96;

/// Billable size of a primary row with `data_len` bytes of data.
#[must_use]
pub const fn primary_row_cost(data_len: usize) -> u64 {
    PRIMARY_ROW_OVERHEAD + data_len as u64
}

/// Billable size of a secondary entry with a key of `width` bytes.
#[must_use]
pub const fn secondary_row_cost(width: usize) -> u64 {
    SECONDARY_ROW_OVERHEAD + width as u64
}

/// Storage usage per payer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ledger {
    usage: HashMap<Name, u64>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bill `amount` bytes to `payer`.
    pub fn charge(&mut self, payer: Name, amount: u64) {
        let balance = self.usage.entry(payer).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Refund `amount` bytes to `payer`.
    ///
    /// A refund larger than the balance clamps to zero and is logged, since
    /// it means a row was credited without having been charged.
    pub fn credit(&mut self, payer: Name, amount: u64) {
        let balance = self.usage.get(&payer).copied().unwrap_or(0);
        if amount > balance {
            tracing::warn!("ledger credit of {amount} for {payer} exceeds balance {balance}");
        }

        let remaining = balance.saturating_sub(amount);
        if remaining == 0 {
            self.usage.remove(&payer);
        } else {
            self.usage.insert(payer, remaining);
        }
    }

    /// Current usage of `payer` in bytes.
    #[must_use]
    pub fn usage(&self, payer: Name) -> u64 {
        self.usage.get(&payer).copied().unwrap_or(0)
    }

    /// Sum of every payer's usage.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.usage.values().sum()
    }

    /// Payers with a non-zero balance, sorted by name.
    #[must_use]
    pub fn balances(&self) -> Vec<(Name, u64)> {
        let mut balances: Vec<(Name, u64)> = self.usage.iter().map(|(&p, &u)| (p, u)).collect();
        balances.sort_unstable();
        balances
    }
}
