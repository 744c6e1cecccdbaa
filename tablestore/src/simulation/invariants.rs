//! Invariant checking for deterministic simulation testing.
//!
//! `ReferenceModel` is a plain-collections model of the façade. It predicts
//! the status of every action before it runs, and `InvariantChecker`
//! compares the prediction and the model state against the real store.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::StoreConfig;
use crate::consistency::{self, Issue};
use crate::migrator::{Action, Migrator, MigratorError, STATUS_OK};
use crate::storage::{primary_row_cost, secondary_row_cost};
use crate::types::{Identity, IndexKind, Name};

/// A record as the model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ModelRow {
    payer: Name,
    len: usize,
}

/// A secondary entry as the model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ModelEntry {
    kind: IndexKind,
    payer: Name,
}

/// Expected state of the store after each accepted action.
#[derive(Debug, Default)]
pub struct ReferenceModel {
    config: StoreConfig,
    rows: BTreeMap<Identity, ModelRow>,
    entries: BTreeMap<Identity, Vec<ModelEntry>>,
    usage: BTreeMap<Name, u64>,
}

impl ReferenceModel {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Status the façade should report for `action` in the current state.
    #[must_use]
    pub fn predict(&self, action: &Action) -> i32 {
        let identity = action.identity();
        match action {
            Action::Inject { data, .. } => {
                if data.len() > self.config.max_record_size {
                    -2
                } else if self.rows.contains_key(&identity) && !self.config.allow_overwrite {
                    -1
                } else {
                    STATUS_OK
                }
            }
            Action::Eject { .. } => {
                if self.config.strict_eject
                    && !self.rows.contains_key(&identity)
                    && self.entry_count(&identity) == 0
                {
                    -3
                } else {
                    STATUS_OK
                }
            }
            _ => match action.index_value() {
                Some(key) if key.validate().is_err() => -4,
                _ if self.config.require_primary && !self.rows.contains_key(&identity) => -5,
                _ => STATUS_OK,
            },
        }
    }

    /// Apply an action the store accepted.
    pub fn record(&mut self, action: &Action) {
        let identity = action.identity();
        match action {
            Action::Inject { payer, data, .. } => {
                let row = ModelRow {
                    payer: *payer,
                    len: data.len(),
                };
                if let Some(old) = self.rows.insert(identity, row) {
                    self.credit(old.payer, primary_row_cost(old.len));
                }
                self.charge(*payer, primary_row_cost(data.len()));
            }
            Action::Eject { .. } => {
                if let Some(old) = self.rows.remove(&identity) {
                    self.credit(old.payer, primary_row_cost(old.len));
                }
                for entry in self.entries.remove(&identity).unwrap_or_default() {
                    self.credit(entry.payer, secondary_row_cost(entry.kind.width()));
                }
            }
            _ => {
                if let Some(key) = action.index_value() {
                    let payer = index_payer(action);
                    let kind = key.kind();
                    self.entries
                        .entry(identity)
                        .or_default()
                        .push(ModelEntry { kind, payer });
                    self.charge(payer, secondary_row_cost(kind.width()));
                }
            }
        }
    }

    fn charge(&mut self, payer: Name, amount: u64) {
        *self.usage.entry(payer).or_insert(0) += amount;
    }

    fn credit(&mut self, payer: Name, amount: u64) {
        let balance = self.usage.entry(payer).or_insert(0);
        *balance = balance.saturating_sub(amount);
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.rows.contains_key(identity)
    }

    #[must_use]
    pub fn usage(&self, payer: Name) -> u64 {
        self.usage.get(&payer).copied().unwrap_or(0)
    }

    /// Number of secondary entries registered for an identity.
    #[must_use]
    pub fn entry_count(&self, identity: &Identity) -> usize {
        self.entries.get(identity).map_or(0, Vec::len)
    }
}

const fn index_payer(action: &Action) -> Name {
    match *action {
        Action::Inject { payer, .. }
        | Action::IdxU64 { payer, .. }
        | Action::IdxU128 { payer, .. }
        | Action::IdxDigest256 { payer, .. }
        | Action::IdxF64 { payer, .. }
        | Action::IdxF80 { payer, .. } => payer,
        Action::Eject { account, .. } => account,
    }
}

/// An invariant violation detected during simulation.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violation.
    pub description: String,
    /// The operation index where the violation was detected.
    pub operation_index: usize,
    /// Additional context.
    pub context: String,
}

/// Compares the store against the reference model.
#[derive(Debug, Default)]
pub struct InvariantChecker {
    violations: Vec<InvariantViolation>,
}

impl InvariantChecker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_violation(&mut self, violation: InvariantViolation) {
        tracing::warn!(
            "invariant violation at operation {}: {}",
            violation.operation_index,
            violation.description
        );
        self.violations.push(violation);
    }

    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    /// Check that the store reported the status the model predicted.
    pub fn check_status(
        &mut self,
        action: &Action,
        expected: i32,
        actual: i32,
        operation_index: usize,
    ) {
        if expected != actual {
            self.add_violation(InvariantViolation {
                description: format!("expected status {expected}, store returned {actual}"),
                operation_index,
                context: action.to_string(),
            });
        }
    }

    /// Check that the records, secondary entries and ledger of `migrator`
    /// match the model, then run the offline consistency check.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the store cannot be read.
    pub fn check_state(
        &mut self,
        migrator: &Migrator,
        model: &ReferenceModel,
        touched: &BTreeSet<Identity>,
        operation_index: usize,
    ) -> Result<(), MigratorError> {
        if migrator.primary().len() != model.row_count() {
            self.add_violation(InvariantViolation {
                description: format!(
                    "store holds {} records, model expects {}",
                    migrator.primary().len(),
                    model.row_count()
                ),
                operation_index,
                context: String::new(),
            });
        }

        for identity in touched {
            let present = migrator.get(identity)?.is_some();
            if present != model.contains(identity) {
                self.add_violation(InvariantViolation {
                    description: format!("presence of {identity} differs from model"),
                    operation_index,
                    context: format!("store has record: {present}"),
                });
            }

            let entries = migrator.index_entries(identity)?.len();
            if entries != model.entry_count(identity) {
                self.add_violation(InvariantViolation {
                    description: format!("secondary entries for {identity} differ from model"),
                    operation_index,
                    context: format!(
                        "store has {entries}, model expects {}",
                        model.entry_count(identity)
                    ),
                });
            }
        }

        for (payer, expected) in &model.usage {
            let actual = migrator.ledger().usage(*payer);
            if actual != *expected {
                self.add_violation(InvariantViolation {
                    description: format!("usage of {payer} differs from model"),
                    operation_index,
                    context: format!("ledger has {actual}, model expects {expected}"),
                });
            }
        }

        // Stray entries are legal when index stores skip the primary check.
        let allow_strays = !migrator.config().require_primary;
        let report = consistency::check(migrator)?;
        for issue in report.issues {
            if allow_strays && matches!(issue, Issue::Dangling { .. }) {
                continue;
            }
            self.add_violation(InvariantViolation {
                description: issue.to_string(),
                operation_index,
                context: String::from("consistency check"),
            });
        }

        Ok(())
    }
}
