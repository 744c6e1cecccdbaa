//! Offline consistency check.
//!
//! Walks every structure of a `Migrator` and reports:
//!
//! - Secondary entries whose identity has no primary record
//! - Disagreement between the by-key and by-identity views of an index
//! - Payers whose ledger balance differs from the usage of their stored rows

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::migrator::{Migrator, MigratorError};
use crate::storage::{PrimaryStore, SecondaryEntry, SecondaryIndex, secondary_row_cost};
use crate::types::{Identity, IndexKind, Name, SecondaryKey};

/// A single consistency problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// A secondary entry outlived (or never had) its primary record.
    Dangling {
        kind: IndexKind,
        identity: Identity,
        seq: u64,
    },
    /// The two views of an index disagree about an entry.
    MirrorMismatch {
        kind: IndexKind,
        identity: Identity,
        seq: u64,
    },
    /// A payer's ledger balance differs from its stored rows.
    UsageMismatch {
        payer: Name,
        recorded: u64,
        expected: u64,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dangling {
                kind,
                identity,
                seq,
            } => write!(f, "{kind} entry {seq} for {identity} has no primary record"),
            Self::MirrorMismatch {
                kind,
                identity,
                seq,
            } => write!(f, "{kind} entry {seq} for {identity} differs between views"),
            Self::UsageMismatch {
                payer,
                recorded,
                expected,
            } => write!(
                f,
                "ledger has {recorded} bytes for {payer}, stored rows account for {expected}"
            ),
        }
    }
}

/// Outcome of `check`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub issues: Vec<Issue>,
    pub rows_checked: usize,
    pub entries_checked: usize,
}

impl ConsistencyReport {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::is_empty() is not const-stable
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Verify every invariant linking the primary store, the indexes and the
/// ledger.
pub fn check(migrator: &Migrator) -> Result<ConsistencyReport, MigratorError> {
    let mut report = ConsistencyReport::default();
    let mut expected: BTreeMap<Name, u64> = BTreeMap::new();

    for (_, record) in migrator.primary().rows()? {
        *expected.entry(record.payer).or_insert(0) += record.cost();
        report.rows_checked += 1;
    }

    let primary = migrator.primary();
    check_index(migrator.index_u64(), primary, &mut expected, &mut report)?;
    check_index(migrator.index_u128(), primary, &mut expected, &mut report)?;
    check_index(migrator.index_digest256(), primary, &mut expected, &mut report)?;
    check_index(migrator.index_f64(), primary, &mut expected, &mut report)?;
    check_index(migrator.index_f80(), primary, &mut expected, &mut report)?;

    let recorded: BTreeMap<Name, u64> = migrator.ledger().balances().into_iter().collect();
    let mut payers: Vec<Name> = expected.keys().chain(recorded.keys()).copied().collect();
    payers.sort_unstable();
    payers.dedup();

    for payer in payers {
        let recorded = recorded.get(&payer).copied().unwrap_or(0);
        let expected = expected.get(&payer).copied().unwrap_or(0);
        if recorded != expected {
            report.issues.push(Issue::UsageMismatch {
                payer,
                recorded,
                expected,
            });
        }
    }

    Ok(report)
}

fn check_index<K: SecondaryKey>(
    index: &SecondaryIndex<K>,
    primary: &PrimaryStore,
    expected: &mut BTreeMap<Name, u64>,
    report: &mut ConsistencyReport,
) -> Result<(), MigratorError> {
    let mut mirror: HashMap<(Identity, u64), SecondaryEntry<K>> = index
        .mirror_entries()?
        .into_iter()
        .map(|entry| ((entry.identity, entry.seq), entry))
        .collect();

    for entry in index.entries()? {
        report.entries_checked += 1;
        *expected.entry(entry.payer).or_insert(0) += secondary_row_cost(K::WIDTH);

        let agrees = mirror
            .remove(&(entry.identity, entry.seq))
            .is_some_and(|m| m.payer == entry.payer && m.key.to_encoded() == entry.key.to_encoded());
        if !agrees {
            report.issues.push(Issue::MirrorMismatch {
                kind: K::KIND,
                identity: entry.identity,
                seq: entry.seq,
            });
        }

        if !primary.contains(&entry.identity)? {
            report.issues.push(Issue::Dangling {
                kind: K::KIND,
                identity: entry.identity,
                seq: entry.seq,
            });
        }
    }

    let mut leftovers: Vec<SecondaryEntry<K>> = mirror.into_values().collect();
    leftovers.sort_by_key(|entry| entry.seq);
    for entry in leftovers {
        report.issues.push(Issue::MirrorMismatch {
            kind: K::KIND,
            identity: entry.identity,
            seq: entry.seq,
        });
    }

    Ok(())
}
