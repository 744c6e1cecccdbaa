//! Migration façade.
//!
//! `Migrator` owns the primary store, the five secondary indexes and the
//! ledger, and exposes the operations a migration tool replays against them:
//!
//! - `inject`: store a record
//! - `idx_u64`, `idx_u128`, `idx_digest256`, `idx_f64`, `idx_f80`: register a
//!   secondary key for a record
//! - `eject`: remove a record together with all of its secondary entries
//!
//! The typed methods return `Result`. `apply` runs an `Action` and reports
//! the outcome as an integer status code for dispatchers that cannot carry
//! Rust errors.
//!
//! # Invariants
//!
//! - With `require_primary` set, a secondary entry only exists while its
//!   identity has a primary record.
//! - `eject` leaves no secondary entry behind for the ejected identity.
//! - The ledger always equals the billable size of the stored rows.

use std::fmt;

use crate::config::StoreConfig;
use crate::storage::btree::BTreeError;
use crate::storage::{
    Handle, Ledger, PrimaryStore, Record, RemoveError, SecondaryEntry, SecondaryIndex, StoreError,
};
use crate::types::{
    Digest256, ExtendedFloat, Identity, IndexKind, IndexValue, KeyError, Name, SecondaryKey,
};

/// Status returned by `apply` on success.
pub const STATUS_OK: i32 = 0;

/// A single façade operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Inject {
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        data: Vec<u8>,
    },
    IdxU64 {
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: u64,
    },
    IdxU128 {
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: u128,
    },
    IdxDigest256 {
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: Digest256,
    },
    IdxF64 {
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: f64,
    },
    IdxF80 {
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: ExtendedFloat,
    },
    Eject {
        account: Name,
        table: Name,
        scope: Name,
        id: u64,
    },
}

impl Action {
    /// Build the index action matching the kind of `key`.
    #[must_use]
    pub const fn index(table: Name, scope: Name, payer: Name, id: u64, key: IndexValue) -> Self {
        match key {
            IndexValue::U64(key) => Self::IdxU64 {
                table,
                scope,
                payer,
                id,
                key,
            },
            IndexValue::U128(key) => Self::IdxU128 {
                table,
                scope,
                payer,
                id,
                key,
            },
            IndexValue::Digest256(key) => Self::IdxDigest256 {
                table,
                scope,
                payer,
                id,
                key,
            },
            IndexValue::F64(key) => Self::IdxF64 {
                table,
                scope,
                payer,
                id,
                key,
            },
            IndexValue::F80(key) => Self::IdxF80 {
                table,
                scope,
                payer,
                id,
                key,
            },
        }
    }

    /// Operation name used in traces.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Inject { .. } => "inject",
            Self::IdxU64 { .. } => IndexKind::U64.as_str(),
            Self::IdxU128 { .. } => IndexKind::U128.as_str(),
            Self::IdxDigest256 { .. } => IndexKind::Digest256.as_str(),
            Self::IdxF64 { .. } => IndexKind::F64.as_str(),
            Self::IdxF80 { .. } => IndexKind::F80.as_str(),
            Self::Eject { .. } => "eject",
        }
    }

    /// The identity the action targets.
    #[must_use]
    pub const fn identity(&self) -> Identity {
        match *self {
            Self::Inject {
                table, scope, id, ..
            }
            | Self::IdxU64 {
                table, scope, id, ..
            }
            | Self::IdxU128 {
                table, scope, id, ..
            }
            | Self::IdxDigest256 {
                table, scope, id, ..
            }
            | Self::IdxF64 {
                table, scope, id, ..
            }
            | Self::IdxF80 {
                table, scope, id, ..
            }
            | Self::Eject {
                table, scope, id, ..
            } => Identity::new(table, scope, id),
        }
    }

    /// The secondary key of an index action.
    #[must_use]
    pub const fn index_value(&self) -> Option<IndexValue> {
        match *self {
            Self::IdxU64 { key, .. } => Some(IndexValue::U64(key)),
            Self::IdxU128 { key, .. } => Some(IndexValue::U128(key)),
            Self::IdxDigest256 { key, .. } => Some(IndexValue::Digest256(key)),
            Self::IdxF64 { key, .. } => Some(IndexValue::F64(key)),
            Self::IdxF80 { key, .. } => Some(IndexValue::F80(key)),
            Self::Inject { .. } | Self::Eject { .. } => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identity = self.identity();
        match self {
            Self::Inject { payer, data, .. } => {
                write!(f, "inject {identity} payer={payer} ({} bytes)", data.len())
            }
            Self::Eject { account, .. } => write!(f, "eject {identity} account={account}"),
            Self::IdxU64 { payer, .. }
            | Self::IdxU128 { payer, .. }
            | Self::IdxDigest256 { payer, .. }
            | Self::IdxF64 { payer, .. }
            | Self::IdxF80 { payer, .. } => {
                write!(f, "{} {identity} payer={payer}", self.name())?;
                if let Some(key) = self.index_value() {
                    write!(f, " key={key}")?;
                }
                Ok(())
            }
        }
    }
}

/// A secondary entry of any kind, as registered for one identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexEntry {
    pub value: IndexValue,
    pub payer: Name,
    pub seq: u64,
}

impl<K: SecondaryKey> From<SecondaryEntry<K>> for IndexEntry {
    fn from(entry: SecondaryEntry<K>) -> Self {
        Self {
            value: entry.key.into_value(),
            payer: entry.payer,
            seq: entry.seq,
        }
    }
}

/// The record store with its secondary indexes.
#[derive(Debug, Clone)]
pub struct Migrator {
    config: StoreConfig,
    primary: PrimaryStore,
    ledger: Ledger,
    idx64: SecondaryIndex<u64>,
    idx128: SecondaryIndex<u128>,
    idx256: SecondaryIndex<Digest256>,
    idx_double: SecondaryIndex<f64>,
    idx_long_double: SecondaryIndex<ExtendedFloat>,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Migrator {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            primary: PrimaryStore::new(&config),
            config,
            ledger: Ledger::new(),
            idx64: SecondaryIndex::new(),
            idx128: SecondaryIndex::new(),
            idx256: SecondaryIndex::new(),
            idx_double: SecondaryIndex::new(),
            idx_long_double: SecondaryIndex::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub const fn primary(&self) -> &PrimaryStore {
        &self.primary
    }

    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[must_use]
    pub const fn index_u64(&self) -> &SecondaryIndex<u64> {
        &self.idx64
    }

    #[must_use]
    pub const fn index_u128(&self) -> &SecondaryIndex<u128> {
        &self.idx128
    }

    #[must_use]
    pub const fn index_digest256(&self) -> &SecondaryIndex<Digest256> {
        &self.idx256
    }

    #[must_use]
    pub const fn index_f64(&self) -> &SecondaryIndex<f64> {
        &self.idx_double
    }

    #[must_use]
    pub const fn index_f80(&self) -> &SecondaryIndex<ExtendedFloat> {
        &self.idx_long_double
    }

    /// Store a record.
    pub fn inject(
        &mut self,
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        data: &[u8],
    ) -> Result<(), MigratorError> {
        self.primary
            .store(&mut self.ledger, table, scope, payer, id, data)?;
        Ok(())
    }

    pub fn idx_u64(
        &mut self,
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: u64,
    ) -> Result<(), MigratorError> {
        let Self {
            config,
            primary,
            ledger,
            idx64,
            ..
        } = self;
        store_secondary(config, primary, ledger, idx64, Identity::new(table, scope, id), payer, key)
    }

    pub fn idx_u128(
        &mut self,
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: u128,
    ) -> Result<(), MigratorError> {
        let Self {
            config,
            primary,
            ledger,
            idx128,
            ..
        } = self;
        store_secondary(config, primary, ledger, idx128, Identity::new(table, scope, id), payer, key)
    }

    pub fn idx_digest256(
        &mut self,
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: Digest256,
    ) -> Result<(), MigratorError> {
        let Self {
            config,
            primary,
            ledger,
            idx256,
            ..
        } = self;
        store_secondary(config, primary, ledger, idx256, Identity::new(table, scope, id), payer, key)
    }

    /// Register a double key. NaN is rejected with `InvalidKey`.
    pub fn idx_f64(
        &mut self,
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: f64,
    ) -> Result<(), MigratorError> {
        let Self {
            config,
            primary,
            ledger,
            idx_double,
            ..
        } = self;
        store_secondary(
            config,
            primary,
            ledger,
            idx_double,
            Identity::new(table, scope, id),
            payer,
            key,
        )
    }

    /// Register an extended-precision key. NaN is rejected with `InvalidKey`.
    pub fn idx_f80(
        &mut self,
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: ExtendedFloat,
    ) -> Result<(), MigratorError> {
        let Self {
            config,
            primary,
            ledger,
            idx_long_double,
            ..
        } = self;
        store_secondary(
            config,
            primary,
            ledger,
            idx_long_double,
            Identity::new(table, scope, id),
            payer,
            key,
        )
    }

    /// Register a secondary key of any kind.
    pub fn index(
        &mut self,
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: IndexValue,
    ) -> Result<(), MigratorError> {
        match key {
            IndexValue::U64(key) => self.idx_u64(table, scope, payer, id, key),
            IndexValue::U128(key) => self.idx_u128(table, scope, payer, id, key),
            IndexValue::Digest256(key) => self.idx_digest256(table, scope, payer, id, key),
            IndexValue::F64(key) => self.idx_f64(table, scope, payer, id, key),
            IndexValue::F80(key) => self.idx_f80(table, scope, payer, id, key),
        }
    }

    /// Remove a record and every secondary entry registered for it.
    ///
    /// `account` is the caller owning the tables. It is recorded on the
    /// trace and plays no part in addressing.
    ///
    /// Entries are swept even when the record is absent. In strict mode
    /// `NotFound` is returned only when there was neither a record nor an
    /// entry to remove.
    pub fn eject(
        &mut self,
        account: Name,
        table: Name,
        scope: Name,
        id: u64,
    ) -> Result<(), MigratorError> {
        let identity = Identity::new(table, scope, id);
        tracing::debug!("eject {identity} requested by {account}");

        let swept = self.sweep(&identity)?;
        if swept > 0 {
            tracing::debug!("swept {swept} secondary entries for {identity}");
        }

        match self.primary.find(table, scope, id)? {
            Some(handle) => {
                self.primary.remove(&mut self.ledger, &handle)?;
            }
            None if swept > 0 => {
                self.primary.bump_generation(identity.partition());
                self.primary.release_generation(identity.partition())?;
            }
            None if self.config.strict_eject => return Err(MigratorError::NotFound(identity)),
            None => tracing::debug!("eject of absent {identity} ignored"),
        }
        Ok(())
    }

    fn sweep(&mut self, identity: &Identity) -> Result<usize, MigratorError> {
        let ledger = &mut self.ledger;
        let swept = self.idx64.remove_identity(ledger, identity)?.len()
            + self.idx128.remove_identity(ledger, identity)?.len()
            + self.idx256.remove_identity(ledger, identity)?.len()
            + self.idx_double.remove_identity(ledger, identity)?.len()
            + self.idx_long_double.remove_identity(ledger, identity)?.len();
        Ok(swept)
    }

    /// Find a record, returning a handle valid until its partition changes.
    pub fn find(&self, table: Name, scope: Name, id: u64) -> Result<Option<Handle>, MigratorError> {
        Ok(self.primary.find(table, scope, id)?)
    }

    /// Read the record behind a handle. Returns None for stale handles.
    pub fn read(&self, handle: &Handle) -> Result<Option<Record>, MigratorError> {
        Ok(self.primary.read(handle)?)
    }

    /// Look up a record by identity.
    pub fn get(&self, identity: &Identity) -> Result<Option<Record>, MigratorError> {
        Ok(self.primary.get(identity)?)
    }

    /// Secondary entries of every kind registered for an identity.
    ///
    /// Entries are grouped by kind in `IndexKind::ALL` order, each group in
    /// insertion order.
    pub fn index_entries(&self, identity: &Identity) -> Result<Vec<IndexEntry>, MigratorError> {
        let mut entries: Vec<IndexEntry> = Vec::new();
        entries.extend(self.idx64.identity_entries(identity)?.into_iter().map(IndexEntry::from));
        entries.extend(self.idx128.identity_entries(identity)?.into_iter().map(IndexEntry::from));
        entries.extend(self.idx256.identity_entries(identity)?.into_iter().map(IndexEntry::from));
        entries.extend(
            self.idx_double
                .identity_entries(identity)?
                .into_iter()
                .map(IndexEntry::from),
        );
        entries.extend(
            self.idx_long_double
                .identity_entries(identity)?
                .into_iter()
                .map(IndexEntry::from),
        );
        Ok(entries)
    }

    /// Run one action.
    pub fn execute(&mut self, action: &Action) -> Result<(), MigratorError> {
        match action {
            Action::Inject {
                table,
                scope,
                payer,
                id,
                data,
            } => self.inject(*table, *scope, *payer, *id, data),
            Action::Eject {
                account,
                table,
                scope,
                id,
            } => self.eject(*account, *table, *scope, *id),
            Action::IdxU64 {
                table,
                scope,
                payer,
                id,
                key,
            } => self.idx_u64(*table, *scope, *payer, *id, *key),
            Action::IdxU128 {
                table,
                scope,
                payer,
                id,
                key,
            } => self.idx_u128(*table, *scope, *payer, *id, *key),
            Action::IdxDigest256 {
                table,
                scope,
                payer,
                id,
                key,
            } => self.idx_digest256(*table, *scope, *payer, *id, *key),
            Action::IdxF64 {
                table,
                scope,
                payer,
                id,
                key,
            } => self.idx_f64(*table, *scope, *payer, *id, *key),
            Action::IdxF80 {
                table,
                scope,
                payer,
                id,
                key,
            } => self.idx_f80(*table, *scope, *payer, *id, *key),
        }
    }

    /// Run one action and report the outcome as a status code.
    ///
    /// Returns `STATUS_OK` on success, otherwise `MigratorError::status_code`.
    pub fn apply(&mut self, action: &Action) -> i32 {
        tracing::debug!("apply {action}");

        let status = match self.execute(action) {
            Ok(()) => STATUS_OK,
            Err(e) => {
                if e.is_fault() {
                    tracing::warn!("{} failed: {e}", action.name());
                } else {
                    tracing::debug!("{} rejected: {e}", action.name());
                }
                e.status_code()
            }
        };

        tracing::debug!("{} finished with status {status}", action.name());
        status
    }
}

fn store_secondary<K: SecondaryKey>(
    config: &StoreConfig,
    primary: &mut PrimaryStore,
    ledger: &mut Ledger,
    index: &mut SecondaryIndex<K>,
    identity: Identity,
    payer: Name,
    key: K,
) -> Result<(), MigratorError> {
    key.validate()?;

    if config.require_primary && !primary.contains(&identity)? {
        return Err(MigratorError::InvariantViolation(format!(
            "{} entry for {identity} has no primary record",
            K::KIND
        )));
    }

    index.index_store(ledger, identity.table, identity.scope, payer, identity.id, key)?;
    primary.bump_generation(identity.partition());
    Ok(())
}

/// Errors surfaced by the façade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigratorError {
    /// The identity already has a record and overwrite is disallowed.
    DuplicateKey(Identity),
    /// The record exceeds the maximum record size.
    TooLarge { size: usize, max: usize },
    /// No record exists for the identity.
    NotFound(Identity),
    /// The secondary key cannot be indexed.
    InvalidKey(KeyError),
    /// The operation would break a store invariant.
    InvariantViolation(String),
    /// The ordered medium failed.
    Medium(BTreeError),
}

impl MigratorError {
    /// Integer status reported by `Migrator::apply`.
    #[must_use]
    pub const fn status_code(&self) -> i32 {
        match self {
            Self::DuplicateKey(_) => -1,
            Self::TooLarge { .. } => -2,
            Self::NotFound(_) => -3,
            Self::InvalidKey(_) => -4,
            Self::InvariantViolation(_) => -5,
            Self::Medium(_) => -6,
        }
    }

    /// Whether the error indicates damage to the store rather than a
    /// rejected request.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Medium(_))
    }
}

impl fmt::Display for MigratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey(identity) => write!(f, "record already exists: {identity}"),
            Self::TooLarge { size, max } => {
                write!(f, "record too large: {size} bytes (max {max})")
            }
            Self::NotFound(identity) => write!(f, "record not found: {identity}"),
            Self::InvalidKey(e) => write!(f, "invalid secondary key: {e}"),
            Self::InvariantViolation(message) => write!(f, "invariant violation: {message}"),
            Self::Medium(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for MigratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidKey(e) => Some(e),
            Self::Medium(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for MigratorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateKey(identity) => Self::DuplicateKey(identity),
            StoreError::TooLarge { size, max } => Self::TooLarge { size, max },
            StoreError::InvalidKey(e) => Self::InvalidKey(e),
            StoreError::InvariantViolation(message) => Self::InvariantViolation(message),
            StoreError::Medium(e) => Self::Medium(e),
        }
    }
}

impl From<RemoveError> for MigratorError {
    fn from(e: RemoveError) -> Self {
        match e {
            RemoveError::NotFound(identity) => Self::NotFound(identity),
            RemoveError::Store(e) => e.into(),
        }
    }
}

impl From<KeyError> for MigratorError {
    fn from(e: KeyError) -> Self {
        Self::InvalidKey(e)
    }
}
