//! Primary store.
//!
//! The primary store maps an identity `(table, scope, id)` to its record.
//! It is backed by a B-tree and provides point lookups, revocable handles and
//! partition scans.
//!
//! # Key Format
//!
//! `table (8, BE) | scope (8, BE) | id (8, BE) | zero padding`
//!
//! # Value Format
//!
//! `payer (8, LE) | data`

use std::collections::HashMap;

use crate::config::StoreConfig;
use crate::storage::btree::{BTree, BTreeError, Key, MAX_INLINE_VALUE_SIZE, make_key};
use crate::storage::ledger::{Ledger, primary_row_cost};
use crate::types::{Identity, KeyError, Name, Partition};

/// Size of the payer header in front of a record's data.
pub const RECORD_HEADER_SIZE: usize = 8;

/// Largest record data the medium can hold.
pub const MAX_RECORD_SIZE: usize = MAX_INLINE_VALUE_SIZE - RECORD_HEADER_SIZE;

/// A stored record: an opaque payload and the payer billed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub payer: Name,
    pub data: Vec<u8>,
}

impl Record {
    /// Serialize for storage.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(RECORD_HEADER_SIZE + self.data.len());
        bytes.extend_from_slice(&self.payer.value().to_le_bytes());
        bytes.extend_from_slice(&self.data);
        bytes
    }

    /// Deserialize from storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let (header, data) = bytes
            .split_first_chunk::<RECORD_HEADER_SIZE>()
            .ok_or_else(|| {
                StoreError::InvariantViolation(format!(
                    "stored record is {} bytes, shorter than its header",
                    bytes.len()
                ))
            })?;

        Ok(Self {
            payer: Name::new(u64::from_le_bytes(*header)),
            data: data.to_vec(),
        })
    }

    /// Billable size of this record.
    #[must_use]
    pub fn cost(&self) -> u64 {
        primary_row_cost(self.data.len())
    }
}

/// A revocable reference to a stored record.
///
/// A handle captures the generation of its partition when it is created.
/// Any later mutation of the partition invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    identity: Identity,
    generation: u64,
}

impl Handle {
    /// The identity this handle refers to.
    #[must_use]
    pub const fn identity(&self) -> Identity {
        self.identity
    }
}

/// Primary store for records.
///
/// Maps `(table, scope, id)` -> `Record`.
///
/// Generations are drawn from one store-wide counter, so a value is never
/// reused and a partition's entry can be dropped once it holds no records.
/// The backing tree never frees nodes: memory stays at the high-water mark
/// of the store's contents.
#[derive(Debug, Clone)]
pub struct PrimaryStore {
    tree: BTree,
    generations: HashMap<Partition, u64>,
    last_generation: u64,
    max_record_size: usize,
    allow_overwrite: bool,
}

impl PrimaryStore {
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            tree: BTree::new(),
            generations: HashMap::new(),
            last_generation: 0,
            max_record_size: config.max_record_size.min(MAX_RECORD_SIZE),
            allow_overwrite: config.allow_overwrite,
        }
    }

    /// Store `data` under `(table, scope, id)`, billed to `payer`.
    ///
    /// # Errors
    ///
    /// - `TooLarge` if `data` exceeds the maximum record size
    /// - `DuplicateKey` if the identity exists and overwrite is disallowed
    pub fn store(
        &mut self,
        ledger: &mut Ledger,
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        data: &[u8],
    ) -> Result<(), StoreError> {
        let identity = Identity::new(table, scope, id);

        if data.len() > self.max_record_size {
            return Err(StoreError::TooLarge {
                size: data.len(),
                max: self.max_record_size,
            });
        }

        let key = identity_key(identity);
        if !self.allow_overwrite && self.tree.get(&key)?.is_some() {
            return Err(StoreError::DuplicateKey(identity));
        }

        let record = Record {
            payer,
            data: data.to_vec(),
        };
        let old = self.tree.insert(key, record.to_bytes())?;

        if let Some(old_bytes) = old {
            let old_record = Record::from_bytes(&old_bytes)?;
            ledger.credit(old_record.payer, old_record.cost());
        }
        ledger.charge(payer, record.cost());
        self.bump_generation(identity.partition());

        Ok(())
    }

    /// Find a record, returning a handle valid until the partition changes.
    pub fn find(&self, table: Name, scope: Name, id: u64) -> Result<Option<Handle>, StoreError> {
        let identity = Identity::new(table, scope, id);
        if self.tree.get(&identity_key(identity))?.is_none() {
            return Ok(None);
        }

        Ok(Some(Handle {
            identity,
            generation: self.generation(identity.partition()),
        }))
    }

    /// Check whether a handle is still current.
    #[must_use]
    pub fn is_live(&self, handle: &Handle) -> bool {
        handle.generation == self.generation(handle.identity.partition())
    }

    /// Read the record behind a handle. Returns None for stale handles.
    pub fn read(&self, handle: &Handle) -> Result<Option<Record>, StoreError> {
        if !self.is_live(handle) {
            return Ok(None);
        }
        self.get(&handle.identity)
    }

    /// Look up a record by identity.
    pub fn get(&self, identity: &Identity) -> Result<Option<Record>, StoreError> {
        match self.tree.get(&identity_key(*identity))? {
            Some(bytes) => Ok(Some(Record::from_bytes(bytes)?)),
            None => Ok(None),
        }
    }

    /// Check whether a record exists for an identity.
    pub fn contains(&self, identity: &Identity) -> Result<bool, StoreError> {
        Ok(self.tree.get(&identity_key(*identity))?.is_some())
    }

    /// Remove the record behind a handle and credit its payer.
    ///
    /// # Errors
    ///
    /// `NotFound` if the handle is stale or the record is gone.
    pub fn remove(&mut self, ledger: &mut Ledger, handle: &Handle) -> Result<Record, RemoveError> {
        if !self.is_live(handle) {
            return Err(RemoveError::NotFound(handle.identity));
        }

        let Some(bytes) = self.tree.remove(&identity_key(handle.identity))? else {
            return Err(RemoveError::NotFound(handle.identity));
        };
        let record = Record::from_bytes(&bytes)?;

        ledger.credit(record.payer, record.cost());
        self.bump_generation(handle.identity.partition());
        self.release_generation(handle.identity.partition())?;

        Ok(record)
    }

    /// All records in a partition, in ascending id order.
    pub fn scan_partition(&self, partition: Partition) -> Result<Vec<(u64, Record)>, StoreError> {
        let prefix = partition.to_prefix();
        let mut iter = self.tree.iter_from(&make_key(&[&prefix]))?;
        let mut rows = Vec::new();

        while let Some((key, value)) = iter.next_entry()? {
            if key[..Partition::ENCODED_SIZE] != prefix {
                break;
            }
            rows.push((key_identity(key).id, Record::from_bytes(value)?));
        }

        Ok(rows)
    }

    /// Partitions holding at least one record, in key order.
    pub fn partitions(&self) -> Result<Vec<Partition>, StoreError> {
        let mut partitions: Vec<Partition> = Vec::new();
        let mut iter = self.tree.cursor()?;

        while let Some((key, _)) = iter.next_entry()? {
            let partition = key_identity(key).partition();
            if partitions.last() != Some(&partition) {
                partitions.push(partition);
            }
        }

        Ok(partitions)
    }

    /// Every record in key order.
    pub fn rows(&self) -> Result<Vec<(Identity, Record)>, StoreError> {
        let mut iter = self.tree.cursor()?;
        let mut rows = Vec::with_capacity(self.tree.len());

        while let Some((key, value)) = iter.next_entry()? {
            rows.push((key_identity(key), Record::from_bytes(value)?));
        }

        Ok(rows)
    }

    /// Number of stored records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Current generation of a partition.
    #[must_use]
    pub fn generation(&self, partition: Partition) -> u64 {
        self.generations.get(&partition).copied().unwrap_or(0)
    }

    /// Invalidate every outstanding handle into a partition.
    pub fn bump_generation(&mut self, partition: Partition) {
        self.last_generation += 1;
        self.generations.insert(partition, self.last_generation);
    }

    /// Forget the generation of a partition that holds no records.
    ///
    /// No handle can be live in such a partition, and the next bump draws a
    /// value no earlier handle captured.
    pub fn release_generation(&mut self, partition: Partition) -> Result<(), StoreError> {
        if self.generations.contains_key(&partition) && !self.has_records(partition)? {
            self.generations.remove(&partition);
        }
        Ok(())
    }

    /// Number of partitions with a tracked generation.
    #[must_use]
    pub fn tracked_partitions(&self) -> usize {
        self.generations.len()
    }

    fn has_records(&self, partition: Partition) -> Result<bool, StoreError> {
        let prefix = partition.to_prefix();
        let mut iter = self.tree.iter_from(&make_key(&[&prefix]))?;
        Ok(iter
            .next_entry()?
            .is_some_and(|(key, _)| key[..Partition::ENCODED_SIZE] == prefix))
    }
}

fn identity_key(identity: Identity) -> Key {
    make_key(&[
        &identity.partition().to_prefix(),
        &identity.id.to_be_bytes(),
    ])
}

fn key_identity(key: &Key) -> Identity {
    let mut id = [0u8; 8];
    id.copy_from_slice(&key[Partition::ENCODED_SIZE..Partition::ENCODED_SIZE + 8]);
    Partition::from_prefix(key).identity(u64::from_be_bytes(id))
}

/// Errors from storing into the primary store or a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The identity already has a record.
    DuplicateKey(Identity),
    /// The record exceeds the maximum record size.
    TooLarge { size: usize, max: usize },
    /// The secondary key is not storable (NaN, non-canonical).
    InvalidKey(KeyError),
    /// The operation would break a store invariant.
    InvariantViolation(String),
    /// The ordered medium failed.
    Medium(BTreeError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(identity) => write!(f, "record already exists: {identity}"),
            Self::TooLarge { size, max } => {
                write!(f, "record too large: {size} bytes (max {max})")
            }
            Self::InvalidKey(e) => write!(f, "invalid secondary key: {e}"),
            Self::InvariantViolation(message) => write!(f, "invariant violation: {message}"),
            Self::Medium(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidKey(e) => Some(e),
            Self::Medium(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BTreeError> for StoreError {
    fn from(e: BTreeError) -> Self {
        Self::Medium(e)
    }
}

impl From<KeyError> for StoreError {
    fn from(e: KeyError) -> Self {
        Self::InvalidKey(e)
    }
}

/// Errors from removing a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveError {
    /// The handle is stale or the record does not exist.
    NotFound(Identity),
    /// Reading the stored record failed.
    Store(StoreError),
}

impl std::fmt::Display for RemoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(identity) => write!(f, "record not found: {identity}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RemoveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Store(e) => Some(e),
        }
    }
}

impl From<StoreError> for RemoveError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<BTreeError> for RemoveError {
    fn from(e: BTreeError) -> Self {
        Self::Store(StoreError::Medium(e))
    }
}
