//! Secondary index family.
//!
//! A secondary index maps a typed key to the identities registered under it.
//! Keys are non-unique; among equal keys, entries keep insertion order. One
//! generic implementation serves all five key kinds.
//!
//! # Key Format
//!
//! Each entry is stored twice so it can be found from either side:
//!
//! - By key: `partition (16) | encoded key (padded to 32) | seq (8, BE)`
//!   -> `id (8, LE) | payer (8, LE)`
//! - By identity: `partition (16) | id (8, BE) | seq (8, BE) | zero padding`
//!   -> `encoded key | payer (8, LE)`
//!
//! `seq` is a per-index counter, so ordering by it within a key range gives
//! insertion order.

use std::marker::PhantomData;

use crate::storage::btree::{BTree, Key, make_key};
use crate::storage::ledger::{Ledger, secondary_row_cost};
use crate::storage::primary::StoreError;
use crate::types::{Identity, MAX_KEY_WIDTH, Name, Partition, SecondaryKey};

/// Offset of the sequence number in a by-key storage key.
const BY_KEY_SEQ_OFFSET: usize = Partition::ENCODED_SIZE + MAX_KEY_WIDTH;

/// Length of the identity prefix of a by-identity storage key.
const BY_ID_PREFIX_LEN: usize = Partition::ENCODED_SIZE + 8;

/// One secondary entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecondaryEntry<K> {
    pub identity: Identity,
    pub key: K,
    pub payer: Name,
    pub seq: u64,
}

/// A secondary index over keys of type `K`.
#[derive(Debug, Clone)]
pub struct SecondaryIndex<K: SecondaryKey> {
    by_key: BTree,
    by_id: BTree,
    next_seq: u64,
    _key: PhantomData<K>,
}

impl<K: SecondaryKey> Default for SecondaryIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: SecondaryKey> SecondaryIndex<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_key: BTree::new(),
            by_id: BTree::new(),
            next_seq: 0,
            _key: PhantomData,
        }
    }

    /// Register `key` for `(table, scope, id)`, billed to `payer`.
    ///
    /// Returns the entry's sequence number.
    ///
    /// # Errors
    ///
    /// `InvalidKey` if the key cannot be ordered (NaN). The index is left
    /// unchanged.
    pub fn index_store(
        &mut self,
        ledger: &mut Ledger,
        table: Name,
        scope: Name,
        payer: Name,
        id: u64,
        key: K,
    ) -> Result<u64, StoreError> {
        key.validate()?;

        let identity = Identity::new(table, scope, id);
        let seq = self.next_seq;
        let encoded = key.to_encoded();

        let mut by_key_value = Vec::with_capacity(16);
        by_key_value.extend_from_slice(&id.to_le_bytes());
        by_key_value.extend_from_slice(&payer.value().to_le_bytes());

        let mut by_id_value = Vec::with_capacity(K::WIDTH + 8);
        by_id_value.extend_from_slice(&encoded);
        by_id_value.extend_from_slice(&payer.value().to_le_bytes());

        self.by_key.insert(by_key_key(identity.partition(), &encoded, seq), by_key_value)?;
        self.by_id.insert(by_id_key(identity, seq), by_id_value)?;

        self.next_seq += 1;
        ledger.charge(payer, secondary_row_cost(K::WIDTH));

        Ok(seq)
    }

    /// Ids registered under `key` in `(table, scope)`, in insertion order.
    pub fn find(&self, table: Name, scope: Name, key: &K) -> Result<Vec<u64>, StoreError> {
        key.validate()?;

        let partition = Partition::new(table, scope);
        let encoded = key.to_encoded();
        let start = by_key_key(partition, &encoded, 0);
        let mut iter = self.by_key.iter_from(&start)?;
        let mut ids = Vec::new();

        while let Some((storage_key, value)) = iter.next_entry()? {
            if storage_key[..BY_KEY_SEQ_OFFSET] != start[..BY_KEY_SEQ_OFFSET] {
                break;
            }
            ids.push(read_u64_le(value, 0)?);
        }

        Ok(ids)
    }

    /// The first entry in `(table, scope)` whose key is `>=` `key`.
    pub fn lower_bound(
        &self,
        table: Name,
        scope: Name,
        key: &K,
    ) -> Result<Option<(K, u64)>, StoreError> {
        key.validate()?;

        let partition = Partition::new(table, scope);
        let start = by_key_key(partition, &key.to_encoded(), 0);
        let mut iter = self.by_key.iter_from(&start)?;

        match iter.next_entry()? {
            Some((storage_key, value))
                if storage_key[..Partition::ENCODED_SIZE] == start[..Partition::ENCODED_SIZE] =>
            {
                let found = decode_key::<K>(&storage_key[Partition::ENCODED_SIZE..])?;
                Ok(Some((found, read_u64_le(value, 0)?)))
            }
            _ => Ok(None),
        }
    }

    /// Keys registered for an identity, in insertion order.
    pub fn keys_for(&self, identity: &Identity) -> Result<Vec<K>, StoreError> {
        Ok(self
            .identity_entries(identity)?
            .into_iter()
            .map(|entry| entry.key)
            .collect())
    }

    /// Entries registered for an identity, in insertion order.
    pub fn identity_entries(
        &self,
        identity: &Identity,
    ) -> Result<Vec<SecondaryEntry<K>>, StoreError> {
        let start = by_id_key(*identity, 0);
        let mut iter = self.by_id.iter_from(&start)?;
        let mut entries = Vec::new();

        while let Some((storage_key, value)) = iter.next_entry()? {
            if storage_key[..BY_ID_PREFIX_LEN] != start[..BY_ID_PREFIX_LEN] {
                break;
            }
            entries.push(by_id_entry(storage_key, value)?);
        }

        Ok(entries)
    }

    /// Remove every entry registered for an identity and credit the payers.
    pub fn remove_identity(
        &mut self,
        ledger: &mut Ledger,
        identity: &Identity,
    ) -> Result<Vec<SecondaryEntry<K>>, StoreError> {
        let entries = self.identity_entries(identity)?;

        for entry in &entries {
            let encoded = entry.key.to_encoded();
            self.by_id.remove(&by_id_key(entry.identity, entry.seq))?;
            let removed = self
                .by_key
                .remove(&by_key_key(identity.partition(), &encoded, entry.seq))?;
            if removed.is_none() {
                tracing::warn!(
                    "{} entry {} for {identity} had no by-key mirror",
                    K::KIND,
                    entry.seq
                );
            }
            ledger.credit(entry.payer, secondary_row_cost(K::WIDTH));
        }

        Ok(entries)
    }

    /// Every entry in by-key order.
    pub fn entries(&self) -> Result<Vec<SecondaryEntry<K>>, StoreError> {
        let mut iter = self.by_key.cursor()?;
        let mut entries = Vec::with_capacity(self.by_key.len());

        while let Some((storage_key, value)) = iter.next_entry()? {
            let partition = Partition::from_prefix(storage_key);
            let key = decode_key::<K>(&storage_key[Partition::ENCODED_SIZE..])?;
            let seq = read_u64_be(storage_key, BY_KEY_SEQ_OFFSET)?;
            entries.push(SecondaryEntry {
                identity: partition.identity(read_u64_le(value, 0)?),
                key,
                payer: Name::new(read_u64_le(value, 8)?),
                seq,
            });
        }

        Ok(entries)
    }

    /// Every entry in by-identity order.
    pub fn mirror_entries(&self) -> Result<Vec<SecondaryEntry<K>>, StoreError> {
        let mut iter = self.by_id.cursor()?;
        let mut entries = Vec::with_capacity(self.by_id.len());

        while let Some((storage_key, value)) = iter.next_entry()? {
            entries.push(by_id_entry(storage_key, value)?);
        }

        Ok(entries)
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.by_key.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

fn by_key_key(partition: Partition, encoded: &[u8], seq: u64) -> Key {
    let mut padded = [0u8; MAX_KEY_WIDTH];
    padded[..encoded.len()].copy_from_slice(encoded);
    make_key(&[&partition.to_prefix(), &padded, &seq.to_be_bytes()])
}

fn by_id_key(identity: Identity, seq: u64) -> Key {
    make_key(&[
        &identity.partition().to_prefix(),
        &identity.id.to_be_bytes(),
        &seq.to_be_bytes(),
    ])
}

fn by_id_entry<K: SecondaryKey>(
    storage_key: &Key,
    value: &[u8],
) -> Result<SecondaryEntry<K>, StoreError> {
    let partition = Partition::from_prefix(storage_key);
    let id = read_u64_be(storage_key, Partition::ENCODED_SIZE)?;
    let seq = read_u64_be(storage_key, BY_ID_PREFIX_LEN)?;

    Ok(SecondaryEntry {
        identity: partition.identity(id),
        key: decode_key::<K>(value)?,
        payer: Name::new(read_u64_le(value, K::WIDTH)?),
        seq,
    })
}

fn decode_key<K: SecondaryKey>(bytes: &[u8]) -> Result<K, StoreError> {
    let encoded = bytes.get(..K::WIDTH).ok_or_else(|| truncated(bytes.len()))?;
    K::decode(encoded).map_err(|e| {
        StoreError::InvariantViolation(format!("stored {} key does not decode: {e}", K::KIND))
    })
}

fn read_u64_le(bytes: &[u8], offset: usize) -> Result<u64, StoreError> {
    bytes
        .get(offset..offset + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| truncated(bytes.len()))
}

fn read_u64_be(bytes: &[u8], offset: usize) -> Result<u64, StoreError> {
    bytes
        .get(offset..offset + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_be_bytes)
        .ok_or_else(|| truncated(bytes.len()))
}

fn truncated(len: usize) -> StoreError {
    StoreError::InvariantViolation(format!("stored index entry is truncated ({len} bytes)"))
}
