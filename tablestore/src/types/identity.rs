//! Record addressing.
//!
//! A record lives in a partition selected by `(table, scope)` and is unique
//! within it by its 64-bit primary key.

use std::fmt;

use super::Name;

/// A `(table, scope)` pair scoping identity uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Partition {
    pub table: Name,
    pub scope: Name,
}

impl Partition {
    /// Size of a partition prefix in storage keys.
    pub const ENCODED_SIZE: usize = 16;

    #[must_use]
    pub const fn new(table: Name, scope: Name) -> Self {
        Self { table, scope }
    }

    /// Encode as the big-endian key prefix shared by every structure.
    #[must_use]
    pub fn to_prefix(self) -> [u8; Self::ENCODED_SIZE] {
        let mut prefix = [0u8; Self::ENCODED_SIZE];
        prefix[..8].copy_from_slice(&self.table.to_be_bytes());
        prefix[8..].copy_from_slice(&self.scope.to_be_bytes());
        prefix
    }

    /// Decode a key prefix produced by `to_prefix`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than `ENCODED_SIZE`.
    #[must_use]
    pub fn from_prefix(bytes: &[u8]) -> Self {
        let mut table = [0u8; 8];
        let mut scope = [0u8; 8];
        table.copy_from_slice(&bytes[..8]);
        scope.copy_from_slice(&bytes[8..16]);
        Self {
            table: Name::from_be_bytes(table),
            scope: Name::from_be_bytes(scope),
        }
    }

    /// The identity of `id` inside this partition.
    #[must_use]
    pub const fn identity(self, id: u64) -> Identity {
        Identity {
            table: self.table,
            scope: self.scope,
            id,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.scope)
    }
}

/// The primary key of one record.
///
/// # Invariants
///
/// - An identity never changes once a record is stored under it.
/// - `id` is unique within `(table, scope)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity {
    pub table: Name,
    pub scope: Name,
    pub id: u64,
}

impl Identity {
    #[must_use]
    pub const fn new(table: Name, scope: Name, id: u64) -> Self {
        Self { table, scope, id }
    }

    /// The partition this identity belongs to.
    #[must_use]
    pub const fn partition(self) -> Partition {
        Partition {
            table: self.table,
            scope: self.scope,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} <{}>", self.table, self.scope, self.id)
    }
}
