//! Snapshot export and import.
//!
//! A snapshot holds every primary row of a store together with its payer and
//! the secondary entries registered for it. Importing replays the rows
//! through the façade, so the imported store upholds the same invariants as
//! one built by live operations.
//!
//! # File Format
//!
//! - 8-byte magic: `TBLSNAP1`
//! - Zero or more frames: `len (u32, LE) | payload | crc32 of payload (u32, LE)`
//!
//! Each payload is a protobuf `RowMessage`. Rows appear in key order; each
//! row's entries appear grouped by kind, in insertion order.
//!
//! Secondary entries without a primary record are not exported.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use prost::Message;

use crate::migrator::{Migrator, MigratorError};
use crate::types::{Identity, IndexKind, IndexValue, KeyError, Name};

/// Leading bytes of every snapshot file.
pub const MAGIC: [u8; 8] = *b"TBLSNAP1";

/// Largest frame payload accepted on import.
pub const MAX_FRAME_SIZE: u32 = 1 << 20;

#[allow(clippy::pedantic)]
#[allow(clippy::nursery)]
#[allow(clippy::all)]
mod proto {
    /// One primary row with its secondary entries.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct RowMessage {
        #[prost(uint64, tag = "1")]
        pub table: u64,
        #[prost(uint64, tag = "2")]
        pub scope: u64,
        #[prost(uint64, tag = "3")]
        pub id: u64,
        #[prost(uint64, tag = "4")]
        pub payer: u64,
        #[prost(bytes = "vec", tag = "5")]
        pub data: Vec<u8>,
        #[prost(message, repeated, tag = "6")]
        pub entries: Vec<IndexEntryMessage>,
    }

    /// One secondary entry.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct IndexEntryMessage {
        /// `IndexKind::code`.
        #[prost(uint32, tag = "1")]
        pub kind: u32,
        /// Order-preserving key encoding.
        #[prost(bytes = "vec", tag = "2")]
        pub key: Vec<u8>,
        #[prost(uint64, tag = "3")]
        pub payer: u64,
        /// Insertion sequence within the entry's index.
        #[prost(uint64, tag = "4")]
        pub seq: u64,
    }
}

pub use proto::{IndexEntryMessage, RowMessage};

/// Counts reported by export and import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub rows: usize,
    pub entries: usize,
}

/// Write every row of `migrator` to `writer`.
pub fn export<W: Write>(migrator: &Migrator, mut writer: W) -> Result<SnapshotStats, SnapshotError> {
    let mut stats = SnapshotStats::default();
    writer.write_all(&MAGIC)?;

    for (identity, record) in migrator.primary().rows().map_err(MigratorError::from)? {
        let entries: Vec<IndexEntryMessage> = migrator
            .index_entries(&identity)?
            .into_iter()
            .map(|entry| IndexEntryMessage {
                kind: entry.value.kind().code(),
                key: entry.value.to_encoded(),
                payer: entry.payer.value(),
                seq: entry.seq,
            })
            .collect();
        stats.entries += entries.len();

        let row = RowMessage {
            table: identity.table.value(),
            scope: identity.scope.value(),
            id: identity.id,
            payer: record.payer.value(),
            data: record.data,
            entries,
        };
        write_frame(&mut writer, &row.encode_to_vec())?;
        stats.rows += 1;
    }

    writer.flush()?;
    Ok(stats)
}

/// A decoded row waiting to be replayed.
struct PendingRow {
    table: Name,
    scope: Name,
    payer: Name,
    id: u64,
    data: Vec<u8>,
}

/// A decoded secondary entry waiting to be replayed.
struct PendingEntry {
    seq: u64,
    identity: Identity,
    payer: Name,
    value: IndexValue,
}

/// Replay a snapshot from `reader` into `migrator`.
///
/// Rows are injected first; secondary entries follow in their original
/// insertion order, so duplicate keys keep their relative order.
///
/// Every frame is decoded before anything is applied, and the replay runs
/// against a copy of `migrator`. The target is left unchanged when import
/// fails.
pub fn import<R: Read>(mut reader: R, migrator: &mut Migrator) -> Result<SnapshotStats, SnapshotError> {
    let mut magic = [0u8; MAGIC.len()];
    read_full(&mut reader, &mut magic)?;
    if magic != MAGIC {
        return Err(SnapshotError::BadMagic);
    }

    let mut rows: Vec<PendingRow> = Vec::new();
    let mut entries: Vec<PendingEntry> = Vec::new();

    while let Some(payload) = read_frame(&mut reader)? {
        let row = RowMessage::decode(payload.as_slice())?;
        let (table, scope) = (Name::new(row.table), Name::new(row.scope));

        for entry in &row.entries {
            let kind = IndexKind::from_code(entry.kind)
                .ok_or(SnapshotError::UnknownIndexKind(entry.kind))?;
            entries.push(PendingEntry {
                seq: entry.seq,
                identity: Identity::new(table, scope, row.id),
                payer: Name::new(entry.payer),
                value: IndexValue::decode(kind, &entry.key)?,
            });
        }

        rows.push(PendingRow {
            table,
            scope,
            payer: Name::new(row.payer),
            id: row.id,
            data: row.data,
        });
    }

    let mut staged = migrator.clone();
    let mut stats = SnapshotStats::default();

    for row in rows {
        staged.inject(row.table, row.scope, row.payer, row.id, &row.data)?;
        stats.rows += 1;
    }

    // Sequences are per index, so only the order within a kind matters.
    entries.sort_by_key(|entry| (entry.value.kind(), entry.seq));
    for entry in entries {
        let Identity { table, scope, id } = entry.identity;
        staged.index(table, scope, entry.payer, id, entry.value)?;
        stats.entries += 1;
    }

    *migrator = staged;
    tracing::info!(
        "imported {} rows and {} secondary entries from snapshot",
        stats.rows,
        stats.entries
    );
    Ok(stats)
}

/// Export to a file, replacing it if it exists.
pub fn export_to_path(migrator: &Migrator, path: &Path) -> Result<SnapshotStats, SnapshotError> {
    let file = File::create(path)?;
    let stats = export(migrator, BufWriter::new(file))?;
    tracing::info!(
        "exported {} rows and {} secondary entries to {}",
        stats.rows,
        stats.entries,
        path.display()
    );
    Ok(stats)
}

/// Import from a file.
pub fn import_from_path(path: &Path, migrator: &mut Migrator) -> Result<SnapshotStats, SnapshotError> {
    let file = File::open(path)?;
    import(BufReader::new(file), migrator)
}

fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), SnapshotError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&len| len <= MAX_FRAME_SIZE)
        .ok_or(SnapshotError::FrameTooLarge(payload.len()))?;

    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.write_all(&crc32fast::hash(payload).to_le_bytes())?;
    Ok(())
}

/// Read one frame. Returns None at a clean end of input.
fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, SnapshotError> {
    let mut len_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < len_bytes.len() {
        match reader.read(&mut len_bytes[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(SnapshotError::Truncated),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }

    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_SIZE {
        return Err(SnapshotError::FrameTooLarge(len as usize));
    }

    let mut payload = vec![0u8; len as usize];
    read_full(reader, &mut payload)?;

    let mut crc_bytes = [0u8; 4];
    read_full(reader, &mut crc_bytes)?;
    let expected = u32::from_le_bytes(crc_bytes);
    let actual = crc32fast::hash(&payload);
    if expected != actual {
        return Err(SnapshotError::ChecksumMismatch { expected, actual });
    }

    Ok(Some(payload))
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), SnapshotError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SnapshotError::Truncated
        } else {
            SnapshotError::Io(e)
        }
    })
}

/// Errors from reading or writing snapshots.
#[derive(Debug)]
pub enum SnapshotError {
    /// I/O error.
    Io(std::io::Error),
    /// The input does not start with the snapshot magic.
    BadMagic,
    /// The input ends inside a frame.
    Truncated,
    /// A frame's checksum does not match its payload.
    ChecksumMismatch { expected: u32, actual: u32 },
    /// A frame exceeds `MAX_FRAME_SIZE`.
    FrameTooLarge(usize),
    /// A payload is not a valid row message.
    Decode(prost::DecodeError),
    /// An entry names an index kind this build does not know.
    UnknownIndexKind(u32),
    /// An entry's key does not decode for its kind.
    Key(KeyError),
    /// Replaying a row was rejected by the store.
    Migrator(MigratorError),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::BadMagic => write!(f, "not a snapshot file"),
            Self::Truncated => write!(f, "snapshot is truncated"),
            Self::ChecksumMismatch { expected, actual } => write!(
                f,
                "frame checksum mismatch: expected {expected:08x}, got {actual:08x}"
            ),
            Self::FrameTooLarge(len) => {
                write!(f, "frame of {len} bytes exceeds {MAX_FRAME_SIZE} bytes")
            }
            Self::Decode(e) => write!(f, "invalid row message: {e}"),
            Self::UnknownIndexKind(code) => write!(f, "unknown index kind {code}"),
            Self::Key(e) => write!(f, "invalid key in snapshot: {e}"),
            Self::Migrator(e) => write!(f, "replay failed: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Key(e) => Some(e),
            Self::Migrator(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<prost::DecodeError> for SnapshotError {
    fn from(e: prost::DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<KeyError> for SnapshotError {
    fn from(e: KeyError) -> Self {
        Self::Key(e)
    }
}

impl From<MigratorError> for SnapshotError {
    fn from(e: MigratorError) -> Self {
        Self::Migrator(e)
    }
}
