// SPDX-License-Identifier: MIT OR Apache-2.0
//! The append-only store index.
//!
//! `store/INDEX` is a log of fixed-width 128-byte records: a 20-byte store
//! id, a 100-byte NUL-padded name, and a little-endian `i64` timestamp.
//! Each record is appended with a single `write(2)` in `O_APPEND` mode, so
//! concurrent workers interleave whole records.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::StoreError;
use crate::id::{is_valid_id, STORE_ID_LEN};

/// Bytes reserved for the record name, NUL-padded.
pub const INDEX_NAME_LEN: usize = 100;
/// Total record width.
pub const INDEX_RECORD_SIZE: usize = STORE_ID_LEN + INDEX_NAME_LEN + 8;

/// One decoded index record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// The indexed store's id.
    pub id: String,
    /// Display name the store was indexed under.
    pub name: String,
    /// Seconds since the epoch at indexing time.
    pub indexed: i64,
}

fn encode_record(entry: &IndexEntry) -> Result<[u8; INDEX_RECORD_SIZE], StoreError> {
    if !is_valid_id(&entry.id) {
        return Err(StoreError::InvalidId);
    }

    let mut rec = [0u8; INDEX_RECORD_SIZE];
    rec[..STORE_ID_LEN].copy_from_slice(entry.id.as_bytes());

    let name = entry.name.as_bytes();
    let n = name.len().min(INDEX_NAME_LEN - 1);
    rec[STORE_ID_LEN..STORE_ID_LEN + n].copy_from_slice(&name[..n]);

    rec[STORE_ID_LEN + INDEX_NAME_LEN..].copy_from_slice(&entry.indexed.to_le_bytes());
    Ok(rec)
}

fn decode_record(rec: &[u8]) -> IndexEntry {
    let id = String::from_utf8_lossy(&rec[..STORE_ID_LEN]).into_owned();
    let name_field = &rec[STORE_ID_LEN..STORE_ID_LEN + INDEX_NAME_LEN];
    let name_end = name_field.iter().position(|&b| b == 0).unwrap_or(INDEX_NAME_LEN);
    let name = String::from_utf8_lossy(&name_field[..name_end]).into_owned();
    let ts_bytes: [u8; 8] = rec[STORE_ID_LEN + INDEX_NAME_LEN..]
        .try_into()
        .expect("record width");
    IndexEntry {
        id,
        name,
        indexed: i64::from_le_bytes(ts_bytes),
    }
}

/// Appender for the index file.
#[derive(Debug)]
pub struct IndexWriter {
    file: File,
}

impl IndexWriter {
    /// Open (or create) the index at `path` in append mode.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Append one record with a single write.
    pub fn put(&mut self, entry: &IndexEntry) -> Result<(), StoreError> {
        let rec = encode_record(entry)?;
        self.file.write_all(&rec)?;
        Ok(())
    }
}

/// Windowed, newest-first reader over an index file.
#[derive(Debug)]
pub struct IndexReader {
    file: File,
}

impl IndexReader {
    /// Wrap an already-open index file.
    pub fn new(file: File) -> Self {
        Self { file }
    }

    /// Open the index at `path` read-only.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(File::open(path)?))
    }

    /// Number of whole records in the file.
    ///
    /// A length that is not a multiple of the record size means the file
    /// was corrupted and is refused.
    pub fn len(&self) -> Result<u64, StoreError> {
        let len = self.file.metadata()?.len();
        if len % INDEX_RECORD_SIZE as u64 != 0 {
            return Err(StoreError::CorruptIndex);
        }
        Ok(len / INDEX_RECORD_SIZE as u64)
    }

    /// `true` when the index holds no records.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Read up to `count` records ending just before row `before`
    /// (exclusive), newest first. `None` starts from the file's end.
    pub fn read_window(
        &mut self,
        before: Option<u64>,
        count: usize,
    ) -> Result<Vec<IndexEntry>, StoreError> {
        let total = self.len()?;
        let end = before.unwrap_or(total).min(total);
        let take = (count as u64).min(end);
        let start = end - take;

        self.file
            .seek(SeekFrom::Start(start * INDEX_RECORD_SIZE as u64))?;
        let mut buf = vec![0u8; (take as usize) * INDEX_RECORD_SIZE];
        self.file.read_exact(&mut buf)?;

        Ok(buf
            .chunks_exact(INDEX_RECORD_SIZE)
            .rev()
            .map(decode_record)
            .collect())
    }
}
