//! Local transaction journal (C7): a durable, append-only log of transactions
//! submitted locally, so a node restart doesn't lose a user's own pending
//! transactions just because the network hasn't re-gossiped them back yet.
//!
//! Deliberately separate from [`crate::blobpool::journal::BlobJournal`] — it carries
//! a caller-supplied encoded byte form rather than a sidecar, since the main pool's
//! canonical encoding is out of this crate's scope (callers own their own RLP/SSZ
//! codec and just hand the pool the bytes to persist).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use alloy_primitives::{Address, Bytes, TxHash};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::JournalError;

/// One locally-submitted transaction, as persisted to the journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalJournalRecord {
    /// The transaction's hash.
    pub tx_hash: TxHash,
    /// The recovered sender.
    pub sender: Address,
    /// The transaction's canonical encoded bytes, opaque to this crate.
    pub tx_bytes: Bytes,
    /// Whether this was submitted locally (always `true` in practice for this
    /// journal, but carried so the on-disk format matches the in-memory record).
    pub local: bool
}

/// An append-only NDJSON log of locally-submitted transactions.
pub struct LocalJournal {
    file: File,
    path: PathBuf
}

impl LocalJournal {
    /// Opens (creating if absent) the journal at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, path })
    }

    /// Appends one record and flushes before returning.
    pub fn insert(&mut self, record: &LocalJournalRecord) -> Result<(), JournalError> {
        let line = serde_json::to_string(record).expect("LocalJournalRecord serialization cannot fail");
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }

    /// Appends multiple records as one batch, flushing once at the end.
    pub fn insert_batch(&mut self, records: &[LocalJournalRecord]) -> Result<(), JournalError> {
        for record in records {
            let line = serde_json::to_string(record).expect("LocalJournalRecord serialization cannot fail");
            writeln!(self.file, "{line}")?;
        }
        self.file.flush()?;
        Ok(())
    }

    /// Loads every well-formed record from `path`, skipping (and logging) malformed
    /// lines — the tail end of the file after a crash mid-write, most commonly.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<LocalJournalRecord>, JournalError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new())
        }

        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue
            }
            match serde_json::from_str::<LocalJournalRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => warn!(target: "txpool", line_no, %err, "skipping malformed local journal line")
            }
        }

        Ok(records)
    }

    /// Rewrites the journal to contain exactly `live`, dropping every transaction
    /// that has since been mined, replaced, or evicted. Writes to a temp file and
    /// atomically renames over the original.
    pub fn rotate(&mut self, live: &[LocalJournalRecord]) -> Result<(), JournalError> {
        let tmp_path = self.path.with_extension("journal.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for record in live {
                let line = serde_json::to_string(record).expect("LocalJournalRecord serialization cannot fail");
                writeln!(tmp, "{line}")?;
            }
            tmp.flush().map_err(JournalError::Rotation)?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(JournalError::Rotation)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }

    /// Flushes any buffered writes. Safe to call more than once.
    pub fn close(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seed: u8) -> LocalJournalRecord {
        LocalJournalRecord {
            tx_hash: TxHash::repeat_byte(seed),
            sender: Address::repeat_byte(seed),
            tx_bytes: Bytes::from(vec![seed; 10]),
            local: true
        }
    }

    #[test]
    fn load_reconstructs_inserted_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.jsonl");

        let mut journal = LocalJournal::open(&path).unwrap();
        journal.insert(&record(1)).unwrap();
        journal.insert(&record(2)).unwrap();

        let loaded = LocalJournal::load(&path).unwrap();
        assert_eq!(loaded, vec![record(1), record(2)]);
    }

    #[test]
    fn load_skips_malformed_line_and_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.jsonl");

        let mut journal = LocalJournal::open(&path).unwrap();
        journal.insert(&record(1)).unwrap();
        std::fs::OpenOptions::new().append(true).open(&path).unwrap().write_all(b"garbage\n").unwrap();
        journal.insert(&record(2)).unwrap();

        let loaded = LocalJournal::load(&path).unwrap();
        assert_eq!(loaded, vec![record(1), record(2)]);
    }

    #[test]
    fn rotate_drops_records_not_in_the_live_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.jsonl");

        let mut journal = LocalJournal::open(&path).unwrap();
        journal.insert_batch(&[record(1), record(2), record(3)]).unwrap();
        journal.rotate(&[record(2)]).unwrap();

        let loaded = LocalJournal::load(&path).unwrap();
        assert_eq!(loaded, vec![record(2)]);
    }
}
