//! Write-ahead journal for the blob pool: every admission and removal is appended as
//! one JSON line before it's considered durable, so a crash-and-restart can replay
//! the log and reconstruct the pool without waiting on the network to re-gossip every
//! sidecar. Malformed trailing lines (a crash mid-`write`) are skipped on replay
//! rather than failing the whole load — the worst case is losing the last unflushed
//! record, not the journal.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use alloy_primitives::{Address, Bytes, TxHash, B256};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::JournalError;
use crate::transaction::BlobSidecar;

/// A durable snapshot of a blob transaction's metadata, independent of the
/// implementer's own `PoolTransaction` type so it can be serialized directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMetadataRecord {
    pub sender: Address,
    pub nonce: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_blob_gas: u128,
    pub blob_versioned_hashes: Vec<B256>,
    pub blob_gas: u64,
    pub encoded_length: usize,
    /// Canonical encoded bytes ([`crate::transaction::PoolTransaction::encoded_bytes`]),
    /// opaque to this crate; callers decode this with their own codec to reconstruct
    /// a live transaction during journal replay, the same way the local journal's
    /// `tx_bytes` is used (§6).
    pub tx_bytes: Bytes,
    pub is_local: bool
}

/// One journaled operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalRecord {
    /// A blob transaction was admitted.
    Insert { tx_hash: TxHash, metadata: BlobMetadataRecord, sidecar: BlobSidecar },
    /// A blob transaction was removed (mined, evicted, or replaced).
    Remove { tx_hash: TxHash }
}

/// An append-only, replayable log of blob-pool admissions and removals.
pub struct BlobJournal {
    file: File,
    path: PathBuf
}

impl BlobJournal {
    /// Opens (creating if absent) the journal at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, path })
    }

    /// Appends an insert record and flushes immediately — a record is not
    /// considered durable until this returns.
    pub fn append_insert(
        &mut self,
        tx_hash: TxHash,
        metadata: BlobMetadataRecord,
        sidecar: BlobSidecar
    ) -> Result<(), JournalError> {
        self.append(&JournalRecord::Insert { tx_hash, metadata, sidecar })
    }

    /// Appends a remove record and flushes immediately.
    pub fn append_remove(&mut self, tx_hash: TxHash) -> Result<(), JournalError> {
        self.append(&JournalRecord::Remove { tx_hash })
    }

    fn append(&mut self, record: &JournalRecord) -> Result<(), JournalError> {
        let line = serde_json::to_string(record).expect("JournalRecord serialization cannot fail");
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }

    /// Reads every well-formed record from `path` in order, skipping (and logging) any
    /// line that fails to parse as JSON.
    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<JournalRecord>, JournalError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new())
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue
            }
            match serde_json::from_str::<JournalRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => warn!(target: "txpool", line_no, %err, "skipping malformed blob journal line")
            }
        }

        Ok(records)
    }

    /// Rewrites the journal to contain exactly one `Insert` per currently-live entry,
    /// dropping every already-applied `Remove` and every superseded `Insert`. Writes
    /// to a temp file in the same directory, flushes, then atomically renames over
    /// the original so a crash mid-rotation never leaves a half-written journal.
    pub fn rotate(&mut self, live: &[(TxHash, BlobMetadataRecord, BlobSidecar)]) -> Result<(), JournalError> {
        let tmp_path = self.path.with_extension("journal.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for (tx_hash, metadata, sidecar) in live {
                let record = JournalRecord::Insert { tx_hash: *tx_hash, metadata: metadata.clone(), sidecar: sidecar.clone() };
                let line = serde_json::to_string(&record).expect("JournalRecord serialization cannot fail");
                writeln!(tmp, "{line}")?;
            }
            tmp.flush().map_err(JournalError::Rotation)?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(JournalError::Rotation)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }

    /// Flushes any buffered writes. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> BlobMetadataRecord {
        BlobMetadataRecord {
            sender: Address::repeat_byte(1),
            nonce: 0,
            max_fee_per_gas: 100,
            max_priority_fee_per_gas: 10,
            max_fee_per_blob_gas: 5,
            blob_versioned_hashes: vec![B256::repeat_byte(9)],
            blob_gas: 131_072,
            encoded_length: 200,
            tx_bytes: Bytes::new(),
            is_local: false
        }
    }

    #[test]
    fn replay_reconstructs_appended_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.jsonl");

        let mut journal = BlobJournal::open(&path).unwrap();
        let hash = TxHash::repeat_byte(7);
        journal.append_insert(hash, metadata(), BlobSidecar::default()).unwrap();
        journal.append_remove(hash).unwrap();

        let records = BlobJournal::replay(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], JournalRecord::Insert { tx_hash, .. } if tx_hash == hash));
        assert!(matches!(records[1], JournalRecord::Remove { tx_hash } if tx_hash == hash));
    }

    #[test]
    fn replay_skips_malformed_trailing_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.jsonl");

        let mut journal = BlobJournal::open(&path).unwrap();
        journal.append_insert(TxHash::repeat_byte(1), metadata(), BlobSidecar::default()).unwrap();
        std::fs::OpenOptions::new().append(true).open(&path).unwrap().write_all(b"{not json\n").unwrap();

        let records = BlobJournal::replay(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn rotate_compacts_to_only_live_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.jsonl");

        let mut journal = BlobJournal::open(&path).unwrap();
        let a = TxHash::repeat_byte(1);
        let b = TxHash::repeat_byte(2);
        journal.append_insert(a, metadata(), BlobSidecar::default()).unwrap();
        journal.append_insert(b, metadata(), BlobSidecar::default()).unwrap();
        journal.append_remove(a).unwrap();

        journal.rotate(&[(b, metadata(), BlobSidecar::default())]).unwrap();

        let records = BlobJournal::replay(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], JournalRecord::Insert { tx_hash, .. } if tx_hash == b));
    }
}
