//! The generic transaction abstraction the pool operates over.
//!
//! The pool makes no assumptions about encoding or signature recovery; it only
//! requires that a transaction can report the fields enumerated here. See
//! [`PoolTransaction`].

use std::sync::{Arc, OnceLock};

use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use serde::{Deserialize, Serialize};

/// The EIP-2718 transaction type, generalized over the families this pool distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    /// Legacy, pre-EIP-2718 transaction: flat `gas_price`.
    Legacy,
    /// EIP-2930 access-list transaction: flat `gas_price` plus an access list.
    AccessList,
    /// EIP-1559 dynamic-fee transaction: `max_fee_per_gas` / `max_priority_fee_per_gas`.
    DynamicFee,
    /// EIP-4844 blob-carrying transaction.
    Blob,
    /// EIP-7702 set-code transaction.
    SetCode
}

impl TxKind {
    /// Whether this transaction family prices gas with a single `gas_price` field rather
    /// than the EIP-1559 fee-cap/tip-cap pair.
    pub const fn is_legacy_priced(self) -> bool {
        matches!(self, Self::Legacy | Self::AccessList)
    }

    /// Whether this transaction carries blobs.
    pub const fn is_blob(self) -> bool {
        matches!(self, Self::Blob)
    }
}

/// A single entry of an EIP-2930 access list: an address plus the storage keys touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListEntry {
    /// The address granted warm access.
    pub address: Address,
    /// The storage slots granted warm access.
    pub storage_keys: Vec<B256>
}

/// Number of PeerDAS erasure-coded columns sampled per blob (see §4.5 of the spec).
pub const CELLS_PER_BLOB: usize = 128;

/// The out-of-band payload associated with a blob transaction.
///
/// Unlike the metadata kept under the main pool lock, the sidecar is large
/// (multiple KiB per blob) and is custody-filtered and journaled by the blob
/// pool rather than being paged through the hot admission path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlobSidecar {
    /// Raw blob bytes, one entry per blob.
    pub blob_data: Vec<Bytes>,
    /// KZG commitments, one per blob.
    pub commitments: Vec<Bytes>,
    /// KZG proofs, one per blob (or per cell, depending on custody granularity).
    pub proofs: Vec<Bytes>,
    /// Cell indices the `proofs`/`blob_data` entries correspond to, parallel to the
    /// above arrays when cell-level (PeerDAS) proofs are used.
    pub cell_indices: Vec<u64>
}

impl BlobSidecar {
    /// Total size in bytes of this sidecar's payload, used to account against the
    /// blob pool's datacap.
    pub fn byte_size(&self) -> usize {
        self.blob_data.iter().map(|b| b.len()).sum::<usize>()
            + self.commitments.iter().map(|b| b.len()).sum::<usize>()
            + self.proofs.iter().map(|b| b.len()).sum::<usize>()
    }

    /// Keeps only the cells whose column (`cell_index mod CELLS_PER_BLOB`) is in
    /// `custody_columns`, dropping the corresponding commitment/proof/blob entries.
    ///
    /// `blob_data`, `commitments`, `proofs` and `cell_indices` are assumed parallel;
    /// when a sidecar carries whole blobs rather than per-cell proofs (`cell_indices`
    /// empty), the filter is a no-op.
    pub fn filter_by_custody(&self, custody_columns: &std::collections::HashSet<u64>) -> Self {
        if self.cell_indices.is_empty() {
            return self.clone()
        }

        let mut blob_data = Vec::new();
        let mut commitments = Vec::new();
        let mut proofs = Vec::new();
        let mut cell_indices = Vec::new();

        for (i, &cell_index) in self.cell_indices.iter().enumerate() {
            let column = cell_index % CELLS_PER_BLOB as u64;
            if !custody_columns.contains(&column) {
                continue
            }
            if let Some(b) = self.blob_data.get(i) {
                blob_data.push(b.clone());
            }
            if let Some(c) = self.commitments.get(i) {
                commitments.push(c.clone());
            }
            if let Some(p) = self.proofs.get(i) {
                proofs.push(p.clone());
            }
            cell_indices.push(cell_index);
        }

        Self { blob_data, commitments, proofs, cell_indices }
    }
}

/// Abstraction the pool requires of its transaction type.
///
/// No assumptions are made about the concrete encoding; implementers are free to wrap
/// `alloy_consensus::TxEnvelope` or any other recovered-and-hashed representation, as
/// long as the sender has already been recovered (or is recoverable through
/// [`PoolTransaction::set_sender`]) before the transaction reaches the pool.
pub trait PoolTransaction: fmt::Debug + Send + Sync + 'static {
    /// The transaction hash.
    fn hash(&self) -> TxHash;

    /// The recovered sender, if known.
    fn sender(&self) -> Option<Address>;

    /// Memoizes a recovered sender. Implementations should make this idempotent.
    fn set_sender(&self, sender: Address);

    /// The transaction's nonce.
    fn nonce(&self) -> u64;

    /// The transaction family.
    fn kind(&self) -> TxKind;

    /// `gas_limit`.
    fn gas_limit(&self) -> u64;

    /// Transfer value.
    fn value(&self) -> U256;

    /// Calldata / init code.
    fn input(&self) -> &Bytes;

    /// The recipient; `None` for contract creation.
    fn to(&self) -> Option<Address>;

    /// The access list, if any (populated for `AccessList`, `DynamicFee`, `Blob`, `SetCode`).
    fn access_list(&self) -> &[AccessListEntry];

    /// `gas_price` for legacy/access-list transactions. Meaningless otherwise.
    fn gas_price(&self) -> u128;

    /// `max_fee_per_gas` for dynamic-fee-family transactions. For legacy/access-list
    /// transactions this returns [`Self::gas_price`] so callers can treat both
    /// uniformly.
    fn max_fee_per_gas(&self) -> u128;

    /// `max_priority_fee_per_gas` for dynamic-fee-family transactions; `0` for
    /// legacy/access-list.
    fn max_priority_fee_per_gas(&self) -> u128;

    /// Blob versioned hashes; empty for non-blob transactions.
    fn blob_versioned_hashes(&self) -> &[B256];

    /// Total blob gas consumed (`blobs * DATA_GAS_PER_BLOB`); `0` for non-blob
    /// transactions.
    fn blob_gas(&self) -> u64;

    /// `max_fee_per_blob_gas`; meaningless for non-blob transactions.
    fn max_fee_per_blob_gas(&self) -> u128;

    /// Byte length of the canonical encoding, used for pool size accounting.
    fn encoded_length(&self) -> usize;

    /// The transaction's canonical encoded bytes, used only for journal persistence
    /// (§6) — the pool never decodes or otherwise interprets them. Defaults to empty
    /// for implementers that don't need journal-replay support; a wrapper around a
    /// real codec should override this with its actual encoding.
    fn encoded_bytes(&self) -> Bytes {
        Bytes::new()
    }
}

/// The pool's internal record of an admitted transaction.
///
/// Wraps the caller's [`PoolTransaction`] plus bookkeeping the pool itself needs:
/// the order it was submitted in (tie-breaking) and whether it came from a trusted
/// local source (affects propagation and journaling policy, out of core scope but
/// threaded through so callers can make that decision).
#[derive(Debug)]
pub struct ValidPoolTransaction<T: PoolTransaction> {
    /// The wrapped transaction.
    pub transaction: T,
    /// Monotonically increasing submission counter, used to break ties in ordering.
    pub submission_id: u64,
    /// Whether this transaction was submitted locally (vs. received from a peer).
    pub is_local: bool
}

impl<T: PoolTransaction> ValidPoolTransaction<T> {
    /// Effective price for block-building ordering; see [`crate::fees::effective_price`].
    pub fn effective_price(&self, base_fee: Option<u128>) -> u128 {
        crate::fees::effective_price(&self.transaction, base_fee)
    }

    /// Effective tip for eviction ordering; see [`crate::fees::effective_tip`].
    pub fn effective_tip(&self, base_fee: Option<u128>) -> u128 {
        crate::fees::effective_tip(&self.transaction, base_fee)
    }
}

use std::fmt;

/// Lazily-recovered sender cache, for transaction implementations that defer signature
/// recovery until it's actually needed (`PoolTransaction::sender`/`set_sender`).
#[derive(Debug, Default)]
pub struct SenderCache(OnceLock<Address>);

impl SenderCache {
    /// Creates an empty cache.
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Returns the cached sender, if recovery has already happened.
    pub fn get(&self) -> Option<Address> {
        self.0.get().copied()
    }

    /// Memoizes the sender. Subsequent calls are no-ops once set.
    pub fn set(&self, sender: Address) {
        let _ = self.0.set(sender);
    }
}

/// A concrete, self-contained [`PoolTransaction`] suitable for tests and for callers
/// that don't need a custom wrapper around their own transaction type.
#[derive(Debug)]
pub struct EthPooledTransaction {
    pub hash: TxHash,
    pub sender_cache: SenderCache,
    pub nonce: u64,
    pub kind: TxKind,
    pub gas_limit: u64,
    pub value: U256,
    pub input: Bytes,
    pub to: Option<Address>,
    pub access_list: Vec<AccessListEntry>,
    pub gas_price: u128,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub blob_versioned_hashes: Vec<B256>,
    pub blob_gas: u64,
    pub max_fee_per_blob_gas: u128,
    pub encoded_length: usize
}

impl PoolTransaction for EthPooledTransaction {
    fn hash(&self) -> TxHash {
        self.hash
    }

    fn sender(&self) -> Option<Address> {
        self.sender_cache.get()
    }

    fn set_sender(&self, sender: Address) {
        self.sender_cache.set(sender);
    }

    fn nonce(&self) -> u64 {
        self.nonce
    }

    fn kind(&self) -> TxKind {
        self.kind
    }

    fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    fn value(&self) -> U256 {
        self.value
    }

    fn input(&self) -> &Bytes {
        &self.input
    }

    fn to(&self) -> Option<Address> {
        self.to
    }

    fn access_list(&self) -> &[AccessListEntry] {
        &self.access_list
    }

    fn gas_price(&self) -> u128 {
        self.gas_price
    }

    fn max_fee_per_gas(&self) -> u128 {
        if self.kind.is_legacy_priced() {
            self.gas_price
        } else {
            self.max_fee_per_gas
        }
    }

    fn max_priority_fee_per_gas(&self) -> u128 {
        if self.kind.is_legacy_priced() {
            0
        } else {
            self.max_priority_fee_per_gas
        }
    }

    fn blob_versioned_hashes(&self) -> &[B256] {
        &self.blob_versioned_hashes
    }

    fn blob_gas(&self) -> u64 {
        self.blob_gas
    }

    fn max_fee_per_blob_gas(&self) -> u128 {
        self.max_fee_per_blob_gas
    }

    fn encoded_length(&self) -> usize {
        self.encoded_length
    }
}

/// Wraps any [`PoolTransaction`] in a reference-counted handle, the representation
/// used throughout the pool's indices (lookup table, heaps, per-account lists) so
/// that a single admitted transaction is never copied.
pub type TxHandle<T> = Arc<ValidPoolTransaction<T>>;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn sidecar_with_cells(cell_indices: &[u64]) -> BlobSidecar {
        let n = cell_indices.len();
        BlobSidecar {
            blob_data: (0..n).map(|i| Bytes::from(vec![i as u8])).collect(),
            commitments: (0..n).map(|i| Bytes::from(vec![i as u8])).collect(),
            proofs: (0..n).map(|i| Bytes::from(vec![i as u8])).collect(),
            cell_indices: cell_indices.to_vec()
        }
    }

    #[test]
    fn custody_filter_keeps_only_custodied_columns() {
        let sidecar = sidecar_with_cells(&[0, 1, 128, 129]);

        let custody = HashSet::from([0, 1]);
        let filtered = sidecar.filter_by_custody(&custody);
        assert_eq!(filtered.cell_indices, vec![0, 1, 128, 129]);

        let custody = HashSet::from([0]);
        let filtered = sidecar.filter_by_custody(&custody);
        assert_eq!(filtered.cell_indices, vec![0, 128]);
        assert_eq!(filtered.blob_data.len(), 2);
        assert_eq!(filtered.commitments.len(), 2);
        assert_eq!(filtered.proofs.len(), 2);
    }

    #[test]
    fn custody_filter_drops_every_cell_for_empty_custody_set() {
        let sidecar = sidecar_with_cells(&[0, 1, 128, 129]);
        let filtered = sidecar.filter_by_custody(&HashSet::new());
        assert!(filtered.cell_indices.is_empty());
        assert_eq!(filtered.byte_size(), 0);
    }

    #[test]
    fn custody_filter_is_noop_when_sidecar_has_no_cell_indices() {
        let sidecar = BlobSidecar {
            blob_data: vec![Bytes::from(vec![1u8; 4])],
            commitments: vec![Bytes::from(vec![2u8; 4])],
            proofs: vec![Bytes::from(vec![3u8; 4])],
            cell_indices: vec![]
        };
        let filtered = sidecar.filter_by_custody(&HashSet::from([0]));
        assert_eq!(filtered.blob_data, sidecar.blob_data);
    }
}
