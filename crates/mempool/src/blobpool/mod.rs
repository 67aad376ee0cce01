//! The blob pool (C5): blob-carrying transactions (EIP-4844), kept separate from the
//! main pool because their sidecars are large (up to a few hundred KiB each) and
//! because replacing one means discarding an already-gossiped sidecar, which the
//! network charges for much more steeply than a plain fee bump.
//!
//! Grounded on reth's `pool/blob.rs`: transaction metadata (hash, sender, nonce,
//! cached ordering fields) is split from the sidecar payload, and only the metadata
//! participates in the price-ordered index. A transaction's sidecar can be evicted
//! under datacap pressure while the transaction itself stays admitted — it just can't
//! be included in a block until the sidecar is available again, tracked by
//! [`SidecarState`].

pub mod config;
pub mod journal;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use alloy_primitives::{Address, TxHash};
use tracing::{instrument, trace, warn};

use crate::account::AccountList;
use crate::error::{JournalError, PoolError, PoolErrorKind, PoolResult};
use crate::fees::{blob_effective_price, blob_effective_tip, has_sufficient_bump, intrinsic_gas_of, tx_cost};
use crate::state::StateReader;
use crate::transaction::{BlobSidecar, PoolTransaction, TxHandle, ValidPoolTransaction};

pub use config::BlobPoolConfig;
pub use journal::{BlobJournal, BlobMetadataRecord, JournalRecord};

/// Lifecycle of a blob transaction's sidecar, independent of the transaction's own
/// admission: `Accepted` while the full sidecar is held, `SidecarEvicted` once
/// datacap pressure dropped the payload but the transaction metadata is kept (it
/// can be re-admitted the sidecar without re-validating the transaction), and
/// conceptually `Removed` once [`BlobPool::remove_transaction`] drops it entirely
/// (not represented as a variant — the entry is simply gone).
#[derive(Debug, Clone)]
pub enum SidecarState {
    /// The sidecar payload is held and counted against the datacap.
    Accepted(BlobSidecar),
    /// The transaction is still pooled but its sidecar was pruned under datacap
    /// pressure; it cannot be included in a block until re-supplied.
    SidecarEvicted
}

impl SidecarState {
    /// The sidecar, if currently held.
    pub fn sidecar(&self) -> Option<&BlobSidecar> {
        match self {
            Self::Accepted(s) => Some(s),
            Self::SidecarEvicted => None
        }
    }
}

struct BlobEntry<T: PoolTransaction> {
    handle: TxHandle<T>,
    sidecar: SidecarState,
    tip: u128,
    price: u128
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TipKey {
    tip: u128,
    hash: TxHash
}

impl Ord for TipKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.tip.cmp(&other.tip).then_with(|| self.hash.cmp(&other.hash))
    }
}
impl PartialOrd for TipKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders blob transactions by effective price rather than tip — used only for
/// admission-time capacity eviction, distinct from [`TipKey`]'s datacap-pruning
/// order (§9's two retained blob-pool eviction criteria).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PriceKey {
    price: u128,
    hash: TxHash
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.price.cmp(&other.price).then_with(|| self.hash.cmp(&other.hash))
    }
}
impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Snapshots the parts of a pooled transaction needed to reconstruct a
/// [`BlobMetadataRecord`] for journaling, independent of the caller's concrete `T`.
fn metadata_record_of<T: PoolTransaction>(handle: &TxHandle<T>) -> BlobMetadataRecord {
    let tx = &handle.transaction;
    BlobMetadataRecord {
        sender: tx.sender().expect("pooled transaction has a recovered sender"),
        nonce: tx.nonce(),
        max_fee_per_gas: tx.max_fee_per_gas(),
        max_priority_fee_per_gas: tx.max_priority_fee_per_gas(),
        max_fee_per_blob_gas: tx.max_fee_per_blob_gas(),
        blob_versioned_hashes: tx.blob_versioned_hashes().to_vec(),
        blob_gas: tx.blob_gas(),
        encoded_length: tx.encoded_length(),
        tx_bytes: tx.encoded_bytes(),
        is_local: handle.is_local
    }
}

/// The pool for EIP-4844 blob-carrying transactions.
pub struct BlobPool<T: PoolTransaction, S: StateReader> {
    config: BlobPoolConfig,
    state: S,
    base_fee: Option<u128>,
    blob_base_fee: Option<u128>,
    entries: HashMap<TxHash, BlobEntry<T>>,
    by_sender: HashMap<Address, AccountList<T>>,
    by_tip: BTreeSet<TipKey>,
    by_price: BTreeSet<PriceKey>,
    sidecar_bytes: usize,
    next_submission_id: u64,
    journal: Option<BlobJournal>
}

impl<T: PoolTransaction, S: StateReader> BlobPool<T, S> {
    /// Builds an empty blob pool with no durable journal.
    pub fn new(config: BlobPoolConfig, state: S) -> Self {
        Self {
            config,
            state,
            base_fee: None,
            blob_base_fee: None,
            entries: HashMap::new(),
            by_sender: HashMap::new(),
            by_tip: BTreeSet::new(),
            by_price: BTreeSet::new(),
            sidecar_bytes: 0,
            next_submission_id: 0,
            journal: None
        }
    }

    /// Opens (creating if absent) a write-ahead journal at `path`, returning an empty
    /// pool plus every well-formed record the journal already held. The pool starts
    /// empty by design: the caller replays `records` in order — `Insert` via
    /// [`Self::add_transaction`] (after decoding [`BlobMetadataRecord::tx_bytes`] back
    /// into a live `T`), `Remove` via [`Self::remove_transaction`] — and then calls
    /// [`Self::compact_journal`] once to collapse the replay's churn back down to one
    /// `Insert` per surviving transaction, matching the spec's "journal is truncated
    /// after successful replay" (§4.5).
    pub fn open(config: BlobPoolConfig, state: S, path: impl AsRef<Path>) -> Result<(Self, Vec<JournalRecord>), JournalError> {
        let records = BlobJournal::replay(&path)?;
        let journal = BlobJournal::open(&path)?;
        let mut pool = Self::new(config, state);
        pool.journal = Some(journal);
        Ok((pool, records))
    }

    /// Rewrites the journal to contain exactly one `Insert` per transaction this pool
    /// currently holds a live sidecar for. Entries whose sidecar was already pruned
    /// under datacap pressure are dropped from the journal along with them — without
    /// the sidecar there is nothing to restore on replay anyway.
    pub fn compact_journal(&mut self) -> Result<(), JournalError> {
        let Some(journal) = self.journal.as_mut() else { return Ok(()) };
        let live: Vec<(TxHash, BlobMetadataRecord, BlobSidecar)> = self
            .entries
            .iter()
            .filter_map(|(hash, entry)| entry.sidecar.sidecar().map(|sc| (*hash, metadata_record_of(&entry.handle), sc.clone())))
            .collect();
        journal.rotate(&live)
    }

    /// Number of blob transactions pooled, regardless of sidecar state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no blob transactions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total sidecar bytes currently counted against the datacap.
    pub fn datacap_used(&self) -> usize {
        self.sidecar_bytes
    }

    /// Updates the execution and blob base fees used for ordering and admission, then
    /// evicts every blob transaction whose `max_fee_per_blob_gas` has fallen below the
    /// new `blob_base_fee` (§4.5's "base-fee update" rule). Unlike the main pool's
    /// demotion, there's no queued tier to fall back to here: a blob transaction that
    /// can no longer afford its own blob gas is simply dropped, sidecar and all.
    #[instrument(skip(self), target = "txpool", fields(blob_base_fee = ?blob_base_fee))]
    pub fn set_base_fees(&mut self, base_fee: Option<u128>, blob_base_fee: Option<u128>) {
        self.base_fee = base_fee;
        self.blob_base_fee = blob_base_fee;

        if let Some(blob_base_fee) = blob_base_fee {
            let stale: Vec<TxHash> = self
                .entries
                .iter()
                .filter(|(_, entry)| entry.handle.transaction.max_fee_per_blob_gas() < blob_base_fee)
                .map(|(hash, _)| *hash)
                .collect();
            for hash in stale {
                trace!(target: "txpool", %hash, "evicted blob transaction below new blob base fee");
                self.remove_transaction(hash);
            }
        }

        let hashes: Vec<TxHash> = self.entries.keys().copied().collect();
        self.by_tip.clear();
        self.by_price.clear();
        for hash in hashes {
            let entry = self.entries.get_mut(&hash).expect("hash collected from entries keys");
            entry.tip = blob_effective_tip(&entry.handle.transaction, base_fee, blob_base_fee);
            entry.price = blob_effective_price(&entry.handle.transaction, base_fee, blob_base_fee);
            self.by_tip.insert(TipKey { tip: entry.tip, hash });
            self.by_price.insert(PriceKey { price: entry.price, hash });
        }
    }

    /// The globally lowest-effective-price live entry, used as the admission-time
    /// eviction victim when the pool is at `max_blob_txs` capacity. Distinct from the
    /// datacap pruning path, which orders by tip instead (§9).
    fn try_make_room(&mut self, newcomer_price: u128) -> bool {
        let Some(&PriceKey { price: victim_price, hash: victim }) = self.by_price.iter().next() else { return false };
        if newcomer_price <= victim_price {
            return false
        }
        trace!(target: "txpool", hash = %victim, "evicted blob transaction under capacity pressure");
        self.remove_transaction(victim);
        true
    }

    fn validate(&self, tx: &T, sender: Address) -> PoolResult<()> {
        let hash = tx.hash();
        let err = |kind| Err(PoolError::new(hash, kind));

        if !tx.kind().is_blob() {
            return err(PoolErrorKind::NotBlobTransaction)
        }
        if tx.blob_versioned_hashes().is_empty() {
            return err(PoolErrorKind::BlobMissingHashes)
        }
        if self.entries.contains_key(&hash) {
            return err(PoolErrorKind::AlreadyKnown)
        }

        let account_nonce = self.state.nonce(sender);
        if tx.nonce() < account_nonce {
            return err(PoolErrorKind::NonceTooLow)
        }

        if tx.gas_limit() < intrinsic_gas_of(tx) {
            return err(PoolErrorKind::IntrinsicGas)
        }

        if let Some(base_fee) = self.base_fee {
            if tx.max_fee_per_gas() < base_fee {
                return err(PoolErrorKind::FeeCapBelowBaseFee)
            }
        }
        if let Some(blob_base_fee) = self.blob_base_fee {
            if tx.max_fee_per_blob_gas() < blob_base_fee {
                return err(PoolErrorKind::BlobFeeCapBelowBaseFee)
            }
        }

        if self.state.balance(sender) < tx_cost(tx) {
            return err(PoolErrorKind::InsufficientFunds)
        }

        let existing = self.by_sender.get(&sender).and_then(|l| l.get(tx.nonce()));
        let sender_count = self.by_sender.get(&sender).map(AccountList::len).unwrap_or(0);
        if existing.is_none() && sender_count >= self.config.max_per_account {
            return err(PoolErrorKind::SenderLimitExceeded)
        }

        Ok(())
    }

    /// Validates and admits a blob transaction together with its sidecar, filtering
    /// the sidecar down to the node's custody columns before storing it. Datacap
    /// pressure is resolved by pruning the lowest-tip *sidecars* (not transactions)
    /// first; only if the newcomer's own sidecar alone exceeds the datacap is it
    /// rejected outright.
    #[instrument(skip(self, tx, sidecar, custody_columns), target = "txpool", fields(hash = %tx.hash()))]
    pub fn add_transaction(
        &mut self,
        tx: T,
        sidecar: BlobSidecar,
        is_local: bool,
        custody_columns: &HashSet<u64>
    ) -> PoolResult<TxHandle<T>> {
        let sender = tx.sender().ok_or_else(|| PoolError::new(tx.hash(), PoolErrorKind::NonceTooLow))?;
        self.validate(&tx, sender)?;

        let hash = tx.hash();
        let nonce = tx.nonce();

        let existing = self.by_sender.get(&sender).and_then(|l| l.get(nonce)).cloned();
        if let Some(old) = &existing {
            if !has_sufficient_bump(&old.transaction, &tx, self.base_fee, self.config.price_bump_percent) {
                return Err(PoolError::new(hash, PoolErrorKind::ReplacementUnderpriced))
            }
        }

        if existing.is_none() && self.entries.len() >= self.config.max_blob_txs {
            let newcomer_price = blob_effective_price(&tx, self.base_fee, self.blob_base_fee);
            if !self.try_make_room(newcomer_price) {
                return Err(PoolError::new(hash, PoolErrorKind::PoolFull))
            }
        }

        let filtered = sidecar.filter_by_custody(custody_columns);
        let size = filtered.byte_size();
        if size > self.config.max_sidecar_bytes {
            return Err(PoolError::new(hash, PoolErrorKind::OversizedData))
        }

        if let Some(old) = existing {
            self.remove_transaction(old.transaction.hash());
        }

        while self.sidecar_bytes + size > self.config.datacap_bytes {
            if !self.prune_one_sidecar() {
                break
            }
        }

        let submission_id = self.next_submission_id;
        self.next_submission_id += 1;
        let tip = blob_effective_tip(&tx, self.base_fee, self.blob_base_fee);
        let price = blob_effective_price(&tx, self.base_fee, self.blob_base_fee);
        let handle: TxHandle<T> = std::sync::Arc::new(ValidPoolTransaction { transaction: tx, submission_id, is_local });

        self.by_sender.entry(sender).or_default().add(handle.clone());
        self.by_tip.insert(TipKey { tip, hash });
        self.by_price.insert(PriceKey { price, hash });
        self.sidecar_bytes += size;

        if let Some(journal) = self.journal.as_mut() {
            if let Err(err) = journal.append_insert(hash, metadata_record_of(&handle), filtered.clone()) {
                warn!(target: "txpool", %hash, %err, "failed to journal blob admission");
            }
        }

        self.entries.insert(hash, BlobEntry { handle: handle.clone(), sidecar: SidecarState::Accepted(filtered), tip, price });

        trace!(target: "txpool", %hash, %sender, nonce, size, "admitted blob transaction");
        Ok(handle)
    }

    /// Drops the lowest-tip sidecar still `Accepted`, transitioning it to
    /// `SidecarEvicted`. Returns `false` if every remaining sidecar is already
    /// evicted (nothing left to prune).
    fn prune_one_sidecar(&mut self) -> bool {
        for key in self.by_tip.iter().copied().collect::<Vec<_>>() {
            if let Some(entry) = self.entries.get_mut(&key.hash) {
                if let SidecarState::Accepted(sidecar) = &entry.sidecar {
                    let freed = sidecar.byte_size();
                    entry.sidecar = SidecarState::SidecarEvicted;
                    self.sidecar_bytes = self.sidecar_bytes.saturating_sub(freed);
                    trace!(target: "txpool", hash = %key.hash, freed, "pruned blob sidecar under datacap pressure");
                    return true
                }
            }
        }
        false
    }

    /// Returns the sidecar for `hash`, if the pool holds the transaction and its
    /// sidecar hasn't been pruned.
    pub fn get_sidecar(&self, hash: TxHash) -> PoolResult<&BlobSidecar> {
        let entry = self.entries.get(&hash).ok_or_else(|| PoolError::new(hash, PoolErrorKind::SidecarNotFound))?;
        entry.sidecar.sidecar().ok_or_else(|| PoolError::new(hash, PoolErrorKind::SidecarNotFound))
    }

    /// Looks up a pooled blob transaction by hash.
    pub fn get(&self, hash: TxHash) -> Option<TxHandle<T>> {
        self.entries.get(&hash).map(|e| e.handle.clone())
    }

    /// Removes a blob transaction and its sidecar entirely.
    pub fn remove_transaction(&mut self, hash: TxHash) -> Option<TxHandle<T>> {
        let entry = self.entries.remove(&hash)?;
        let sender = entry.handle.transaction.sender().expect("pooled transaction has a recovered sender");
        let nonce = entry.handle.transaction.nonce();

        if let Some(list) = self.by_sender.get_mut(&sender) {
            list.remove(nonce);
            if list.is_empty() {
                self.by_sender.remove(&sender);
            }
        }
        self.by_tip.remove(&TipKey { tip: entry.tip, hash });
        self.by_price.remove(&PriceKey { price: entry.price, hash });
        if let Some(sidecar) = entry.sidecar.sidecar() {
            self.sidecar_bytes = self.sidecar_bytes.saturating_sub(sidecar.byte_size());
        }

        if let Some(journal) = self.journal.as_mut() {
            if let Err(err) = journal.append_remove(hash) {
                warn!(target: "txpool", %hash, %err, "failed to journal blob removal");
            }
        }

        Some(entry.handle)
    }

    /// Drops every mined transaction (nonce below the account's current nonce) for
    /// every sender currently pooled.
    pub fn reset(&mut self, base_fee: Option<u128>, blob_base_fee: Option<u128>) {
        let senders: Vec<Address> = self.by_sender.keys().copied().collect();
        for sender in senders {
            let account_nonce = self.state.nonce(sender);
            let mined: Vec<TxHash> = self
                .by_sender
                .get(&sender)
                .map(|l| l.iter().filter(|t| t.transaction.nonce() < account_nonce).map(|t| t.transaction.hash()).collect())
                .unwrap_or_default();
            for hash in mined {
                self.remove_transaction(hash);
            }
        }
        self.set_base_fees(base_fee, blob_base_fee);
    }
}
