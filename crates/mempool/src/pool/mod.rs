//! The main pool (C4): admission, the pending/queued split, replace-by-fee,
//! base-fee-driven promotion, and price-based eviction under capacity pressure.
//!
//! Every pooled transaction lives in exactly one of two places: `pending`, whose
//! account lists start exactly at the account's current on-chain nonce with no gaps,
//! or `queued`, everything else. [`TxPool::promote`] is the only thing that moves a
//! transaction from `queued` to `pending`; it runs after every admission and after
//! every [`TxPool::reset`].

pub mod best;
pub mod config;

use std::collections::HashMap;

use alloy_primitives::{Address, TxHash};
use tracing::{instrument, trace};

use crate::account::AccountList;
use crate::error::{PoolError, PoolErrorKind, PoolResult};
use crate::fees::{has_sufficient_bump, intrinsic_gas_of, tx_cost};
use crate::heap::PriceHeaps;
use crate::state::StateReader;
use crate::transaction::{PoolTransaction, TxHandle, ValidPoolTransaction};

pub use best::BestTransactions;
pub use config::PoolConfig;

/// The chain tip the pool is currently validating against.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockInfo {
    /// Height of the block this pool considers "latest".
    pub block_number: u64,
    /// That block's base fee, if the chain has activated EIP-1559.
    pub base_fee: Option<u128>
}

/// A point-in-time snapshot of the pool's occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSize {
    /// Transactions in the pending sub-pool (nonce-contiguous from the account's
    /// current nonce).
    pub pending: usize,
    /// Transactions in the queued sub-pool (waiting on an earlier nonce, or parked
    /// for some other reason promotion hasn't cleared yet).
    pub queued: usize,
    /// Sum of `encoded_length()` across every pooled transaction.
    pub total_bytes: usize
}

impl PoolSize {
    /// Total transaction count, pending plus queued.
    pub fn total(&self) -> usize {
        self.pending + self.queued
    }
}

/// The in-memory transaction pool for one shard (or the whole node, if unsharded).
pub struct TxPool<T: PoolTransaction, S: StateReader> {
    config: PoolConfig,
    state: S,
    block_info: BlockInfo,
    lookup: HashMap<TxHash, TxHandle<T>>,
    pending: HashMap<Address, AccountList<T>>,
    queued: HashMap<Address, AccountList<T>>,
    heaps: PriceHeaps,
    next_submission_id: u64,
    total_bytes: usize
}

impl<T: PoolTransaction, S: StateReader> TxPool<T, S> {
    /// Builds an empty pool against `state`, starting at `block_info`.
    pub fn new(config: PoolConfig, state: S, block_info: BlockInfo) -> Self {
        Self {
            heaps: PriceHeaps::new(block_info.base_fee),
            config,
            state,
            block_info,
            lookup: HashMap::new(),
            pending: HashMap::new(),
            queued: HashMap::new(),
            next_submission_id: 0,
            total_bytes: 0
        }
    }

    /// The pool's current view of the chain tip.
    pub fn block_info(&self) -> BlockInfo {
        self.block_info
    }

    /// A copy of this pool's configuration, used by [`crate::shard::ShardedPool`] to
    /// rebuild shards with identical settings on rebalance.
    pub fn config_snapshot(&self) -> PoolConfig {
        self.config.clone()
    }

    /// A copy of this pool's state reader, used by [`crate::shard::ShardedPool`] on
    /// rebalance.
    pub fn state_snapshot(&self) -> S
    where
        S: Clone
    {
        self.state.clone()
    }

    /// Current occupancy.
    pub fn size(&self) -> PoolSize {
        PoolSize {
            pending: self.pending.values().map(AccountList::len).sum(),
            queued: self.queued.values().map(AccountList::len).sum(),
            total_bytes: self.total_bytes
        }
    }

    /// Looks up a pooled transaction by hash.
    pub fn get(&self, hash: TxHash) -> Option<TxHandle<T>> {
        self.lookup.get(&hash).cloned()
    }

    /// Every sender with at least one pooled transaction.
    pub fn unique_senders(&self) -> impl Iterator<Item = Address> + '_ {
        self.pending.keys().chain(self.queued.keys()).copied().collect::<std::collections::HashSet<_>>().into_iter()
    }

    /// All of a sender's pooled transactions, pending and queued, nonce-ascending.
    pub fn get_transactions_by_sender(&self, sender: Address) -> Vec<TxHandle<T>> {
        let mut out = Vec::new();
        if let Some(list) = self.pending.get(&sender) {
            out.extend(list.iter().cloned());
        }
        if let Some(list) = self.queued.get(&sender) {
            out.extend(list.iter().cloned());
        }
        out
    }

    /// Every pooled transaction, in no particular order.
    pub fn all_transactions(&self) -> impl Iterator<Item = TxHandle<T>> + '_ {
        self.lookup.values().cloned()
    }

    /// A block-building iterator over the pending set, highest effective price first.
    pub fn best_transactions(&self) -> BestTransactions<T> {
        let mut pending = HashMap::with_capacity(self.pending.len());
        for (sender, list) in &self.pending {
            pending.insert(*sender, list.iter().cloned().collect());
        }
        BestTransactions::new(pending, self.block_info.base_fee)
    }

    /// The admission validation pipeline, matching the spec's step order: duplicate
    /// check, then structural validation (size, fee-cap/tip consistency, blob hashes,
    /// gas bounds, fee bounds against the current base fee, balance), then the nonce
    /// window, then the per-sender limit. Fails fast on the first violated rule; does
    /// not mutate pool state.
    fn validate(&self, tx: &T, sender: Address) -> PoolResult<()> {
        let hash = tx.hash();
        let err = |kind| Err(PoolError::new(hash, kind));

        // 1. Duplicate.
        if self.lookup.contains_key(&hash) {
            return err(PoolErrorKind::AlreadyKnown)
        }

        // 2. Structural validation.
        if tx.encoded_length() > self.config.max_tx_bytes {
            return err(PoolErrorKind::OversizedData)
        }
        if tx.max_fee_per_gas() < tx.max_priority_fee_per_gas() {
            return err(PoolErrorKind::FeeCapBelowTip)
        }
        if tx.kind().is_blob() && tx.blob_versioned_hashes().is_empty() {
            return err(PoolErrorKind::BlobMissingHashes)
        }
        if tx.gas_limit() > self.config.block_gas_limit {
            return err(PoolErrorKind::GasLimit)
        }
        if tx.gas_limit() < intrinsic_gas_of(tx) {
            return err(PoolErrorKind::IntrinsicGas)
        }
        if let Some(base_fee) = self.block_info.base_fee {
            if tx.max_fee_per_gas() < base_fee {
                return err(PoolErrorKind::FeeCapBelowBaseFee)
            }
        }
        let price = crate::fees::effective_price(tx, self.block_info.base_fee);
        if price < self.config.min_gas_price {
            return err(PoolErrorKind::Underpriced)
        }
        if self.state.balance(sender) < tx_cost(tx) {
            return err(PoolErrorKind::InsufficientFunds)
        }

        // 3. Nonce window.
        let account_nonce = self.state.nonce(sender);
        if tx.nonce() < account_nonce {
            return err(PoolErrorKind::NonceTooLow)
        }
        if tx.nonce() > account_nonce + self.config.max_nonce_gap {
            return err(PoolErrorKind::NonceTooHigh)
        }

        // 4. Per-sender limit (replacement price bump checked separately in
        // `add_transaction`, since it needs the existing transaction at the same
        // nonce, not just counts).
        let sender_count =
            self.pending.get(&sender).map(AccountList::len).unwrap_or(0)
                + self.queued.get(&sender).map(AccountList::len).unwrap_or(0);
        let replacing_existing = self
            .pending
            .get(&sender)
            .and_then(|l| l.get(tx.nonce()))
            .or_else(|| self.queued.get(&sender).and_then(|l| l.get(tx.nonce())))
            .is_some();
        if !replacing_existing && sender_count >= self.config.max_per_sender {
            return err(PoolErrorKind::SenderLimitExceeded)
        }

        Ok(())
    }

    /// Validates and admits `tx`. On success, returns the pooled handle; the caller
    /// still needs to inspect [`TxPool::size`] afterwards since admission may have
    /// triggered an eviction of some other transaction to stay under `max_total`.
    #[instrument(skip(self, tx), target = "txpool", fields(hash = %tx.hash()))]
    pub fn add_transaction(&mut self, tx: T, is_local: bool) -> PoolResult<TxHandle<T>> {
        let sender = tx.sender().ok_or_else(|| PoolError::new(tx.hash(), PoolErrorKind::NonceTooLow))?;
        self.validate(&tx, sender)?;

        let nonce = tx.nonce();
        let hash = tx.hash();
        let encoded_length = tx.encoded_length();

        let existing = self
            .pending
            .get(&sender)
            .and_then(|l| l.get(nonce))
            .or_else(|| self.queued.get(&sender).and_then(|l| l.get(nonce)))
            .cloned();

        if let Some(old) = &existing {
            if !has_sufficient_bump(
                &old.transaction,
                &tx,
                self.block_info.base_fee,
                self.config.price_bump_percent
            ) {
                return Err(PoolError::new(hash, PoolErrorKind::ReplacementUnderpriced))
            }
        }

        if existing.is_none() && self.lookup.len() >= self.config.max_total {
            let newcomer_price = crate::fees::effective_price(&tx, self.block_info.base_fee);
            if !self.try_make_room(newcomer_price) {
                return Err(PoolError::new(hash, PoolErrorKind::PoolFull))
            }
        }

        let submission_id = self.next_submission_id;
        self.next_submission_id += 1;
        let handle: TxHandle<T> = std::sync::Arc::new(ValidPoolTransaction { transaction: tx, submission_id, is_local });

        if let Some(old) = existing {
            self.remove_internal(old.transaction.hash());
        }

        let account_nonce = self.state.nonce(sender);
        let target = if nonce == self.pending_next_expected(sender, account_nonce) {
            &mut self.pending
        } else {
            &mut self.queued
        };
        target.entry(sender).or_default().add(handle.clone());

        self.lookup.insert(hash, handle.clone());
        self.total_bytes += encoded_length;
        self.heaps.insert(
            hash,
            sender,
            nonce,
            handle.transaction.kind().is_legacy_priced(),
            if handle.transaction.kind().is_legacy_priced() {
                handle.transaction.gas_price()
            } else {
                handle.transaction.max_fee_per_gas()
            },
            handle.transaction.max_priority_fee_per_gas()
        );

        self.promote(sender);

        if self.heaps.stale_ratio() > 0.5 {
            self.heaps.cleanup();
        }

        trace!(target: "txpool", %hash, %sender, nonce, "admitted transaction");
        Ok(handle)
    }

    fn pending_next_expected(&self, sender: Address, account_nonce: u64) -> u64 {
        self.pending.get(&sender).and_then(AccountList::last_nonce).map(|n| n + 1).unwrap_or(account_nonce)
    }

    /// Moves the contiguous ready prefix of `sender`'s queued transactions into
    /// `pending`, repeating until no further nonce lines up.
    #[instrument(skip(self), target = "txpool")]
    pub fn promote(&mut self, sender: Address) {
        let account_nonce = self.state.nonce(sender);
        let expected = self.pending_next_expected(sender, account_nonce);

        let Some(queued_list) = self.queued.get_mut(&sender) else { return };
        let ready = queued_list.take_ready_prefix(expected);
        if queued_list.is_empty() {
            self.queued.remove(&sender);
        }
        if ready.is_empty() {
            return
        }

        let pending_list = self.pending.entry(sender).or_default();
        for tx in ready {
            trace!(target: "txpool", hash = %tx.transaction.hash(), "promoted queued transaction to pending");
            pending_list.add(tx);
        }
    }

    /// Removes a transaction from every index without checking admission rules.
    /// Internal helper for replacement and eviction.
    fn remove_internal(&mut self, hash: TxHash) -> Option<TxHandle<T>> {
        let handle = self.lookup.remove(&hash)?;
        let sender = handle.transaction.sender().expect("pooled transaction has a recovered sender");
        let nonce = handle.transaction.nonce();

        if let Some(list) = self.pending.get_mut(&sender) {
            list.remove(nonce);
            if list.is_empty() {
                self.pending.remove(&sender);
            }
        }
        if let Some(list) = self.queued.get_mut(&sender) {
            list.remove(nonce);
            if list.is_empty() {
                self.queued.remove(&sender);
            }
        }

        self.heaps.remove(hash);
        self.total_bytes = self.total_bytes.saturating_sub(handle.transaction.encoded_length());
        Some(handle)
    }

    /// Removes a transaction by hash, e.g. because it was mined or the caller is
    /// discarding it out-of-band. Returns it if it was present.
    pub fn remove_transaction(&mut self, hash: TxHash) -> Option<TxHandle<T>> {
        self.remove_internal(hash)
    }

    /// Whether `hash` is the highest-nonce pending transaction for its sender, and
    /// therefore protected from eviction regardless of price (§4.4's eviction
    /// policy). A sender with exactly one pending transaction has that transaction
    /// protected unconditionally, since it is also its own highest-nonce entry.
    /// Queued transactions are never protected.
    fn is_protected(&self, hash: TxHash) -> bool {
        let Some(handle) = self.lookup.get(&hash) else { return false };
        let Some(sender) = handle.transaction.sender() else { return false };
        let nonce = handle.transaction.nonce();
        self.pending.get(&sender).and_then(AccountList::last_nonce) == Some(nonce)
    }

    /// Attempts to evict exactly one transaction to admit a newcomer priced at
    /// `newcomer_price`. The victim is the globally cheapest non-protected
    /// candidate; eviction proceeds only if the newcomer's effective price strictly
    /// exceeds the victim's, matching the spec's "eviction succeeds only if the
    /// newcomer's effective price strictly exceeds the chosen victim's" rule.
    /// Returns whether room was made.
    fn try_make_room(&mut self, newcomer_price: u128) -> bool {
        let Some(victim) = self.heaps.find_min_price(|h| self.is_protected(h)) else { return false };
        let Some(handle) = self.lookup.get(&victim) else { return false };
        let victim_price = crate::fees::effective_price(&handle.transaction, self.block_info.base_fee);
        if newcomer_price <= victim_price {
            return false
        }
        trace!(target: "txpool", hash = %victim, "evicted transaction under capacity pressure");
        self.remove_internal(victim);
        true
    }

    /// Updates the pool's view of the chain tip: drops mined-prefix transactions per
    /// sender, demotes transactions the new state can no longer afford back to
    /// `queued`, re-promotes whatever the new nonce allows, and recomputes the price
    /// heaps against the new base fee.
    #[instrument(skip(self, block_info), target = "txpool", fields(block_number = block_info.block_number))]
    pub fn reset(&mut self, block_info: BlockInfo) {
        self.block_info.block_number = block_info.block_number;

        let senders: Vec<Address> =
            self.pending.keys().chain(self.queued.keys()).copied().collect::<std::collections::HashSet<_>>().into_iter().collect();

        for sender in senders {
            let account_nonce = self.state.nonce(sender);

            if let Some(list) = self.pending.get_mut(&sender) {
                for mined in list.remove_below(account_nonce) {
                    self.lookup.remove(&mined.transaction.hash());
                    self.heaps.remove(mined.transaction.hash());
                    self.total_bytes = self.total_bytes.saturating_sub(mined.transaction.encoded_length());
                }
                if list.is_empty() {
                    self.pending.remove(&sender);
                }
            }
            if let Some(list) = self.queued.get_mut(&sender) {
                for mined in list.remove_below(account_nonce) {
                    self.lookup.remove(&mined.transaction.hash());
                    self.heaps.remove(mined.transaction.hash());
                    self.total_bytes = self.total_bytes.saturating_sub(mined.transaction.encoded_length());
                }
                if list.is_empty() {
                    self.queued.remove(&sender);
                }
            }

            // A pending account list might no longer start at the account's new nonce
            // (e.g. the account was reorged and gained a gap); demote the whole
            // remainder back to queued and let `promote` sort it back out.
            if let Some(list) = self.pending.remove(&sender) {
                if list.first_nonce() != Some(account_nonce) {
                    let queued_list = self.queued.entry(sender).or_default();
                    for tx in list.iter() {
                        queued_list.add(tx.clone());
                    }
                } else {
                    self.pending.insert(sender, list);
                }
            }

            self.promote(sender);
        }

        self.set_base_fee(block_info.base_fee);
        trace!(target: "txpool", block_number = block_info.block_number, "pool reset to new block");
    }

    /// Records a new base fee and demotes every pending transaction whose
    /// `max_fee_per_gas` has fallen below it back to `queued` (§4.4). Counts are
    /// unchanged — this only moves transactions between the two sub-pools. Queued
    /// entries are left alone even if their fee cap also trails the new base fee,
    /// since they aren't executable on nonce grounds yet regardless.
    #[instrument(skip(self), target = "txpool", fields(base_fee = ?base_fee))]
    pub fn set_base_fee(&mut self, base_fee: Option<u128>) {
        self.block_info.base_fee = base_fee;

        if let Some(base_fee) = base_fee {
            let senders: Vec<Address> = self.pending.keys().copied().collect();
            for sender in senders {
                let Some(list) = self.pending.get_mut(&sender) else { continue };
                let demoted = list.remove_fee_cap_below(base_fee);
                if list.is_empty() {
                    self.pending.remove(&sender);
                }
                if demoted.is_empty() {
                    continue
                }
                let queued_list = self.queued.entry(sender).or_default();
                for tx in demoted {
                    trace!(target: "txpool", hash = %tx.transaction.hash(), %sender, "demoted pending transaction below new base fee");
                    queued_list.add(tx);
                }
            }
        }

        self.heaps.set_base_fee(base_fee);
    }

    /// Drops every pooled transaction whose hash is not in `known`, keeping the rest.
    /// Used after a peer announces its own pool contents, to prune what's diverged.
    pub fn retain_unknown(&mut self, known: &std::collections::HashSet<TxHash>) {
        let to_drop: Vec<TxHash> = self.lookup.keys().filter(|h| !known.contains(*h)).copied().collect();
        for hash in to_drop {
            self.remove_internal(hash);
        }
    }
}
