//! Per-account transaction lists (C2 of the spec): a nonce-sorted sequence with
//! ready-prefix extraction and gap detection.
//!
//! Each sender's transactions — pending and queued alike, callers decide which list
//! they belong in — live in one of these. Items are always kept sorted ascending by
//! nonce with unique nonces; `add` enforces the invariant by binary-searching for
//! the insertion point and overwriting on a nonce collision.

use crate::transaction::{PoolTransaction, TxHandle};

/// A nonce-sorted, nonce-unique sequence of transactions belonging to one sender.
#[derive(Debug)]
pub struct AccountList<T: PoolTransaction> {
    txs: Vec<TxHandle<T>>
}

impl<T: PoolTransaction> Default for AccountList<T> {
    fn default() -> Self {
        Self { txs: Vec::new() }
    }
}

impl<T: PoolTransaction> AccountList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions currently held.
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    /// Whether the list holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    fn search(&self, nonce: u64) -> Result<usize, usize> {
        self.txs.binary_search_by_key(&nonce, |tx| tx.transaction.nonce())
    }

    /// Inserts `tx`, keeping the list sorted by nonce. If a transaction with the
    /// same nonce already exists, it is overwritten and returned to the caller —
    /// replacement eligibility (price bump) is the caller's responsibility; this
    /// list only maintains nonce order.
    pub fn add(&mut self, tx: TxHandle<T>) -> Option<TxHandle<T>> {
        let nonce = tx.transaction.nonce();
        match self.search(nonce) {
            Ok(idx) => Some(std::mem::replace(&mut self.txs[idx], tx)),
            Err(idx) => {
                self.txs.insert(idx, tx);
                None
            }
        }
    }

    /// Removes and returns the transaction at `nonce`, if present.
    pub fn remove(&mut self, nonce: u64) -> Option<TxHandle<T>> {
        let idx = self.search(nonce).ok()?;
        Some(self.txs.remove(idx))
    }

    /// Returns the transaction at `nonce`, if present.
    pub fn get(&self, nonce: u64) -> Option<&TxHandle<T>> {
        self.search(nonce).ok().map(|idx| &self.txs[idx])
    }

    /// Returns the lowest nonce held, if any.
    pub fn first_nonce(&self) -> Option<u64> {
        self.txs.first().map(|tx| tx.transaction.nonce())
    }

    /// Returns the highest nonce held, if any.
    pub fn last_nonce(&self) -> Option<u64> {
        self.txs.last().map(|tx| tx.transaction.nonce())
    }

    /// All transactions, nonce-ascending.
    pub fn iter(&self) -> impl Iterator<Item = &TxHandle<T>> {
        self.txs.iter()
    }

    /// The longest contiguous run `[base_nonce, base_nonce + 1, ...]` starting
    /// exactly at `base_nonce`. Stops at the first gap (including immediately, if
    /// the list is empty or doesn't start at `base_nonce`).
    pub fn ready_prefix(&self, base_nonce: u64) -> Vec<TxHandle<T>> {
        let mut out = Vec::new();
        let mut expected = base_nonce;

        for tx in &self.txs {
            let nonce = tx.transaction.nonce();
            if nonce != expected {
                break
            }
            out.push(tx.clone());
            expected += 1;
        }

        out
    }

    /// Removes and returns the longest contiguous run starting at `base_nonce`,
    /// leaving the remainder of the list untouched.
    pub fn take_ready_prefix(&mut self, base_nonce: u64) -> Vec<TxHandle<T>> {
        let mut count = 0;
        let mut expected = base_nonce;
        for tx in &self.txs {
            if tx.transaction.nonce() != expected {
                break
            }
            count += 1;
            expected += 1;
        }
        self.txs.drain(..count).collect()
    }

    /// Every nonce in `[base_nonce, max_nonce]` absent from the list, ascending.
    pub fn gaps(&self, base_nonce: u64) -> Vec<u64> {
        let Some(max_nonce) = self.last_nonce() else { return Vec::new() };
        if max_nonce < base_nonce {
            return Vec::new()
        }

        let present: std::collections::HashSet<u64> =
            self.txs.iter().map(|tx| tx.transaction.nonce()).collect();

        (base_nonce..=max_nonce).filter(|n| !present.contains(n)).collect()
    }

    /// Removes every transaction with nonce strictly below `floor`, returning them
    /// in ascending order. Used by `reset` to drop mined transactions.
    pub fn remove_below(&mut self, floor: u64) -> Vec<TxHandle<T>> {
        let split = self.txs.partition_point(|tx| tx.transaction.nonce() < floor);
        self.txs.drain(..split).collect()
    }

    /// Removes every transaction from the first `max_fee_per_gas < base_fee`
    /// offender onward, preserving nonce order. Used by `set_base_fee` to demote
    /// pending transactions the new base fee has outrun back to queued: once one
    /// nonce in a contiguous pending run can't afford the new base fee, every
    /// higher nonce behind it is un-executable too (it can't be mined before the
    /// one blocking it), so the whole tail is demoted, not just the offender
    /// itself — this keeps the pending invariant (no gaps) intact after demotion.
    pub fn remove_fee_cap_below(&mut self, base_fee: u128) -> Vec<TxHandle<T>> {
        let Some(split) = self.txs.iter().position(|tx| tx.transaction.max_fee_per_gas() < base_fee) else {
            return Vec::new()
        };
        self.txs.drain(split..).collect()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Bytes, U256};

    use super::*;
    use crate::transaction::{EthPooledTransaction, SenderCache, TxKind};
    use std::sync::Arc;
    use crate::transaction::ValidPoolTransaction;

    fn tx(nonce: u64) -> TxHandle<EthPooledTransaction> {
        Arc::new(ValidPoolTransaction {
            transaction: EthPooledTransaction {
                hash: alloy_primitives::TxHash::repeat_byte(nonce as u8),
                sender_cache: SenderCache::new(),
                nonce,
                kind: TxKind::Legacy,
                gas_limit: 21_000,
                value: U256::ZERO,
                input: Bytes::new(),
                to: None,
                access_list: vec![],
                gas_price: 1,
                max_fee_per_gas: 0,
                max_priority_fee_per_gas: 0,
                blob_versioned_hashes: vec![],
                blob_gas: 0,
                max_fee_per_blob_gas: 0,
                encoded_length: 100
            },
            submission_id: nonce,
            is_local: false
        })
    }

    #[test]
    fn add_keeps_nonce_order() {
        let mut list = AccountList::new();
        list.add(tx(3));
        list.add(tx(1));
        list.add(tx(2));
        let nonces: Vec<_> = list.iter().map(|t| t.transaction.nonce()).collect();
        assert_eq!(nonces, vec![1, 2, 3]);
    }

    #[test]
    fn add_same_nonce_replaces_and_returns_old() {
        let mut list = AccountList::new();
        list.add(tx(1));
        let old = list.add(tx(1));
        assert!(old.is_some());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn ready_prefix_stops_at_gap() {
        let mut list = AccountList::new();
        list.add(tx(0));
        list.add(tx(1));
        list.add(tx(3));
        let prefix = list.ready_prefix(0);
        assert_eq!(prefix.len(), 2);
        assert_eq!(prefix[1].transaction.nonce(), 1);
    }

    #[test]
    fn gaps_reports_missing_nonces() {
        let mut list = AccountList::new();
        list.add(tx(0));
        list.add(tx(2));
        list.add(tx(4));
        assert_eq!(list.gaps(0), vec![1, 3]);
    }

    #[test]
    fn remove_below_drops_mined_prefix() {
        let mut list = AccountList::new();
        for n in 0..5 {
            list.add(tx(n));
        }
        let removed = list.remove_below(3);
        assert_eq!(removed.len(), 3);
        assert_eq!(list.first_nonce(), Some(3));
    }
}
