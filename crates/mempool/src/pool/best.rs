//! Block-building iterator over the pool's pending set.
//!
//! Grounded on reth's `BestTransactions`: rather than sorting the entire pending set
//! once, we maintain an "independent set" of one candidate per sender — the lowest
//! ready nonce that hasn't been yielded yet — in a max-heap ordered by effective
//! price. Each time a transaction is yielded, the next nonce from the same sender (if
//! any) is pushed in to take its place. This keeps the heap at `O(senders)` rather
//! than `O(transactions)` and guarantees per-sender nonce order is respected without
//! a separate pass to check it.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use alloy_primitives::Address;

use crate::transaction::{PoolTransaction, TxHandle};

struct BestEntry<T: PoolTransaction> {
    tx: TxHandle<T>,
    price: u128
}

impl<T: PoolTransaction> PartialEq for BestEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.price == other.price && self.tx.transaction.nonce() == other.tx.transaction.nonce()
    }
}
impl<T: PoolTransaction> Eq for BestEntry<T> {}

impl<T: PoolTransaction> PartialOrd for BestEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: PoolTransaction> Ord for BestEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; lower nonce wins ties so an account's own
        // transactions are still offered in nonce order when prices collide.
        self.price
            .cmp(&other.price)
            .then_with(|| other.tx.transaction.nonce().cmp(&self.tx.transaction.nonce()))
    }
}

/// Yields pending transactions in descending effective-price order, one independent
/// candidate per sender at a time, respecting each sender's nonce order.
pub struct BestTransactions<T: PoolTransaction> {
    heap: BinaryHeap<BestEntry<T>>,
    remaining: HashMap<Address, std::vec::IntoIter<TxHandle<T>>>,
    base_fee: Option<u128>
}

impl<T: PoolTransaction> BestTransactions<T> {
    /// Builds the iterator from each sender's ready (nonce-contiguous) pending
    /// transactions, already nonce-ascending.
    pub fn new(pending: HashMap<Address, Vec<TxHandle<T>>>, base_fee: Option<u128>) -> Self {
        let mut heap = BinaryHeap::with_capacity(pending.len());
        let mut remaining = HashMap::with_capacity(pending.len());

        for (sender, txs) in pending {
            let mut iter = txs.into_iter();
            if let Some(first) = iter.next() {
                let price = crate::fees::effective_price(&first.transaction, base_fee);
                heap.push(BestEntry { tx: first, price });
            }
            remaining.insert(sender, iter);
        }

        Self { heap, remaining, base_fee }
    }
}

impl<T: PoolTransaction> Iterator for BestTransactions<T> {
    type Item = TxHandle<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.heap.pop()?;
        let sender = entry.tx.transaction.sender().expect("pooled transaction has a recovered sender");

        if let Some(iter) = self.remaining.get_mut(&sender) {
            if let Some(next_tx) = iter.next() {
                let price = crate::fees::effective_price(&next_tx.transaction, self.base_fee);
                self.heap.push(BestEntry { tx: next_tx, price });
            }
        }

        Some(entry.tx)
    }
}
