//! Test-only transaction fixtures: [`MockTransaction`] and [`MockTransactionFactory`].
//!
//! Gated behind the `test-utils` feature (and implicitly available under
//! `#[cfg(test)]` via this crate's own self-referential dev-dependency) so both this
//! crate's unit tests and the `tests/` integration suite can build
//! [`PoolTransaction`]-conforming fixtures without hand-writing every field of an
//! [`EthPooledTransaction`] at every call site.

#![cfg(any(test, feature = "test-utils"))]

use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use rand::Rng;

use crate::transaction::{EthPooledTransaction, SenderCache, TxKind};

/// A [`PoolTransaction`](crate::transaction::PoolTransaction) fixture produced by
/// [`MockTransactionFactory`]. A thin alias over [`EthPooledTransaction`]: the
/// factory's job is picking sensible (or randomized) field values, not defining a
/// second transaction shape.
pub type MockTransaction = EthPooledTransaction;

/// Builds [`MockTransaction`]s with sequential hashes, so callers constructing many
/// fixtures in one test don't need to pick a distinct hash seed by hand each time.
#[derive(Debug, Default)]
pub struct MockTransactionFactory {
    next_hash_seed: u8
}

impl MockTransactionFactory {
    /// A factory starting from hash seed `0`.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_hash(&mut self) -> TxHash {
        let hash = TxHash::repeat_byte(self.next_hash_seed);
        self.next_hash_seed = self.next_hash_seed.wrapping_add(1);
        hash
    }

    fn base(&mut self, sender: Address, nonce: u64, kind: TxKind) -> EthPooledTransaction {
        let tx = EthPooledTransaction {
            hash: self.next_hash(),
            sender_cache: SenderCache::new(),
            nonce,
            kind,
            gas_limit: 21_000,
            value: U256::ZERO,
            input: Bytes::new(),
            to: Some(Address::repeat_byte(0xee)),
            access_list: vec![],
            gas_price: 0,
            max_fee_per_gas: 0,
            max_priority_fee_per_gas: 0,
            blob_versioned_hashes: vec![],
            blob_gas: 0,
            max_fee_per_blob_gas: 0,
            encoded_length: 110
        };
        tx.set_sender(sender);
        tx
    }

    /// A legacy transaction for `sender` at `nonce`, priced at `gas_price`.
    pub fn legacy(&mut self, sender: Address, nonce: u64, gas_price: u128) -> MockTransaction {
        let mut tx = self.base(sender, nonce, TxKind::Legacy);
        tx.gas_price = gas_price;
        tx
    }

    /// A dynamic-fee (EIP-1559) transaction for `sender` at `nonce`.
    pub fn dynamic_fee(
        &mut self,
        sender: Address,
        nonce: u64,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128
    ) -> MockTransaction {
        let mut tx = self.base(sender, nonce, TxKind::DynamicFee);
        tx.max_fee_per_gas = max_fee_per_gas;
        tx.max_priority_fee_per_gas = max_priority_fee_per_gas;
        tx
    }

    /// A blob transaction for `sender` at `nonce`, carrying `blob_count` versioned
    /// hashes (each derived deterministically from the hash seed, not a real KZG
    /// commitment — the pool never interprets their contents).
    pub fn blob(
        &mut self,
        sender: Address,
        nonce: u64,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
        max_fee_per_blob_gas: u128,
        blob_count: usize
    ) -> MockTransaction {
        let mut tx = self.base(sender, nonce, TxKind::Blob);
        let seed = self.next_hash_seed.wrapping_sub(1);
        tx.max_fee_per_gas = max_fee_per_gas;
        tx.max_priority_fee_per_gas = max_priority_fee_per_gas;
        tx.max_fee_per_blob_gas = max_fee_per_blob_gas;
        tx.blob_versioned_hashes = (0..blob_count).map(|i| B256::repeat_byte(seed.wrapping_add(i as u8))).collect();
        tx.blob_gas = blob_count as u64 * 131_072;
        tx
    }

    /// A legacy transaction for `sender` at `nonce` with a `gas_price` drawn
    /// uniformly from `price_range` — useful for property-style tests that want
    /// many differently-priced transactions without picking each price by hand.
    pub fn random_legacy(&mut self, sender: Address, nonce: u64, price_range: std::ops::Range<u128>) -> MockTransaction {
        let gas_price = rand::thread_rng().gen_range(price_range);
        self.legacy(sender, nonce, gas_price)
    }

    /// A dynamic-fee transaction for `sender` at `nonce` with `max_priority_fee_per_gas`
    /// drawn uniformly from `tip_range` and `max_fee_per_gas` set to `tip + base_fee_hint`,
    /// so the caller gets a randomized-but-internally-consistent fee pair.
    pub fn random_dynamic_fee(
        &mut self,
        sender: Address,
        nonce: u64,
        tip_range: std::ops::Range<u128>,
        base_fee_hint: u128
    ) -> MockTransaction {
        let tip = rand::thread_rng().gen_range(tip_range);
        self.dynamic_fee(sender, nonce, tip + base_fee_hint, tip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_hashes_never_repeat_across_a_handful_of_builds() {
        let mut factory = MockTransactionFactory::new();
        let sender = Address::repeat_byte(1);
        let hashes: Vec<_> = (0..5).map(|n| factory.legacy(sender, n, 1).hash).collect();
        let unique: std::collections::HashSet<_> = hashes.iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn random_legacy_price_stays_within_the_requested_range() {
        let mut factory = MockTransactionFactory::new();
        let sender = Address::repeat_byte(1);
        for n in 0..20 {
            let tx = factory.random_legacy(sender, n, 100..200);
            assert!((100..200).contains(&tx.gas_price));
        }
    }

    #[test]
    fn random_dynamic_fee_keeps_fee_cap_at_or_above_tip() {
        let mut factory = MockTransactionFactory::new();
        let sender = Address::repeat_byte(1);
        let tx = factory.random_dynamic_fee(sender, 0, 10..50, 1_000);
        assert!(tx.max_fee_per_gas >= tx.max_priority_fee_per_gas);
    }
}
