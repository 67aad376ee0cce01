//! Pure fee arithmetic over [`PoolTransaction`]s.
//!
//! Every function here is side-effect free and depends only on its arguments, so the
//! main pool and the block-building iterators can share one definition of "price" and
//! "tip" instead of re-deriving fork-specific logic in multiple places.

use crate::transaction::{PoolTransaction, TxKind};

/// The price used to order transactions for block building.
///
/// For legacy/access-list transactions this is the flat `gas_price`. For the
/// dynamic-fee family it is `min(max_fee_per_gas, base_fee + max_priority_fee_per_gas)`;
/// if `base_fee` is `None` (not yet known), it falls back to `max_fee_per_gas` since the
/// tip cannot be bounded without a base fee to subtract.
pub fn effective_price<T: PoolTransaction>(tx: &T, base_fee: Option<u128>) -> u128 {
    if tx.kind().is_legacy_priced() {
        return tx.gas_price()
    }

    let Some(base_fee) = base_fee else { return tx.max_fee_per_gas() };

    let capped_tip = base_fee.saturating_add(tx.max_priority_fee_per_gas());
    tx.max_fee_per_gas().min(capped_tip)
}

/// The portion of [`effective_price`] that goes to the block proposer, i.e. the
/// miner's revenue. Used for eviction ordering and fee-oracle sampling.
///
/// For legacy transactions: `max(0, gas_price - base_fee)`.
/// For dynamic-fee transactions: `min(max_priority_fee_per_gas, max(0, max_fee_per_gas - base_fee))`.
/// Returns `0` whenever `max_fee_per_gas < base_fee` (the transaction isn't
/// executable at this base fee at all). When `base_fee` is `None`, the tip is
/// unconstrained by a base fee and this returns `max_priority_fee_per_gas`
/// (or `gas_price` for legacy transactions, matching [`effective_price`]'s fallback).
pub fn effective_tip<T: PoolTransaction>(tx: &T, base_fee: Option<u128>) -> u128 {
    let Some(base_fee) = base_fee else {
        return if tx.kind().is_legacy_priced() { tx.gas_price() } else { tx.max_priority_fee_per_gas() }
    };

    if tx.kind().is_legacy_priced() {
        return tx.gas_price().saturating_sub(base_fee)
    }

    if tx.max_fee_per_gas() < base_fee {
        return 0
    }

    tx.max_priority_fee_per_gas()
        .min(tx.max_fee_per_gas() - base_fee)
}

/// The price used to order blob transactions for eviction/replacement: the minimum
/// of the execution-side effective price and the blob-fee headroom, expressed as a
/// tip. Per the spec's resolved open question (§9), if either `base_fee` or
/// `blob_base_fee` is unknown the tip is returned unchanged (execution-side tip only).
pub fn blob_effective_tip<T: PoolTransaction>(
    tx: &T,
    base_fee: Option<u128>,
    blob_base_fee: Option<u128>
) -> u128 {
    let tip = effective_tip(tx, base_fee);
    let (Some(_), Some(blob_base_fee)) = (base_fee, blob_base_fee) else { return tip };

    if tx.max_fee_per_blob_gas() < blob_base_fee {
        0
    } else {
        tip
    }
}

/// The price used to order blob transactions for admission-time eviction (§4.5): the
/// execution-side effective price, zeroed out if the blob-fee cap can't keep up with
/// the blob base fee. Deliberately distinct from [`blob_effective_tip`], which orders
/// datacap pruning — the spec retains both blob-pool eviction criteria intentionally
/// (§9): admission eviction compares newcomer price to victim price, datacap pruning
/// drops the lowest tip.
pub fn blob_effective_price<T: PoolTransaction>(
    tx: &T,
    base_fee: Option<u128>,
    blob_base_fee: Option<u128>
) -> u128 {
    let price = effective_price(tx, base_fee);
    let (Some(_), Some(blob_base_fee)) = (base_fee, blob_base_fee) else { return price };

    if tx.max_fee_per_blob_gas() < blob_base_fee {
        0
    } else {
        price
    }
}

/// Whether `new`'s effective price (and, for dynamic-fee replacements, its tip) beats
/// `old`'s by at least `bump_percent`.
///
/// `threshold = old_effective_price * (100 + bump_percent) / 100`, truncating integer
/// division; `new_effective_price` must be `>= threshold`. When both `old` and `new`
/// are dynamic-fee-family transactions, the same bump must independently hold for
/// `max_priority_fee_per_gas`, since the tip cap alone could otherwise be raised to
/// pass the price bump while leaving the miner's actual revenue unchanged.
pub fn has_sufficient_bump<T: PoolTransaction>(
    old: &T,
    new: &T,
    base_fee: Option<u128>,
    bump_percent: u32
) -> bool {
    let old_price = effective_price(old, base_fee);
    let new_price = effective_price(new, base_fee);
    let price_threshold = old_price * (100 + u128::from(bump_percent)) / 100;

    if new_price < price_threshold {
        return false
    }

    if !old.kind().is_legacy_priced() && !new.kind().is_legacy_priced() {
        let old_tip = old.max_priority_fee_per_gas();
        let new_tip = new.max_priority_fee_per_gas();
        let tip_threshold = old_tip * (100 + u128::from(bump_percent)) / 100;
        if new_tip < tip_threshold {
            return false
        }
    }

    true
}

/// Base intrinsic gas cost of a transaction: a flat base (transfer or contract
/// creation) plus a per-byte calldata cost and a per-entry access-list cost.
pub fn intrinsic_gas(data: &[u8], is_creation: bool, access_list_len: (usize, usize)) -> u64 {
    const TX_BASE_GAS: u64 = 21_000;
    const TX_CREATE_BASE_GAS: u64 = 53_000;
    const TX_DATA_ZERO_GAS: u64 = 4;
    const TX_DATA_NON_ZERO_GAS: u64 = 16;
    const TX_ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
    const TX_ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

    let mut gas = if is_creation { TX_CREATE_BASE_GAS } else { TX_BASE_GAS };

    for &byte in data {
        gas += if byte == 0 { TX_DATA_ZERO_GAS } else { TX_DATA_NON_ZERO_GAS };
    }

    let (addresses, storage_keys) = access_list_len;
    gas += addresses as u64 * TX_ACCESS_LIST_ADDRESS_GAS;
    gas += storage_keys as u64 * TX_ACCESS_LIST_STORAGE_KEY_GAS;

    gas
}

/// Intrinsic gas for a [`PoolTransaction`], derived from its calldata, recipient and
/// access list.
pub fn intrinsic_gas_of<T: PoolTransaction>(tx: &T) -> u64 {
    let storage_keys = tx.access_list().iter().map(|e| e.storage_keys.len()).sum();
    intrinsic_gas(tx.input(), tx.to().is_none(), (tx.access_list().len(), storage_keys))
}

/// Raw-number variant of [`effective_price`] for callers that have pulled the fee
/// fields out of a transaction (the price heap caches these so it can recompute on
/// `set_base_fee` without holding a reference back to the transaction itself).
pub fn effective_price_raw(legacy_priced: bool, gas_price_or_cap: u128, tip: u128, base_fee: Option<u128>) -> u128 {
    if legacy_priced {
        return gas_price_or_cap
    }
    let Some(base_fee) = base_fee else { return gas_price_or_cap };
    gas_price_or_cap.min(base_fee.saturating_add(tip))
}

/// Raw-number variant of [`effective_tip`]; see [`effective_price_raw`].
pub fn effective_tip_raw(legacy_priced: bool, gas_price_or_cap: u128, tip: u128, base_fee: Option<u128>) -> u128 {
    let Some(base_fee) = base_fee else { return if legacy_priced { gas_price_or_cap } else { tip } };

    if legacy_priced {
        return gas_price_or_cap.saturating_sub(base_fee)
    }
    if gas_price_or_cap < base_fee {
        return 0
    }
    tip.min(gas_price_or_cap - base_fee)
}

/// Upper bound on what a transaction could cost the sender: `gas_limit * price + value`,
/// plus the blob-gas cost for blob transactions. Uses `gas_price` for legacy/access-list
/// transactions and `max_fee_per_gas` for the dynamic-fee family, matching the
/// worst-case balance check performed at admission.
pub fn tx_cost<T: PoolTransaction>(tx: &T) -> alloy_primitives::U256 {
    use alloy_primitives::U256;

    let price = if tx.kind().is_legacy_priced() { tx.gas_price() } else { tx.max_fee_per_gas() };

    let mut cost = U256::from(tx.gas_limit()).saturating_mul(U256::from(price));
    cost = cost.saturating_add(tx.value());

    if matches!(tx.kind(), TxKind::Blob) {
        let blob_cost = U256::from(tx.blob_gas()).saturating_mul(U256::from(tx.max_fee_per_blob_gas()));
        cost = cost.saturating_add(blob_cost);
    }

    cost
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Bytes, U256};

    use super::*;
    use crate::transaction::{EthPooledTransaction, SenderCache};

    fn legacy(gas_price: u128) -> EthPooledTransaction {
        EthPooledTransaction {
            hash: Default::default(),
            sender_cache: SenderCache::new(),
            nonce: 0,
            kind: TxKind::Legacy,
            gas_limit: 21_000,
            value: U256::ZERO,
            input: Bytes::new(),
            to: None,
            access_list: vec![],
            gas_price,
            max_fee_per_gas: 0,
            max_priority_fee_per_gas: 0,
            blob_versioned_hashes: vec![],
            blob_gas: 0,
            max_fee_per_blob_gas: 0,
            encoded_length: 100
        }
    }

    fn dynamic(max_fee: u128, tip: u128) -> EthPooledTransaction {
        EthPooledTransaction {
            hash: Default::default(),
            sender_cache: SenderCache::new(),
            nonce: 0,
            kind: TxKind::DynamicFee,
            gas_limit: 21_000,
            value: U256::ZERO,
            input: Bytes::new(),
            to: None,
            access_list: vec![],
            gas_price: 0,
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: tip,
            blob_versioned_hashes: vec![],
            blob_gas: 0,
            max_fee_per_blob_gas: 0,
            encoded_length: 120
        }
    }

    #[test]
    fn legacy_effective_price_is_gas_price() {
        let tx = legacy(1_000);
        assert_eq!(effective_price(&tx, Some(10)), 1_000);
        assert_eq!(effective_price(&tx, None), 1_000);
    }

    #[test]
    fn dynamic_effective_price_caps_at_max_fee() {
        // base_fee=10, tip=100, cap=200 => min(200, 110) = 110
        let tx = dynamic(200, 100);
        assert_eq!(effective_price(&tx, Some(10)), 110);
    }

    #[test]
    fn dynamic_effective_tip_zero_below_base_fee() {
        let tx = dynamic(5, 100);
        assert_eq!(effective_tip(&tx, Some(10)), 0);
    }

    #[test]
    fn exact_bump_threshold_accepted() {
        // old effective price 1000, 10% bump => threshold 1100
        let old = legacy(1_000);
        let new = legacy(1_100);
        assert!(has_sufficient_bump(&old, &new, None, 10));
    }

    #[test]
    fn one_below_bump_threshold_rejected() {
        let old = legacy(1_000);
        let new = legacy(1_099);
        assert!(!has_sufficient_bump(&old, &new, None, 10));
    }

    #[test]
    fn dynamic_fee_bump_requires_tip_bump_too() {
        // base_fee 10: old tip=100 cap=200 (price 110); new tip=105 cap=220 (price 115)
        // price threshold = 121, so it fails regardless of the tip check.
        let old = dynamic(200, 100);
        let new = dynamic(220, 105);
        assert!(!has_sufficient_bump(&old, &new, Some(10), 10));

        // new tip=112 cap=230 (price min(230,122)=122 >= 121, tip 112 >= 110)
        let new2 = dynamic(230, 112);
        assert!(has_sufficient_bump(&old, &new2, Some(10), 10));
    }

    #[test]
    fn intrinsic_gas_matches_transfer_and_creation_bases() {
        assert_eq!(intrinsic_gas(&[], false, (0, 0)), 21_000);
        assert_eq!(intrinsic_gas(&[], true, (0, 0)), 53_000);
        assert_eq!(intrinsic_gas(&[0, 1, 2], false, (0, 0)), 21_000 + 4 + 16 + 16);
        assert_eq!(intrinsic_gas(&[], false, (1, 2)), 21_000 + 2_400 + 2 * 1_900);
    }

    #[test]
    fn tx_cost_adds_blob_gas_cost() {
        let mut tx = dynamic(100, 10);
        tx.kind = TxKind::Blob;
        tx.blob_gas = 131_072;
        tx.max_fee_per_blob_gas = 2;
        tx.gas_limit = 21_000;
        tx.max_fee_per_gas = 50;
        let cost = tx_cost(&tx);
        assert_eq!(cost, U256::from(21_000u64 * 50 + 131_072 * 2));
    }
}
