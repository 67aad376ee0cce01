//! Price-indexed heaps (C3 of the spec): a dual view over every pooled transaction,
//! ordered by effective price for eviction and by effective tip for block building.
//!
//! Grounded on reth's `BestTransactions`/blob-pool submission-ordered `BTreeSet`
//! pattern: rather than a binary-heap with O(log n) arbitrary-element removal, both
//! views are `BTreeSet`s over a small `Ord` key so both the min and the max can be
//! peeked or popped in O(log n) and removal-by-hash only has to flip a tombstone.
//! Eagerly removing a mid-tree element from a `BTreeSet` is also O(log n), but doing
//! it on every `remove()` call would mean the main pool's hot replace/evict paths pay
//! tree-rebalancing costs for entries that are about to be popped again anyway; the
//! tombstone defers that cost to [`PriceHeaps::cleanup`] or to the next pop.
//!
//! The fee fields needed to recompute price/tip are cached per entry (not a reference
//! back to the transaction) so [`PriceHeaps::set_base_fee`] can re-derive every live
//! entry's ordering key without taking the pool's transaction lookup lock.

use std::collections::{BTreeSet, HashMap, HashSet};

use alloy_primitives::{Address, TxHash};

use crate::fees::{effective_price_raw, effective_tip_raw};

/// The raw, base-fee-independent fee fields needed to recompute a cached price/tip.
#[derive(Debug, Clone, Copy)]
struct RawFees {
    legacy_priced: bool,
    gas_price_or_cap: u128,
    tip: u128
}

#[derive(Debug, Clone)]
struct Meta {
    sender: Address,
    nonce: u64,
    raw: RawFees,
    price: u128,
    tip: u128,
    tombstoned: bool
}

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TipKey {
    tip: u128,
    nonce: u64,
    hash: TxHash
}

impl Ord for TipKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher tip sorts greater (so `pop_last` yields the richest tip). Ties break
        // towards the lower nonce, since it's the one that can actually be included
        // next without waiting on an earlier nonce from the same sender.
        self.tip
            .cmp(&other.tip)
            .then_with(|| other.nonce.cmp(&self.nonce))
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for TipKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The dual price/tip index over every transaction the main pool currently holds.
#[derive(Debug, Default)]
pub struct PriceHeaps {
    meta: HashMap<TxHash, Meta>,
    by_price: BTreeSet<PriceKey>,
    by_tip: BTreeSet<TipKey>,
    by_sender: HashMap<Address, HashSet<TxHash>>,
    stale: usize,
    base_fee: Option<u128>
}

impl PriceHeaps {
    /// An empty index at the given starting base fee.
    pub fn new(base_fee: Option<u128>) -> Self {
        Self { base_fee, ..Default::default() }
    }

    /// Number of live (non-tombstoned) entries.
    pub fn len(&self) -> usize {
        self.meta.len() - self.stale
    }

    /// Whether the index holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total entries including tombstoned ones not yet purged.
    pub fn total_with_tombstones(&self) -> usize {
        self.meta.len()
    }

    /// Inserts a transaction's ordering fields. Returns `false` without modifying
    /// anything if `hash` is already indexed (callers replace via `remove` + `insert`).
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        hash: TxHash,
        sender: Address,
        nonce: u64,
        legacy_priced: bool,
        gas_price_or_cap: u128,
        tip: u128
    ) -> bool {
        if self.meta.contains_key(&hash) {
            return false
        }

        let raw = RawFees { legacy_priced, gas_price_or_cap, tip };
        let price = effective_price_raw(legacy_priced, gas_price_or_cap, tip, self.base_fee);
        let eff_tip = effective_tip_raw(legacy_priced, gas_price_or_cap, tip, self.base_fee);

        self.by_price.insert(PriceKey { price, hash });
        self.by_tip.insert(TipKey { tip: eff_tip, nonce, hash });
        self.by_sender.entry(sender).or_default().insert(hash);
        self.meta.insert(hash, Meta { sender, nonce, raw, price, tip: eff_tip, tombstoned: false });
        true
    }

    /// Marks `hash` for lazy removal. Returns `true` if it was present and live.
    pub fn remove(&mut self, hash: TxHash) -> bool {
        let Some(m) = self.meta.get_mut(&hash) else { return false };
        if m.tombstoned {
            return false
        }
        m.tombstoned = true;
        self.stale += 1;
        true
    }

    /// Whether `hash` is indexed and not tombstoned.
    pub fn contains(&self, hash: TxHash) -> bool {
        self.meta.get(&hash).map(|m| !m.tombstoned).unwrap_or(false)
    }

    /// The lowest live effective price currently indexed, without removing it.
    pub fn peek_min_price(&self) -> Option<TxHash> {
        self.by_price
            .iter()
            .find(|k| self.meta.get(&k.hash).map(|m| !m.tombstoned).unwrap_or(false))
            .map(|k| k.hash)
    }

    /// The lowest live effective price for which `skip` returns `false`, without
    /// removing it. Used by the main pool's eviction path, which must skip
    /// protected (highest-nonce-pending) candidates without popping past them —
    /// unlike [`Self::pop_min_price`], a skipped entry stays indexed.
    pub fn find_min_price(&self, mut skip: impl FnMut(TxHash) -> bool) -> Option<TxHash> {
        self.by_price
            .iter()
            .find(|k| self.meta.get(&k.hash).map(|m| !m.tombstoned).unwrap_or(false) && !skip(k.hash))
            .map(|k| k.hash)
    }

    /// The highest live effective tip currently indexed, without removing it.
    pub fn peek_max_tip(&self) -> Option<TxHash> {
        self.by_tip
            .iter()
            .rev()
            .find(|k| self.meta.get(&k.hash).map(|m| !m.tombstoned).unwrap_or(false))
            .map(|k| k.hash)
    }

    /// Pops and permanently removes the transaction with the lowest live effective
    /// price, discarding any stale tombstones it walks past along the way. Used by
    /// the main pool's eviction path: the returned hash is the newcomer's victim.
    pub fn pop_min_price(&mut self) -> Option<TxHash> {
        loop {
            let key = self.by_price.pop_first()?;
            let Some(m) = self.meta.get(&key.hash) else { continue };
            if m.tombstoned {
                self.stale -= 1;
                self.meta.remove(&key.hash);
                continue
            }
            self.purge(key.hash);
            return Some(key.hash)
        }
    }

    fn purge(&mut self, hash: TxHash) {
        if let Some(m) = self.meta.remove(&hash) {
            self.by_tip.remove(&TipKey { tip: m.tip, nonce: m.nonce, hash });
            if let Some(set) = self.by_sender.get_mut(&m.sender) {
                set.remove(&hash);
                if set.is_empty() {
                    self.by_sender.remove(&m.sender);
                }
            }
        }
    }

    /// Every hash currently indexed for `sender`, live or tombstoned.
    pub fn sender_hashes(&self, sender: Address) -> impl Iterator<Item = TxHash> + '_ {
        self.by_sender.get(&sender).into_iter().flatten().copied()
    }

    /// Fraction of entries that are tombstoned, used to decide whether [`Self::cleanup`]
    /// is worth running.
    pub fn stale_ratio(&self) -> f64 {
        if self.meta.is_empty() {
            0.0
        } else {
            self.stale as f64 / self.meta.len() as f64
        }
    }

    /// Physically drops every tombstoned entry from both trees. The spec calls for
    /// this once `stale_ratio() > 0.5`; callers decide when to invoke it (the main
    /// pool checks after each admission/eviction batch).
    pub fn cleanup(&mut self) {
        if self.stale == 0 {
            return
        }
        let dead: Vec<TxHash> =
            self.meta.iter().filter(|(_, m)| m.tombstoned).map(|(h, _)| *h).collect();
        for hash in dead {
            if let Some(m) = self.meta.remove(&hash) {
                self.by_price.remove(&PriceKey { price: m.price, hash });
                self.by_tip.remove(&TipKey { tip: m.tip, nonce: m.nonce, hash });
                if let Some(set) = self.by_sender.get_mut(&m.sender) {
                    set.remove(&hash);
                    if set.is_empty() {
                        self.by_sender.remove(&m.sender);
                    }
                }
            }
        }
        self.stale = 0;
    }

    /// Recomputes every live entry's cached price/tip against a new base fee and
    /// rebuilds both trees. This is the spec's resolved open question (§9): cached
    /// prices/tips are recomputed eagerly on a base-fee change rather than lazily
    /// re-derived per read, so a subsequent `pop_min_price`/`peek_max_tip` is correct
    /// without the caller threading the base fee through every query.
    pub fn set_base_fee(&mut self, base_fee: Option<u128>) {
        self.base_fee = base_fee;
        self.by_price.clear();
        self.by_tip.clear();

        let hashes: Vec<TxHash> = self.meta.keys().copied().collect();
        for hash in hashes {
            let m = self.meta.get_mut(&hash).expect("hash collected from meta keys");
            if m.tombstoned {
                continue
            }
            m.price = effective_price_raw(m.raw.legacy_priced, m.raw.gas_price_or_cap, m.raw.tip, base_fee);
            m.tip = effective_tip_raw(m.raw.legacy_priced, m.raw.gas_price_or_cap, m.raw.tip, base_fee);
            self.by_price.insert(PriceKey { price: m.price, hash });
            self.by_tip.insert(TipKey { tip: m.tip, nonce: m.nonce, hash });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn hash(n: u8) -> TxHash {
        TxHash::repeat_byte(n)
    }

    #[test]
    fn pop_min_price_returns_cheapest_first() {
        let mut h = PriceHeaps::new(None);
        h.insert(hash(1), addr(1), 0, true, 100, 0);
        h.insert(hash(2), addr(1), 1, true, 50, 0);
        h.insert(hash(3), addr(1), 2, true, 200, 0);

        assert_eq!(h.pop_min_price(), Some(hash(2)));
        assert_eq!(h.pop_min_price(), Some(hash(1)));
        assert_eq!(h.pop_min_price(), Some(hash(3)));
        assert_eq!(h.pop_min_price(), None);
    }

    #[test]
    fn peek_max_tip_breaks_ties_by_lower_nonce() {
        let mut h = PriceHeaps::new(None);
        h.insert(hash(1), addr(1), 5, true, 100, 0);
        h.insert(hash(2), addr(1), 2, true, 100, 0);
        assert_eq!(h.peek_max_tip(), Some(hash(2)));
    }

    #[test]
    fn remove_is_lazy_until_cleanup() {
        let mut h = PriceHeaps::new(None);
        h.insert(hash(1), addr(1), 0, true, 100, 0);
        assert!(h.remove(hash(1)));
        assert_eq!(h.len(), 0);
        assert_eq!(h.total_with_tombstones(), 1);
        h.cleanup();
        assert_eq!(h.total_with_tombstones(), 0);
    }

    #[test]
    fn pop_min_price_skips_tombstones() {
        let mut h = PriceHeaps::new(None);
        h.insert(hash(1), addr(1), 0, true, 10, 0);
        h.insert(hash(2), addr(1), 1, true, 20, 0);
        h.remove(hash(1));
        assert_eq!(h.pop_min_price(), Some(hash(2)));
    }

    #[test]
    fn set_base_fee_recomputes_dynamic_fee_ordering() {
        let mut h = PriceHeaps::new(Some(10));
        // legacy_priced=false, cap=200, tip=50 => price = min(200, base+tip)
        h.insert(hash(1), addr(1), 0, false, 200, 50);
        assert_eq!(h.peek_min_price(), Some(hash(1)));

        h.set_base_fee(Some(1_000));
        // at base_fee=1000, price caps at 200 (cap < base+tip)
        let stored_price = h.meta.get(&hash(1)).unwrap().price;
        assert_eq!(stored_price, 200);
    }

    #[test]
    fn sender_hashes_tracks_all_entries_for_sender() {
        let mut h = PriceHeaps::new(None);
        h.insert(hash(1), addr(1), 0, true, 10, 0);
        h.insert(hash(2), addr(1), 1, true, 20, 0);
        h.insert(hash(3), addr(2), 0, true, 30, 0);
        let mut from_one: Vec<_> = h.sender_hashes(addr(1)).collect();
        from_one.sort();
        let mut expected = vec![hash(1), hash(2)];
        expected.sort();
        assert_eq!(from_one, expected);
        assert_eq!(h.sender_hashes(addr(2)).count(), 1);
    }
}
