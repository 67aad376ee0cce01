//! Fee oracle (C6): a rolling window of recent blocks' fee statistics, used to
//! recommend a gas price/tip for a new transaction and to project the next block's
//! base fee before it's known.
//!
//! The window is a fixed-capacity circular buffer rather than an unbounded `Vec` —
//! the oracle only ever needs the last `window_size` blocks, so a `VecDeque` with a
//! capacity cap gives O(1) push-and-evict without a separate pruning pass. Grounded
//! on reth's `GasPriceOracle` and its `eth_feeHistory` companion: both mine a
//! sliding window of historical blocks rather than maintaining a live fee-market
//! model, and both expose percentile sampling as the central primitive.

use std::collections::VecDeque;

/// Reward percentiles sampled into [`FeeHistoryEntry::tip_percentiles`], matching
/// the shape of `eth_feeHistory`'s `rewardPercentiles` in common Ethereum clients.
pub const DEFAULT_REWARD_PERCENTILES: &[u8] = &[10, 25, 50, 75, 90];

/// Tunables for [`FeeOracle`].
#[derive(Debug, Clone)]
pub struct FeeOracleConfig {
    /// Number of blocks retained in the rolling window.
    pub window_size: usize,
    /// Percentile used by [`FeeOracle::suggest_tip_cap`].
    pub percentile_tip: u8,
    /// Percentile used by [`FeeOracle::suggest_gas_price`].
    pub percentile_price: u8,
    /// Samples strictly below this value are discarded before percentile sampling,
    /// so a handful of near-zero-tip transactions (e.g. same-block arbitrage) don't
    /// drag the suggested tip down.
    pub ignore_price: u128,
    /// Floor applied to [`FeeOracle::suggest_tip_cap`]'s result.
    pub min_tip: u128,
    /// Floor applied to [`FeeOracle::suggest_gas_price`]'s result.
    pub min_base_fee: u128,
    /// Fraction of `gas_limit` treated as the EIP-1559 gas target, e.g. `0.5`.
    pub target_gas_fraction: f64,
    /// The EIP-1559 base-fee adjustment denominator: base fee moves by at most
    /// `1/base_fee_max_change_denominator` of its value per block.
    pub base_fee_max_change_denominator: u128,
    /// Lower percentile tier reported by [`FeeOracle::recommend`]'s `slow` fields.
    pub slow_percentile: u8,
    /// Upper percentile tier reported by [`FeeOracle::recommend`]'s `fast` fields.
    pub fast_percentile: u8
}

impl Default for FeeOracleConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            percentile_tip: 60,
            percentile_price: 60,
            ignore_price: 0,
            min_tip: 0,
            min_base_fee: 0,
            target_gas_fraction: 0.5,
            base_fee_max_change_denominator: 8,
            slow_percentile: 25,
            fast_percentile: 90
        }
    }
}

/// One block's worth of fee data sampled into the oracle.
#[derive(Debug, Clone)]
pub struct FeeRecord {
    /// The block number this record was sampled from.
    pub block_number: u64,
    /// The block's base fee, if EIP-1559 is active.
    pub base_fee: Option<u128>,
    /// Gas used by the block.
    pub gas_used: u64,
    /// Gas limit of the block (used to project the next base fee).
    pub gas_limit: u64,
    /// Effective tips paid by the block's transactions, used for percentile
    /// sampling. Sorted ascending by [`FeeOracle::add_block`].
    pub tips: Vec<u128>,
    /// Effective legacy-style gas prices (`base_fee + tip`) paid by the block's
    /// transactions. Sorted ascending by [`FeeOracle::add_block`].
    pub gas_prices: Vec<u128>
}

/// A percentile-tier fee recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRecommendation {
    /// The most recently observed base fee, `0` if none has been recorded.
    pub base_fee: u128,
    /// The projected next block's base fee; equals `base_fee` if it can't be
    /// projected (empty window).
    pub next_base_fee: u128,
    /// Tip at [`FeeOracleConfig::slow_percentile`].
    pub slow_tip: u128,
    /// Tip at [`FeeOracleConfig::percentile_tip`].
    pub medium_tip: u128,
    /// Tip at [`FeeOracleConfig::fast_percentile`].
    pub fast_tip: u128,
    /// `next_base_fee + slow_tip`.
    pub slow_fee: u128,
    /// `next_base_fee + medium_tip`.
    pub medium_fee: u128,
    /// `next_base_fee + fast_tip`.
    pub fast_fee: u128
}

/// One entry of [`FeeOracle::fee_history`].
#[derive(Debug, Clone)]
pub struct FeeHistoryEntry {
    /// The block number.
    pub number: u64,
    /// The block's base fee.
    pub base_fee: Option<u128>,
    /// `gas_used / gas_limit`, as a fraction in `[0, 1]`.
    pub gas_used_pct: f64,
    /// Tip percentiles sampled at [`DEFAULT_REWARD_PERCENTILES`], parallel to it.
    pub tip_percentiles: Vec<u128>
}

/// A rolling window of recent block fee statistics.
#[derive(Debug)]
pub struct FeeOracle {
    config: FeeOracleConfig,
    records: VecDeque<FeeRecord>
}

impl FeeOracle {
    /// An empty oracle retaining at most `config.window_size` blocks.
    pub fn new(config: FeeOracleConfig) -> Self {
        let capacity = config.window_size.max(1);
        Self { config, records: VecDeque::with_capacity(capacity) }
    }

    /// Number of blocks currently retained.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the oracle has observed any blocks yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Samples a new block's fee data, evicting the oldest record if the window is
    /// already full.
    pub fn add_block(&mut self, mut record: FeeRecord) {
        record.tips.sort_unstable();
        record.gas_prices.sort_unstable();
        if self.records.len() == self.config.window_size.max(1) {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The most recent `n` blocks' fee data, oldest first.
    pub fn fee_history(&self, n: usize) -> Vec<FeeHistoryEntry> {
        let skip = self.records.len().saturating_sub(n);
        self.records
            .iter()
            .skip(skip)
            .map(|r| FeeHistoryEntry {
                number: r.block_number,
                base_fee: r.base_fee,
                gas_used_pct: if r.gas_limit == 0 { 0.0 } else { r.gas_used as f64 / r.gas_limit as f64 },
                tip_percentiles: DEFAULT_REWARD_PERCENTILES.iter().map(|&p| percentile(&r.tips, p)).collect()
            })
            .collect()
    }

    /// Every tip sampled across the window, ascending, with samples below
    /// `ignore_price` discarded.
    fn pooled_tips(&self) -> Vec<u128> {
        let mut pooled: Vec<u128> =
            self.records.iter().flat_map(|r| r.tips.iter().copied()).filter(|&t| t >= self.config.ignore_price).collect();
        pooled.sort_unstable();
        pooled
    }

    /// Every gas price sampled across the window, ascending, with samples below
    /// `ignore_price` discarded.
    fn pooled_gas_prices(&self) -> Vec<u128> {
        let mut pooled: Vec<u128> =
            self.records.iter().flat_map(|r| r.gas_prices.iter().copied()).filter(|&p| p >= self.config.ignore_price).collect();
        pooled.sort_unstable();
        pooled
    }

    /// A tip suggestion at `config.percentile_tip` across every tip sampled in the
    /// window, pooled together rather than averaged per-block, floored at
    /// `config.min_tip`.
    pub fn suggest_tip_cap(&self) -> u128 {
        percentile(&self.pooled_tips(), self.config.percentile_tip).max(self.config.min_tip)
    }

    /// A legacy `gas_price` suggestion at `config.percentile_price` across every
    /// gas price sampled in the window, floored at `config.min_base_fee`.
    pub fn suggest_gas_price(&self) -> u128 {
        percentile(&self.pooled_gas_prices(), self.config.percentile_price).max(self.config.min_base_fee)
    }

    /// Projects the next block's base fee from the most recent block's base fee and
    /// gas usage, per EIP-1559: usage above the gas target raises it, below lowers
    /// it, proportional to the deviation and bounded to
    /// `1/base_fee_max_change_denominator` per block. Returns `None` if the oracle
    /// hasn't observed a block with a base fee yet.
    pub fn estimate_next_base_fee(&self) -> Option<u128> {
        let last = self.records.back()?;
        let base_fee = last.base_fee?;
        let gas_target = (last.gas_limit as f64 * self.config.target_gas_fraction) as u64;
        if gas_target == 0 {
            return Some(base_fee)
        }

        if last.gas_used == gas_target {
            return Some(base_fee)
        }

        let denominator = self.config.base_fee_max_change_denominator.max(1);
        if last.gas_used > gas_target {
            let gas_used_delta = last.gas_used - gas_target;
            let base_fee_delta = (base_fee * gas_used_delta as u128 / gas_target as u128 / denominator).max(1);
            Some(base_fee.saturating_add(base_fee_delta))
        } else {
            let gas_used_delta = gas_target - last.gas_used;
            let base_fee_delta = base_fee * gas_used_delta as u128 / gas_target as u128 / denominator;
            Some(base_fee.saturating_sub(base_fee_delta))
        }
    }

    /// Slow/medium/fast tip and composite-fee recommendation. Guaranteed
    /// `slow <= medium <= fast` for both tips and fees, since all three are
    /// percentiles of the same sorted sample and fees only add a constant offset.
    pub fn recommend(&self) -> FeeRecommendation {
        let base_fee = self.records.back().and_then(|r| r.base_fee).unwrap_or(0);
        let next_base_fee = self.estimate_next_base_fee().unwrap_or(base_fee);

        let tips = self.pooled_tips();
        let slow_tip = percentile(&tips, self.config.slow_percentile).max(self.config.min_tip);
        let medium_tip = percentile(&tips, self.config.percentile_tip).max(self.config.min_tip);
        let fast_tip = percentile(&tips, self.config.fast_percentile).max(self.config.min_tip);

        FeeRecommendation {
            base_fee,
            next_base_fee,
            slow_tip,
            medium_tip,
            fast_tip,
            slow_fee: next_base_fee.saturating_add(slow_tip),
            medium_fee: next_base_fee.saturating_add(medium_tip),
            fast_fee: next_base_fee.saturating_add(fast_tip)
        }
    }
}

/// Nearest-rank percentile of an arbitrary slice, sorted ascending internally if
/// needed; `sorted` is expected pre-sorted by the caller for the common case where
/// it already is. Returns `0` for an empty slice. `p=0` yields the minimum, `p=100`
/// the maximum, `p=50` the median (0-indexed nearest-rank selection).
pub fn percentile(sorted: &[u128], p: u8) -> u128 {
    if sorted.is_empty() {
        return 0
    }
    let p = p.min(100) as usize;
    let idx = (sorted.len() - 1) * p / 100;
    sorted[idx]
}
