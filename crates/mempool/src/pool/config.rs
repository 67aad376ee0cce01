//! Tunables for the main pool (C4): capacity limits, the replacement price bump, and
//! the nonce-gap tolerance that bounds how far a `queued` transaction may sit ahead of
//! the account's current nonce before it's rejected outright rather than parked.

/// Configuration for [`super::TxPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of transactions held across all senders, pending and queued.
    pub max_total: usize,
    /// Maximum number of transactions a single sender may have pooled at once.
    pub max_per_sender: usize,
    /// Floor below which a transaction's effective price is rejected outright,
    /// independent of replacement/eviction (protects against spam at the admission
    /// boundary rather than relying purely on capacity pressure).
    pub min_gas_price: u128,
    /// The current block's gas limit; `gas_limit` above this is rejected unconditionally
    /// since the transaction could never fit in any block.
    pub block_gas_limit: u64,
    /// Largest `tx.nonce - state.nonce(sender)` tolerated before `NonceTooHigh`.
    pub max_nonce_gap: u64,
    /// Minimum percentage by which a replacement's effective price (and, for
    /// dynamic-fee transactions, its tip) must exceed the transaction it replaces.
    pub price_bump_percent: u32,
    /// Maximum encoded size of a single transaction.
    pub max_tx_bytes: usize
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: 10_000,
            max_per_sender: 16,
            min_gas_price: 1,
            block_gas_limit: 30_000_000,
            max_nonce_gap: 64,
            price_bump_percent: 10,
            max_tx_bytes: 128 * 1024
        }
    }
}
