//! The pool's error taxonomy.
//!
//! Every admission rejection maps to exactly one [`PoolErrorKind`]; validation is
//! total and fails fast on the first violated rule (§4.4 of the spec). Errors are
//! returned as-is to the caller — the pool never retries and never panics on
//! malformed input.

use alloy_primitives::{Address, TxHash};
use thiserror::Error;

/// The concrete reason a transaction was rejected, or why a lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolErrorKind {
    /// A transaction with this hash is already in the pool.
    #[error("already known")]
    AlreadyKnown,
    /// `tx.nonce < state.nonce(sender)`.
    #[error("nonce too low")]
    NonceTooLow,
    /// `tx.nonce > state.nonce(sender) + max_nonce_gap`.
    #[error("nonce too high")]
    NonceTooHigh,
    /// `gas_limit` exceeds the block gas limit.
    #[error("gas limit exceeds block gas limit")]
    GasLimit,
    /// Sender's balance is insufficient to cover `tx_cost`.
    #[error("insufficient funds")]
    InsufficientFunds,
    /// `gas_limit` is below the transaction's intrinsic gas.
    #[error("gas limit below intrinsic gas")]
    IntrinsicGas,
    /// The pool is at capacity and no evictable candidate beats the newcomer.
    #[error("pool full")]
    PoolFull,
    /// A negative `value` was observed (representable only through a malformed encoding).
    #[error("negative value")]
    NegativeValue,
    /// Encoded size or calldata length exceeds `max_tx_bytes`.
    #[error("oversized data")]
    OversizedData,
    /// `gas_price` (or effective price, pre-replacement) is below `min_gas_price`.
    #[error("underpriced")]
    Underpriced,
    /// A replacement transaction didn't meet the price-bump requirement.
    #[error("replacement underpriced")]
    ReplacementUnderpriced,
    /// The sender already has `max_per_sender` transactions pooled.
    #[error("sender limit exceeded")]
    SenderLimitExceeded,
    /// `max_fee_per_gas < max_priority_fee_per_gas`.
    #[error("fee cap below tip")]
    FeeCapBelowTip,
    /// `max_fee_per_gas < base_fee` when the base fee is known.
    #[error("fee cap below base fee")]
    FeeCapBelowBaseFee,
    /// A blob transaction without `blob_versioned_hashes`.
    #[error("blob transaction missing blob hashes")]
    BlobMissingHashes,
    /// `max_fee_per_blob_gas < blob_base_fee` when the blob base fee is known.
    #[error("blob fee cap below blob base fee")]
    BlobFeeCapBelowBaseFee,
    /// A negative `gas_price` was observed.
    #[error("negative gas price")]
    NegativeGasPrice,
    /// The transaction's RLP/canonical encoding exceeds protocol limits.
    #[error("oversized rlp")]
    OversizedRlp,
    /// The submitted transaction is not a blob transaction but was routed to the blob pool.
    #[error("not a blob transaction")]
    NotBlobTransaction,
    /// A sidecar was requested for a transaction whose sidecar was evicted under
    /// datacap pressure (metadata-only state) or that is unknown to the pool.
    #[error("sidecar not found")]
    SidecarNotFound
}

/// A rejected-or-failed pool operation, carrying the offending transaction's hash
/// alongside the [`PoolErrorKind`].
#[derive(Debug, Clone, Error)]
#[error("{kind}: {hash}")]
pub struct PoolError {
    /// The hash of the transaction the error pertains to.
    pub hash: TxHash,
    /// The concrete rejection reason.
    pub kind: PoolErrorKind
}

impl PoolError {
    /// Constructs a new error for the given transaction hash.
    pub const fn new(hash: TxHash, kind: PoolErrorKind) -> Self {
        Self { hash, kind }
    }

    /// Returns `true` if this rejection means the transaction could never become
    /// valid, regardless of future state changes (as opposed to e.g. a transient
    /// `PoolFull`).
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self.kind,
            PoolErrorKind::AlreadyKnown
                | PoolErrorKind::NonceTooLow
                | PoolErrorKind::GasLimit
                | PoolErrorKind::IntrinsicGas
                | PoolErrorKind::NegativeValue
                | PoolErrorKind::OversizedData
                | PoolErrorKind::FeeCapBelowTip
                | PoolErrorKind::BlobMissingHashes
                | PoolErrorKind::NegativeGasPrice
                | PoolErrorKind::OversizedRlp
        )
    }
}

/// Convenience alias for fallible pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// An error surfaced by sharded-facade operations that aren't tied to a specific
/// transaction (shard configuration, rebalance).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShardError {
    /// `num_shards == 0`.
    #[error("shard count must be non-zero")]
    ZeroShards,
    /// `num_shards` is not a power of two.
    #[error("shard count must be a power of two, got {0}")]
    NotPowerOfTwo(u32),
    /// `replication_factor > num_shards`.
    #[error("replication factor {replication_factor} exceeds shard count {num_shards}")]
    ReplicationExceedsShards { replication_factor: u32, num_shards: u32 }
}

/// Errors arising from the local transaction journal.
#[derive(Debug, Error)]
pub enum JournalError {
    /// The underlying file could not be opened, read, or written.
    #[error("journal io error: {0}")]
    Io(#[from] std::io::Error),
    /// The journal's temp-file rename during rotation failed.
    #[error("journal rotation failed: {0}")]
    Rotation(std::io::Error)
}

/// A sender address the pool has no record of, surfaced by facade queries.
pub fn unknown_sender(address: Address) -> String {
    format!("no pooled transactions for sender {address}")
}
