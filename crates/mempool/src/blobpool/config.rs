//! Tunables for the blob pool (C5).

/// Configuration for [`super::BlobPool`].
#[derive(Debug, Clone)]
pub struct BlobPoolConfig {
    /// Maximum number of blob transactions held across all senders.
    pub max_blob_txs: usize,
    /// Maximum number of blob transactions a single sender may have pooled at once.
    pub max_per_account: usize,
    /// Minimum percentage by which a replacement's blob-effective tip must exceed
    /// the transaction it replaces. Blob transactions carry a much steeper bump
    /// than the main pool's since a replacement also discards an already-propagated
    /// sidecar.
    pub price_bump_percent: u32,
    /// Total sidecar bytes the blob pool will hold before pruning the
    /// lowest-tip sidecars (metadata is kept; only the sidecar payload is dropped).
    pub datacap_bytes: usize,
    /// Per-transaction ceiling on a single (post-custody-filter) sidecar's byte
    /// size, checked at admission independent of the aggregate datacap — a single
    /// oversized sidecar is rejected outright rather than being allowed in and
    /// immediately pruned back out.
    pub max_sidecar_bytes: usize,
    /// Tip below which a blob transaction is a preferred datacap-pruning victim.
    /// The pool always prunes the globally lowest-tip sidecar first (§4.5), which
    /// already honors this preference by construction; the threshold is exposed
    /// as a tunable for callers that want to reason about "cheap enough to evict"
    /// independent of the exact ranking.
    pub eviction_tip_threshold: u128
}

impl Default for BlobPoolConfig {
    fn default() -> Self {
        Self {
            max_blob_txs: 256,
            max_per_account: 16,
            price_bump_percent: 100,
            datacap_bytes: 2_684_354_560, // ~2.5 GiB
            max_sidecar_bytes: 131_072 * 6, // 6 max-size blobs' worth of cell data
            eviction_tip_threshold: 1
        }
    }
}
