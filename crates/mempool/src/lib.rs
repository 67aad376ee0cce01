//! In-memory admission, ordering, replacement and eviction engine for a blockchain
//! node's transaction pool.
//!
//! The pool is split across a handful of focused modules rather than one large
//! type: [`transaction`] defines the generic transaction abstraction everything else
//! builds on; [`fees`] is the pure fee arithmetic shared by admission, eviction and
//! block building; [`account`] keeps one sender's transactions nonce-ordered;
//! [`heap`] is the dual price/tip index used for eviction and for recomputing
//! ordering on a base-fee change; [`pool`] is the main pending/queued pool;
//! [`blobpool`] is the separately-capacity-managed EIP-4844 blob pool; [`oracle`] is
//! the fee-history oracle; [`shard`] is the horizontally-sharded facade over
//! [`pool::TxPool`]; and [`journal`] is the durable log of locally-submitted
//! transactions.
//!
//! None of this crate concerns itself with how transactions reach the pool (p2p
//! gossip, RPC submission) or how they leave it (block building is exposed only as
//! an ordered iterator, not a full builder) — see each module's Non-goals in its own
//! doc comment for what's deliberately out of scope.
//!
//! [`test_utils`] (behind the `test-utils` feature) provides `MockTransaction`/
//! `MockTransactionFactory` fixtures for building transactions in tests without
//! populating every field of [`EthPooledTransaction`] by hand.

#![warn(missing_debug_implementations, missing_docs, unreachable_pub)]

pub mod account;
pub mod blobpool;
pub mod error;
pub mod fees;
pub mod heap;
pub mod journal;
pub mod oracle;
pub mod pool;
pub mod shard;
pub mod state;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transaction;

pub use error::{PoolError, PoolErrorKind, PoolResult};
pub use pool::{BlockInfo, PoolConfig, PoolSize, TxPool};
pub use state::StateReader;
pub use transaction::{AccessListEntry, BlobSidecar, EthPooledTransaction, PoolTransaction, TxHandle, TxKind, ValidPoolTransaction};
