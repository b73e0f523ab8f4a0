//! Storage engine capabilities consumed by the collectors.
//!
//! The collectors never talk to a concrete engine type. Instead they depend on
//! a small set of capability traits:
//!
//! ```text
//! DatabaseStatsSource ── stats() ──────────────▶ DatabaseStats
//!
//! Engine ── view(f) ──▶ ReadTx ── for_each_bucket(visit) ──▶ (name, &dyn BucketHandle)
//!                                                                  └── stats() ──▶ BucketStats
//! ```
//!
//! A real engine handle implements [`DatabaseStatsSource`] and [`Engine`];
//! tests implement the same traits over fixed in-memory values.

use std::time::Duration;

use crate::error::Result;

/// Database-wide statistics captured at one instant.
///
/// Freelist figures and `open_tx_n` are levels. `tx_n` and every field of
/// [`TxStats`] are lifetime totals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DatabaseStats {
    /// Total number of free pages on the freelist.
    pub free_page_n: u64,
    /// Total number of pending pages on the freelist.
    pub pending_page_n: u64,
    /// Total bytes allocated in free pages.
    pub free_alloc: u64,
    /// Total bytes used by the freelist.
    pub freelist_inuse: u64,
    /// Total number of started read transactions.
    pub tx_n: u64,
    /// Number of currently open read transactions.
    pub open_tx_n: u64,
    /// Global, ongoing transaction statistics.
    pub tx_stats: TxStats,
}

/// Cumulative transaction cost counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TxStats {
    /// Number of page allocations.
    pub page_count: u64,
    /// Total bytes allocated for pages.
    pub page_alloc: u64,
    /// Number of cursors created.
    pub cursor_count: u64,
    /// Number of node allocations.
    pub node_count: u64,
    /// Number of node dereferences.
    pub node_deref: u64,
    /// Number of node rebalances.
    pub rebalance: u64,
    /// Total time spent rebalancing.
    pub rebalance_time: Duration,
    /// Number of nodes split.
    pub split: u64,
    /// Number of nodes spilled.
    pub spill: u64,
    /// Total time spent spilling.
    pub spill_time: Duration,
    /// Number of writes performed.
    pub write: u64,
    /// Total time spent writing to disk.
    pub write_time: Duration,
}

/// Tree shape and page usage of a single bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BucketStats {
    /// Number of logical branch pages.
    pub branch_page_n: u64,
    /// Number of physical branch overflow pages.
    pub branch_overflow_n: u64,
    /// Number of logical leaf pages.
    pub leaf_page_n: u64,
    /// Number of physical leaf overflow pages.
    pub leaf_overflow_n: u64,
    /// Number of key/value pairs.
    pub key_n: u64,
    /// Number of levels in the B+tree.
    pub depth: u64,
    /// Bytes allocated for physical branch pages.
    pub branch_alloc: u64,
    /// Bytes actually used for branch data.
    pub branch_inuse: u64,
    /// Bytes allocated for physical leaf pages.
    pub leaf_alloc: u64,
    /// Bytes actually used for leaf data.
    pub leaf_inuse: u64,
    /// Number of buckets within this bucket, including itself.
    pub bucket_n: u64,
    /// Number of inlined buckets.
    pub inline_bucket_n: u64,
    /// Bytes used for inlined buckets.
    pub inline_bucket_inuse: u64,
}

/// Anything that can produce a [`DatabaseStats`] snapshot.
///
/// Pulling statistics must not mutate engine state. Engine handles are owned
/// by the caller; an implementation that cannot produce statistics (e.g. a
/// closed handle) is expected to panic rather than return stale values.
pub trait DatabaseStatsSource: Send + Sync {
    /// Return the current database statistics.
    fn stats(&self) -> DatabaseStats;
}

/// A bucket visited inside a read-only transaction.
pub trait BucketHandle {
    /// Compute statistics for this bucket.
    fn stats(&self) -> BucketStats;
}

/// A read-only transaction.
pub trait ReadTx {
    /// Call `visit` for every top-level bucket, in the engine's native order.
    ///
    /// Iteration stops at the first error returned by `visit`, and that
    /// error is returned.
    fn for_each_bucket(
        &self,
        visit: &mut dyn FnMut(&[u8], &dyn BucketHandle) -> Result<()>,
    ) -> Result<()>;
}

/// An engine that can run closures inside read-only transactions.
pub trait Engine: Send + Sync {
    /// Run `f` inside a read-only transaction.
    ///
    /// Returns an error if the transaction cannot be opened, or whatever
    /// error `f` returns.
    fn view(&self, f: &mut dyn FnMut(&dyn ReadTx) -> Result<()>) -> Result<()>;
}

impl<T: DatabaseStatsSource + ?Sized> DatabaseStatsSource for std::sync::Arc<T> {
    fn stats(&self) -> DatabaseStats {
        (**self).stats()
    }
}

impl<T: Engine + ?Sized> Engine for std::sync::Arc<T> {
    fn view(&self, f: &mut dyn FnMut(&dyn ReadTx) -> Result<()>) -> Result<()> {
        (**self).view(f)
    }
}
