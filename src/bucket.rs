//! Per-bucket tree shape and page usage statistics.
//!
//! Bucket statistics are gathered through a [`ForEachBucket`] strategy:
//!
//! - [`EngineBuckets`] opens one read-only transaction on an [`Engine`] and
//!   visits every top-level bucket in the engine's native order.
//! - [`FixedBuckets`] replays a fixed list of `(name, stats)` pairs.
//!
//! Each visited bucket produces 13 gauges labeled
//! `{bucket="<name>",database="<name>"}`. Nested buckets are not visited;
//! their totals only show up through the parent's `bolt_bucket_buckets`
//! and `bolt_bucket_inlined_buckets` gauges.

use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::descriptor::{MetricDescriptor, MetricKind, Observation, Scope};
use crate::engine::{BucketStats, Engine};
use crate::error::Result;

const SUBSYSTEM: &str = "bucket";

/// Strategy for visiting every top-level bucket with its statistics.
pub trait ForEachBucket: Send + Sync {
    /// Call `visit` once per bucket. Stops at, and returns, the first error.
    fn for_each_bucket(&self, visit: &mut dyn FnMut(&str, BucketStats) -> Result<()>)
        -> Result<()>;
}

/// Visits the top-level buckets of an engine inside one read-only transaction.
pub struct EngineBuckets<E> {
    engine: E,
}

impl<E: Engine> EngineBuckets<E> {
    /// Wrap an engine handle.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }
}

impl<E: Engine> ForEachBucket for EngineBuckets<E> {
    fn for_each_bucket(
        &self,
        visit: &mut dyn FnMut(&str, BucketStats) -> Result<()>,
    ) -> Result<()> {
        self.engine.view(&mut |tx| {
            tx.for_each_bucket(&mut |name, bucket| {
                // Only top-level buckets: the engine's iteration offers no
                // stable recursive traversal, and a nested bucket would need
                // a path label to stay unique.
                visit(&bucket_label(name), bucket.stats())
            })
        })
    }
}

/// Render a bucket name as a label value, keeping distinct names distinct.
///
/// UTF-8 names without a backslash are used as-is. Anything else is
/// byte-escaped with [`u8::escape_ascii`], whose output always contains a
/// backslash, so it cannot collide with an unescaped name.
pub fn bucket_label(name: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(name) {
        Ok(s) if !s.contains('\\') => Cow::Borrowed(s),
        _ => Cow::Owned(name.escape_ascii().to_string()),
    }
}

/// Replays a fixed, ordered list of bucket snapshots.
#[derive(Debug, Clone, Default)]
pub struct FixedBuckets {
    buckets: Vec<(String, BucketStats)>,
}

impl FixedBuckets {
    /// Create from `(name, stats)` pairs, visited in the given order.
    pub fn new<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = (S, BucketStats)>,
        S: Into<String>,
    {
        Self {
            buckets: buckets.into_iter().map(|(n, s)| (n.into(), s)).collect(),
        }
    }
}

impl ForEachBucket for FixedBuckets {
    fn for_each_bucket(
        &self,
        visit: &mut dyn FnMut(&str, BucketStats) -> Result<()>,
    ) -> Result<()> {
        for (name, stats) in &self.buckets {
            visit(name, *stats)?;
        }
        Ok(())
    }
}

/// Collector for bucket statistics.
pub struct BucketStatsCollector {
    database: String,
    for_each: Box<dyn ForEachBucket>,

    // === Gauges (tree shape and page usage) ===
    /// Number of logical branch pages
    pub logical_branch_pages: MetricDescriptor,

    /// Number of physical branch overflow pages
    pub physical_branch_overflow_pages: MetricDescriptor,

    /// Number of logical leaf pages
    pub logical_leaf_pages: MetricDescriptor,

    /// Number of physical leaf overflow pages
    pub physical_leaf_overflow_pages: MetricDescriptor,

    /// Number of key/value pairs
    pub keys: MetricDescriptor,

    /// Number of levels in the B+tree
    pub depth: MetricDescriptor,

    /// Bytes allocated in physical branch pages
    pub physical_branch_pages_allocated_bytes: MetricDescriptor,

    /// Bytes in use in physical branch pages
    pub physical_branch_pages_in_use_bytes: MetricDescriptor,

    /// Bytes allocated in physical leaf pages
    pub physical_leaf_pages_allocated_bytes: MetricDescriptor,

    /// Bytes in use in physical leaf pages
    pub physical_leaf_pages_in_use_bytes: MetricDescriptor,

    /// Number of buckets within the bucket, including itself
    pub buckets: MetricDescriptor,

    /// Number of inlined buckets
    pub inlined_buckets: MetricDescriptor,

    /// Bytes in use by inlined buckets
    pub inlined_buckets_in_use_bytes: MetricDescriptor,
}

impl BucketStatsCollector {
    /// Create a collector that visits the top-level buckets of `engine`.
    pub fn new<E: Engine + 'static>(database: impl Into<String>, engine: Arc<E>) -> Self {
        Self::with_strategy(database, EngineBuckets::new(engine))
    }

    /// Create a collector driven by an arbitrary iteration strategy.
    pub fn with_strategy(
        database: impl Into<String>,
        for_each: impl ForEachBucket + 'static,
    ) -> Self {
        let database = database.into();
        let gauge = |name: &str, help: &str| {
            MetricDescriptor::new(
                SUBSYSTEM,
                name,
                help,
                MetricKind::Gauge,
                Scope::Bucket,
                &database,
            )
        };

        Self {
            logical_branch_pages: gauge(
                "logical_branch_pages",
                "Number of logical branch pages for a bucket.",
            ),
            physical_branch_overflow_pages: gauge(
                "physical_branch_overflow_pages",
                "Number of physical branch overflow pages for a bucket.",
            ),
            logical_leaf_pages: gauge(
                "logical_leaf_pages",
                "Number of logical leaf pages for a bucket.",
            ),
            physical_leaf_overflow_pages: gauge(
                "physical_leaf_overflow_pages",
                "Number of physical leaf overflow pages for a bucket.",
            ),
            keys: gauge("keys", "Number of key/value pairs in a bucket."),
            depth: gauge("depth", "Number of levels in B+ tree for a bucket."),
            physical_branch_pages_allocated_bytes: gauge(
                "physical_branch_pages_allocated_bytes",
                "Number of bytes allocated in physical branch pages for a bucket.",
            ),
            physical_branch_pages_in_use_bytes: gauge(
                "physical_branch_pages_in_use_bytes",
                "Number of bytes in use in physical branch pages for a bucket.",
            ),
            physical_leaf_pages_allocated_bytes: gauge(
                "physical_leaf_pages_allocated_bytes",
                "Number of bytes allocated in physical leaf pages for a bucket.",
            ),
            physical_leaf_pages_in_use_bytes: gauge(
                "physical_leaf_pages_in_use_bytes",
                "Number of bytes in use in physical leaf pages for a bucket.",
            ),
            buckets: gauge(
                "buckets",
                "Number of buckets within a bucket, including the top bucket.",
            ),
            inlined_buckets: gauge("inlined_buckets", "Number of inlined buckets for a bucket."),
            inlined_buckets_in_use_bytes: gauge(
                "inlined_buckets_in_use_bytes",
                "Number of bytes in use for inlined buckets.",
            ),

            database,
            for_each: Box::new(for_each),
        }
    }

    /// The database identity attached to every sample.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// All descriptors, in per-bucket emission order.
    pub fn describe(&self) -> Vec<&MetricDescriptor> {
        vec![
            &self.logical_branch_pages,
            &self.physical_branch_overflow_pages,
            &self.logical_leaf_pages,
            &self.physical_leaf_overflow_pages,
            &self.keys,
            &self.depth,
            &self.physical_branch_pages_allocated_bytes,
            &self.physical_branch_pages_in_use_bytes,
            &self.physical_leaf_pages_allocated_bytes,
            &self.physical_leaf_pages_in_use_bytes,
            &self.buckets,
            &self.inlined_buckets,
            &self.inlined_buckets_in_use_bytes,
        ]
    }

    /// Visit every bucket and emit 13 samples for each.
    ///
    /// If iteration fails, samples for buckets already visited are kept and
    /// a single invalid marker, attached to `bolt_bucket_buckets`, is
    /// appended. The error is never propagated.
    pub fn collect(&self) -> Vec<Observation<'_>> {
        let mut observations = Vec::new();
        let mut visited = 0usize;

        let res = self.for_each.for_each_bucket(&mut |bucket, s| {
            let labels = [self.database.as_str(), bucket];
            let values: [(&MetricDescriptor, u64); 13] = [
                (&self.logical_branch_pages, s.branch_page_n),
                (&self.physical_branch_overflow_pages, s.branch_overflow_n),
                (&self.logical_leaf_pages, s.leaf_page_n),
                (&self.physical_leaf_overflow_pages, s.leaf_overflow_n),
                (&self.keys, s.key_n),
                (&self.depth, s.depth),
                (&self.physical_branch_pages_allocated_bytes, s.branch_alloc),
                (&self.physical_branch_pages_in_use_bytes, s.branch_inuse),
                (&self.physical_leaf_pages_allocated_bytes, s.leaf_alloc),
                (&self.physical_leaf_pages_in_use_bytes, s.leaf_inuse),
                (&self.buckets, s.bucket_n),
                (&self.inlined_buckets, s.inline_bucket_n),
                (&self.inlined_buckets_in_use_bytes, s.inline_bucket_inuse),
            ];
            observations.extend(
                values
                    .into_iter()
                    .map(|(desc, v)| desc.sample(v as f64, &labels)),
            );
            visited += 1;
            debug!(database = %self.database, bucket, "collected bucket stats");
            Ok(())
        });

        if let Err(e) = res {
            warn!(%e, database = %self.database, visited, "bucket stats iteration failed");
            observations.push(self.buckets.invalid(e));
        }

        observations
    }
}

impl std::fmt::Debug for BucketStatsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketStatsCollector")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}
