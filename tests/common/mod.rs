//! In-memory engine shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::RwLock;
use prometheus::{Encoder, Registry, TextEncoder};
use prombolt::{
    BucketHandle, BucketStats, DatabaseStats, DatabaseStatsSource, Engine, PromboltError,
    ReadTx, Result,
};

/// Engine double with fixed statistics and an optional failure point.
#[derive(Default)]
pub struct MemoryEngine {
    stats: RwLock<DatabaseStats>,
    buckets: RwLock<Vec<(Vec<u8>, BucketStats)>>,
    /// Fail the bucket scan after this many buckets.
    fail_after: RwLock<Option<usize>>,
    /// Number of read transactions opened so far.
    pub views: AtomicUsize,
    /// Track scrapes in flight and stall each engine call.
    slow: AtomicBool,
    /// Scrapes between `stats()` and the end of `view()`.
    in_flight: AtomicUsize,
    /// Set when a scrape started while another was in flight.
    pub overlapped: AtomicBool,
}

impl MemoryEngine {
    pub fn new(stats: DatabaseStats, buckets: Vec<(&str, BucketStats)>) -> Self {
        let engine = Self::default();
        *engine.stats.write() = stats;
        *engine.buckets.write() = buckets
            .into_iter()
            .map(|(n, s)| (n.as_bytes().to_vec(), s))
            .collect();
        engine
    }

    /// Append a bucket with a raw, possibly non-UTF-8, name.
    pub fn push_bucket(&self, name: Vec<u8>, stats: BucketStats) {
        self.buckets.write().push((name, stats));
    }

    pub fn fail_after(&self, n: usize) {
        *self.fail_after.write() = Some(n);
    }

    /// Stall `stats()` and `view()` and record overlapping scrapes.
    ///
    /// A scrape spans one `stats()` call followed by one `view()` call, so
    /// only use this with collectors that pull both from this engine.
    pub fn set_slow(&self) {
        self.slow.store(true, Ordering::SeqCst);
    }

    pub fn set_stats(&self, stats: DatabaseStats) {
        *self.stats.write() = stats;
    }
}

impl DatabaseStatsSource for MemoryEngine {
    fn stats(&self) -> DatabaseStats {
        if self.slow.load(Ordering::SeqCst) {
            if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(1));
        }
        *self.stats.read()
    }
}

struct MemoryBucket(BucketStats);

impl BucketHandle for MemoryBucket {
    fn stats(&self) -> BucketStats {
        self.0
    }
}

struct MemoryTx<'a> {
    buckets: &'a [(Vec<u8>, BucketStats)],
    fail_after: Option<usize>,
}

impl ReadTx for MemoryTx<'_> {
    fn for_each_bucket(
        &self,
        visit: &mut dyn FnMut(&[u8], &dyn BucketHandle) -> Result<()>,
    ) -> Result<()> {
        for (i, (name, s)) in self.buckets.iter().enumerate() {
            if self.fail_after == Some(i) {
                return Err(PromboltError::engine("invalid page type: 0: 4"));
            }
            visit(name, &MemoryBucket(*s))?;
        }
        Ok(())
    }
}

impl Engine for MemoryEngine {
    fn view(&self, f: &mut dyn FnMut(&dyn ReadTx) -> Result<()>) -> Result<()> {
        self.views.fetch_add(1, Ordering::SeqCst);
        let buckets = self.buckets.read();
        let tx = MemoryTx {
            buckets: &buckets,
            fail_after: *self.fail_after.read(),
        };
        let result = f(&tx);

        if self.slow.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        result
    }
}

/// Gather `registry` and render it in the text exposition format.
pub fn render(registry: &Registry) -> String {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .expect("encoding should succeed");
    String::from_utf8(buffer).expect("exposition is utf-8")
}

/// Register `collector` in a fresh registry and render one scrape.
pub fn scrape(collector: prombolt::BoltCollector) -> String {
    let registry = Registry::new();
    registry
        .register(Box::new(collector))
        .expect("registration should succeed");
    render(&registry)
}

pub fn numbered_bucket() -> BucketStats {
    BucketStats {
        branch_page_n: 1,
        branch_overflow_n: 2,
        leaf_page_n: 3,
        leaf_overflow_n: 4,
        key_n: 5,
        depth: 6,
        branch_alloc: 7,
        branch_inuse: 8,
        leaf_alloc: 9,
        leaf_inuse: 10,
        bucket_n: 11,
        inline_bucket_n: 12,
        inline_bucket_inuse: 13,
    }
}

pub fn bucket_lines(bucket: &str, database: &str) -> Vec<String> {
    [
        "logical_branch_pages",
        "physical_branch_overflow_pages",
        "logical_leaf_pages",
        "physical_leaf_overflow_pages",
        "keys",
        "depth",
        "physical_branch_pages_allocated_bytes",
        "physical_branch_pages_in_use_bytes",
        "physical_leaf_pages_allocated_bytes",
        "physical_leaf_pages_in_use_bytes",
        "buckets",
        "inlined_buckets",
        "inlined_buckets_in_use_bytes",
    ]
    .iter()
    .enumerate()
    .map(|(i, m)| {
        format!(
            "bolt_bucket_{}{{bucket=\"{}\",database=\"{}\"}} {}",
            m,
            bucket,
            database,
            i + 1
        )
    })
    .collect()
}
