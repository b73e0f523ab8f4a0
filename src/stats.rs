//! Database-wide freelist and transaction statistics.
//!
//! Every scrape pulls exactly one [`DatabaseStats`] snapshot and emits one
//! sample per descriptor, all labeled `{database="<name>"}`.
//!
//! ## Gauges
//!
//! - `bolt_db_freelist_free_pages`
//! - `bolt_db_freelist_pending_pages`
//! - `bolt_db_freelist_free_page_allocated_bytes`
//! - `bolt_db_freelist_in_use_bytes`
//! - `bolt_db_open_read_tx`
//!
//! ## Counters
//!
//! - `bolt_db_read_tx_total`
//! - `bolt_tx_*_total`, including the three `*_seconds_total` timing counters

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::descriptor::{MetricDescriptor, MetricKind, Observation, Scope};
use crate::engine::DatabaseStatsSource;

const DB_SUBSYSTEM: &str = "db";
const TX_SUBSYSTEM: &str = "tx";

/// Collector for database and transaction statistics.
pub struct DatabaseStatsCollector {
    database: String,
    source: Arc<dyn DatabaseStatsSource>,

    // === Freelist and read transactions ===
    /// Free pages in the freelist
    pub freelist_free_pages: MetricDescriptor,
    /// Pending pages in the freelist
    pub freelist_pending_pages: MetricDescriptor,
    /// Bytes allocated in free pages
    pub freelist_free_page_allocated_bytes: MetricDescriptor,
    /// Bytes used by the freelist
    pub freelist_in_use_bytes: MetricDescriptor,
    /// Read transactions started
    pub read_tx_total: MetricDescriptor,
    /// Read transactions currently open
    pub open_read_tx: MetricDescriptor,

    // === Transaction cost ===
    /// Page allocations
    pub tx_pages_allocated_total: MetricDescriptor,
    /// Bytes allocated for pages
    pub tx_pages_allocated_bytes_total: MetricDescriptor,
    /// Cursors created
    pub tx_cursors_total: MetricDescriptor,
    /// Node allocations
    pub tx_nodes_allocated_total: MetricDescriptor,
    /// Node dereferences
    pub tx_nodes_dereferenced_total: MetricDescriptor,
    /// Node rebalances
    pub tx_node_rebalances_total: MetricDescriptor,
    /// Time spent rebalancing, in seconds
    pub tx_node_rebalance_seconds_total: MetricDescriptor,
    /// Nodes split
    pub tx_nodes_split_total: MetricDescriptor,
    /// Nodes spilled
    pub tx_nodes_spilled_total: MetricDescriptor,
    /// Time spent spilling, in seconds
    pub tx_nodes_spilled_seconds_total: MetricDescriptor,
    /// Writes performed
    pub tx_writes_total: MetricDescriptor,
    /// Time spent writing to disk, in seconds
    pub tx_write_seconds_total: MetricDescriptor,
}

impl DatabaseStatsCollector {
    /// Create a collector labeling every metric with `database`.
    pub fn new(database: impl Into<String>, source: Arc<dyn DatabaseStatsSource>) -> Self {
        let database = database.into();
        let db = |name: &str, help: &str, kind: MetricKind| {
            MetricDescriptor::new(DB_SUBSYSTEM, name, help, kind, Scope::Database, &database)
        };
        let tx = |name: &str, help: &str| {
            MetricDescriptor::new(
                TX_SUBSYSTEM,
                name,
                help,
                MetricKind::Counter,
                Scope::Database,
                &database,
            )
        };

        Self {
            freelist_free_pages: db(
                "freelist_free_pages",
                "Number of free pages on the freelist.",
                MetricKind::Gauge,
            ),
            freelist_pending_pages: db(
                "freelist_pending_pages",
                "Number of pending pages on the freelist.",
                MetricKind::Gauge,
            ),
            freelist_free_page_allocated_bytes: db(
                "freelist_free_page_allocated_bytes",
                "Number of bytes allocated in free pages on the freelist.",
                MetricKind::Gauge,
            ),
            freelist_in_use_bytes: db(
                "freelist_in_use_bytes",
                "Number of bytes in use by the freelist.",
                MetricKind::Gauge,
            ),
            read_tx_total: db(
                "read_tx_total",
                "Total number of started read transactions for the database.",
                MetricKind::Counter,
            ),
            open_read_tx: db(
                "open_read_tx",
                "Number of currently open read-only transactions for the database.",
                MetricKind::Gauge,
            ),

            tx_pages_allocated_total: tx(
                "pages_allocated_total",
                "Total number of transaction page allocations.",
            ),
            tx_pages_allocated_bytes_total: tx(
                "pages_allocated_bytes_total",
                "Total number of bytes allocated for transaction pages.",
            ),
            tx_cursors_total: tx(
                "cursors_total",
                "Total number of cursors created by transactions.",
            ),
            tx_nodes_allocated_total: tx(
                "nodes_allocated_total",
                "Total number of nodes allocated by transactions.",
            ),
            tx_nodes_dereferenced_total: tx(
                "nodes_dereferenced_total",
                "Total number of nodes dereferenced by transactions.",
            ),
            tx_node_rebalances_total: tx(
                "node_rebalances_total",
                "Total number of node rebalances by transactions.",
            ),
            tx_node_rebalance_seconds_total: tx(
                "node_rebalance_seconds_total",
                "Total amount of time in seconds spent rebalancing nodes by transactions.",
            ),
            tx_nodes_split_total: tx(
                "nodes_split_total",
                "Total number of nodes split by transactions.",
            ),
            tx_nodes_spilled_total: tx(
                "nodes_spilled_total",
                "Total number of nodes spilled by transactions.",
            ),
            tx_nodes_spilled_seconds_total: tx(
                "nodes_spilled_seconds_total",
                "Total amount of time in seconds spent spilling nodes by transactions.",
            ),
            tx_writes_total: tx(
                "writes_total",
                "Total number of writes to disk performed by transactions.",
            ),
            tx_write_seconds_total: tx(
                "write_seconds_total",
                "Total amount of time in seconds spent writing to disk by transactions.",
            ),

            database,
            source,
        }
    }

    /// The database identity attached to every sample.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// All descriptors, in emission order.
    pub fn describe(&self) -> Vec<&MetricDescriptor> {
        vec![
            &self.freelist_free_pages,
            &self.freelist_pending_pages,
            &self.freelist_free_page_allocated_bytes,
            &self.freelist_in_use_bytes,
            &self.read_tx_total,
            &self.open_read_tx,
            &self.tx_pages_allocated_total,
            &self.tx_pages_allocated_bytes_total,
            &self.tx_cursors_total,
            &self.tx_nodes_allocated_total,
            &self.tx_nodes_dereferenced_total,
            &self.tx_node_rebalances_total,
            &self.tx_node_rebalance_seconds_total,
            &self.tx_nodes_split_total,
            &self.tx_nodes_spilled_total,
            &self.tx_nodes_spilled_seconds_total,
            &self.tx_writes_total,
            &self.tx_write_seconds_total,
        ]
    }

    /// Pull one snapshot and emit one sample per descriptor.
    pub fn collect(&self) -> Vec<Observation<'_>> {
        let s = self.source.stats();
        let t = &s.tx_stats;
        let labels = [self.database.as_str()];

        let values: [(&MetricDescriptor, f64); 18] = [
            (&self.freelist_free_pages, s.free_page_n as f64),
            (&self.freelist_pending_pages, s.pending_page_n as f64),
            (&self.freelist_free_page_allocated_bytes, s.free_alloc as f64),
            (&self.freelist_in_use_bytes, s.freelist_inuse as f64),
            (&self.read_tx_total, s.tx_n as f64),
            (&self.open_read_tx, s.open_tx_n as f64),
            (&self.tx_pages_allocated_total, t.page_count as f64),
            (&self.tx_pages_allocated_bytes_total, t.page_alloc as f64),
            (&self.tx_cursors_total, t.cursor_count as f64),
            (&self.tx_nodes_allocated_total, t.node_count as f64),
            (&self.tx_nodes_dereferenced_total, t.node_deref as f64),
            (&self.tx_node_rebalances_total, t.rebalance as f64),
            (&self.tx_node_rebalance_seconds_total, seconds(t.rebalance_time)),
            (&self.tx_nodes_split_total, t.split as f64),
            (&self.tx_nodes_spilled_total, t.spill as f64),
            (&self.tx_nodes_spilled_seconds_total, seconds(t.spill_time)),
            (&self.tx_writes_total, t.write as f64),
            (&self.tx_write_seconds_total, seconds(t.write_time)),
        ];

        let observations: Vec<_> = values
            .into_iter()
            .map(|(desc, value)| desc.sample(value, &labels))
            .collect();

        debug!(
            database = %self.database,
            observations = observations.len(),
            "collected database stats"
        );
        observations
    }
}

/// Timing counters are exported in fractional seconds.
fn seconds(d: Duration) -> f64 {
    d.as_secs_f64()
}

impl std::fmt::Debug for DatabaseStatsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseStatsCollector")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}
