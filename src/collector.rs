//! The composite collector registered with Prometheus.
//!
//! [`BoltCollector`] owns a [`DatabaseStatsCollector`] and a
//! [`BucketStatsCollector`] for one database and exposes them as a single
//! describe/collect unit. A mutex serializes scrapes: a second scrape blocks
//! until the first has finished both engine round-trips.
//!
//! # Example
//!
//! ```ignore
//! use prometheus::{Encoder, Registry, TextEncoder};
//! use prombolt::BoltCollector;
//!
//! let registry = Registry::new();
//! registry.register(Box::new(BoltCollector::new("app.db", engine.clone())))?;
//!
//! let mut buffer = Vec::new();
//! TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
//! ```
//!
//! # Invalid metrics
//!
//! The Prometheus exposition has no invalid-metric line, so a failed bucket
//! scan is exported as
//! `bolt_scrape_error{database="..",error="..",metric="bolt_bucket_buckets"} 1`
//! alongside the samples collected before the failure.

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::core::{Collector, Desc, Describer, Opts};
use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};
use tracing::debug;

use crate::bucket::{BucketStatsCollector, ForEachBucket};
use crate::descriptor::{
    metric_families, InvalidMetric, MetricDescriptor, Observation, DATABASE_LABEL, NAMESPACE,
};
use crate::engine::{DatabaseStatsSource, Engine};
use crate::stats::DatabaseStatsCollector;

const SCRAPE_ERROR: &str = "scrape_error";
const SCRAPE_ERROR_HELP: &str =
    "Set to 1 for each statistics pull that failed during this scrape.";

/// Prometheus collector for one bolt-style database.
///
/// Cloning is cheap and clones share the same lock, so one clone can be
/// registered while another is scraped directly.
#[derive(Clone)]
pub struct BoltCollector {
    inner: Arc<Inner>,
}

struct Inner {
    mu: Mutex<()>,
    stats: DatabaseStatsCollector,
    buckets: BucketStatsCollector,
    scrape_error: Desc,
}

impl BoltCollector {
    /// Create a collector for `engine`, labeling every metric with `database`.
    ///
    /// `database` must be unique among collectors sharing a registry.
    pub fn new<E>(database: impl Into<String>, engine: Arc<E>) -> Self
    where
        E: DatabaseStatsSource + Engine + 'static,
    {
        let database = database.into();
        let stats = DatabaseStatsCollector::new(database.clone(), engine.clone());
        let buckets = BucketStatsCollector::new(database, engine);
        Self::from_parts(stats, buckets)
    }

    /// Create a collector with an explicit bucket iteration strategy.
    pub fn with_strategy(
        database: impl Into<String>,
        source: Arc<dyn DatabaseStatsSource>,
        for_each: impl ForEachBucket + 'static,
    ) -> Self {
        let database = database.into();
        let stats = DatabaseStatsCollector::new(database.clone(), source);
        let buckets = BucketStatsCollector::with_strategy(database, for_each);
        Self::from_parts(stats, buckets)
    }

    fn from_parts(stats: DatabaseStatsCollector, buckets: BucketStatsCollector) -> Self {
        debug_assert_eq!(stats.database(), buckets.database());

        let scrape_error = Opts::new(SCRAPE_ERROR, SCRAPE_ERROR_HELP)
            .namespace(NAMESPACE)
            .const_label(DATABASE_LABEL, stats.database())
            .variable_labels(vec!["metric".to_string(), "error".to_string()])
            .describe()
            .expect("metric descriptor should be valid");

        Self {
            inner: Arc::new(Inner {
                mu: Mutex::new(()),
                stats,
                buckets,
                scrape_error,
            }),
        }
    }

    /// The database identity attached to every metric.
    pub fn database(&self) -> &str {
        self.inner.stats.database()
    }

    /// Database descriptors followed by bucket descriptors.
    pub fn describe(&self) -> Vec<&MetricDescriptor> {
        let _guard = self.inner.mu.lock();

        let mut descs = self.inner.stats.describe();
        descs.extend(self.inner.buckets.describe());
        descs
    }

    /// Run one scrape: database stats first, then bucket stats.
    ///
    /// The two pulls are not taken in one engine transaction; they only share
    /// the scrape pass.
    pub fn collect(&self) -> Vec<Observation<'_>> {
        let _guard = self.inner.mu.lock();

        let mut observations = self.inner.stats.collect();
        observations.extend(self.inner.buckets.collect());

        debug!(
            database = %self.database(),
            observations = observations.len(),
            "scrape complete"
        );
        observations
    }

    fn scrape_error_family<'a, I>(&self, errors: I) -> Option<MetricFamily>
    where
        I: IntoIterator<Item = &'a InvalidMetric<'a>>,
    {
        let mut mf = MetricFamily::default();
        mf.set_name(self.inner.scrape_error.fq_name.clone());
        mf.set_help(self.inner.scrape_error.help.clone());
        mf.set_field_type(MetricType::GAUGE);

        for inv in errors {
            let mut metric = proto::Metric::default();
            // Sorted by label name.
            for (name, value) in [
                (DATABASE_LABEL, self.database()),
                ("error", inv.error()),
                ("metric", inv.descriptor().fq_name()),
            ] {
                let mut lp = LabelPair::default();
                lp.set_name(name.to_string());
                lp.set_value(value.to_string());
                metric.mut_label().push(lp);
            }
            let mut g = proto::Gauge::default();
            g.set_value(1.0);
            metric.set_gauge(g);
            mf.mut_metric().push(metric);
        }

        if mf.get_metric().is_empty() {
            None
        } else {
            Some(mf)
        }
    }
}

impl Collector for BoltCollector {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs: Vec<&Desc> = self
            .describe()
            .into_iter()
            .map(MetricDescriptor::desc)
            .collect();
        descs.push(&self.inner.scrape_error);
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let observations = BoltCollector::collect(self);

        let mut families = metric_families(&observations);
        let errors = observations.iter().filter_map(|o| match o {
            Observation::Invalid(inv) => Some(inv),
            Observation::Sample(_) => None,
        });
        families.extend(self.scrape_error_family(errors));
        families
    }
}

impl std::fmt::Debug for BoltCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoltCollector")
            .field("database", &self.database())
            .finish()
    }
}
