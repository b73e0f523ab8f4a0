//! # prombolt
//!
//! **Prometheus metrics for bolt-style storage engines**
//!
//! A pull-based collector exposing the runtime statistics of an embedded,
//! copy-on-write B+tree storage engine: page allocation, freelist pressure,
//! transaction cost and per-bucket tree shape.
//!
//! ## Features
//!
//! - **Database scope**: 18 freelist, read transaction and transaction cost metrics
//! - **Bucket scope**: 13 tree shape and page usage gauges per top-level bucket
//! - **Fresh snapshots**: statistics are pulled from the engine on every scrape
//! - **Scrape serialization**: concurrent scrapes of one collector never interleave
//! - **Partial failure**: a failed bucket scan is reported, never fails the scrape
//! - **Flexible Configuration**: Configure via files (TOML/YAML/JSON), environment variables, or code
//!
//! ## Quick Start
//!
//! ```ignore
//! use prometheus::{Encoder, Registry, TextEncoder};
//! use prombolt::BoltCollector;
//!
//! // `engine` implements `DatabaseStatsSource` and `Engine`.
//! let registry = Registry::new();
//! registry.register(Box::new(BoltCollector::new("app.db", engine.clone())))?;
//!
//! let mut buffer = Vec::new();
//! TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
//! ```
//!
//! ## Metric Names
//!
//! Every metric is named `bolt_<subsystem>_<metric>` with subsystem `db`, `tx`
//! or `bucket`, and carries `database="<identity>"`. Bucket metrics also carry
//! `bucket="<name>"`:
//!
//! ```text
//! bolt_db_freelist_free_pages{database="app.db"} 12
//! bolt_tx_write_seconds_total{database="app.db"} 0.25
//! bolt_bucket_keys{bucket="users",database="app.db"} 1024
//! ```
//!
//! ## Configuration
//!
//! Configuration sources are merged in order (later sources override earlier):
//!
//! 1. Default values
//! 2. Config files (via `.file()`)
//! 3. Environment variables (via `.env_prefix()`)
//! 4. Programmatic overrides
//! 5. CLI arguments (via `.with_cli_args()`)
//!
//! ```ignore
//! use prombolt::CollectorBuilder;
//!
//! let collector = CollectorBuilder::new()
//!     .file("prombolt.toml")
//!     .env_prefix("PROMBOLT")
//!     .prometheus_registry(registry.clone())
//!     .build(engine)?;
//! ```
//!
//! ## Nested Buckets
//!
//! Only top-level buckets are reported. Nested buckets are counted by their
//! parent's `bolt_bucket_buckets` gauge but do not get their own series.

pub mod bucket;
pub mod builder;
pub mod collector;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod stats;

pub use bucket::{BucketStatsCollector, EngineBuckets, FixedBuckets, ForEachBucket};
pub use builder::{CollectorBuilder, PromboltArgs};
pub use collector::BoltCollector;
pub use config::PromboltConfig;
pub use descriptor::{
    InvalidMetric, MetricDescriptor, MetricKind, Observation, Sample, Scope, NAMESPACE,
};
pub use engine::{
    BucketHandle, BucketStats, DatabaseStats, DatabaseStatsSource, Engine, ReadTx, TxStats,
};
pub use error::{PromboltError, Result};
pub use stats::DatabaseStatsCollector;
