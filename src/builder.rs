//! Builder pattern for constructing collectors.
//!
//! The builder supports multiple configuration sources using figment:
//! - Default values
//! - Config files (TOML, YAML, JSON)
//! - Environment variables
//! - Programmatic overrides
//! - CLI arguments via clap

use std::path::Path;
use std::sync::Arc;

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use prometheus::Registry;
use tracing::info;

use crate::collector::BoltCollector;
use crate::config::PromboltConfig;
use crate::engine::{DatabaseStatsSource, Engine};
use crate::error::Result;

/// Builder for constructing a [`BoltCollector`].
///
/// Configuration sources are merged in the following order (later sources override earlier):
/// 1. Default values
/// 2. Config files (in order added)
/// 3. Environment variables
/// 4. Programmatic overrides
/// 5. CLI arguments
///
/// # Examples
///
/// ```ignore
/// use prombolt::CollectorBuilder;
///
/// let registry = prometheus::Registry::new();
/// let collector = CollectorBuilder::new()
///     .file("prombolt.toml")
///     .env_prefix("PROMBOLT")
///     .database("orders.db")
///     .prometheus_registry(registry.clone())
///     .build(engine)?;
/// ```
pub struct CollectorBuilder {
    figment: Figment,
    prometheus_registry: Option<Registry>,
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CollectorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorBuilder")
            .field("figment", &self.figment)
            .field(
                "prometheus_registry",
                &self.prometheus_registry.as_ref().map(|_| "<Registry>"),
            )
            .finish()
    }
}

impl CollectorBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            figment: Figment::from(Serialized::defaults(PromboltConfig::default())),
            prometheus_registry: None,
        }
    }

    /// Add a configuration file.
    ///
    /// Supports TOML, YAML, and JSON formats (detected by extension, TOML
    /// otherwise). Files are merged in the order they are added.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        self.figment = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => self.figment.merge(Yaml::file(path)),
            "json" => self.figment.merge(Json::file(path)),
            _ => self.figment.merge(Toml::file(path)),
        };
        self
    }

    /// Add environment variables with a prefix.
    ///
    /// Environment variables are expected in the format `{PREFIX}_{KEY}`,
    /// e.g. `PROMBOLT_DATABASE`.
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.figment = self
            .figment
            .merge(Env::prefixed(&format!("{}_", prefix)));
        self
    }

    /// Set the database identity used as the `database` label.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("database", database.into()));
        self
    }

    /// Register the built collector with this registry.
    pub fn prometheus_registry(mut self, registry: Registry) -> Self {
        self.prometheus_registry = Some(registry);
        self
    }

    /// Apply CLI argument overrides.
    ///
    /// This method applies any non-None values from the `PromboltArgs` struct.
    pub fn with_cli_args(mut self, args: &PromboltArgs) -> Self {
        if let Some(ref database) = args.bolt_database {
            self.figment = self
                .figment
                .merge(Serialized::default("database", database.clone()));
        }
        self
    }

    /// Extract and validate the merged configuration.
    pub fn config(&self) -> Result<PromboltConfig> {
        let mut config: PromboltConfig = self.figment.extract().map_err(Box::new)?;
        config.prometheus_registry = self.prometheus_registry.clone();
        config.validate()?;
        Ok(config)
    }

    /// Build a collector for `engine`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration extraction fails
    /// - The database identity is empty
    /// - The registry rejects the collector (e.g. the same database identity
    ///   is already registered)
    pub fn build<E>(self, engine: Arc<E>) -> Result<BoltCollector>
    where
        E: DatabaseStatsSource + Engine + 'static,
    {
        let config = self.config()?;
        let collector = BoltCollector::new(config.database.clone(), engine);

        if let Some(ref registry) = config.prometheus_registry {
            registry.register(Box::new(collector.clone()))?;
            info!(database = %config.database, "registered bolt collector");
        }

        Ok(collector)
    }
}

/// CLI arguments for collector configuration.
///
/// Use with clap's `Parser` derive macro and apply to a builder with
/// [`CollectorBuilder::with_cli_args`].
///
/// ```ignore
/// use clap::Parser;
/// use prombolt::{CollectorBuilder, PromboltArgs};
///
/// #[derive(Parser)]
/// struct MyArgs {
///     #[command(flatten)]
///     bolt: PromboltArgs,
/// }
///
/// let args = MyArgs::parse();
/// let collector = CollectorBuilder::new().with_cli_args(&args.bolt).build(engine)?;
/// ```
#[derive(Debug, Default, Clone, clap::Args)]
pub struct PromboltArgs {
    /// Database identity used as the `database` metric label
    #[arg(long)]
    pub bolt_database: Option<String>,
}
