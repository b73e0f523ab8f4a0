//! Configuration types for prombolt collectors.

use prometheus::Registry;
use serde::{Deserialize, Serialize};

use crate::error::{PromboltError, Result};

/// Configuration for a [`BoltCollector`](crate::BoltCollector).
///
/// This struct can be deserialized from TOML, YAML, JSON, or environment variables
/// using figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromboltConfig {
    /// Database identity attached as the `database` label (default: "bolt").
    ///
    /// Typically the database file path or a logical name. Must be unique among
    /// collectors registered in the same registry.
    #[serde(default = "default_database")]
    pub database: String,

    /// Prometheus registry the collector is registered with.
    /// Not serializable - must be set programmatically.
    #[serde(skip)]
    pub prometheus_registry: Option<Registry>,
}

fn default_database() -> String {
    "bolt".to_string()
}

impl Default for PromboltConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            prometheus_registry: None,
        }
    }
}

impl PromboltConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that the configuration can be used to build a collector.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(PromboltError::InvalidConfiguration(
                "database identity must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
