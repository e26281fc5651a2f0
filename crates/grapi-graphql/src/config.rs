//! GraphQL configuration.
//!
//! Configuration is read from the `[graphql]` section of `grapi.toml`.
//!
//! # Example Configuration
//!
//! ```toml
//! [graphql]
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! batch_delay_ms = 1
//! max_batch_size = 100
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// GraphQL API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLConfig {
    /// Maximum query depth allowed.
    /// Default: 15
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    /// Default: 500
    #[serde(default = "default_max_complexity")]
    pub max_complexity: usize,

    /// Enable GraphQL introspection queries.
    /// Default: true
    #[serde(default = "default_introspection")]
    pub introspection: bool,

    /// How long a loader waits for more keys before dispatching a batch.
    /// Default: 1
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Maximum number of keys dispatched in one batch.
    /// Default: 100
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_max_depth() -> usize {
    15
}

fn default_max_complexity() -> usize {
    500
}

fn default_introspection() -> bool {
    true
}

fn default_batch_delay_ms() -> u64 {
    1
}

fn default_max_batch_size() -> usize {
    100
}

impl Default for GraphQLConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_complexity: default_max_complexity(),
            introspection: default_introspection(),
            batch_delay_ms: default_batch_delay_ms(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl GraphQLConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("graphql.max_depth must be > 0".into());
        }
        if self.max_complexity == 0 {
            return Err("graphql.max_complexity must be > 0".into());
        }
        if self.max_batch_size == 0 {
            return Err("graphql.max_batch_size must be > 0".into());
        }
        Ok(())
    }

    /// Returns the batch window delay.
    #[must_use]
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Converts this config to a SchemaBuilderConfig.
    #[must_use]
    pub fn to_schema_builder_config(&self) -> crate::SchemaBuilderConfig {
        crate::SchemaBuilderConfig {
            max_depth: self.max_depth,
            max_complexity: self.max_complexity,
            introspection_enabled: self.introspection,
        }
    }

    /// Converts this config to the per-request loader settings.
    #[must_use]
    pub fn to_loader_settings(&self) -> crate::loaders::LoaderSettings {
        crate::loaders::LoaderSettings {
            delay: self.batch_delay(),
            max_batch_size: self.max_batch_size,
        }
    }
}
