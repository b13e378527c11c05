//! Configuration for the settings resolver's own providers and triggers
//!
//! The knobs are resolved with the resolver itself: a schema describing them is
//! loaded through the environment provider and the resulting tree is
//! deserialized into [`Config`].

use crate::contract::{CfgError, ValueProvider};
use crate::domain::Settings;
use crate::infra::providers::env::EnvValueProvider;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Settings resolver configuration
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Record-store provider defaults
    #[serde(default)]
    pub store: StoreConfig,

    /// Interval trigger defaults
    #[serde(default)]
    pub trigger: TriggerConfig,
}

/// Record-store provider configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreConfig {
    /// Create records for requested items that have none
    #[serde(default = "default_true")]
    pub create_missing: bool,

    /// Service whose records are read
    #[serde(default)]
    pub service_name: String,

    /// Version whose records overlay the unversioned ones; empty for none
    #[serde(default)]
    pub service_version: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_missing: true,
            service_name: String::new(),
            service_version: String::new(),
        }
    }
}

/// Interval trigger configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerConfig {
    /// Delay between firings, in seconds
    #[serde(default = "default_trigger_interval")]
    pub interval: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            interval: default_trigger_interval(),
        }
    }
}

impl TriggerConfig {
    /// Interval truncated to whole milliseconds; negative or NaN becomes zero
    pub fn interval_duration(&self) -> Duration {
        let millis = (self.interval * 1000.0).trunc();
        if millis.is_finite() && millis > 0.0 {
            Duration::from_millis(millis as u64)
        } else {
            Duration::ZERO
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_trigger_interval() -> f64 {
    60.0
}

impl Config {
    /// Schema of the configuration knobs
    pub fn schema() -> serde_json::Value {
        serde_json::json!({
            "store": {
                "createMissing": { "default": true, "type": "boolean" },
                "serviceName": { "default": "", "type": "string", "envName": "SERVICE_NAME" },
                "serviceVersion": { "default": "", "type": "string" }
            },
            "trigger": {
                "interval": { "default": default_trigger_interval(), "type": "float" }
            }
        })
    }

    /// Resolve the configuration from the process environment
    pub async fn load() -> Result<Self, CfgError> {
        Self::load_with(Arc::new(EnvValueProvider::new())).await
    }

    /// Resolve the configuration through a given provider
    pub async fn load_with(provider: Arc<dyn ValueProvider>) -> Result<Self, CfgError> {
        let settings = Settings::from_json(&Self::schema())?;
        settings.load(&[provider]).await?;

        serde_json::from_value(settings.to_json()).map_err(|source| CfgError::Coercion {
            name: "config".to_string(),
            source,
        })
    }
}
