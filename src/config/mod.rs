//! Configuration management for watchers.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Section-wise validation
mod debounce;
mod retry;
pub use debounce::*;
pub use retry::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable prefix, e.g. `WATCH__RETRY__INITIAL_INTERVAL_MS=250`
pub const ENV_PREFIX: &str = "WATCH";

/// Main configuration container for a [`crate::Watcher`]
///
/// Merged from, lowest priority first:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables
#[derive(Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct WatcherConfig {
    /// Backoff applied between failed fetches
    #[serde(default)]
    pub retry: BackoffPolicy,
    /// Coalescing of rapid successive changes
    #[serde(default)]
    pub debounce: DebounceConfig,
}

impl Debug for WatcherConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatcherConfig")
            .field("retry", &self.retry)
            .field("debounce", &self.debounce)
            .finish()
    }
}

impl WatcherConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Note
    /// Validation is deferred so further overrides can be layered with
    /// [`with_override_config`](Self::with_override_config). Call
    /// [`validate`](Self::validate) before handing the config to a watcher.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("WATCH__DEBOUNCE__DEBOUNCE_MS", "500");
    /// let cfg = WatcherConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from a file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.retry.validate()?;
        self.debounce.validate()?;
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
