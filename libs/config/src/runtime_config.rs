//! Runtime Configuration Module
//!
//! Provides configuration loading for an actor context and its optional
//! remote endpoint. Supports loading from a TOML file with environment
//! variable overrides (`ACTORS__SECTION__KEY`).

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "ACTORS";

/// Main runtime configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Prefix of references created by the default factory
    pub namespace: String,

    /// Shared worker pool sizing
    pub executor: ExecutorSettings,

    /// Diagnostic envelope log
    pub logging: LoggingSettings,

    /// HTTP endpoint settings
    pub remote: RemoteSettings,
}

/// Worker pool settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Workers kept alive while idle
    pub core_threads: usize,
    pub max_threads: usize,
    pub keep_alive_ms: u64,
    pub thread_name: String,
}

/// Envelope log settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub enabled: bool,
    pub path: PathBuf,
}

/// Remote endpoint settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RemoteSettings {
    pub enabled: bool,
    pub host: String,
    /// `0` binds an ephemeral port
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_local_actors: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            namespace: defaults::naming::NAMESPACE.to_string(),
            executor: ExecutorSettings::default(),
            logging: LoggingSettings::default(),
            remote: RemoteSettings::default(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            core_threads: parallelism,
            max_threads: defaults::executor::MAX_THREADS,
            keep_alive_ms: defaults::executor::KEEP_ALIVE_MS,
            thread_name: defaults::executor::THREAD_NAME.to_string(),
        }
    }
}

impl ExecutorSettings {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self {
            enabled: false,
            path: std::env::temp_dir().join(format!("actor-log-{}.log", millis)),
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: defaults::remote::HOST.to_string(),
            port: defaults::remote::PORT,
            request_timeout_secs: defaults::remote::REQUEST_TIMEOUT_SECS,
            max_local_actors: defaults::remote::MAX_LOCAL_ACTORS,
        }
    }
}

impl RemoteSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RuntimeConfig {
    /// Load configuration from an optional file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading runtime config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        // Override with environment variables (ACTORS__ prefix)
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut runtime: RuntimeConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        runtime.expand_env_vars()?;
        runtime.validate()?;
        debug!(?runtime, "Runtime configuration loaded");
        Ok(runtime)
    }

    /// Expand environment variables in path values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let raw = self.logging.path.to_string_lossy().into_owned();
        let expanded = shellexpand::env(&raw).context("Failed to expand log path")?;
        self.logging.path = PathBuf::from(expanded.as_ref());
        Ok(())
    }

    /// Reject settings the runtime cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            bail!("namespace must not be empty");
        }
        if self.executor.max_threads == 0 {
            bail!("executor.max_threads must be at least 1");
        }
        if self.executor.core_threads > self.executor.max_threads {
            bail!(
                "executor.core_threads ({}) exceeds executor.max_threads ({})",
                self.executor.core_threads,
                self.executor.max_threads
            );
        }
        if self.remote.request_timeout_secs == 0 {
            bail!("remote.request_timeout_secs must be positive");
        }
        Ok(())
    }
}

/// Convenience function to load configuration with defaults
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    RuntimeConfig::load(path)
}
