//! # Actor Runtime Configuration
//!
//! Settings for an actor context: worker pool sizing, the diagnostic
//! envelope log and the optional HTTP endpoint.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use actor_config::RuntimeConfig;
//! use std::path::Path;
//!
//! let config = RuntimeConfig::load(Some(Path::new("runtime.toml"))).unwrap();
//! println!("workers: {}", config.executor.max_threads);
//! ```

pub mod defaults;
pub mod runtime_config;

// Re-export commonly used types
pub use runtime_config::{
    load_config, ExecutorSettings, LoggingSettings, RemoteSettings, RuntimeConfig,
};
