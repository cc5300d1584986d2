//! # Manifold Core
//!
//! Core utilities, configuration management, logging, and the YAML instance
//! evaluator for Manifold.
//!
//! This crate provides:
//!
//! - **Configuration**: layered configuration (defaults, file, environment, flags)
//! - **Logging**: `tracing` subscriber setup that keeps stdout free for output
//! - **Instances**: loading configuration instances from YAML with attribute tags
//! - **Utilities**: YAML stream handling, path helpers, external tool execution
//!
//! ## Example
//!
//! ```no_run
//! use manifold_core::config::{BuildConfig, Config};
//!
//! let config = Config::load(BuildConfig::default_path())?.with_process_env();
//! let build = BuildConfig::from_config(&config)?;
//! println!("caching under {}", build.cache_dir.display());
//! # Ok::<(), manifold_types::ManifoldError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod instance;
pub mod log;
pub mod util;

// Re-export commonly used items
pub use config::{BuildConfig, Config, ToolsConfig};
pub use instance::YamlEvaluator;
pub use manifold_types::{ManifoldError, Result};

/// Manifold application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Manifold application name
pub const APP_NAME: &str = "manifold";
