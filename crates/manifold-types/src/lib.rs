//! # Manifold Types
//!
//! Core types, traits, and the configuration value tree shared across all
//! Manifold crates.
//!
//! This crate provides:
//!
//! - The immutable [`Value`] tree with field-level attributes
//! - Type identifiers for generators and identity keys for objects
//! - The generator API types (`Bundle`, `Objects`)
//! - Collaborator traits for evaluation, fetching, templating, overlays and
//!   secret decryption
//! - Error types and result aliases
//!
//! ## Example
//!
//! ```
//! use manifold_types::{GroupVersionKind, ObjectKey};
//!
//! let gvk = GroupVersionKind::from_type_meta("apps/v1", "Deployment");
//! assert_eq!(gvk.group, "apps");
//! assert_eq!(gvk.api_version(), "apps/v1");
//!
//! let key = ObjectKey::new("v1", "ConfigMap", "default", "settings");
//! assert_eq!(key.to_string(), "v1|ConfigMap|default|settings");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod errors;
pub mod identifiers;
pub mod traits;
pub mod value;

// Re-export common types for convenience
pub use errors::{ManifoldError, Result, ResultExt};
pub use identifiers::{GroupVersionKind, ObjectKey};
pub use traits::{
    ChartFetcher, ChartRef, ChartRenderer, ChartSource, Evaluator, Instance, LoadOptions,
    OverlayEngine, Release, ResourceFetcher, SecretResolver,
};
pub use value::{Attribute, Field, Path, Value};
