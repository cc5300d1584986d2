//! # Manifold Secrets
//!
//! Replaces fields marked with a `sops` attribute by the decrypted contents
//! of the file the attribute names.
//!
//! - **Attributes**: `sops(<file>[,type=text])` parsing and path resolution
//! - **Injection**: walking a value tree and filling in decrypted secrets

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod inject;

pub use attribute::{SopsConfig, MODULE_PREFIX, SOPS_ATTRIBUTE};
pub use inject::{decode_secret, fill_secrets, inject, SecretContext};
