//! Common utility functions.

pub mod data;
pub mod fs;
pub mod process;

// Re-export commonly used items
pub use data::{deep_merge, parse_yaml_documents, to_yaml_string};
pub use fs::{expand_path, find_module_root, is_yaml_file, list_yaml_files};
pub use process::Tool;
