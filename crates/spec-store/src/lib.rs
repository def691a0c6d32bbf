//! OpenAPI spec loading and merging.
//!
//! This crate owns the startup-time half of the Quortex MCP server: it reads a
//! directory of independently authored OpenAPI YAML documents and folds them
//! into one merged document that the capability catalog consumes.
//!
//! It intentionally contains **no** HTTP logic and **no** MCP-specific policy.

pub mod error;
pub mod loader;
pub mod merge;

pub use error::{Result, SpecStoreError};
pub use loader::{LoadedSpec, load_spec_dir};
pub use merge::{merge_documents, merge_into, set_unified_info};
