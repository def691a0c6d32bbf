//! Error types for `quortex-spec-store`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for spec loading and merging.
///
/// Every variant here is a startup-time configuration error: the server
/// factory aborts construction on any of them, there is no recovery path.
#[derive(Error, Debug)]
pub enum SpecStoreError {
    #[error("API spec directory not found: {path}")]
    SpecDirMissing { path: PathBuf },

    #[error("failed to read API spec directory {path}: {source}")]
    SpecDirRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no API spec files (*.yaml, *.yml) found in {path}")]
    NoSpecsFound { path: PathBuf },

    #[error("failed to read spec file {path}: {source}")]
    SpecReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse OpenAPI spec {path}: {source}")]
    SpecParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("spec file {path} is not an OpenAPI document (expected a YAML mapping at the root)")]
    SpecNotAMapping { path: PathBuf },
}

/// Result type alias for spec store operations.
pub type Result<T> = std::result::Result<T, SpecStoreError>;
