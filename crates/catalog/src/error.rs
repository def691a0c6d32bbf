//! Error types for `quortex-catalog`.

use thiserror::Error;

/// Main error type for capability discovery and invocation.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Merged-document structure problems (bad paths object, unresolvable refs).
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    /// Invocation-time errors (unknown capability, missing arguments).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Outbound HTTP failures (transport errors, non-2xx responses).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Credential failures surfaced by the token manager.
    #[error(transparent)]
    Auth(#[from] quortex_auth::AuthError),
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
