//! Error types for `quortex-auth`.

use thiserror::Error;

/// Main error type for credential operations.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid token endpoint URL '{url}': {message}")]
    InvalidTokenUrl { url: String, message: String },

    #[error("token request to '{url}' failed: {message}")]
    TokenRequest { url: String, message: String },

    #[error("token endpoint returned {status}: {body}")]
    TokenEndpointStatus { status: u16, body: String },

    #[error("token endpoint returned a malformed body: {0}")]
    TokenResponseParse(String),

    #[error("token endpoint returned an unparseable expires_at '{raw}': {source}")]
    ExpiryParse {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Result type alias for credential operations.
pub type Result<T> = std::result::Result<T, AuthError>;
