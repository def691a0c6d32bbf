//! Inbound access-token verification.
//!
//! When the server is configured with a management access token, every MCP
//! request must present it as `Authorization: Bearer <token>`. Comparison is
//! done over SHA-256 digests so the equality check runs over fixed-length
//! values regardless of what the caller sent.

use sha2::{Digest, Sha256};

/// Extract the bearer token from an `Authorization` header value.
#[must_use]
pub fn bearer_from_authorization(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ").map(str::trim)?;
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Verifier for the server's own management access token.
#[derive(Clone)]
pub struct ServerAccess {
    expected_digest: [u8; 32],
}

impl ServerAccess {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            expected_digest: Sha256::digest(token.as_bytes()).into(),
        }
    }

    /// Check a presented bearer token against the configured one.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        let presented_digest: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        presented_digest == self.expected_digest
    }
}
