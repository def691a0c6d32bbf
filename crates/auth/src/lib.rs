//! Authentication for the Quortex MCP server.
//!
//! Two concerns live here:
//! - **Outbound**: the bearer credential attached to every call against the
//!   wrapped Quortex API, either auto-refreshed from the token-issuance
//!   endpoint ([`TokenManager`]) or a fixed pre-issued token, selected once at
//!   startup ([`OutboundAuth`]).
//! - **Inbound**: verification of the server's own management access token
//!   ([`ServerAccess`]).

pub mod access;
pub mod error;
pub mod token;

pub use access::{ServerAccess, bearer_from_authorization};
pub use error::{AuthError, Result};
pub use token::{OutboundAuth, TokenManager};
