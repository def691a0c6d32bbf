//! Capability catalog for the Quortex MCP server.
//!
//! This crate turns the merged OpenAPI document into a set of typed
//! capabilities (tools, resources, resource templates) and executes their
//! outbound HTTP invocations. The route classification policy lives in
//! [`routes`], capability materialization in [`discover`], and the invoker in
//! [`runtime`].
//!
//! It intentionally contains **no** spec loading/merging logic and **no**
//! transport-level MCP handling.

pub mod discover;
pub mod error;
pub mod routes;
pub mod runtime;

pub use discover::{Capability, CapabilityParameter, ParamLocation, discover_capabilities};
pub use error::{CatalogError, Result};
pub use routes::{CapabilityKind, RouteRule, classify, quortex_route_rules};
pub use runtime::CapabilityInvoker;
