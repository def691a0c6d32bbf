//! Inbound access-token enforcement for the MCP endpoint.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse as _, Response},
};
use quortex_auth::{ServerAccess, bearer_from_authorization};

fn unauthorized(msg: &'static str) -> Response {
    (StatusCode::UNAUTHORIZED, msg).into_response()
}

/// Check the request against the configured access token, if any.
pub(super) fn enforce(access: Option<&ServerAccess>, headers: &HeaderMap) -> Result<(), Response> {
    let Some(access) = access else {
        // No token configured: management access is open.
        return Ok(());
    };

    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_from_authorization);

    match presented {
        Some(token) if access.matches(token) => Ok(()),
        Some(_) => Err(unauthorized("Unauthorized: invalid access token")),
        None => Err(unauthorized("Unauthorized: bearer token is required")),
    }
}
