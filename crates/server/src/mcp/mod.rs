//! MCP transport: JSON-RPC over HTTP POST.
//!
//! A single `/mcp` route accepts `ClientJsonRpcMessage` payloads and
//! dispatches on the typed request variant. Responses are plain JSON
//! envelopes; notifications are acknowledged with 202.

mod access;

use crate::server::QuortexServer;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse as _, Response},
    routing::{get, post},
};
use quortex_catalog::CatalogError;
use rmcp::model::{
    ClientJsonRpcMessage, ClientRequest, EmptyObject, ErrorCode, ErrorData, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, JsonRpcVersion2_0, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, RequestId, ServerJsonRpcMessage, ServerResult,
};
use std::sync::Arc;

pub fn router(server: Arc<QuortexServer>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/mcp", post(handle_mcp))
        .with_state(server)
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_mcp(
    State(server): State<Arc<QuortexServer>>,
    headers: HeaderMap,
    Json(message): Json<ClientJsonRpcMessage>,
) -> Response {
    if let Err(denied) = access::enforce(server.access(), &headers) {
        return denied;
    }

    match message {
        ClientJsonRpcMessage::Request(JsonRpcRequest { id, request, .. }) => {
            dispatch(&server, id, request).await
        }
        ClientJsonRpcMessage::Notification(_) => StatusCode::ACCEPTED.into_response(),
        _ => (StatusCode::BAD_REQUEST, "unsupported message type").into_response(),
    }
}

async fn dispatch(server: &QuortexServer, id: RequestId, request: ClientRequest) -> Response {
    match request {
        ClientRequest::InitializeRequest(_) => {
            json_response(id, ServerResult::InitializeResult(server.server_info()))
        }
        ClientRequest::PingRequest(_) => {
            json_response(id, ServerResult::EmptyResult(EmptyObject {}))
        }
        ClientRequest::ListToolsRequest(_) => json_response(
            id,
            ServerResult::ListToolsResult(ListToolsResult {
                tools: server.list_tools(),
                ..Default::default()
            }),
        ),
        ClientRequest::CallToolRequest(r) => {
            let name = r.params.name.to_string();
            let arguments = r.params.arguments.unwrap_or_default();
            match server.call_tool(&name, arguments).await {
                Ok(result) => json_response(id, ServerResult::CallToolResult(result)),
                Err(e) => error_response(id, error_code_for(&e), e.to_string()),
            }
        }
        ClientRequest::ListResourcesRequest(_) => json_response(
            id,
            ServerResult::ListResourcesResult(ListResourcesResult {
                resources: server.list_resources(),
                ..Default::default()
            }),
        ),
        ClientRequest::ListResourceTemplatesRequest(_) => json_response(
            id,
            ServerResult::ListResourceTemplatesResult(ListResourceTemplatesResult {
                resource_templates: server.list_resource_templates(),
                ..Default::default()
            }),
        ),
        ClientRequest::ReadResourceRequest(r) => {
            let uri = r.params.uri;
            match server.read_resource(&uri).await {
                Ok(result) => json_response(id, ServerResult::ReadResourceResult(result)),
                Err(e) => error_response(id, error_code_for(&e), e.to_string()),
            }
        }
        _ => error_response(
            id,
            ErrorCode::METHOD_NOT_FOUND,
            "method not supported".to_string(),
        ),
    }
}

fn error_code_for(error: &CatalogError) -> ErrorCode {
    match error {
        CatalogError::Runtime(_) => ErrorCode::INVALID_PARAMS,
        _ => ErrorCode::INTERNAL_ERROR,
    }
}

fn json_response(id: RequestId, result: ServerResult) -> Response {
    let msg = ServerJsonRpcMessage::Response(JsonRpcResponse {
        jsonrpc: JsonRpcVersion2_0,
        id,
        result,
    });
    Json(msg).into_response()
}

fn error_response(id: RequestId, code: ErrorCode, message: String) -> Response {
    let msg = ServerJsonRpcMessage::Error(JsonRpcError {
        jsonrpc: JsonRpcVersion2_0,
        id,
        error: ErrorData::new(code, message, None),
    });
    Json(msg).into_response()
}
