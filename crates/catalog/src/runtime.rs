//! Capability invocation and MCP surface projection.
//!
//! [`CapabilityInvoker`] executes one capability as an outbound HTTP request:
//! path-template substitution, query/header serialization, JSON body
//! assembly, and bearer auth via the configured [`OutboundAuth`] mode. A
//! credential refresh failure fails the triggering call; the request is never
//! sent with a stale or missing credential.

use crate::discover::{Capability, CapabilityParameter, ParamLocation};
use crate::error::{CatalogError, Result};
use crate::routes::CapabilityKind;
use quortex_auth::OutboundAuth;
use reqwest::{Client, Method};
use rmcp::model::{
    Annotated, JsonObject, RawResource, RawResourceTemplate, Resource, ResourceTemplate, Tool,
    ToolAnnotations,
};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Executes outbound HTTP requests for capabilities.
pub struct CapabilityInvoker {
    client: Client,
    base_url: String,
    auth: OutboundAuth,
    default_timeout: Duration,
}

#[derive(Debug)]
struct RequestParts {
    path: String,
    query_params: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body_fields: HashMap<String, Value>,
    body_payload: Option<Value>,
}

impl CapabilityInvoker {
    #[must_use]
    pub fn new(
        client: Client,
        base_url: String,
        auth: OutboundAuth,
        default_timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url,
            auth,
            default_timeout,
        }
    }

    /// Execute one capability invocation and return the response body.
    ///
    /// # Errors
    ///
    /// Returns an error if a required argument is missing, the credential
    /// refresh fails, the request fails at the transport level, or the API
    /// returns a non-2xx status.
    pub async fn invoke(
        &self,
        capability: &Capability,
        arguments: &Map<String, Value>,
    ) -> Result<Value> {
        let parts = build_request_parts(capability, arguments)?;
        let url = build_url(&self.base_url, &parts.path, &parts.query_params)?;

        let mut request = self
            .client
            .request(capability.method.clone(), url)
            .timeout(self.default_timeout);

        // Credential failures abort the call before anything is sent.
        if let Some(token) = self.auth.bearer_token().await? {
            request = request.bearer_auth(token);
        }

        for (key, value) in &parts.headers {
            request = request.header(key, value);
        }
        if let Some(payload) = &parts.body_payload {
            request = request.json(payload);
        } else if !parts.body_fields.is_empty() {
            request = request.json(&parts.body_fields);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Http(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CatalogError::Http(e.to_string()))?;

        if status.is_success() {
            // JSON when possible, raw text otherwise.
            Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!(text)))
        } else {
            let body: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!(text));
            let reason = status.canonical_reason().unwrap_or("Unknown");
            Err(CatalogError::Http(format!(
                "API returned {} {reason}: {body}",
                status.as_u16()
            )))
        }
    }
}

fn build_request_parts(
    capability: &Capability,
    arguments: &Map<String, Value>,
) -> Result<RequestParts> {
    let mut path = capability.path.clone();
    let mut query_params: Vec<(String, String)> = Vec::new();
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut body_fields: HashMap<String, Value> = HashMap::new();
    let mut body_payload: Option<Value> = None;

    for param in &capability.parameters {
        let value = arguments.get(&param.name).cloned();

        if param.required && value.is_none() {
            return Err(CatalogError::Runtime(format!(
                "Missing required parameter: {}",
                param.name
            )));
        }

        let value = match value {
            Some(Value::Null) | None => continue,
            Some(other) => other,
        };

        match param.location {
            ParamLocation::Path => {
                path = path.replace(&format!("{{{}}}", param.name), &value_to_string(&value));
            }
            ParamLocation::Query => {
                query_params.extend(serialize_query_param(&param.name, &value));
            }
            ParamLocation::Header => {
                headers.push((param.name.clone(), value_to_string(&value)));
            }
            ParamLocation::Body => {
                if param.name == "body" && is_opaque_body(param) {
                    body_payload = Some(value);
                } else {
                    body_fields.insert(param.name.clone(), value);
                }
            }
        }
    }

    if !path.starts_with('/') {
        path = format!("/{path}");
    }

    Ok(RequestParts {
        path,
        query_params,
        headers,
        body_fields,
        body_payload,
    })
}

fn is_opaque_body(param: &CapabilityParameter) -> bool {
    param.location == ParamLocation::Body
        && param
            .schema
            .get("properties")
            .and_then(Value::as_object)
            .is_none()
}

fn serialize_query_param(name: &str, value: &Value) -> Vec<(String, String)> {
    match value {
        // form/explode: repeated keys.
        Value::Array(items) => items
            .iter()
            .map(|v| (name.to_string(), value_to_string(v)))
            .collect(),
        other => vec![(name.to_string(), value_to_string(other))],
    }
}

fn build_url(base_url: &str, path: &str, query_params: &[(String, String)]) -> Result<Url> {
    let joined = format!("{}{}", base_url.trim_end_matches('/'), path);
    let mut url =
        Url::parse(&joined).map_err(|e| CatalogError::Runtime(format!("Invalid URL: {e}")))?;

    if !query_params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query_params {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// MCP tool annotations derived from RFC 9110 method semantics.
///
/// `openWorldHint` is always set: every capability talks to an external
/// system.
#[must_use]
pub fn annotations_for_method(method: &Method) -> ToolAnnotations {
    let open_world_hint = Some(true);

    if *method == Method::GET {
        return ToolAnnotations {
            title: None,
            read_only_hint: Some(true),
            destructive_hint: Some(false),
            idempotent_hint: Some(true),
            open_world_hint,
        };
    }
    if *method == Method::POST {
        return ToolAnnotations {
            title: None,
            read_only_hint: Some(false),
            destructive_hint: Some(false),
            idempotent_hint: Some(false),
            open_world_hint,
        };
    }
    if *method == Method::PUT || *method == Method::DELETE {
        return ToolAnnotations {
            title: None,
            read_only_hint: Some(false),
            destructive_hint: Some(true),
            idempotent_hint: Some(true),
            open_world_hint,
        };
    }
    if *method == Method::PATCH {
        return ToolAnnotations {
            title: None,
            read_only_hint: Some(false),
            destructive_hint: Some(true),
            // PATCH may or may not be idempotent; do not guess.
            idempotent_hint: None,
            open_world_hint,
        };
    }

    ToolAnnotations {
        title: None,
        read_only_hint: None,
        destructive_hint: None,
        idempotent_hint: None,
        open_world_hint,
    }
}

/// Project a tool-kind capability into an MCP `Tool`.
#[must_use]
pub fn to_tool(capability: &Capability) -> Tool {
    let schema_obj = capability
        .input_schema
        .as_object()
        .cloned()
        .unwrap_or_else(JsonObject::new);
    let mut tool = Tool::new(
        capability.name.clone(),
        capability.description.clone().unwrap_or_default(),
        Arc::new(schema_obj),
    );
    tool.annotations = Some(annotations_for_method(&capability.method));
    tool
}

/// The URI a plain resource capability is exposed under.
#[must_use]
pub fn resource_uri(capability: &Capability) -> String {
    format!("api://{}", capability.path.trim_start_matches('/'))
}

/// Project a resource-kind capability into an MCP `Resource`.
#[must_use]
pub fn to_resource(capability: &Capability) -> Resource {
    let mut raw = RawResource::new(resource_uri(capability), capability.name.clone());
    raw.description = capability.description.clone();
    raw.mime_type = Some("application/json".to_string());
    Annotated::new(raw, None)
}

/// Project a template-kind capability into an MCP `ResourceTemplate`.
#[must_use]
pub fn to_resource_template(capability: &Capability) -> ResourceTemplate {
    let raw = RawResourceTemplate {
        uri_template: resource_uri(capability),
        name: capability.name.clone(),
        title: None,
        description: capability.description.clone(),
        mime_type: Some("application/json".to_string()),
        icons: None,
    };
    Annotated::new(raw, None)
}

/// Resolve a resource URI back to a capability.
///
/// Exact matches hit plain resources; otherwise the URI is matched against
/// each template's path pattern, extracting the path variables as invocation
/// arguments.
#[must_use]
pub fn resolve_resource_uri<'a>(
    capabilities: &'a [Capability],
    uri: &str,
) -> Option<(&'a Capability, Map<String, Value>)> {
    let Some(request_path) = uri.strip_prefix("api://") else {
        return None;
    };
    let request_path = format!("/{request_path}");

    // Exact resource match first.
    for capability in capabilities {
        if capability.kind == CapabilityKind::Resource && capability.path == request_path {
            return Some((capability, Map::new()));
        }
    }

    // Template match: `{var}` segments capture one path segment each.
    for capability in capabilities {
        if capability.kind != CapabilityKind::ResourceTemplate {
            continue;
        }
        if let Some(args) = match_template(&capability.path, &request_path) {
            return Some((capability, args));
        }
    }

    None
}

fn match_template(template: &str, candidate: &str) -> Option<Map<String, Value>> {
    let template_segments: Vec<&str> = template.split('/').collect();
    let candidate_segments: Vec<&str> = candidate.split('/').collect();
    if template_segments.len() != candidate_segments.len() {
        return None;
    }

    let mut args = Map::new();
    for (tpl, seg) in template_segments.iter().zip(candidate_segments.iter()) {
        if let Some(var) = tpl.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if seg.is_empty() {
                return None;
            }
            args.insert(var.to_string(), Value::String((*seg).to_string()));
        } else if tpl != seg {
            return None;
        }
    }
    Some(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::quortex_route_rules;
    use axum::{Json, Router, extract::Path, http::HeaderMap, routing::get, routing::post};
    use quortex_auth::OutboundAuth;

    fn capability(
        name: &str,
        kind: CapabilityKind,
        method: Method,
        path: &str,
        parameters: Vec<CapabilityParameter>,
    ) -> Capability {
        let input_schema = json!({"type": "object", "properties": {}});
        Capability {
            name: name.to_string(),
            kind,
            method,
            path: path.to_string(),
            description: None,
            parameters,
            input_schema,
        }
    }

    #[test]
    fn annotations_follow_method_semantics() {
        let get = annotations_for_method(&Method::GET);
        assert_eq!(get.read_only_hint, Some(true));
        assert_eq!(get.idempotent_hint, Some(true));

        let delete = annotations_for_method(&Method::DELETE);
        assert_eq!(delete.destructive_hint, Some(true));

        let patch = annotations_for_method(&Method::PATCH);
        assert_eq!(patch.idempotent_hint, None);
        assert_eq!(patch.open_world_hint, Some(true));
    }

    #[test]
    fn missing_required_parameter_fails_before_sending() {
        let cap = capability(
            "get_user",
            CapabilityKind::ResourceTemplate,
            Method::GET,
            "/users/{id}",
            vec![CapabilityParameter {
                name: "id".to_string(),
                location: ParamLocation::Path,
                required: true,
                schema: json!({"type": "string"}),
            }],
        );

        let err = build_request_parts(&cap, &Map::new()).unwrap_err();
        assert!(err.to_string().contains("Missing required parameter: id"));
    }

    #[test]
    fn path_query_and_body_arguments_are_routed_by_location() {
        let cap = capability(
            "update_user",
            CapabilityKind::Tool,
            Method::PUT,
            "/users/{id}",
            vec![
                CapabilityParameter {
                    name: "id".to_string(),
                    location: ParamLocation::Path,
                    required: true,
                    schema: json!({"type": "string"}),
                },
                CapabilityParameter {
                    name: "verbose".to_string(),
                    location: ParamLocation::Query,
                    required: false,
                    schema: json!({"type": "boolean"}),
                },
                CapabilityParameter {
                    name: "name".to_string(),
                    location: ParamLocation::Body,
                    required: false,
                    schema: json!({"type": "string"}),
                },
            ],
        );

        let mut args = Map::new();
        args.insert("id".to_string(), json!("42"));
        args.insert("verbose".to_string(), json!(true));
        args.insert("name".to_string(), json!("alice"));

        let parts = build_request_parts(&cap, &args).unwrap();
        assert_eq!(parts.path, "/users/42");
        assert_eq!(
            parts.query_params,
            vec![("verbose".to_string(), "true".to_string())]
        );
        assert_eq!(parts.body_fields.get("name"), Some(&json!("alice")));
        assert!(parts.body_payload.is_none());
    }

    #[test]
    fn array_query_params_repeat_the_key() {
        let pairs = serialize_query_param("tags", &json!(["a", "b"]));
        assert_eq!(
            pairs,
            vec![
                ("tags".to_string(), "a".to_string()),
                ("tags".to_string(), "b".to_string())
            ]
        );
    }

    #[test]
    fn template_uri_resolution_extracts_path_variables() {
        let caps = vec![
            capability(
                "list_users",
                CapabilityKind::Resource,
                Method::GET,
                "/users",
                vec![],
            ),
            capability(
                "get_user",
                CapabilityKind::ResourceTemplate,
                Method::GET,
                "/users/{id}",
                vec![],
            ),
        ];

        let (cap, args) = resolve_resource_uri(&caps, "api://users").unwrap();
        assert_eq!(cap.name, "list_users");
        assert!(args.is_empty());

        let (cap, args) = resolve_resource_uri(&caps, "api://users/42").unwrap();
        assert_eq!(cap.name, "get_user");
        assert_eq!(args.get("id"), Some(&json!("42")));

        assert!(resolve_resource_uri(&caps, "api://missing").is_none());
        assert!(resolve_resource_uri(&caps, "other://users").is_none());
    }

    async fn spawn_api() -> String {
        async fn get_user(Path(id): Path<String>, headers: HeaderMap) -> Json<Value> {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            Json(json!({"id": id, "auth": auth}))
        }
        async fn create_user(Json(body): Json<Value>) -> Json<Value> {
            Json(json!({"created": body}))
        }

        let app = Router::new()
            .route("/users/{id}", get(get_user))
            .route("/users", post(create_user));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn invoke_substitutes_path_and_attaches_bearer() {
        let base = spawn_api().await;
        let auth = OutboundAuth::Static {
            token: "fixed-token".to_string(),
        };
        let invoker =
            CapabilityInvoker::new(Client::new(), base, auth, Duration::from_secs(5));

        let cap = capability(
            "get_user",
            CapabilityKind::ResourceTemplate,
            Method::GET,
            "/users/{id}",
            vec![CapabilityParameter {
                name: "id".to_string(),
                location: ParamLocation::Path,
                required: true,
                schema: json!({"type": "string"}),
            }],
        );

        let mut args = Map::new();
        args.insert("id".to_string(), json!("7"));
        let body = invoker.invoke(&cap, &args).await.unwrap();

        assert_eq!(body.get("id"), Some(&json!("7")));
        assert_eq!(body.get("auth"), Some(&json!("Bearer fixed-token")));
    }

    #[tokio::test]
    async fn invoke_sends_flattened_body_fields_as_json() {
        let base = spawn_api().await;
        let invoker = CapabilityInvoker::new(
            Client::new(),
            base,
            OutboundAuth::Unauthenticated,
            Duration::from_secs(5),
        );

        let cap = capability(
            "create_user",
            CapabilityKind::Tool,
            Method::POST,
            "/users",
            vec![CapabilityParameter {
                name: "name".to_string(),
                location: ParamLocation::Body,
                required: true,
                schema: json!({"type": "string"}),
            }],
        );

        let mut args = Map::new();
        args.insert("name".to_string(), json!("alice"));
        let body = invoker.invoke(&cap, &args).await.unwrap();
        assert_eq!(body.pointer("/created/name"), Some(&json!("alice")));
    }

    #[tokio::test]
    async fn non_2xx_maps_to_an_http_error() {
        let base = spawn_api().await;
        let invoker = CapabilityInvoker::new(
            Client::new(),
            base,
            OutboundAuth::Unauthenticated,
            Duration::from_secs(5),
        );

        let cap = capability(
            "nope",
            CapabilityKind::Resource,
            Method::GET,
            "/no-such-route",
            vec![],
        );

        let err = invoker.invoke(&cap, &Map::new()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Http(_)));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn tool_projection_carries_schema_and_annotations() {
        let doc: Value = serde_yaml::from_str(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
paths:
  /things:
    post:
      operationId: make_thing
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [label]
              properties:
                label: { type: string }
      responses:
        "201": { description: created }
"#,
        )
        .unwrap();

        let caps = crate::discover::discover_capabilities(&doc, &quortex_route_rules()).unwrap();
        let tool = to_tool(&caps[0]);

        assert_eq!(tool.name, "make_thing");
        assert!(tool.input_schema.get("properties").is_some());
        let ann = tool.annotations.as_ref().unwrap();
        assert_eq!(ann.read_only_hint, Some(false));
    }
}
