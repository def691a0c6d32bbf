//! Capability materialization.
//!
//! Walks the merged OpenAPI document and produces one [`Capability`] per
//! (path, method) operation, classified by the route policy. The merged
//! document is self-contained, so `$ref` resolution only needs to follow
//! local `#/...` JSON pointers (with a cycle guard).

use crate::error::{CatalogError, Result};
use crate::routes::{CapabilityKind, RouteRule, classify};
use regex::Regex;
use reqwest::Method;
use serde_json::{Map, Value, json};
use std::collections::HashSet;

/// Parameter location in the outbound HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
}

/// One argument of a capability.
#[derive(Debug, Clone)]
pub struct CapabilityParameter {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub schema: Value,
}

/// A callable or readable unit derived from one HTTP operation.
#[derive(Debug, Clone)]
pub struct Capability {
    /// Exposed name (`operationId` or a canonical `method_path` slug).
    pub name: String,
    pub kind: CapabilityKind,
    pub method: Method,
    /// Path template, e.g. `/users/{id}`.
    pub path: String,
    pub description: Option<String>,
    pub parameters: Vec<CapabilityParameter>,
    /// JSON Schema object describing the capability's arguments.
    pub input_schema: Value,
}

const METHODS: [(&str, Method); 5] = [
    ("get", Method::GET),
    ("post", Method::POST),
    ("put", Method::PUT),
    ("delete", Method::DELETE),
    ("patch", Method::PATCH),
];

/// Materialize every operation in the merged document.
///
/// Operations whose method matches no rule fall back to the tool kind.
/// Operations that fail to materialize (unsupported parameters, broken refs)
/// are skipped with a warning rather than failing the whole catalog.
///
/// # Errors
///
/// Returns an error if the document has no object-valued `paths` key.
pub fn discover_capabilities(doc: &Value, rules: &[RouteRule]) -> Result<Vec<Capability>> {
    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| CatalogError::OpenApi("merged document has no 'paths' object".into()))?;

    let mut capabilities = Vec::new();
    let mut names: HashSet<String> = HashSet::new();

    for (path, path_item) in paths {
        let Some(path_item) = path_item.as_object() else {
            tracing::warn!(path = %path, "skipping path: item is not an object");
            continue;
        };

        let path_level_params = path_item
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for (method_key, method) in METHODS {
            let Some(operation) = path_item.get(method_key).and_then(Value::as_object) else {
                continue;
            };

            let kind = classify(rules, &method, path).unwrap_or(CapabilityKind::Tool);

            match build_capability(
                doc,
                path,
                &method,
                kind,
                operation,
                &path_level_params,
                &mut names,
            ) {
                Ok(capability) => capabilities.push(capability),
                Err(e) => {
                    tracing::warn!(
                        method = %method,
                        path = %path,
                        error = %e,
                        "skipping operation"
                    );
                }
            }
        }
    }

    tracing::info!(count = capabilities.len(), "materialized capabilities");

    Ok(capabilities)
}

fn build_capability(
    doc: &Value,
    path: &str,
    method: &Method,
    kind: CapabilityKind,
    operation: &Map<String, Value>,
    path_level_params: &[Value],
    names: &mut HashSet<String>,
) -> Result<Capability> {
    let base_name = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map_or_else(|| canonical_name(method.as_str(), path), str::to_string);
    let name = reserve_unique_name(names, &base_name);

    let description = operation
        .get("summary")
        .or_else(|| operation.get("description"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| Some(format!("Calls {} {}", method.as_str(), path)));

    let parameters = collect_parameters(doc, operation, path_level_params)?;
    let input_schema = build_input_schema(&parameters);

    Ok(Capability {
        name,
        kind,
        method: method.clone(),
        path: path.to_string(),
        description,
        parameters,
        input_schema,
    })
}

fn collect_parameters(
    doc: &Value,
    operation: &Map<String, Value>,
    path_level_params: &[Value],
) -> Result<Vec<CapabilityParameter>> {
    let op_params = operation
        .get("parameters")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut parameters = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // Operation-level parameters override path-item-level ones with the same
    // (name, in) pair, so resolve the operation's list first.
    for raw in op_params.iter().chain(path_level_params.iter()) {
        let resolved = deref(doc, raw)?;
        let Some(param) = resolved.as_object() else {
            return Err(CatalogError::OpenApi(
                "parameter entry is not an object".into(),
            ));
        };

        let (name, location, required) = parameter_identity(param)?;
        let key = format!("{}:{name}", location_key(location));
        if !seen.insert(key) {
            continue;
        }

        let mut schema = match param.get("schema") {
            Some(s) => deref(doc, s)?,
            None => json!({}),
        };
        if let Some(desc) = param.get("description").and_then(Value::as_str)
            && let Some(obj) = schema.as_object_mut()
            && !obj.contains_key("description")
        {
            obj.insert("description".to_string(), Value::String(desc.to_string()));
        }

        parameters.push(CapabilityParameter {
            name,
            location,
            required,
            schema,
        });
    }

    // Request body: flatten JSON object properties into top-level arguments;
    // anything else is exposed as a single `body` argument.
    if let Some(body_ref) = operation.get("requestBody") {
        let body = deref(doc, body_ref)?;
        let body_required = body
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if let Some(schema_ref) = body.pointer("/content/application~1json/schema") {
            let schema = deref(doc, schema_ref)?;
            extend_with_body_params(doc, &schema, body_required, &mut parameters, &mut seen)?;
        }
    }

    Ok(parameters)
}

fn parameter_identity(param: &Map<String, Value>) -> Result<(String, ParamLocation, bool)> {
    let name = param
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| CatalogError::OpenApi("parameter without a name".into()))?
        .to_string();

    let location = match param.get("in").and_then(Value::as_str) {
        Some("path") => ParamLocation::Path,
        Some("query") => ParamLocation::Query,
        Some("header") => ParamLocation::Header,
        Some("cookie") => {
            return Err(CatalogError::OpenApi(format!(
                "cookie parameter '{name}' is not supported"
            )));
        }
        other => {
            return Err(CatalogError::OpenApi(format!(
                "parameter '{name}' has unsupported location {other:?}"
            )));
        }
    };

    // Path params are always required regardless of what the spec says.
    let required = location == ParamLocation::Path
        || param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);

    Ok((name, location, required))
}

fn location_key(location: ParamLocation) -> &'static str {
    match location {
        ParamLocation::Path => "path",
        ParamLocation::Query => "query",
        ParamLocation::Header => "header",
        ParamLocation::Body => "body",
    }
}

fn extend_with_body_params(
    doc: &Value,
    schema: &Value,
    body_required: bool,
    parameters: &mut Vec<CapabilityParameter>,
    seen: &mut HashSet<String>,
) -> Result<()> {
    let properties = schema.get("properties").and_then(Value::as_object);

    let Some(properties) = properties else {
        // Non-object body: a single opaque `body` argument.
        if !seen.insert("body:body".to_string()) {
            return Ok(());
        }
        parameters.push(CapabilityParameter {
            name: "body".to_string(),
            location: ParamLocation::Body,
            required: body_required,
            schema: schema.clone(),
        });
        return Ok(());
    };

    let required_props: HashSet<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .collect();

    for (prop_name, prop_schema) in properties {
        // A body property colliding with a path/query/header argument would be
        // ambiguous at the tool-arg level; the first declaration wins.
        if parameters.iter().any(|p| p.name == *prop_name) {
            tracing::warn!(property = %prop_name, "body property collides with a declared parameter; skipping");
            continue;
        }
        if !seen.insert(format!("body:{prop_name}")) {
            continue;
        }

        let schema = deref(doc, prop_schema)?;
        parameters.push(CapabilityParameter {
            name: prop_name.clone(),
            location: ParamLocation::Body,
            // A property of an optional body can never be mandatory at the
            // tool-arg level.
            required: body_required && required_props.contains(prop_name.as_str()),
            schema,
        });
    }

    Ok(())
}

/// Follow local `#/...` `$ref`s until a concrete value is reached.
///
/// The merged document is the only ref target; external refs are a spec
/// authoring error here and reported as such.
fn deref(doc: &Value, value: &Value) -> Result<Value> {
    let mut current = value.clone();
    let mut seen: HashSet<String> = HashSet::new();

    loop {
        let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
            return Ok(current);
        };

        let Some(pointer) = reference.strip_prefix("#") else {
            return Err(CatalogError::OpenApi(format!(
                "external $ref '{reference}' is not supported in a merged document"
            )));
        };
        if !pointer.starts_with('/') {
            return Err(CatalogError::OpenApi(format!(
                "unsupported $ref fragment (expected JSON pointer): {reference}"
            )));
        }
        if !seen.insert(reference.to_string()) {
            return Err(CatalogError::OpenApi(format!(
                "cyclic $ref detected while resolving: {reference}"
            )));
        }

        current = doc
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| CatalogError::OpenApi(format!("unresolved $ref '{reference}'")))?;
    }
}

fn build_input_schema(parameters: &[CapabilityParameter]) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();

    for param in parameters {
        properties.insert(param.name.clone(), param.schema.clone());
        if param.required {
            required.push(param.name.clone());
        }
    }

    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

fn canonical_name(method: &str, path: &str) -> String {
    let mut name = format!("{}_{}", method.to_lowercase(), path);

    // {param} segments become _param.
    let re = Regex::new(r"\{([^}]+)\}").expect("static regex");
    name = re.replace_all(&name, "_$1").to_string();

    let re = Regex::new(r"[^a-zA-Z0-9]+").expect("static regex");
    name = re.replace_all(&name, "_").to_string();

    name = name.trim_matches('_').to_string();
    if name.len() > 64 {
        name.truncate(64);
    }
    name
}

fn reserve_unique_name(names: &mut HashSet<String>, base: &str) -> String {
    if names.insert(base.to_string()) {
        return base.to_string();
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{base}_{counter}");
        if names.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}
