//! Multi-document OpenAPI merge.
//!
//! `merge_into` folds one document into an accumulator. The collision policy
//! is asymmetric on purpose, for behavioral compatibility with the deployed
//! service:
//!
//! - **Paths**: a colliding path pattern is overwritten wholesale by the
//!   incoming document (the entire method map is replaced, not merged
//!   per-method). Later documents win. Logged at `warn`.
//! - **Components**: a colliding (category, name) pair keeps the
//!   accumulator's value. Earlier documents win. Logged at `debug`.
//!
//! Top-level keys other than `paths`/`components` are inherited from the
//! accumulator when already present and only added when absent.

use serde_json::{Map, Value};

/// Fold `next` into `accumulator` and return the merged document.
///
/// An empty accumulator (JSON `null` or an empty object) yields a copy of
/// `next`. `source` is the incoming document's name, used only for collision
/// log context.
#[must_use]
pub fn merge_into(accumulator: Value, next: &Value, source: &str) -> Value {
    let acc_map = match accumulator {
        Value::Object(m) if !m.is_empty() => m,
        _ => return next.clone(),
    };

    let Some(next_map) = next.as_object() else {
        return Value::Object(acc_map);
    };

    let mut merged = acc_map;

    merge_paths(&mut merged, next_map, source);
    merge_components(&mut merged, next_map, source);

    // Remaining top-level keys: accumulator wins, absent keys are added.
    for (key, value) in next_map {
        if key == "paths" || key == "components" {
            continue;
        }
        if !merged.contains_key(key) {
            merged.insert(key.clone(), value.clone());
        }
    }

    Value::Object(merged)
}

fn merge_paths(merged: &mut Map<String, Value>, next: &Map<String, Value>, source: &str) {
    let Some(next_paths) = next.get("paths").and_then(Value::as_object) else {
        return;
    };

    let merged_paths = merged
        .entry("paths".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(merged_paths) = merged_paths.as_object_mut() else {
        return;
    };

    for (pattern, methods) in next_paths {
        if merged_paths.contains_key(pattern) {
            tracing::warn!(
                path = %pattern,
                spec = %source,
                "path collision; overwriting with newer spec"
            );
        }
        // Full replacement of the method map, never a per-method merge.
        merged_paths.insert(pattern.clone(), methods.clone());
    }
}

fn merge_components(merged: &mut Map<String, Value>, next: &Map<String, Value>, source: &str) {
    let Some(next_components) = next.get("components").and_then(Value::as_object) else {
        return;
    };

    let merged_components = merged
        .entry("components".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(merged_components) = merged_components.as_object_mut() else {
        return;
    };

    for (category, items) in next_components {
        let merged_category = merged_components
            .entry(category.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(merged_category) = merged_category.as_object_mut() else {
            continue;
        };

        let Some(items) = items.as_object() else {
            continue;
        };

        for (name, schema) in items {
            if merged_category.contains_key(name) {
                tracing::debug!(
                    category = %category,
                    component = %name,
                    spec = %source,
                    "component collision; keeping existing version"
                );
            } else {
                merged_category.insert(name.clone(), schema.clone());
            }
        }
    }
}

/// Merge a sequence of loaded documents left-to-right.
#[must_use]
pub fn merge_documents<'a, I>(specs: I) -> Value
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let mut merged = Value::Null;
    for (name, document) in specs {
        merged = merge_into(merged, document, name);
    }
    merged
}

/// Overwrite `info.title` / `info.description` with the unified service
/// identity, discarding whatever the source documents carried.
pub fn set_unified_info(merged: &mut Value, title: &str, description: &str) {
    let Some(root) = merged.as_object_mut() else {
        return;
    };

    let info = root
        .entry("info".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(info) = info.as_object_mut() {
        info.insert("title".to_string(), Value::String(title.to_string()));
        info.insert(
            "description".to_string(),
            Value::String(description.to_string()),
        );
        info.entry("version".to_string())
            .or_insert_with(|| Value::String("1.0.0".to_string()));
    }
}
