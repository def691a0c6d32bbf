//! Tool surface transforms.
//!
//! A transform rewrites how a tool looks to MCP clients without changing the
//! underlying HTTP operation. Today that means **hidden arguments with
//! injected defaults**: the argument disappears from the advertised input
//! schema and the configured value is supplied on every call, transparent to
//! the caller.
//!
//! Transforms are applied in two places, which must stay in sync:
//! - [`TransformPipeline::apply_schema_transforms`] at `tools/list` time
//! - [`TransformPipeline::apply_call_transforms`] at `tools/call` time

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Transform applied to a single tool argument.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgTransform {
    /// Remove the argument from the externally visible input schema.
    #[serde(default)]
    pub hide: bool,

    /// Value injected at call time (hidden args) or advertised as the schema
    /// default (visible args).
    #[serde(default)]
    pub default: Option<Value>,
}

impl ArgTransform {
    /// A hidden argument whose value is always the supplied default.
    #[must_use]
    pub fn hidden_default(value: Value) -> Self {
        Self {
            hide: true,
            default: Some(value),
        }
    }
}

/// All argument transforms for one tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolTransformConfig {
    #[serde(default)]
    pub arguments: HashMap<String, ArgTransform>,
}

/// Per-tool transform registry, keyed by the tool's original name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformPipeline {
    #[serde(default)]
    tools: HashMap<String, ToolTransformConfig>,
}

impl TransformPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Number of tools with at least one registered transform.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn register(&mut self, tool_name: impl Into<String>, config: ToolTransformConfig) {
        self.tools.insert(tool_name.into(), config);
    }

    #[must_use]
    pub fn transform_for(&self, tool_name: &str) -> Option<&ToolTransformConfig> {
        self.tools.get(tool_name)
    }

    /// Rewrite a tool's advertised input schema in place.
    ///
    /// Hidden arguments are removed from `properties` and `required`; visible
    /// arguments with a configured default get a `default` in their property
    /// schema and are dropped from `required` (a defaulted argument is no
    /// longer mandatory for the caller).
    pub fn apply_schema_transforms(&self, tool_name: &str, schema: &mut Value) {
        let Some(config) = self.tools.get(tool_name) else {
            return;
        };
        let Some(root) = schema.as_object_mut() else {
            return;
        };

        for (arg, transform) in &config.arguments {
            if transform.hide {
                if let Some(props) = root.get_mut("properties").and_then(Value::as_object_mut) {
                    props.remove(arg);
                }
                remove_required(root, arg);
            } else if let Some(default) = &transform.default {
                if let Some(prop) = root
                    .get_mut("properties")
                    .and_then(Value::as_object_mut)
                    .and_then(|p| p.get_mut(arg))
                    .and_then(Value::as_object_mut)
                {
                    prop.insert("default".to_string(), default.clone());
                }
                remove_required(root, arg);
            }
        }
    }

    /// Rewrite call arguments in place before dispatching the tool.
    ///
    /// Hidden arguments always receive the configured default; a caller-
    /// supplied value is discarded, since the argument is not part of the
    /// advertised surface. Visible defaulted arguments are only filled when
    /// the caller omitted them.
    pub fn apply_call_transforms(&self, tool_name: &str, arguments: &mut Map<String, Value>) {
        let Some(config) = self.tools.get(tool_name) else {
            return;
        };

        for (arg, transform) in &config.arguments {
            let Some(default) = &transform.default else {
                if transform.hide {
                    arguments.remove(arg);
                }
                continue;
            };

            if transform.hide {
                arguments.insert(arg.clone(), default.clone());
            } else if !arguments.contains_key(arg) {
                arguments.insert(arg.clone(), default.clone());
            }
        }
    }
}

fn remove_required(root: &mut Map<String, Value>, arg: &str) {
    if let Some(required) = root.get_mut("required").and_then(Value::as_array_mut) {
        required.retain(|v| v.as_str() != Some(arg));
        if required.is_empty() {
            root.remove("required");
        }
    }
}

/// Build a pipeline that hides `param` and injects `value` for every tool in
/// `tools` whose input schema declares a property with that name.
///
/// `tools` yields `(tool_name, input_schema)` pairs. Tools without the
/// property are silently skipped.
#[must_use]
pub fn plan_hidden_defaults<'a, I>(tools: I, param: &str, value: &Value) -> TransformPipeline
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let mut pipeline = TransformPipeline::new();

    for (name, schema) in tools {
        let declares_param = schema
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| props.contains_key(param));

        if declares_param {
            let mut config = ToolTransformConfig::default();
            config
                .arguments
                .insert(param.to_string(), ArgTransform::hidden_default(value.clone()));
            pipeline.register(name, config);
        }
    }

    pipeline
}
