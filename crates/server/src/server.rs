//! Server factory and capability surface.
//!
//! [`QuortexServer::build`] is the single construction point: it loads and
//! merges the spec directory, materializes the capability catalog, plans the
//! `org` redaction, and selects the outbound auth mode. Everything happens
//! synchronously before the listener starts; any failure aborts construction.

use crate::config::ServerConfig;
use anyhow::Context as _;
use quortex_auth::{OutboundAuth, ServerAccess};
use quortex_catalog::runtime::{to_resource, to_resource_template, to_tool};
use quortex_catalog::{
    Capability, CapabilityInvoker, CapabilityKind, CatalogError, discover_capabilities,
    quortex_route_rules,
};
use quortex_spec_store::{load_spec_dir, merge_documents, set_unified_info};
use quortex_tool_transforms::{TransformPipeline, plan_hidden_defaults};
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ReadResourceResult, Resource,
    ResourceContents, ResourceTemplate, ServerCapabilities, ServerInfo, Tool,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub const UNIFIED_TITLE: &str = "Quortex Unified API (MCP)";
pub const UNIFIED_DESCRIPTION: &str = "Unified MCP server for Quortex.io services";

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct QuortexServer {
    capabilities: Vec<Capability>,
    invoker: CapabilityInvoker,
    transforms: TransformPipeline,
    access: Option<ServerAccess>,
}

impl QuortexServer {
    /// Build the server from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec directory is missing or empty, any spec
    /// fails to parse, the merged document yields no catalog, or the token
    /// endpoint URL is invalid. These are all startup failures: no server
    /// instance is produced.
    pub fn build(config: &ServerConfig) -> anyhow::Result<Self> {
        let specs = load_spec_dir(&config.spec_dir).context("load API specs")?;

        let mut merged =
            merge_documents(specs.iter().map(|s| (s.name.as_str(), &s.document)));
        set_unified_info(&mut merged, UNIFIED_TITLE, UNIFIED_DESCRIPTION);

        let capabilities = discover_capabilities(&merged, &quortex_route_rules())
            .context("materialize capabilities")?;

        let transforms = match &config.default_org {
            Some(org) => {
                let pipeline = plan_hidden_defaults(
                    capabilities
                        .iter()
                        .filter(|c| c.kind == CapabilityKind::Tool)
                        .map(|c| (c.name.as_str(), &c.input_schema)),
                    "org",
                    &Value::String(org.clone()),
                );
                tracing::info!(
                    tools = pipeline.len(),
                    "applying global 'org' transformation"
                );
                pipeline
            }
            None => TransformPipeline::new(),
        };

        let client = reqwest::Client::new();
        let auth = OutboundAuth::select(
            client.clone(),
            &config.token_url,
            config.api_key_secret.clone(),
            config.static_api_token.clone(),
        )
        .context("select outbound auth mode")?;

        let invoker = CapabilityInvoker::new(
            client,
            config.base_url.clone(),
            auth,
            OUTBOUND_TIMEOUT,
        );

        let access = config.server_access_token.as_deref().map(ServerAccess::new);
        if access.is_none() {
            tracing::warn!("no access token configured; MCP endpoint accepts unauthenticated requests");
        }

        Ok(Self {
            capabilities,
            invoker,
            transforms,
            access,
        })
    }

    #[must_use]
    pub fn access(&self) -> Option<&ServerAccess> {
        self.access.as_ref()
    }

    #[must_use]
    pub fn capability_count(&self) -> usize {
        self.capabilities.len()
    }

    #[must_use]
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "quortex-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some(UNIFIED_TITLE.to_string()),
                ..Default::default()
            },
            instructions: Some(UNIFIED_DESCRIPTION.to_string()),
        }
    }

    /// Tool-kind capabilities as advertised MCP tools, with schema transforms
    /// (org redaction) applied.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.capabilities
            .iter()
            .filter(|c| c.kind == CapabilityKind::Tool)
            .map(|c| {
                let mut tool = to_tool(c);
                let mut schema = Value::Object(tool.input_schema.as_ref().clone());
                self.transforms.apply_schema_transforms(&c.name, &mut schema);
                if let Value::Object(obj) = schema {
                    tool.input_schema = Arc::new(obj);
                }
                tool
            })
            .collect()
    }

    #[must_use]
    pub fn list_resources(&self) -> Vec<Resource> {
        self.capabilities
            .iter()
            .filter(|c| c.kind == CapabilityKind::Resource)
            .map(to_resource)
            .collect()
    }

    #[must_use]
    pub fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.capabilities
            .iter()
            .filter(|c| c.kind == CapabilityKind::ResourceTemplate)
            .map(to_resource_template)
            .collect()
    }

    /// Execute a tool call, applying call-time transforms first.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool name is unknown, required arguments are
    /// missing, the credential refresh fails, or the outbound request fails.
    pub async fn call_tool(
        &self,
        name: &str,
        mut arguments: Map<String, Value>,
    ) -> Result<CallToolResult, CatalogError> {
        let capability = self
            .capabilities
            .iter()
            .find(|c| c.kind == CapabilityKind::Tool && c.name == name)
            .ok_or_else(|| CatalogError::Runtime(format!("Tool not found: {name}")))?;

        self.transforms.apply_call_transforms(name, &mut arguments);

        let body = self.invoker.invoke(capability, &arguments).await?;
        Ok(CallToolResult::success(vec![Content::text(body_to_text(
            &body,
        ))]))
    }

    /// Read a resource (or an expanded resource template) by URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI resolves to no capability or the outbound
    /// request fails.
    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, CatalogError> {
        let (capability, arguments) =
            quortex_catalog::runtime::resolve_resource_uri(&self.capabilities, uri)
                .ok_or_else(|| CatalogError::Runtime(format!("unknown resource uri: {uri}")))?;

        let body = self.invoker.invoke(capability, &arguments).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(body_to_text(&body), uri)],
        })
    }
}

fn body_to_text(body: &Value) -> String {
    if let Some(s) = body.as_str() {
        s.to_string()
    } else {
        serde_json::to_string(body).unwrap_or_else(|_| body.to_string())
    }
}
