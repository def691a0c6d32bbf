//! Process configuration.
//!
//! All environment lookups happen here, once, at startup. Components receive
//! the resulting [`ServerConfig`] by value and never touch the environment
//! themselves.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quortex-mcp", about = "Unified MCP server for Quortex.io services")]
pub struct Cli {
    /// Directory containing the OpenAPI documents to expose.
    #[arg(long, env = "QUORTEX_MCP_SPEC_DIR", default_value = "api")]
    pub spec_dir: PathBuf,

    /// Address to listen on.
    #[arg(long, env = "QUORTEX_MCP_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Base URL of the wrapped Quortex API.
    #[arg(long, env = "QUORTEX_API_BASE_URL", default_value = "https://api.quortex.io")]
    pub base_url: String,

    /// API key secret; enables auto-refreshing outbound credentials.
    #[arg(long, env = "QUORTEX_API_KEY_SECRET", hide_env_values = true)]
    pub api_key_secret: Option<String>,

    /// Pre-issued API token; fallback outbound auth when no secret is set.
    #[arg(long, env = "QUORTEX_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Token-issuance endpoint used with --api-key-secret.
    #[arg(
        long,
        env = "QUORTEX_TOKEN_URL",
        default_value = "https://api.quortex.io/v1/token"
    )]
    pub token_url: String,

    /// Access token required on inbound MCP requests; absent means
    /// unauthenticated management access.
    #[arg(long, env = "QUORTEX_MCP_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Default organization injected into every tool that accepts an `org`
    /// argument.
    #[arg(long, env = "QUORTEX_ORG")]
    pub org: Option<String>,
}

/// Validated configuration handed to the server factory.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub spec_dir: PathBuf,
    pub base_url: String,
    pub api_key_secret: Option<String>,
    pub static_api_token: Option<String>,
    pub token_url: String,
    pub server_access_token: Option<String>,
    pub default_org: Option<String>,
}

impl Cli {
    #[must_use]
    pub fn into_config(self) -> (SocketAddr, ServerConfig) {
        let bind = self.bind;
        let config = ServerConfig {
            spec_dir: self.spec_dir,
            base_url: self.base_url,
            api_key_secret: self.api_key_secret,
            static_api_token: self.api_token,
            token_url: self.token_url,
            server_access_token: self.access_token,
            default_org: self.org,
        };
        (bind, config)
    }
}
