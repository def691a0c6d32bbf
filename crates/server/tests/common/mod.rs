use anyhow::Context as _;
use std::path::Path;
use std::process::{Child, Command};
use std::time::Duration;

pub use quortex_test_support::{KillOnDrop, StubApi};

pub fn pick_unused_port() -> anyhow::Result<u16> {
    quortex_test_support::pick_unused_port()
}

pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    quortex_test_support::wait_http_ok(url, timeout_dur).await
}

pub struct ServerEnv<'a> {
    pub base_url: &'a str,
    pub token_url: &'a str,
    pub api_key_secret: Option<&'a str>,
    pub api_token: Option<&'a str>,
    pub access_token: Option<&'a str>,
    pub org: Option<&'a str>,
}

pub fn spawn_server(spec_dir: &Path, port: u16, env: &ServerEnv<'_>) -> anyhow::Result<Child> {
    let bin = env!("CARGO_BIN_EXE_quortex-mcp");
    let mut cmd = Command::new(bin);
    cmd.arg("--spec-dir")
        .arg(spec_dir)
        .arg("--bind")
        .arg(format!("127.0.0.1:{port}"))
        .env("QUORTEX_API_BASE_URL", env.base_url)
        .env("QUORTEX_TOKEN_URL", env.token_url)
        // The test process environment must not leak credentials into the child.
        .env_remove("QUORTEX_API_KEY_SECRET")
        .env_remove("QUORTEX_API_TOKEN")
        .env_remove("QUORTEX_MCP_ACCESS_TOKEN")
        .env_remove("QUORTEX_ORG");

    if let Some(secret) = env.api_key_secret {
        cmd.env("QUORTEX_API_KEY_SECRET", secret);
    }
    if let Some(token) = env.api_token {
        cmd.env("QUORTEX_API_TOKEN", token);
    }
    if let Some(token) = env.access_token {
        cmd.env("QUORTEX_MCP_ACCESS_TOKEN", token);
    }
    if let Some(org) = env.org {
        cmd.env("QUORTEX_ORG", org);
    }

    cmd.spawn().context("spawn quortex-mcp")
}
