mod common;

use anyhow::Context as _;
use common::{KillOnDrop, ServerEnv, StubApi, pick_unused_port, spawn_server, wait_http_ok};
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::tempdir;

const ACCESS_TOKEN: &str = "sekrit";

fn write_specs(dir: &std::path::Path) -> anyhow::Result<()> {
    // Lexicographically first: defines /streams with an operationId that the
    // second document overwrites (path collisions favor the later document).
    std::fs::write(
        dir.join("a-legacy.yaml"),
        r#"
openapi: "3.0.0"
info: { title: Legacy, version: "1" }
paths:
  /streams:
    get:
      operationId: legacy_list_streams
      responses:
        "200": { description: ok }
components:
  schemas:
    Stream:
      type: object
      description: legacy stream
      properties:
        id: { type: string }
"#,
    )?;

    std::fs::write(
        dir.join("b-current.yaml"),
        r#"
openapi: "3.0.0"
info: { title: Current, version: "2" }
paths:
  /streams:
    get:
      operationId: list_streams
      responses:
        "200": { description: ok }
  /streams/{id}:
    get:
      operationId: get_stream
      parameters:
        - name: id
          in: path
          required: true
          schema: { type: string }
      responses:
        "200": { description: ok }
  /ingest/inputs:
    post:
      operationId: ingest_inputs_create
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [org, name]
              properties:
                org: { type: string }
                name: { type: string }
      responses:
        "201": { description: created }
components:
  schemas:
    Stream:
      type: object
      description: current stream
      properties:
        id: { type: string }
        label: { type: string }
"#,
    )?;

    Ok(())
}

struct McpClient {
    http: reqwest::Client,
    url: String,
}

impl McpClient {
    fn new(base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{base}/mcp"),
        }
    }

    async fn request(&self, id: u64, method: &str, params: Value) -> anyhow::Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(ACCESS_TOKEN)
            .json(&body)
            .send()
            .await
            .context("post mcp request")?;
        anyhow::ensure!(resp.status().is_success(), "mcp http {}", resp.status());
        resp.json().await.context("parse mcp response")
    }
}

#[tokio::test]
async fn mcp_surface_round_trip() -> anyhow::Result<()> {
    let stub = StubApi::spawn().await?;
    let dir = tempdir().context("create temp dir")?;
    write_specs(dir.path())?;

    let port = pick_unused_port()?;
    let child = spawn_server(
        dir.path(),
        port,
        &ServerEnv {
            base_url: &stub.base_url,
            token_url: &stub.token_url,
            api_key_secret: Some("test-secret"),
            api_token: None,
            access_token: Some(ACCESS_TOKEN),
            org: Some("test-org-uuid"),
        },
    )?;
    let _child = KillOnDrop(child);

    let base = format!("http://127.0.0.1:{port}");
    wait_http_ok(&format!("{base}/health"), Duration::from_secs(30)).await?;

    let mcp = McpClient::new(&base);

    // ------------------------------------------------------------------
    // Inbound access control
    // ------------------------------------------------------------------
    {
        let resp = reqwest::Client::new()
            .post(format!("{base}/mcp"))
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {}}))
            .send()
            .await?;
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        let resp = reqwest::Client::new()
            .post(format!("{base}/mcp"))
            .bearer_auth("wrong-token")
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {}}))
            .send()
            .await?;
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    // ------------------------------------------------------------------
    // tools/list: only mutating operations, org redacted
    // ------------------------------------------------------------------
    let tools_list = mcp.request(2, "tools/list", json!({})).await?;
    let tools = tools_list
        .pointer("/result/tools")
        .and_then(Value::as_array)
        .context("tools/list missing result.tools")?;

    assert!(
        tools
            .iter()
            .any(|t| t.get("name") == Some(&json!("ingest_inputs_create"))),
        "expected ingest_inputs_create in tools/list"
    );
    // GET operations are resources, not tools.
    assert!(
        tools
            .iter()
            .all(|t| t.get("name") != Some(&json!("list_streams"))),
        "expected list_streams to be a resource, not a tool"
    );

    let ingest = tools
        .iter()
        .find(|t| t.get("name") == Some(&json!("ingest_inputs_create")))
        .unwrap();
    assert!(
        ingest.pointer("/inputSchema/properties/org").is_none(),
        "org must be hidden from the advertised schema"
    );
    assert!(ingest.pointer("/inputSchema/properties/name").is_some());
    assert_eq!(
        ingest.pointer("/inputSchema/required"),
        Some(&json!(["name"])),
        "org must be dropped from required"
    );

    // ------------------------------------------------------------------
    // tools/call: org injected transparently, bearer from token issuer
    // ------------------------------------------------------------------
    let call = mcp
        .request(
            3,
            "tools/call",
            json!({
                "name": "ingest_inputs_create",
                "arguments": {"name": "stream-1"}
            }),
        )
        .await?;
    let text = call
        .pointer("/result/content/0/text")
        .and_then(Value::as_str)
        .context("tools/call missing text content")?;
    let echoed: Value = serde_json::from_str(text)?;
    assert_eq!(
        echoed.pointer("/received/org"),
        Some(&json!("test-org-uuid")),
        "configured org must be injected into the outbound call"
    );
    assert_eq!(echoed.pointer("/received/name"), Some(&json!("stream-1")));

    // ------------------------------------------------------------------
    // resources: plain GET + template, collision favored the later spec
    // ------------------------------------------------------------------
    let resources_list = mcp.request(4, "resources/list", json!({})).await?;
    let resources = resources_list
        .pointer("/result/resources")
        .and_then(Value::as_array)
        .context("resources/list missing result.resources")?;
    assert!(
        resources
            .iter()
            .any(|r| r.get("name") == Some(&json!("list_streams"))),
        "expected list_streams resource (later spec wins the path collision)"
    );
    assert!(
        resources
            .iter()
            .all(|r| r.get("name") != Some(&json!("legacy_list_streams"))),
        "legacy operation must be gone after the collision overwrite"
    );

    let templates_list = mcp.request(5, "resources/templates/list", json!({})).await?;
    let templates = templates_list
        .pointer("/result/resourceTemplates")
        .and_then(Value::as_array)
        .context("missing result.resourceTemplates")?;
    assert!(
        templates
            .iter()
            .any(|t| t.get("uriTemplate") == Some(&json!("api://streams/{id}"))),
        "expected templated stream resource"
    );

    // resources/read on a plain resource carries the issued bearer token.
    let read = mcp
        .request(6, "resources/read", json!({"uri": "api://streams"}))
        .await?;
    let text = read
        .pointer("/result/contents/0/text")
        .and_then(Value::as_str)
        .context("resources/read missing text contents")?;
    let body: Value = serde_json::from_str(text)?;
    assert_eq!(body.get("auth"), Some(&json!("Bearer issued-token")));

    // resources/read on an expanded template extracts the path variable.
    let read = mcp
        .request(7, "resources/read", json!({"uri": "api://streams/42"}))
        .await?;
    let text = read
        .pointer("/result/contents/0/text")
        .and_then(Value::as_str)
        .context("resources/read missing text contents")?;
    let body: Value = serde_json::from_str(text)?;
    assert_eq!(body.get("id"), Some(&json!("42")));

    // ------------------------------------------------------------------
    // Credential caching: all calls above share one token fetch
    // ------------------------------------------------------------------
    assert_eq!(
        stub.token_fetches(),
        1,
        "credential must be fetched once and reused"
    );

    // Unknown tool maps to a JSON-RPC error, not a transport error.
    let err = mcp
        .request(8, "tools/call", json!({"name": "no_such_tool", "arguments": {}}))
        .await?;
    assert!(err.pointer("/error/message").is_some());

    Ok(())
}

#[tokio::test]
async fn startup_fails_on_missing_spec_dir() -> anyhow::Result<()> {
    let stub = StubApi::spawn().await?;
    let dir = tempdir()?;
    let missing = dir.path().join("no-such-dir");

    let port = pick_unused_port()?;
    let mut child = spawn_server(
        &missing,
        port,
        &ServerEnv {
            base_url: &stub.base_url,
            token_url: &stub.token_url,
            api_key_secret: None,
            api_token: Some("static-token"),
            access_token: None,
            org: None,
        },
    )?;

    let start = std::time::Instant::now();
    loop {
        if start.elapsed() > Duration::from_secs(15) {
            let _ = child.kill();
            anyhow::bail!("expected server to exit on missing spec dir");
        }
        if let Some(status) = child.try_wait().context("try_wait server")? {
            anyhow::ensure!(
                !status.success(),
                "expected non-zero exit on missing spec dir, got: {status}"
            );
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    Ok(())
}

#[tokio::test]
async fn static_token_mode_skips_the_issuer() -> anyhow::Result<()> {
    let stub = StubApi::spawn().await?;
    let dir = tempdir()?;
    write_specs(dir.path())?;

    let port = pick_unused_port()?;
    let child = spawn_server(
        dir.path(),
        port,
        &ServerEnv {
            base_url: &stub.base_url,
            token_url: &stub.token_url,
            api_key_secret: None,
            api_token: Some("pre-issued"),
            access_token: Some(ACCESS_TOKEN),
            org: None,
        },
    )?;
    let _child = KillOnDrop(child);

    let base = format!("http://127.0.0.1:{port}");
    wait_http_ok(&format!("{base}/health"), Duration::from_secs(30)).await?;

    let mcp = McpClient::new(&base);
    let read = mcp
        .request(1, "resources/read", json!({"uri": "api://streams"}))
        .await?;
    let text = read
        .pointer("/result/contents/0/text")
        .and_then(Value::as_str)
        .context("resources/read missing text contents")?;
    let body: Value = serde_json::from_str(text)?;

    assert_eq!(body.get("auth"), Some(&json!("Bearer pre-issued")));
    assert_eq!(stub.token_fetches(), 0, "static mode must never hit the issuer");

    Ok(())
}
