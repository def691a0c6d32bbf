//! Shared integration-test helpers.

use anyhow::Context as _;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::Child;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
    }
}

/// Pick an unused TCP port on localhost.
///
/// Note: this does not reserve the port; it's still possible for another
/// process to bind it before you do.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails or if the
/// bound socket's local address cannot be read.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll an HTTP URL until it returns a success status (2xx/3xx).
///
/// # Errors
///
/// Returns an error if the timeout elapses before the endpoint returns a
/// success status.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }
}

/// A stub upstream Quortex API + token issuer for integration tests.
///
/// Serves:
/// - `POST /v1/token`: issues `{"access_token": "issued-token"}` and counts hits
/// - `GET /streams`: echoes the received `Authorization` header
/// - `GET /streams/{id}`: echoes the path variable
/// - `POST /ingest/inputs`: echoes the received JSON body
#[derive(Clone)]
pub struct StubApi {
    pub base_url: String,
    pub token_url: String,
    token_hits: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct StubState {
    token_hits: Arc<AtomicUsize>,
}

async fn issue_token(State(state): State<StubState>) -> Json<Value> {
    state.token_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "access_token": "issued-token",
        "expires_at": "2099-01-01T00:00:00Z"
    }))
}

async fn list_streams(headers: HeaderMap) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({"streams": [], "auth": auth}))
}

async fn get_stream(Path(id): Path<String>) -> Json<Value> {
    Json(json!({"id": id}))
}

async fn create_input(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"received": body}))
}

impl StubApi {
    /// Spawn the stub on an ephemeral localhost port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn spawn() -> anyhow::Result<Self> {
        let token_hits = Arc::new(AtomicUsize::new(0));
        let state = StubState {
            token_hits: Arc::clone(&token_hits),
        };

        let app = Router::new()
            .route("/v1/token", post(issue_token))
            .route("/streams", get(list_streams))
            .route("/streams/{id}", get(get_stream))
            .route("/ingest/inputs", post(create_input))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind stub api")?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            token_url: format!("http://{addr}/v1/token"),
            token_hits,
        })
    }

    #[must_use]
    pub fn token_fetches(&self) -> usize {
        self.token_hits.load(Ordering::SeqCst)
    }
}
