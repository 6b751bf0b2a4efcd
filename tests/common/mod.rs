//! Integration test infrastructure.
//!
//! Spawns the compiled `abusegate` binary against a stub AbuseIPDB upstream.

use axum::Router;
use axum::extract::{Query, State};
use axum::routing::get;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// Stub AbuseIPDB upstream with fixed per-IP scores.
pub struct StubUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct UpstreamState {
    scores: Arc<HashMap<String, u8>>,
    hits: Arc<AtomicUsize>,
}

async fn check(
    State(state): State<UpstreamState>,
    Query(params): Query<HashMap<String, String>>,
) -> String {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let score = params
        .get("ipAddress")
        .and_then(|ip| state.scores.get(ip))
        .copied()
        .unwrap_or(0);
    format!(r#"{{"data":{{"abuseConfidenceScore":{}}}}}"#, score)
}

impl StubUpstream {
    pub async fn spawn(scores: &[(&str, u8)]) -> anyhow::Result<Self> {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = UpstreamState {
            scores: Arc::new(
                scores
                    .iter()
                    .map(|(ip, score)| (ip.to_string(), *score))
                    .collect(),
            ),
            hits: Arc::clone(&hits),
        };
        let app = Router::new()
            .route("/api/v2/check", get(check))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { addr, hits })
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/api/v2/check", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// A running gate process.
pub struct TestGate {
    child: Child,
    port: u16,
    _data_dir: tempfile::TempDir,
}

impl TestGate {
    /// Spawn the gate with the given API key and upstream endpoint.
    pub async fn spawn(api_key: &str, endpoint: &str) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let port = free_port()?;

        let config_path: PathBuf = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
listen = "127.0.0.1:{port}"
metrics_port = 0
trusted_proxies = ["127.0.0.1"]

[database]
path = "{db}"

[abuseipdb]
api_key = "{api_key}"
endpoint = "{endpoint}"
timeout_secs = 2
"#,
            db = data_dir.path().join("scores.db").display(),
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_abusegate"))
            .arg(&config_path)
            .spawn()?;

        let gate = Self {
            child,
            port,
            _data_dir: data_dir,
        };
        gate.wait_until_ready().await?;
        Ok(gate)
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Gate failed to start within 5 seconds")
    }

    /// Issue a request as if it came from `client_ip`.
    pub async fn request_from(&self, client_ip: &str) -> anyhow::Result<(u16, String)> {
        let response = reqwest::Client::new()
            .get(format!("http://127.0.0.1:{}/login", self.port))
            .header("X-Forwarded-For", client_ip)
            .send()
            .await?;
        let status = response.status().as_u16();
        Ok((status, response.text().await?))
    }
}

impl Drop for TestGate {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
