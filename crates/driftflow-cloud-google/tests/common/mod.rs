//! Scripted HTTP API for transport integration tests.

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// A request as the server saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
    pub body: String,
}

impl Recorded {
    /// Decoded query parameter
    pub fn query(&self, key: &str) -> Option<String> {
        let url = url::Url::parse(&format!("http://local{}", self.uri)).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<(StatusCode, String)>,
    requests: Vec<Recorded>,
}

type Shared = Arc<Mutex<Script>>;

/// Mock API server answering requests with queued replies, in order
pub struct MockApi {
    pub addr: SocketAddr,
    script: Shared,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockApi {
    pub async fn spawn() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let script = Shared::default();
        let router = Router::new().fallback(handle).with_state(script.clone());

        // Bind to port 0 to let the OS choose
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        // Small delay to ensure server is ready
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        Self {
            addr,
            script,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL ending with a slash
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path)
    }

    pub fn reply(&self, status: u16, body: &str) {
        self.script.lock().unwrap().replies.push_back((
            StatusCode::from_u16(status).unwrap(),
            body.to_string(),
        ));
    }

    pub fn reply_json(&self, body: serde_json::Value) {
        self.reply(200, &body.to_string());
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.script.lock().unwrap().requests.clone()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle(
    State(script): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let mut script = script.lock().unwrap();
    script.requests.push(Recorded {
        method,
        uri,
        authorization: header("authorization"),
        user_agent: header("user-agent"),
        body,
    });
    script.replies.pop_front().unwrap_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        "no reply scripted".to_string(),
    ))
}
