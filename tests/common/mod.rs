#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use file_log_publisher::delivery::{DeliveryClient, DeliveryError, DeliveryOutcome};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Stub collector: records payloads, answers with scripted outcomes and
/// tracks how many sends overlap.
pub struct StubClient {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    delay: Duration,
    sent: Mutex<Vec<Vec<u8>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubClient {
    pub fn new(fallback: bool) -> Arc<Self> {
        Self::build(&[], fallback, Duration::ZERO)
    }

    pub fn scripted(script: &[bool], fallback: bool) -> Arc<Self> {
        Self::build(script, fallback, Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(&[], true, delay)
    }

    fn build(script: &[bool], fallback: bool, delay: Duration) -> Arc<Self> {
        Arc::new(StubClient {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            delay,
            sent: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Bodies sent so far, lossily decoded.
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryClient for StubClient {
    async fn send(&self, payload: &[u8]) -> DeliveryOutcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.sent.lock().unwrap().push(payload.to_vec());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let ok = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if ok {
            DeliveryOutcome::Delivered
        } else {
            DeliveryOutcome::Failed(DeliveryError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }
}

pub fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

/// Poll `cond` every 10ms until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// A request captured by [`spawn_collector`].
#[derive(Debug)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
struct CollectorState {
    status: StatusCode,
    stall: Option<Duration>,
    requests: mpsc::UnboundedSender<CapturedRequest>,
}

/// Collector answering every request with `status`.
///
/// Returns the base URL and a receiver of captured requests.
pub async fn spawn_collector(status: u16) -> (String, mpsc::UnboundedReceiver<CapturedRequest>) {
    serve_collector(status, None).await
}

/// Collector that accepts requests but does not answer for `stall`.
pub async fn spawn_stalled_collector(
    stall: Duration,
) -> (String, mpsc::UnboundedReceiver<CapturedRequest>) {
    serve_collector(200, Some(stall)).await
}

async fn serve_collector(
    status: u16,
    stall: Option<Duration>,
) -> (String, mpsc::UnboundedReceiver<CapturedRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = CollectorState {
        status: StatusCode::from_u16(status).unwrap(),
        stall,
        requests: tx,
    };
    let app = Router::new().fallback(capture).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}", addr), rx)
}

async fn capture(
    State(state): State<CollectorState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let _ = state.requests.send(CapturedRequest {
        method,
        path: uri.path().to_string(),
        content_type: header_value(header::CONTENT_TYPE),
        user_agent: header_value(header::USER_AGENT),
        body: body.to_vec(),
    });

    if let Some(stall) = state.stall {
        tokio::time::sleep(stall).await;
    }
    (state.status, format!("status {}", state.status.as_u16()))
}
