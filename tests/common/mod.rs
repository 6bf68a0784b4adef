//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adaptive_lb::health::{HealthThresholds, ProbeOutcome};
use adaptive_lb::{ServerId, ServerRegistry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A mock HTTP backend whose status code can be changed while it runs.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    status: Arc<AtomicU16>,
    hits: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        204 => "204 No Content",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a backend on an ephemeral loopback port answering every request
/// with the current status and `body`.
pub async fn start_mock_backend(status: u16, body: &'static str) -> MockBackend {
    start_backend(status, body, None).await
}

/// Like [`start_mock_backend`] but with `Content-Type: application/json`.
pub async fn start_json_backend(body: &'static str) -> MockBackend {
    start_backend(200, body, Some("application/json")).await
}

async fn start_backend(status: u16, body: &'static str, content_type: Option<&'static str>) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = MockBackend {
        addr: listener.local_addr().unwrap(),
        status: Arc::new(AtomicU16::new(status)),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let shared = backend.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let shared = shared.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 2048];
                        let _ = socket.read(&mut buf).await;
                        shared.hits.fetch_add(1, Ordering::SeqCst);

                        let content_type = content_type
                            .map(|ct| format!("Content-Type: {}\r\n", ct))
                            .unwrap_or_default();
                        let response = format!(
                            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(shared.status.load(Ordering::SeqCst)),
                            content_type,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    backend
}

/// A backend that accepts connections but never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Drive a registered server to Healthy through the threshold rule.
pub fn mark_healthy(registry: &ServerRegistry, id: &str) {
    let thresholds = HealthThresholds {
        success_threshold: 1,
        failure_threshold: 1,
    };
    registry.update_probe_result(&ServerId::new(id), &ProbeOutcome::success(10.0), &thresholds);
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
