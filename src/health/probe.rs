//! Single-backend probe: optional TCP connect, then optional HTTP GET.
//!
//! Both enabled stages must pass for the probe to count as a success.
//! Every stage is bounded by the policy timeout.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Request, Response};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time;

use crate::health::policy::HealthCheckPolicy;
use crate::registry::{ResourceGauges, ServerDescriptor};

const USER_AGENT: &str = "adaptive-lb-health-check/0.1";
const MAX_GAUGE_BODY: usize = 64 * 1024;

/// Why a probe failed. Recorded as `last_error`, never propagated.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("TCP connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} probe timed out after {timeout:?}")]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },
    #[error("unexpected status code: {0}")]
    Status(u16),
    #[error("HTTP request failed: {0}")]
    Request(String),
    #[error("invalid health check URI '{0}'")]
    InvalidUri(String),
}

/// Result of one probe as applied to the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub success: bool,
    pub latency_ms: f64,
    pub gauges: Option<ResourceGauges>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn success(latency_ms: f64) -> Self {
        Self {
            success: true,
            latency_ms,
            gauges: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            latency_ms: 0.0,
            gauges: None,
            error: Some(error.into()),
        }
    }

    pub fn with_gauges(mut self, gauges: ResourceGauges) -> Self {
        self.gauges = Some(gauges);
        self
    }
}

/// Issues probes. Cheap to share; the HTTP client pools connections.
#[derive(Clone)]
pub struct Prober {
    client: Client<HttpConnector, Body>,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    pub async fn probe(&self, server: &ServerDescriptor, policy: &HealthCheckPolicy) -> ProbeOutcome {
        let start = Instant::now();
        match self.run_stages(server, policy).await {
            Ok(gauges) => {
                let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                let outcome = ProbeOutcome::success(latency_ms);
                match gauges {
                    Some(g) => outcome.with_gauges(g),
                    None => outcome,
                }
            }
            Err(e) => {
                tracing::debug!(server = %server.id, error = %e, "Health probe failed");
                ProbeOutcome::failure(e.to_string())
            }
        }
    }

    async fn run_stages(
        &self,
        server: &ServerDescriptor,
        policy: &HealthCheckPolicy,
    ) -> Result<Option<ResourceGauges>, ProbeError> {
        if policy.tcp_check {
            self.check_tcp(server, policy).await?;
        }
        if policy.http_check {
            return self.check_http(server, policy).await;
        }
        Ok(None)
    }

    async fn check_tcp(&self, server: &ServerDescriptor, policy: &HealthCheckPolicy) -> Result<(), ProbeError> {
        let port = policy.tcp_port.unwrap_or(server.port);
        let addr = format!("{}:{}", server.host, port);

        match time::timeout(policy.timeout, TcpStream::connect((server.host.as_str(), port))).await {
            // Connect-and-close.
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(source)) => Err(ProbeError::Connect { addr, source }),
            Err(_) => Err(ProbeError::Timeout {
                stage: "tcp",
                timeout: policy.timeout,
            }),
        }
    }

    async fn check_http(
        &self,
        server: &ServerDescriptor,
        policy: &HealthCheckPolicy,
    ) -> Result<Option<ResourceGauges>, ProbeError> {
        let uri = server.health_check_url(&policy.path);
        let request = Request::builder()
            .method("GET")
            .uri(&uri)
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())
            .map_err(|_| ProbeError::InvalidUri(uri.clone()))?;

        let response = match time::timeout(policy.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ProbeError::Request(e.to_string())),
            Err(_) => {
                return Err(ProbeError::Timeout {
                    stage: "http",
                    timeout: policy.timeout,
                })
            }
        };

        let status = response.status().as_u16();
        if !policy.expected_statuses.contains(&status) {
            return Err(ProbeError::Status(status));
        }

        Ok(read_gauges(response, policy.timeout).await)
    }
}

/// Best effort: a JSON health body may carry `cpu_usage` / `memory_usage`.
async fn read_gauges(response: Response<Incoming>, timeout: Duration) -> Option<ResourceGauges> {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return None;
    }

    let body = Body::new(response.into_body());
    let bytes = time::timeout(timeout, axum::body::to_bytes(body, MAX_GAUGE_BODY))
        .await
        .ok()?
        .ok()?;

    serde_json::from_slice::<ResourceGauges>(&bytes)
        .ok()
        .map(ResourceGauges::clamped)
        .filter(|g| !g.is_empty())
}
