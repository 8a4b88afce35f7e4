// ABOUTME: HTTP health gating for freshly started releases.
// ABOUTME: Polls localhost:<port><path> on a fixed interval until healthy, exhausted, or cancelled.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::shutdown::Shutdown;

/// One health probe against a local port.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Returns true when the endpoint answered with a non-error status.
    async fn check(&self, port: u16, path: &str) -> bool;
}

/// Plain HTTP/1.1 GET over a fresh TCP connection per attempt.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    request_timeout: Duration,
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(2),
        }
    }
}

impl HttpProbe {
    pub fn with_timeout(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    async fn get(port: u16, path: &str) -> Result<hyper::StatusCode, String> {
        let stream = TcpStream::connect(("127.0.0.1", port))
            .await
            .map_err(|e| format!("connect failed: {}", e))?;
        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| format!("HTTP handshake failed: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("health probe connection error: {}", e);
            }
        });

        let req = hyper::Request::builder()
            .method("GET")
            .uri(path)
            .header("Host", format!("localhost:{}", port))
            .header("User-Agent", "mushak-health")
            .body(Empty::<Bytes>::new())
            .map_err(|e| format!("failed to build request: {}", e))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        Ok(resp.status())
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self, port: u16, path: &str) -> bool {
        match tokio::time::timeout(self.request_timeout, Self::get(port, path)).await {
            Ok(Ok(status)) => {
                tracing::debug!(port, path, %status, "health probe answered");
                !status.is_client_error() && !status.is_server_error()
            }
            Ok(Err(e)) => {
                tracing::debug!(port, path, "health probe failed: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!(port, path, "health probe timed out");
                false
            }
        }
    }
}

/// How often and how long to poll.
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    pub path: String,
    pub attempts: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    Healthy { attempts: u32 },
    Unhealthy { attempts: u32 },
    Interrupted { attempts: u32 },
}

/// Poll until the probe succeeds, the attempt budget runs out, or shutdown fires.
pub async fn wait_healthy(
    probe: &dyn HealthProbe,
    port: u16,
    policy: &HealthPolicy,
    shutdown: &Shutdown,
) -> HealthOutcome {
    let mut shutdown = shutdown.clone();

    for attempt in 1..=policy.attempts {
        if shutdown.is_triggered() {
            return HealthOutcome::Interrupted {
                attempts: attempt - 1,
            };
        }

        if probe.check(port, &policy.path).await {
            return HealthOutcome::Healthy { attempts: attempt };
        }
        tracing::debug!(port, attempt, budget = policy.attempts, "not healthy yet");

        if attempt < policy.attempts {
            tokio::select! {
                _ = tokio::time::sleep(policy.interval) => {}
                _ = shutdown.triggered() => {
                    return HealthOutcome::Interrupted { attempts: attempt };
                }
            }
        }
    }

    HealthOutcome::Unhealthy {
        attempts: policy.attempts,
    }
}
