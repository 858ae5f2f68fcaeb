//! Readiness probing of the core's external controller.
//!
//! # Responsibilities
//! - Poll the controller until it answers with a success status
//! - Bound the wait so a wedged core fails the start instead of hanging it
//!
//! # Design Decisions
//! - Jittered exponential backoff between polls, capped
//! - Bearer secret sent when the config declares one
//! - Never routed through any system proxy

use std::time::{Duration, Instant};
use tokio::time;

use crate::config::ReadinessConfig;
use crate::resilience::backoff::calculate_backoff;
use crate::sources::CoreConfigSummary;
use crate::supervisor::error::SupervisorError;

#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    client: reqwest::Client,
    timeout: Duration,
    base_interval_ms: u64,
    max_interval_ms: u64,
    path: String,
}

impl ReadinessProbe {
    pub fn new(config: &ReadinessConfig) -> Result<Self, reqwest::Error> {
        let request_timeout = Duration::from_millis(config.max_interval_ms.max(500));
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
            base_interval_ms: config.base_interval_ms,
            max_interval_ms: config.max_interval_ms,
            path: config.path.clone(),
        })
    }

    /// Override the overall wait, mostly for tests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn wait_ready(&self, summary: &CoreConfigSummary) -> Result<(), SupervisorError> {
        let address = summary.controller_probe_address();
        let url = format!("http://{}{}", address, self.path);
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let mut request = self.client.get(&url);
            if let Some(secret) = &summary.secret {
                request = request.bearer_auth(secret);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(
                        address = %address,
                        attempts = attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Core controller ready"
                    );
                    return Ok(());
                }
                Ok(response) => {
                    tracing::debug!(address = %address, status = %response.status(), "Controller not ready yet");
                }
                Err(e) => {
                    tracing::debug!(address = %address, error = %e, "Controller not reachable yet");
                }
            }

            let delay = calculate_backoff(attempt, self.base_interval_ms, self.max_interval_ms);
            if Instant::now() + delay >= deadline {
                let waited_ms = started.elapsed().as_millis() as u64;
                tracing::warn!(address = %address, attempts = attempt, waited_ms, "Core controller never became ready");
                return Err(SupervisorError::NotReady { address, waited_ms });
            }
            time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn summary_for(addr: std::net::SocketAddr, secret: Option<&str>) -> CoreConfigSummary {
        let mut yaml = format!("external-controller: {}\n", addr);
        if let Some(secret) = secret {
            yaml.push_str(&format!("secret: {}\n", secret));
        }
        CoreConfigSummary::parse(&yaml).unwrap()
    }

    fn fast_config() -> ReadinessConfig {
        ReadinessConfig {
            enabled: true,
            timeout_secs: 5,
            base_interval_ms: 20,
            max_interval_ms: 100,
            path: "/version".into(),
        }
    }

    #[tokio::test]
    async fn test_ready_after_controller_comes_up() {
        let hits = Arc::new(AtomicU32::new(0));
        let h = hits.clone();
        let app = Router::new().route(
            "/version",
            get(move || {
                let h = h.clone();
                async move {
                    if h.fetch_add(1, Ordering::SeqCst) < 2 {
                        StatusCode::SERVICE_UNAVAILABLE
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let probe = ReadinessProbe::new(&fast_config()).unwrap();
        probe.wait_ready(&summary_for(addr, None)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sends_bearer_secret() {
        let app = Router::new().route(
            "/version",
            get(|headers: axum::http::HeaderMap| async move {
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("Bearer hunter2") => StatusCode::OK,
                    _ => StatusCode::UNAUTHORIZED,
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let probe = ReadinessProbe::new(&fast_config()).unwrap();
        probe.wait_ready(&summary_for(addr, Some("hunter2"))).await.unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_timeout() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let probe = ReadinessProbe::new(&fast_config())
            .unwrap()
            .with_timeout(Duration::from_millis(300));

        let started = Instant::now();
        let err = probe.wait_ready(&summary_for(addr, None)).await.unwrap_err();
        assert!(matches!(err, SupervisorError::NotReady { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
