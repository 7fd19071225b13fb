//! Probe module for target liveness checks.
//!
//! A [`Prober`] runs exactly one request against a target through a
//! [`Transport`] and classifies the outcome into a [`Status`].

mod http;

pub use http::*;

use crate::models::{HttpMethod, ProbeResult, TargetConfig};
use crate::status::Status;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Probe error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("malformed target URL: {0}")]
    MalformedTarget(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP error status {0}")]
    Http(u16),
}

impl ProbeError {
    /// Status reported for a probe that failed with this error.
    pub fn status(&self) -> Status {
        match self {
            ProbeError::MalformedTarget(_) => Status::Bad,
            ProbeError::Transport(_) | ProbeError::Timeout(_) | ProbeError::Http(_) => Status::Down,
        }
    }
}

/// HTTP client used by the prober.
///
/// Implementations return the response status code. Dropping the returned
/// future must cancel the request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, method: HttpMethod, url: &Url, timeout: Duration) -> Result<u16, ProbeError>;
}

/// Parse and check a target URL before any network I/O.
pub fn parse_target_url(raw: &str) -> Result<Url, ProbeError> {
    let url = Url::parse(raw.trim()).map_err(|e| ProbeError::MalformedTarget(format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProbeError::MalformedTarget(format!(
            "{}: unsupported scheme {}",
            raw,
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ProbeError::MalformedTarget(format!("{}: missing host", raw)));
    }

    Ok(url)
}

/// Classify an HTTP response code.
pub fn classify_status_code(code: u16) -> Result<(), ProbeError> {
    if (200..400).contains(&code) {
        Ok(())
    } else {
        Err(ProbeError::Http(code))
    }
}

/// Runs single probes. Holds no state besides the shared transport.
#[derive(Clone)]
pub struct Prober {
    transport: Arc<dyn Transport>,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Probe the target once.
    ///
    /// Expected failures (bad URL, timeout, refused connection, error status)
    /// are folded into the returned result's status.
    pub async fn probe(&self, target: &TargetConfig) -> ProbeResult {
        let url = match parse_target_url(&target.url) {
            Ok(url) => url,
            Err(e) => {
                return ProbeResult {
                    status: e.status(),
                    duration_millis: None,
                    observed_at: Utc::now(),
                    error: Some(e.to_string()),
                };
            }
        };

        let timeout = target.timeout();
        let start = Instant::now();

        let outcome = match tokio::time::timeout(timeout, self.transport.send(target.method, &url, timeout)).await {
            Ok(Ok(code)) => classify_status_code(code),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };

        let duration_millis = start.elapsed().as_millis() as u64;
        let observed_at = Utc::now();

        match outcome {
            Ok(()) => ProbeResult {
                status: Status::Up,
                duration_millis: Some(duration_millis),
                observed_at,
                error: None,
            },
            Err(e) => ProbeResult {
                status: e.status(),
                duration_millis: Some(duration_millis),
                observed_at,
                error: Some(e.to_string()),
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::Ordering;

    fn target(url: &str, timeout_seconds: u64) -> TargetConfig {
        TargetConfig::new("test", url, HttpMethod::Head, 60, timeout_seconds)
    }

    #[test]
    fn test_parse_target_url() {
        assert!(parse_target_url("https://example.com/health").is_ok());
        assert!(parse_target_url("http://127.0.0.1:8080").is_ok());
        assert!(matches!(parse_target_url("not a url"), Err(ProbeError::MalformedTarget(_))));
        assert!(matches!(parse_target_url(""), Err(ProbeError::MalformedTarget(_))));
        assert!(matches!(parse_target_url("ftp://example.com"), Err(ProbeError::MalformedTarget(_))));
        assert!(matches!(parse_target_url("mailto:ops@example.com"), Err(ProbeError::MalformedTarget(_))));
    }

    #[test]
    fn test_classify_status_code() {
        assert!(classify_status_code(200).is_ok());
        assert!(classify_status_code(204).is_ok());
        assert!(classify_status_code(301).is_ok());
        assert!(classify_status_code(399).is_ok());
        assert_eq!(classify_status_code(400), Err(ProbeError::Http(400)));
        assert_eq!(classify_status_code(503), Err(ProbeError::Http(503)));
        assert_eq!(classify_status_code(199), Err(ProbeError::Http(199)));
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ProbeError::MalformedTarget("x".into()).status(), Status::Bad);
        assert_eq!(ProbeError::Transport("x".into()).status(), Status::Down);
        assert_eq!(ProbeError::Timeout(Duration::from_secs(1)).status(), Status::Down);
        assert_eq!(ProbeError::Http(500).status(), Status::Down);
    }

    #[tokio::test]
    async fn test_malformed_url_is_bad_without_network() {
        let transport = Arc::new(FixedTransport::new(200));
        let prober = Prober::new(transport.clone());

        let result = prober.probe(&target("not a url", 5)).await;

        assert_eq!(result.status, Status::Bad);
        assert_eq!(result.duration_millis, None);
        assert!(result.error.is_some());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_success_is_up() {
        let transport = Arc::new(FixedTransport::new(204));
        let prober = Prober::new(transport.clone());

        let result = prober.probe(&target("http://example.com", 5)).await;

        assert_eq!(result.status, Status::Up);
        assert!(result.duration_millis.is_some());
        assert_eq!(result.error, None);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_http_error_is_down() {
        let prober = Prober::new(Arc::new(FixedTransport::new(500)));
        let result = prober.probe(&target("http://example.com", 5)).await;
        assert_eq!(result.status, Status::Down);
        assert!(result.duration_millis.is_some());
    }

    #[tokio::test]
    async fn test_transport_failure_is_down() {
        let prober = Prober::new(Arc::new(RefusingTransport));
        let result = prober.probe(&target("http://example.com", 5)).await;
        assert_eq!(result.status, Status::Down);
        assert!(result.error.unwrap().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_down_and_bounded() {
        let transport = Arc::new(HangingTransport::default());
        let prober = Prober::new(transport.clone());

        let started = Instant::now();
        let result = prober.probe(&target("http://example.com", 3)).await;
        let elapsed = started.elapsed();

        assert_eq!(result.status, Status::Down);
        assert!(result.duration_millis.unwrap() >= 3000);
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_millis(3100));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
