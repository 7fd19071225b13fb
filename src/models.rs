//! Model types shared by the prober, the scheduler and the web layer.

use crate::status::Status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// HTTP method used to poll a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One endpoint to poll.
///
/// Never mutated after construction: a configuration change produces a new
/// list and new monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    /// Seconds between probes, at least 1.
    pub frequency_seconds: u64,
    /// Per-probe deadline in seconds, at least 1.
    pub timeout_seconds: u64,
}

impl TargetConfig {
    pub fn new(name: &str, url: &str, method: HttpMethod, frequency_seconds: u64, timeout_seconds: u64) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            method,
            frequency_seconds,
            timeout_seconds,
        }
    }

    pub fn frequency(&self) -> Duration {
        Duration::from_secs(self.frequency_seconds.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub status: Status,
    /// Round-trip time, or `None` when no request was started.
    pub duration_millis: Option<u64>,
    pub observed_at: DateTime<Utc>,
    /// Why the probe was classified `Down` or `Bad`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    /// Placeholder published before the first probe completes.
    pub fn init() -> Self {
        Self {
            status: Status::Init,
            duration_millis: None,
            observed_at: Utc::now(),
            error: None,
        }
    }
}

/// Point-in-time view of one monitored target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSnapshot {
    pub target: TargetConfig,
    pub status: Status,
    pub duration_millis: Option<u64>,
    pub observed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetSnapshot {
    pub fn new(target: TargetConfig, result: ProbeResult) -> Self {
        Self {
            target,
            status: result.status,
            duration_millis: result.duration_millis,
            observed_at: result.observed_at,
            error: result.error,
        }
    }
}
