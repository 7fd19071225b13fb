//! Configuration module.
//!
//! Server settings come from environment variables with sensible defaults;
//! the list of targets comes from a JSON file that can be reloaded at runtime.

use crate::models::{HttpMethod, TargetConfig};

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_FREQUENCY_SECONDS: u64 = 120;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the status API (default: 8080)
    pub http_port: u16,
    /// Path to the targets file (default: "targets.json")
    pub targets_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            targets_path: PathBuf::from("targets.json"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SERVER_STATUS_HTTP_PORT`: HTTP port (default: 8080)
    /// - `SERVER_STATUS_TARGETS`: Targets file path (default: "targets.json")
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("SERVER_STATUS_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(path) = env::var("SERVER_STATUS_TARGETS") {
            cfg.targets_path = PathBuf::from(path);
        }

        cfg
    }
}

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse targets: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("target #{index}: {reason}")]
    Invalid { index: usize, reason: String },
}

/// A JSON value that may be a number or a numeric/boolean string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl Loose {
    fn as_seconds(&self, field: &str) -> Result<i64, String> {
        match self {
            Loose::Number(n) => Ok(*n),
            Loose::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("{} must be a whole number of seconds, got {:?}", field, s)),
            Loose::Bool(b) => Err(format!("{} must be a number, got {}", field, b)),
        }
    }

    fn is_true(&self) -> bool {
        match self {
            Loose::Bool(b) => *b,
            Loose::Text(s) => s.trim().eq_ignore_ascii_case("true"),
            Loose::Number(_) => false,
        }
    }
}

/// One target as written in the targets file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    frequency: Option<Loose>,
    #[serde(default)]
    timeout: Option<Loose>,
    #[serde(default)]
    method: Option<String>,
    /// Older files stored the method as `"is_get": "true" | "false"`.
    #[serde(default)]
    is_get: Option<Loose>,
}

impl TargetRecord {
    /// Apply defaults and validate.
    ///
    /// The URL is passed through untouched: a malformed URL is reported by
    /// the prober as `bad`, not rejected here.
    pub fn into_target(self, index: usize) -> Result<TargetConfig, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid { index, reason };

        let frequency = match &self.frequency {
            Some(v) => v.as_seconds("frequency").map_err(invalid)?,
            None => DEFAULT_FREQUENCY_SECONDS as i64,
        };
        let timeout = match &self.timeout {
            Some(v) => v.as_seconds("timeout").map_err(invalid)?,
            None => DEFAULT_TIMEOUT_SECONDS as i64,
        };
        if frequency < 1 {
            return Err(invalid(format!("frequency must be at least 1 second, got {}", frequency)));
        }
        if timeout < 1 {
            return Err(invalid(format!("timeout must be at least 1 second, got {}", timeout)));
        }

        let method = match (self.method.as_deref(), &self.is_get) {
            (Some(m), _) => parse_method(m).map_err(invalid)?,
            (None, Some(is_get)) if is_get.is_true() => HttpMethod::Get,
            (None, _) => HttpMethod::Head,
        };

        Ok(TargetConfig::new(
            self.name.as_deref().unwrap_or_default(),
            self.url.as_deref().unwrap_or_default(),
            method,
            frequency as u64,
            timeout as u64,
        ))
    }
}

fn parse_method(raw: &str) -> Result<HttpMethod, String> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "GET" => Ok(HttpMethod::Get),
        "HEAD" => Ok(HttpMethod::Head),
        other => Err(format!("unsupported method {:?}, expected GET or HEAD", other)),
    }
}

/// Parse a JSON array of target records.
pub fn parse_targets(json: &str) -> Result<Vec<TargetConfig>, ConfigError> {
    let records: Vec<TargetRecord> = serde_json::from_str(json)?;
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| record.into_target(index))
        .collect()
}

/// Read and parse the targets file.
pub fn load_targets(path: &Path) -> Result<Vec<TargetConfig>, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_targets(&json)
}

/// Like [`load_targets`], but a missing file means no targets.
pub fn load_targets_or_empty(path: &Path) -> Result<Vec<TargetConfig>, ConfigError> {
    match load_targets(path) {
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Targets file {} not found, starting with no targets", path.display());
            Ok(Vec::new())
        }
        other => other,
    }
}
