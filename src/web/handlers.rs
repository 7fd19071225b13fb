//! HTTP request handlers.

use super::AppState;
use crate::config::{load_targets, ConfigError};
use crate::models::{TargetConfig, TargetSnapshot};
use crate::scheduler::MonitorSet;
use crate::status::{aggregate, Status};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: Status,
    pub targets: Vec<TargetSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub targets: usize,
}

pub async fn handle_get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let targets = state.monitors.snapshot();
    // Aggregate from the same snapshot so the two always agree.
    let status = aggregate(targets.iter().map(|t| t.status));
    Json(StatusResponse { status, targets })
}

pub async fn handle_get_targets(State(state): State<AppState>) -> Json<Vec<TargetConfig>> {
    Json(state.monitors.targets())
}

pub async fn handle_reload(State(state): State<AppState>) -> impl IntoResponse {
    match reload_targets(&state.config.targets_path, &state.monitors) {
        Ok(count) => Json(ReloadResponse { targets: count }).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

/// Re-read the targets file and swap the monitor set.
///
/// On error the running monitors are left alone.
pub fn reload_targets(path: &Path, monitors: &MonitorSet) -> Result<usize, ConfigError> {
    match load_targets(path) {
        Ok(targets) => {
            let count = targets.len();
            monitors.replace_all(targets);
            Ok(count)
        }
        Err(e) => {
            tracing::warn!("Reload of {} failed, keeping current targets: {}", path.display(), e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::models::HttpMethod;
    use crate::probe::testing::FixedTransport;
    use crate::probe::Prober;
    use crate::sink::LogSink;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    fn state(targets_path: &Path) -> AppState {
        let monitors = MonitorSet::new(
            Prober::new(Arc::new(FixedTransport::new(200))),
            Arc::new(LogSink::new()),
        );
        AppState {
            config: ServerConfig {
                http_port: 0,
                targets_path: targets_path.to_path_buf(),
            },
            monitors: Arc::new(monitors),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_worst_and_targets() {
        let state = state(Path::new("unused.json"));
        state.monitors.replace_all(vec![
            TargetConfig::new("good", "http://good.example", HttpMethod::Head, 60, 5),
            TargetConfig::new("broken", "::", HttpMethod::Head, 60, 5),
        ]);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let Json(response) = handle_get_status(State(state)).await;

        assert_eq!(response.status, Status::Bad);
        assert_eq!(response.targets.len(), 2);
        assert_eq!(response.targets[0].status, Status::Up);
        assert_eq!(response.targets[1].status, Status::Bad);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_replaces_targets() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name": "a", "url": "http://a.example"}}, {{"name": "b"}}]"#).unwrap();
        let state = state(file.path());
        state
            .monitors
            .replace_all(vec![TargetConfig::new("old", "http://old.example", HttpMethod::Get, 60, 5)]);

        let count = reload_targets(file.path(), &state.monitors).unwrap();

        assert_eq!(count, 2);
        let Json(targets) = handle_get_targets(State(state)).await;
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reload_keeps_current_targets() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"frequency": 0}}]"#).unwrap();
        let state = state(file.path());
        state
            .monitors
            .replace_all(vec![TargetConfig::new("kept", "http://kept.example", HttpMethod::Get, 60, 5)]);

        let response = handle_reload(State(state.clone())).await.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.monitors.targets()[0].name, "kept");
    }
}
