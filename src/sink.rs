//! Outbound status notifications.

use crate::status::Status;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Receives aggregate and per-target status updates, e.g. an indicator.
///
/// Called from the monitors' tasks, possibly concurrently. Implementations
/// must not call back into `MonitorSet::replace_all` or `shutdown`.
pub trait StatusSink: Send + Sync {
    fn on_aggregate_status_changed(&self, status: Status);

    fn on_target_status_changed(&self, name: &str, status: Status, duration_millis: Option<u64>);
}

/// Sink that reports status transitions through `tracing`.
#[derive(Default)]
pub struct LogSink {
    aggregate: Mutex<Option<Status>>,
    targets: Mutex<HashMap<String, Status>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the aggregate; true if it differs from the previous one.
    fn record_aggregate(&self, status: Status) -> bool {
        let mut last = self.aggregate.lock().unwrap_or_else(PoisonError::into_inner);
        last.replace(status) != Some(status)
    }

    fn record_target(&self, name: &str, status: Status) -> bool {
        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        targets.insert(name.to_string(), status) != Some(status)
    }
}

impl StatusSink for LogSink {
    fn on_aggregate_status_changed(&self, status: Status) {
        if self.record_aggregate(status) {
            tracing::info!("Overall status is now {}", status);
        }
    }

    fn on_target_status_changed(&self, name: &str, status: Status, duration_millis: Option<u64>) {
        let changed = self.record_target(name, status);
        match (changed, duration_millis) {
            (true, Some(ms)) => tracing::info!("Target {} is {} ({}ms)", name, status, ms),
            (true, None) => tracing::info!("Target {} is {}", name, status),
            (false, _) => tracing::debug!("Target {} still {} ({:?}ms)", name, status, duration_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_transitions() {
        let sink = LogSink::new();
        assert!(sink.record_aggregate(Status::Init));
        assert!(!sink.record_aggregate(Status::Init));
        assert!(sink.record_aggregate(Status::Down));
        assert!(sink.record_aggregate(Status::Up));
    }

    #[test]
    fn test_target_transitions_are_per_name() {
        let sink = LogSink::new();
        assert!(sink.record_target("api", Status::Up));
        assert!(sink.record_target("web", Status::Up));
        assert!(!sink.record_target("api", Status::Up));
        assert!(sink.record_target("api", Status::Bad));
    }
}
