//! Scheduler module: owns every running target monitor.

mod monitor;

pub use monitor::*;

use crate::models::{TargetConfig, TargetSnapshot};
use crate::probe::Prober;
use crate::sink::StatusSink;
use crate::status::{aggregate, Status};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// The monitors built from one configuration load.
#[derive(Default)]
struct Generation {
    monitors: Vec<TargetMonitor>,
}

impl Generation {
    fn stop(&self) {
        for monitor in &self.monitors {
            monitor.stop();
        }
    }
}

/// Owns the current set of [`TargetMonitor`]s and swaps it as a unit.
pub struct MonitorSet {
    prober: Prober,
    sink: Arc<dyn StatusSink>,
    current: RwLock<Arc<Generation>>,
    // Serializes replace_all/shutdown. Snapshots only take `current`.
    swap: Mutex<()>,
    shut_down: AtomicBool,
}

impl MonitorSet {
    pub fn new(prober: Prober, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            prober,
            sink,
            current: RwLock::new(Arc::new(Generation::default())),
            swap: Mutex::new(()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Stop every running monitor, then start one monitor per target in
    /// order. No callback from the old monitors fires after this returns.
    pub fn replace_all(&self, targets: Vec<TargetConfig>) {
        let _swap = self.swap.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shut_down.load(Ordering::SeqCst) {
            tracing::warn!("Scheduler: Ignoring target reload after shutdown");
            return;
        }

        self.generation().stop();

        let monitors: Vec<TargetMonitor> = targets
            .into_iter()
            .map(|target| TargetMonitor::new(target, self.prober.clone()))
            .collect();
        let board: Arc<Vec<LatestResult>> = Arc::new(monitors.iter().map(TargetMonitor::latest_handle).collect());
        let monitors = monitors
            .into_iter()
            .map(|monitor| monitor.with_on_update(notify_sink(board.clone(), self.sink.clone())))
            .collect();

        let generation = Arc::new(Generation { monitors });
        let previous = std::mem::replace(&mut *self.write_current(), generation.clone());
        drop(previous);

        tracing::info!("Scheduler: Monitoring {} targets", generation.monitors.len());

        // Fresh monitors are all Init; reset the indicator before any probe lands.
        self.sink.on_aggregate_status_changed(aggregate(board.iter().map(LatestResult::status)));
        for monitor in &generation.monitors {
            monitor.start();
        }
    }

    /// Latest result of every live monitor, in configuration order.
    pub fn snapshot(&self) -> Vec<TargetSnapshot> {
        self.generation()
            .monitors
            .iter()
            .map(|monitor| TargetSnapshot::new(monitor.target().clone(), monitor.latest()))
            .collect()
    }

    /// Worst status across the live monitors.
    pub fn aggregate_status(&self) -> Status {
        aggregate(self.generation().monitors.iter().map(|m| m.current_status().0))
    }

    pub fn targets(&self) -> Vec<TargetConfig> {
        self.generation()
            .monitors
            .iter()
            .map(|monitor| monitor.target().clone())
            .collect()
    }

    /// Stop all monitors. Later calls, and later reloads, do nothing.
    pub fn shutdown(&self) {
        let _swap = self.swap.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let previous = std::mem::take(&mut *self.write_current());
        previous.stop();
        tracing::info!("Scheduler: Stopped {} targets", previous.monitors.len());
    }

    fn generation(&self) -> Arc<Generation> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn write_current(&self) -> std::sync::RwLockWriteGuard<'_, Arc<Generation>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MonitorSet {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Per-monitor callback: forward the target's result, then recompute the
/// aggregate over its generation.
fn notify_sink(board: Arc<Vec<LatestResult>>, sink: Arc<dyn StatusSink>) -> UpdateCallback {
    Arc::new(move |target, result| {
        sink.on_target_status_changed(&target.name, result.status, result.duration_millis);
        sink.on_aggregate_status_changed(aggregate(board.iter().map(LatestResult::status)));
    })
}
