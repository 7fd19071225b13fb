//! Recurring probe loop for a single target.

use crate::models::{ProbeResult, TargetConfig};
use crate::probe::Prober;
use crate::status::Status;

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

/// Called after every published probe result.
pub type UpdateCallback = Arc<dyn Fn(&TargetConfig, &ProbeResult) + Send + Sync>;

/// Read handle to a monitor's most recent result.
///
/// Writers replace the whole value, so readers never see a partial update.
#[derive(Clone)]
pub struct LatestResult(Arc<RwLock<ProbeResult>>);

impl LatestResult {
    fn new() -> Self {
        Self(Arc::new(RwLock::new(ProbeResult::init())))
    }

    pub fn get(&self) -> ProbeResult {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn status(&self) -> Status {
        self.0.read().unwrap_or_else(PoisonError::into_inner).status
    }

    fn set(&self, result: ProbeResult) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = result;
    }
}

/// Keeps one target's status fresh by probing it every `frequency_seconds`.
pub struct TargetMonitor {
    target: Arc<TargetConfig>,
    prober: Prober,
    latest: LatestResult,
    stopped: Arc<Mutex<bool>>,
    stop_tx: broadcast::Sender<()>,
    started: AtomicBool,
    on_update: Option<UpdateCallback>,
}

impl TargetMonitor {
    pub fn new(target: TargetConfig, prober: Prober) -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            target: Arc::new(target),
            prober,
            latest: LatestResult::new(),
            stopped: Arc::new(Mutex::new(false)),
            stop_tx,
            started: AtomicBool::new(false),
            on_update: None,
        }
    }

    /// Register the callback fired after each completed probe.
    pub fn with_on_update(mut self, on_update: UpdateCallback) -> Self {
        self.on_update = Some(on_update);
        self
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    pub fn latest_handle(&self) -> LatestResult {
        self.latest.clone()
    }

    /// Last published result; `Init` until the first probe completes.
    pub fn latest(&self) -> ProbeResult {
        self.latest.get()
    }

    pub fn current_status(&self) -> (Status, Option<u64>) {
        let latest = self.latest.get();
        (latest.status, latest.duration_millis)
    }

    /// Spawn the probe loop. The first probe fires immediately in the
    /// background. Calling this again, or after `stop`, does nothing.
    pub fn start(&self) {
        let stopped = lock(&self.stopped);
        if *stopped || self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let stop_rx = self.stop_tx.subscribe();
        drop(stopped);

        let publisher = Publisher {
            target: self.target.clone(),
            latest: self.latest.clone(),
            stopped: self.stopped.clone(),
            on_update: self.on_update.clone(),
        };

        tracing::debug!("Monitor: Starting {} ({})", self.target.name, self.target.url);
        tokio::spawn(run_probe_loop(self.prober.clone(), publisher, stop_rx));
    }

    /// Cancel the timer and any in-flight probe.
    ///
    /// Once this returns no further result is published and the update
    /// callback is not invoked again. Must not be called from inside the
    /// monitor's own update callback.
    pub fn stop(&self) {
        let mut stopped = lock(&self.stopped);
        if *stopped {
            return;
        }
        *stopped = true;
        drop(stopped);

        let _ = self.stop_tx.send(());
        tracing::debug!("Monitor: Stopped {}", self.target.name);
    }
}

impl Drop for TargetMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The loop's half of the monitor: writes results while not stopped.
struct Publisher {
    target: Arc<TargetConfig>,
    latest: LatestResult,
    stopped: Arc<Mutex<bool>>,
    on_update: Option<UpdateCallback>,
}

impl Publisher {
    /// Store the result and notify. Returns false once the monitor is stopped.
    ///
    /// The stop flag stays locked across the write and the callback, so a
    /// concurrent `stop` waits for an in-progress publish to finish.
    fn publish(&self, result: ProbeResult) -> bool {
        let stopped = lock(&self.stopped);
        if *stopped {
            tracing::debug!("Monitor: Discarding result for stopped target {}", self.target.name);
            return false;
        }

        self.latest.set(result.clone());
        if let Some(on_update) = &self.on_update {
            on_update(&self.target, &result);
        }

        true
    }
}

/// Run the probe loop for a single target.
async fn run_probe_loop(prober: Prober, publisher: Publisher, mut stop_rx: broadcast::Receiver<()>) {
    let target = publisher.target.clone();

    let mut interval = tokio::time::interval(target.frequency());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // When the previous probe finished; ticks that came due before then
    // are dropped rather than queued.
    let mut last_finished: Option<Instant> = None;

    loop {
        let scheduled = tokio::select! {
            biased;
            _ = stop_rx.recv() => break,
            scheduled = interval.tick() => scheduled,
        };

        if last_finished.is_some_and(|finished| scheduled < finished) {
            tracing::debug!("Skipping tick for {}: previous probe overran", target.name);
            continue;
        }

        let probe_target = target.clone();
        let probe_prober = prober.clone();
        let mut probe = tokio::spawn(async move { probe_prober.probe(&probe_target).await });

        let result = tokio::select! {
            biased;
            _ = stop_rx.recv() => {
                probe.abort();
                break;
            }
            joined = &mut probe => match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Probe task failed for {}: {}", target.name, e);
                    ProbeResult {
                        status: Status::Down,
                        duration_millis: None,
                        observed_at: Utc::now(),
                        error: Some(e.to_string()),
                    }
                }
            },
        };
        last_finished = Some(Instant::now());

        tracing::debug!(
            "Probe {} {}: {} in {:?}ms",
            target.method,
            target.name,
            result.status,
            result.duration_millis
        );

        if !publisher.publish(result) {
            break;
        }
    }
}

fn lock(flag: &Mutex<bool>) -> MutexGuard<'_, bool> {
    flag.lock().unwrap_or_else(PoisonError::into_inner)
}
