//! Background deadlock monitoring.
//!
//! The detector itself is passive. A [`DeadlockMonitor`] is one possible
//! caller: a dedicated thread that runs a detection pass on a fixed period
//! and hands every detected cycle to a [`DeadlockListener`].
//!
//! A cycle that persists is reported on every pass until it is resolved.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lockwatch_common::constants::MONITOR_THREAD_NAME;
use lockwatch_common::error::{LockWatchError, LockWatchResult};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::deadlock::{DeadlockDetector, DeadlockEvent};

/// Receives deadlocks found by a [`DeadlockMonitor`].
pub trait DeadlockListener: Send + Sync {
    /// Called once per detected cycle, on the monitor thread.
    fn on_deadlock(&self, event: &DeadlockEvent);
}

impl<F> DeadlockListener for F
where
    F: Fn(&DeadlockEvent) + Send + Sync,
{
    fn on_deadlock(&self, event: &DeadlockEvent) {
        self(event);
    }
}

/// Listener that writes each deadlock to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl DeadlockListener for LoggingListener {
    fn on_deadlock(&self, event: &DeadlockEvent) {
        warn!(
            "deadlock among {:?}, recommended victim {}: {}",
            event.participants,
            event.recommended_victim,
            event.describe_chain()
        );
    }
}

/// State shared with the monitor thread.
#[derive(Debug, Default)]
struct MonitorShared {
    /// Set when the monitor should exit.
    shutdown: Mutex<bool>,
    /// Wakes the thread early on shutdown.
    wakeup: Condvar,
    /// Detection passes run.
    checks: AtomicU64,
    /// Deadlocks handed to the listener.
    reported: AtomicU64,
}

/// Periodically checks a detector for deadlocks on a background thread.
///
/// The thread stops when [`DeadlockMonitor::stop`] is called or the monitor
/// is dropped.
pub struct DeadlockMonitor {
    /// State shared with the thread.
    shared: Arc<MonitorShared>,
    /// Period between passes.
    interval: Duration,
    /// The monitor thread, taken on stop.
    handle: Option<JoinHandle<()>>,
}

impl DeadlockMonitor {
    /// Spawns the monitor thread.
    ///
    /// # Errors
    ///
    /// Returns an error if `interval` is zero or the thread cannot be
    /// spawned.
    pub fn start(
        detector: Arc<DeadlockDetector>,
        interval: Duration,
        listener: Arc<dyn DeadlockListener>,
    ) -> LockWatchResult<Self> {
        if interval.is_zero() {
            return Err(LockWatchError::invalid_config(
                "deadlock.check_interval_ms",
                "must be greater than zero",
            ));
        }

        let shared = Arc::new(MonitorShared::default());
        let thread_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name(MONITOR_THREAD_NAME.to_string())
            .spawn(move || run(&detector, interval, listener.as_ref(), &thread_shared))
            .map_err(|source| LockWatchError::MonitorSpawn { source })?;

        info!("deadlock monitor started, interval {:?}", interval);

        Ok(Self {
            shared,
            interval,
            handle: Some(handle),
        })
    }

    /// Signals the thread to exit and waits for it.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        {
            let mut shutdown = self.shared.shutdown.lock();
            *shutdown = true;
            self.shared.wakeup.notify_all();
        }

        if handle.join().is_err() {
            warn!("deadlock monitor thread panicked");
        }
        info!(
            "deadlock monitor stopped after {} checks",
            self.checks_run()
        );
    }

    /// Returns true while the thread is running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Returns the period between passes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the number of detection passes run.
    pub fn checks_run(&self) -> u64 {
        self.shared.checks.load(Ordering::Relaxed)
    }

    /// Returns the number of deadlocks handed to the listener.
    pub fn deadlocks_reported(&self) -> u64 {
        self.shared.reported.load(Ordering::Relaxed)
    }
}

impl Drop for DeadlockMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for DeadlockMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlockMonitor")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .field("checks", &self.checks_run())
            .field("reported", &self.deadlocks_reported())
            .finish()
    }
}

/// Monitor thread body.
fn run(
    detector: &DeadlockDetector,
    interval: Duration,
    listener: &dyn DeadlockListener,
    shared: &MonitorShared,
) {
    loop {
        {
            let mut shutdown = shared.shutdown.lock();
            if !*shutdown {
                shared.wakeup.wait_for(&mut shutdown, interval);
            }
            if *shutdown {
                break;
            }
        }

        shared.checks.fetch_add(1, Ordering::Relaxed);
        if let Some(event) = detector.check_for_deadlock() {
            debug!("monitor found deadlock: {}", event);
            shared.reported.fetch_add(1, Ordering::Relaxed);
            listener.on_deadlock(&event);
        }
    }
}
