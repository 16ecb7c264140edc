//! Engine facade combining the registry and the deadlock detector.
//!
//! [`LockWatch`] is the handle handed to the instrumentation layer. It owns
//! one [`TransactionRegistry`] and one [`DeadlockDetector`] and applies the
//! engine configuration to both, so a caller only needs to forward what it
//! observes:
//!
//! ```text
//!   instrumentation layer
//!          │ begin / record_query / lock_* / complete
//!          ▼
//!   ┌─────────────┐      ┌──────────────────────┐
//!   │  LockWatch  │─────▶│ TransactionRegistry  │
//!   │             │      └──────────────────────┘
//!   │             │      ┌──────────────────────┐      ┌─────────────────┐
//!   │             │─────▶│   DeadlockDetector   │◀─────│ DeadlockMonitor │
//!   └─────────────┘      └──────────────────────┘      └─────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use lockwatch_common::config::LockWatchConfig;
use lockwatch_common::error::{LockWatchError, LockWatchResult};
use lockwatch_common::types::{ConnectionId, ResourceId, TransactionId};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::deadlock::{DeadlockDetector, DeadlockEvent};
use crate::monitor::{DeadlockListener, DeadlockMonitor};
use crate::registry::{TransactionContext, TransactionMetrics, TransactionRegistry, TransactionStatus};

/// Transaction and deadlock monitoring engine.
///
/// Construct one per monitored process (or per test) and share it by
/// handle; there is no global instance.
pub struct LockWatch {
    /// Connection bindings and query history.
    registry: Arc<TransactionRegistry>,
    /// Wait-for graph.
    detector: Arc<DeadlockDetector>,
    /// Configuration.
    config: LockWatchConfig,
    /// Background monitor, when started.
    monitor: Mutex<Option<DeadlockMonitor>>,
}

impl LockWatch {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::build(LockWatchConfig::default())
    }

    /// Creates an engine with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn with_config(config: LockWatchConfig) -> LockWatchResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: LockWatchConfig) -> Self {
        info!(
            "lockwatch engine created (deadlock detection {}, check on request {})",
            config.deadlock.enabled, config.deadlock.check_on_request
        );
        Self {
            registry: Arc::new(TransactionRegistry::with_config(config.registry.clone())),
            detector: Arc::new(DeadlockDetector::with_config(config.deadlock.clone())),
            config,
            monitor: Mutex::new(None),
        }
    }

    /// Binds a connection to a transaction and returns its context.
    pub fn begin(
        &self,
        connection_id: ConnectionId,
        transaction_id: TransactionId,
    ) -> Arc<TransactionContext> {
        self.registry
            .register_transaction(connection_id, transaction_id)
    }

    /// Records a query against whatever transaction the connection serves.
    ///
    /// Returns the transaction, or `None` if the connection is unbound, in
    /// which case nothing is recorded.
    pub fn record_query(
        &self,
        connection_id: &ConnectionId,
        query_id: impl Into<String>,
        sql: impl Into<String>,
        execution_time_ms: u64,
    ) -> Option<TransactionId> {
        let Some(transaction_id) = self.registry.get_transaction_id(connection_id) else {
            debug!("dropping query on unbound connection {}", connection_id);
            return None;
        };
        self.registry
            .record_query(&transaction_id, query_id, sql, execution_time_ms);
        Some(transaction_id)
    }

    /// Reports that a transaction acquired a lock.
    pub fn lock_acquired(&self, transaction_id: TransactionId, resource: ResourceId) {
        if self.config.deadlock.enabled {
            self.detector.register_lock_acquired(transaction_id, resource);
        }
    }

    /// Reports that a transaction is waiting for a lock.
    ///
    /// With `check_on_request` set, a detection pass runs immediately and
    /// its result is returned.
    pub fn lock_requested(
        &self,
        transaction_id: TransactionId,
        resource: ResourceId,
    ) -> Option<DeadlockEvent> {
        if !self.config.deadlock.enabled {
            return None;
        }
        self.detector.register_lock_request(transaction_id, resource);

        if self.config.deadlock.check_on_request {
            self.detector.check_for_deadlock()
        } else {
            None
        }
    }

    /// Reports that a transaction released a lock.
    pub fn lock_released(&self, transaction_id: &TransactionId, resource: &ResourceId) {
        if self.config.deadlock.enabled {
            self.detector.register_lock_released(transaction_id, resource);
        }
    }

    /// Sets the abort cost used when picking a deadlock victim.
    pub fn set_cost(&self, transaction_id: TransactionId, cost: i64) {
        if self.config.deadlock.enabled {
            self.detector.register_transaction_cost(transaction_id, cost);
        }
    }

    /// Ends the transaction a connection serves.
    ///
    /// The connection is unbound and the transaction's lock state is torn
    /// down. Its history is dropped too unless the configuration retains
    /// completed contexts.
    pub fn complete(
        &self,
        connection_id: &ConnectionId,
        status: TransactionStatus,
    ) -> Option<TransactionId> {
        let transaction_id = self.registry.complete_transaction(connection_id, status)?;

        self.detector.on_transaction_completed(&transaction_id);
        if !self.config.registry.retain_completed_contexts {
            self.registry.remove_transaction_context(&transaction_id);
        }

        Some(transaction_id)
    }

    /// Checks for a deadlock now.
    pub fn check_for_deadlock(&self) -> Option<DeadlockEvent> {
        if !self.config.deadlock.enabled {
            return None;
        }
        self.detector.check_for_deadlock()
    }

    /// Returns metrics for a transaction.
    pub fn metrics(&self, transaction_id: &TransactionId) -> Option<TransactionMetrics> {
        self.registry.metrics(transaction_id)
    }

    /// Returns active transactions past the long-running threshold.
    pub fn long_running_transactions(&self) -> Vec<TransactionMetrics> {
        self.registry.long_running_transactions()
    }

    /// Starts the background monitor using the configured interval.
    ///
    /// # Errors
    ///
    /// Returns an error if deadlock detection is disabled, a monitor is
    /// already running, or the thread cannot be spawned.
    pub fn start_monitor(&self, listener: Arc<dyn DeadlockListener>) -> LockWatchResult<()> {
        if !self.config.deadlock.enabled {
            return Err(LockWatchError::invalid_config(
                "deadlock.enabled",
                "deadlock detection is disabled",
            ));
        }

        let mut slot = self.monitor.lock();
        if slot.as_ref().is_some_and(DeadlockMonitor::is_running) {
            return Err(LockWatchError::MonitorRunning);
        }

        *slot = Some(DeadlockMonitor::start(
            Arc::clone(&self.detector),
            self.config.deadlock.check_interval(),
            listener,
        )?);
        Ok(())
    }

    /// Stops the background monitor. Returns false if none was running.
    pub fn stop_monitor(&self) -> bool {
        let monitor = self.monitor.lock().take();
        match monitor {
            Some(mut monitor) => {
                monitor.stop();
                true
            }
            None => false,
        }
    }

    /// Returns true while a background monitor is running.
    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(DeadlockMonitor::is_running)
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<TransactionRegistry> {
        &self.registry
    }

    /// Returns the deadlock detector.
    pub fn detector(&self) -> &Arc<DeadlockDetector> {
        &self.detector
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LockWatchConfig {
        &self.config
    }
}

impl Default for LockWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockWatch")
            .field("registry", &self.registry)
            .field("detector", &self.detector)
            .field("monitoring", &self.is_monitoring())
            .finish()
    }
}
