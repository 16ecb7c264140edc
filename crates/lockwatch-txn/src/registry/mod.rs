//! Transaction registry for connection binding and query history.
//!
//! This module tracks the logical side of monitored database work:
//! - Which transaction a physical connection currently serves
//! - Each transaction's query history and timing
//! - On-demand metrics derived from that history
//!
//! # Transaction States
//!
//! ```text
//! ┌───────┐  first reference  ┌────────┐
//! │ Start │──────────────────▶│ Active │
//! └───────┘                   └────────┘
//!                                  │
//!                        ┌─────────┴─────────┐
//!                        │                   │
//!                     commit             rollback
//!                        │                   │
//!                        ▼                   ▼
//!                 ┌───────────┐      ┌────────────┐
//!                 │ Committed │      │ RolledBack │
//!                 └───────────┘      └────────────┘
//! ```
//!
//! Completing a transaction on its connection only drops the connection
//! mapping. The context and its history stay until
//! [`TransactionRegistry::remove_transaction_context`] is called.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use dashmap::DashMap;
use lockwatch_common::config::RegistryConfig;
use lockwatch_common::types::{ConnectionId, TransactionId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Transaction is still running.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

impl TransactionStatus {
    /// Returns true if the transaction is still running.
    pub fn is_active(&self) -> bool {
        *self == TransactionStatus::Active
    }

    /// Returns true if the transaction has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Committed | TransactionStatus::RolledBack
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "Active"),
            TransactionStatus::Committed => write!(f, "Committed"),
            TransactionStatus::RolledBack => write!(f, "RolledBack"),
        }
    }
}

/// A single statement executed within a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryExecution {
    /// Caller-assigned query identifier.
    pub query_id: String,
    /// Statement text, possibly normalized upstream.
    pub sql: String,
    /// Time spent executing the statement.
    pub execution_time_ms: u64,
}

impl QueryExecution {
    /// Creates a new query record.
    pub fn new(query_id: impl Into<String>, sql: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            query_id: query_id.into(),
            sql: sql.into(),
            execution_time_ms,
        }
    }
}

/// Metrics derived from a transaction's history at a point in time.
///
/// `duration_ms` is wall time since the transaction started, while
/// `total_execution_time_ms` sums statement time. The gap between the two
/// is idle or lock-wait time, and the sum may also exceed the wall time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetrics {
    /// The transaction these metrics describe.
    pub transaction_id: TransactionId,
    /// Status when the metrics were built.
    pub status: TransactionStatus,
    /// Number of recorded queries.
    pub query_count: usize,
    /// Sum of all query execution times.
    pub total_execution_time_ms: u64,
    /// Longest single query.
    pub max_execution_time_ms: u64,
    /// Queries at or above the slow-query threshold.
    pub slow_query_count: usize,
    /// Milliseconds since the transaction started.
    pub duration_ms: u64,
}

/// The query history and timing of one logical transaction.
pub struct TransactionContext {
    /// Transaction identifier.
    id: TransactionId,
    /// Monotonic start, used for durations.
    started_at: Instant,
    /// Wall-clock start, used for reporting.
    started_wall: SystemTime,
    /// Current status.
    status: Mutex<TransactionStatus>,
    /// Queries in execution order.
    queries: RwLock<Vec<QueryExecution>>,
    /// Threshold used to classify slow queries.
    slow_query_threshold_ms: u64,
}

impl TransactionContext {
    /// Creates a new active context with the default slow-query threshold.
    pub fn new(id: TransactionId) -> Self {
        Self::with_slow_query_threshold(id, RegistryConfig::default().slow_query_threshold_ms)
    }

    /// Creates a new active context with a specific slow-query threshold.
    pub fn with_slow_query_threshold(id: TransactionId, slow_query_threshold_ms: u64) -> Self {
        Self {
            id,
            started_at: Instant::now(),
            started_wall: SystemTime::now(),
            status: Mutex::new(TransactionStatus::Active),
            queries: RwLock::new(Vec::new()),
            slow_query_threshold_ms,
        }
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    /// Returns the current status.
    pub fn status(&self) -> TransactionStatus {
        *self.status.lock()
    }

    /// Records the transaction's status.
    pub fn set_status(&self, status: TransactionStatus) {
        *self.status.lock() = status;
    }

    /// Returns when the transaction started (wall clock).
    pub fn started_at(&self) -> SystemTime {
        self.started_wall
    }

    /// Returns how long the transaction has been running.
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Appends a query to the history and returns true.
    ///
    /// The history is frozen once the status is terminal: the query is
    /// dropped and false is returned. Concurrent readers see either the
    /// history before or after the append, never a partially written record.
    pub fn add_query(
        &self,
        query_id: impl Into<String>,
        sql: impl Into<String>,
        execution_time_ms: u64,
    ) -> bool {
        // Held across the push so a concurrent completion cannot interleave.
        let status = self.status.lock();
        if status.is_terminal() {
            debug!("dropping query for {} transaction {}", *status, self.id);
            return false;
        }

        let query = QueryExecution::new(query_id, sql, execution_time_ms);
        self.queries.write().push(query);
        true
    }

    /// Returns the number of recorded queries.
    pub fn query_count(&self) -> usize {
        self.queries.read().len()
    }

    /// Returns a copy of the query history.
    pub fn queries(&self) -> Vec<QueryExecution> {
        self.queries.read().clone()
    }

    /// Returns the queries whose execution time reached `threshold_ms`.
    pub fn slow_queries(&self, threshold_ms: u64) -> Vec<QueryExecution> {
        self.queries
            .read()
            .iter()
            .filter(|q| q.execution_time_ms >= threshold_ms)
            .cloned()
            .collect()
    }

    /// Builds metrics as of now. Never cached.
    pub fn build_metrics(&self) -> TransactionMetrics {
        let (query_count, total, max, slow) = {
            let queries = self.queries.read();
            let total = queries
                .iter()
                .fold(0u64, |acc, q| acc.saturating_add(q.execution_time_ms));
            let max = queries.iter().map(|q| q.execution_time_ms).max().unwrap_or(0);
            let slow = queries
                .iter()
                .filter(|q| q.execution_time_ms >= self.slow_query_threshold_ms)
                .count();
            (queries.len(), total, max, slow)
        };

        TransactionMetrics {
            transaction_id: self.id.clone(),
            status: self.status(),
            query_count,
            total_execution_time_ms: total,
            max_execution_time_ms: max,
            slow_query_count: slow,
            duration_ms: u64::try_from(self.duration().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("queries", &self.query_count())
            .finish()
    }
}

/// Statistics about the registry.
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Contexts created.
    contexts_created: AtomicU64,
    /// Queries recorded through the registry.
    queries_recorded: AtomicU64,
    /// Queries at or above the slow-query threshold.
    slow_queries: AtomicU64,
    /// Transactions completed as committed.
    committed: AtomicU64,
    /// Transactions completed as rolled back.
    rolled_back: AtomicU64,
}

impl RegistryStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn record_context_created(&self) {
        self.contexts_created.fetch_add(1, AtomicOrdering::Relaxed);
    }

    #[inline]
    fn record_query(&self, slow: bool) {
        self.queries_recorded.fetch_add(1, AtomicOrdering::Relaxed);
        if slow {
            self.slow_queries.fetch_add(1, AtomicOrdering::Relaxed);
        }
    }

    #[inline]
    fn record_completion(&self, status: TransactionStatus) {
        match status {
            TransactionStatus::Committed => {
                self.committed.fetch_add(1, AtomicOrdering::Relaxed);
            }
            TransactionStatus::RolledBack => {
                self.rolled_back.fetch_add(1, AtomicOrdering::Relaxed);
            }
            TransactionStatus::Active => {}
        }
    }

    /// Returns the number of contexts created.
    pub fn contexts_created(&self) -> u64 {
        self.contexts_created.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of queries recorded.
    pub fn queries_recorded(&self) -> u64 {
        self.queries_recorded.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of slow queries recorded.
    pub fn slow_queries(&self) -> u64 {
        self.slow_queries.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of committed completions.
    pub fn committed(&self) -> u64 {
        self.committed.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of rolled back completions.
    pub fn rolled_back(&self) -> u64 {
        self.rolled_back.load(AtomicOrdering::Relaxed)
    }
}

/// Binds connections to transactions and owns every transaction's history.
pub struct TransactionRegistry {
    /// Connection -> transaction it currently serves.
    connections: DashMap<ConnectionId, TransactionId>,
    /// Transaction -> connection serving it (inverse of `connections`).
    bindings: DashMap<TransactionId, ConnectionId>,
    /// Transaction -> its context.
    contexts: DashMap<TransactionId, Arc<TransactionContext>>,
    /// Configuration.
    config: RegistryConfig,
    /// Statistics.
    stats: RegistryStats,
}

impl TransactionRegistry {
    /// Creates a new registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates a registry with custom configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            connections: DashMap::new(),
            bindings: DashMap::new(),
            contexts: DashMap::new(),
            config,
            stats: RegistryStats::new(),
        }
    }

    /// Binds `connection_id` to `transaction_id` and returns the
    /// transaction's context, creating it if needed.
    ///
    /// The binding is one-to-one in both directions, last write wins. A
    /// connection that served another transaction is rebound. A transaction
    /// already served by another connection moves to `connection_id`, and
    /// the earlier connection is left unbound, so completing it later no
    /// longer touches this transaction.
    pub fn register_transaction(
        &self,
        connection_id: ConnectionId,
        transaction_id: TransactionId,
    ) -> Arc<TransactionContext> {
        let context = self.get_or_create_transaction_context(&transaction_id);

        if let Some(previous) = self
            .connections
            .insert(connection_id.clone(), transaction_id.clone())
        {
            if previous != transaction_id {
                debug!(
                    "connection {} moved from transaction {} to {}",
                    connection_id, previous, transaction_id
                );
                self.bindings
                    .remove_if(&previous, |_, owner| *owner == connection_id);
            }
        }

        if let Some(owner) = self
            .bindings
            .insert(transaction_id.clone(), connection_id.clone())
        {
            if owner != connection_id {
                warn!(
                    "transaction {} taken over by connection {}, unbinding {}",
                    transaction_id, connection_id, owner
                );
                self.connections
                    .remove_if(&owner, |_, bound| *bound == transaction_id);
            }
        }

        debug!(
            "connection {} now serves transaction {}",
            connection_id, transaction_id
        );
        context
    }

    /// Returns the transaction bound to the connection, if any.
    pub fn get_transaction_id(&self, connection_id: &ConnectionId) -> Option<TransactionId> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    /// Returns the existing context or creates a new active one.
    ///
    /// Concurrent first calls for the same id observe a single context.
    pub fn get_or_create_transaction_context(
        &self,
        transaction_id: &TransactionId,
    ) -> Arc<TransactionContext> {
        if let Some(existing) = self.contexts.get(transaction_id) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .contexts
            .entry(transaction_id.clone())
            .or_insert_with(|| {
                self.stats.record_context_created();
                debug!("created context for transaction {}", transaction_id);
                Arc::new(TransactionContext::with_slow_query_threshold(
                    transaction_id.clone(),
                    self.config.slow_query_threshold_ms,
                ))
            });
        Arc::clone(entry.value())
    }

    /// Returns the context for a transaction without creating one.
    pub fn get_transaction_context(
        &self,
        transaction_id: &TransactionId,
    ) -> Option<Arc<TransactionContext>> {
        self.contexts
            .get(transaction_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Appends a query to a transaction's history, creating the context if
    /// needed. Slow queries are counted and logged.
    ///
    /// Returns false if the transaction has already ended, in which case
    /// nothing is recorded.
    pub fn record_query(
        &self,
        transaction_id: &TransactionId,
        query_id: impl Into<String>,
        sql: impl Into<String>,
        execution_time_ms: u64,
    ) -> bool {
        let context = self.get_or_create_transaction_context(transaction_id);
        let sql = sql.into();
        let slow = execution_time_ms >= self.config.slow_query_threshold_ms;

        if slow && context.status().is_active() {
            warn!(
                "slow query in transaction {}: {}ms (threshold {}ms): {}",
                transaction_id, execution_time_ms, self.config.slow_query_threshold_ms, sql
            );
        }

        if !context.add_query(query_id, sql, execution_time_ms) {
            return false;
        }
        self.stats.record_query(slow);
        true
    }

    /// Drops the connection's binding and returns the transaction it served.
    ///
    /// A terminal `status` is recorded on the transaction's context. The
    /// context itself is kept.
    pub fn complete_transaction(
        &self,
        connection_id: &ConnectionId,
        status: TransactionStatus,
    ) -> Option<TransactionId> {
        let (_, transaction_id) = self.connections.remove(connection_id)?;
        self.bindings
            .remove_if(&transaction_id, |_, owner| owner == connection_id);

        if status.is_terminal() {
            if let Some(context) = self.get_transaction_context(&transaction_id) {
                context.set_status(status);
            }
        }
        self.stats.record_completion(status);

        debug!(
            "connection {} completed transaction {} as {}",
            connection_id, transaction_id, status
        );
        Some(transaction_id)
    }

    /// Forgets a transaction's context and history.
    pub fn remove_transaction_context(
        &self,
        transaction_id: &TransactionId,
    ) -> Option<Arc<TransactionContext>> {
        self.contexts
            .remove(transaction_id)
            .map(|(_, context)| context)
    }

    /// Returns the number of connections currently bound to a transaction.
    pub fn get_active_transaction_count(&self) -> usize {
        self.connections.len()
    }

    /// Returns the number of contexts held.
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Returns metrics for one transaction, if it is known.
    pub fn metrics(&self, transaction_id: &TransactionId) -> Option<TransactionMetrics> {
        self.get_transaction_context(transaction_id)
            .map(|context| context.build_metrics())
    }

    /// Returns metrics for active transactions running at least as long as
    /// the configured threshold, longest first.
    pub fn long_running_transactions(&self) -> Vec<TransactionMetrics> {
        let threshold = self.config.long_transaction_threshold();
        let contexts: Vec<Arc<TransactionContext>> = self
            .contexts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut long_running: Vec<TransactionMetrics> = contexts
            .iter()
            .filter(|context| context.status().is_active() && context.duration() >= threshold)
            .map(|context| context.build_metrics())
            .collect();

        long_running.sort_by(|a, b| {
            b.duration_ms
                .cmp(&a.duration_ms)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        long_running
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns statistics.
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransactionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRegistry")
            .field("active_count", &self.get_active_transaction_count())
            .field("context_count", &self.context_count())
            .finish()
    }
}
