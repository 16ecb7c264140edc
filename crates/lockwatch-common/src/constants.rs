//! System-wide constants for LockWatch.

// =============================================================================
// Registry Defaults
// =============================================================================

/// Queries at or above this execution time (in milliseconds) count as slow.
pub const DEFAULT_SLOW_QUERY_THRESHOLD_MS: u64 = 1_000;

/// Transactions open longer than this (in milliseconds) count as long-running.
pub const DEFAULT_LONG_TRANSACTION_THRESHOLD_MS: u64 = 30_000;

// =============================================================================
// Deadlock Detection Defaults
// =============================================================================

/// Period of the background deadlock monitor, in milliseconds.
pub const DEFAULT_DEADLOCK_CHECK_INTERVAL_MS: u64 = 100;

/// Cost assumed for transactions that never registered one.
///
/// Zero makes an unregistered transaction the cheapest to abort.
pub const DEFAULT_TRANSACTION_COST: i64 = 0;

/// Name given to the background monitor thread.
pub const MONITOR_THREAD_NAME: &str = "lockwatch-deadlock-monitor";
