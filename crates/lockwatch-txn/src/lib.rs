//! # lockwatch-txn
//!
//! Transaction tracking and deadlock detection for LockWatch.
//!
//! This crate is the in-process engine behind database instrumentation:
//!
//! - **Transaction Registry**: Binds physical connections to logical
//!   transactions and keeps each transaction's query history and timing.
//!
//! - **Deadlock Detection**: Maintains a wait-for graph from lock events,
//!   detects cycles using DFS and recommends the cheapest victim.
//!
//! - **Monitoring**: An optional background thread that checks for
//!   deadlocks on a fixed interval.
//!
//! The engine observes and reports. It never holds real database locks and
//! never aborts anything itself.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          LockWatch                             │
//! │                              │                                 │
//! │             ┌────────────────┴────────────────┐                │
//! │             │                                 │                │
//! │             ▼                                 ▼                │
//! │  ┌─────────────────────┐          ┌──────────────────────┐    │
//! │  │ TransactionRegistry │          │   DeadlockDetector   │    │
//! │  │  connection -> txn  │          │  held_by / waiting   │    │
//! │  │  txn -> context     │          │         │            │    │
//! │  └─────────────────────┘          │         ▼            │    │
//! │                                   │    WaitForGraph      │    │
//! │                                   └──────────────────────┘    │
//! │                                              ▲                 │
//! │                                   ┌──────────┴───────────┐    │
//! │                                   │   DeadlockMonitor    │    │
//! │                                   └──────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use lockwatch_common::types::{ConnectionId, ResourceId, TransactionId};
//! use lockwatch_txn::{LockWatch, TransactionStatus};
//!
//! let watch = LockWatch::new();
//! let (a, b) = (TransactionId::new("A"), TransactionId::new("B"));
//!
//! watch.begin(ConnectionId::new("c1"), a.clone());
//! watch.record_query(&ConnectionId::new("c1"), "q1", "UPDATE t SET x = 1", 12);
//!
//! watch.lock_acquired(a.clone(), ResourceId::new("R1"));
//! watch.lock_acquired(b.clone(), ResourceId::new("R2"));
//! watch.lock_requested(a.clone(), ResourceId::new("R2"));
//! watch.lock_requested(b.clone(), ResourceId::new("R1"));
//!
//! let event = watch.check_for_deadlock().unwrap();
//! assert!(event.involves(&a) && event.involves(&b));
//!
//! watch.complete(&ConnectionId::new("c1"), TransactionStatus::RolledBack);
//! assert!(watch.check_for_deadlock().is_none());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Connection binding and query history.
///
/// This module provides:
/// - [`registry::TransactionRegistry`]: Connection and context bookkeeping
/// - [`registry::TransactionContext`]: One transaction's history
/// - [`registry::TransactionMetrics`]: Metrics derived on demand
pub mod registry;

/// Deadlock detection.
///
/// This module provides:
/// - [`deadlock::DeadlockDetector`]: Consumes lock events, finds cycles
/// - [`deadlock::WaitForGraph`]: Point-in-time wait-for graph
/// - [`deadlock::DeadlockEvent`]: Information about a detected deadlock
pub mod deadlock;

/// Background deadlock monitoring.
///
/// This module provides:
/// - [`monitor::DeadlockMonitor`]: Periodic detection on its own thread
/// - [`monitor::DeadlockListener`]: Receives detected deadlocks
pub mod monitor;

/// Engine facade.
///
/// This module provides:
/// - [`engine::LockWatch`]: Registry and detector behind one handle
pub mod engine;

// Re-export commonly used types

pub use registry::{
    QueryExecution, RegistryStats, TransactionContext, TransactionMetrics, TransactionRegistry,
    TransactionStatus,
};

pub use deadlock::{
    DeadlockDetector, DeadlockEvent, DeadlockStats, DeadlockType, LockChainLink, WaitForGraph,
};

pub use monitor::{DeadlockListener, DeadlockMonitor, LoggingListener};

pub use engine::LockWatch;
