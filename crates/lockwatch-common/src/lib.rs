//! # lockwatch-common
//!
//! Common types, errors, and configuration for LockWatch.
//!
//! This crate provides the foundational pieces shared by the registry and
//! the deadlock detector:
//!
//! - **Types**: String-backed identifiers (`TransactionId`, `ConnectionId`,
//!   `ResourceId`)
//! - **Errors**: Unified error handling with `LockWatchError`
//! - **Config**: Engine configuration loaded from TOML
//! - **Constants**: Default thresholds and intervals
//!
//! ## Example
//!
//! ```rust
//! use lockwatch_common::types::{ConnectionId, ResourceId, TransactionId};
//! use lockwatch_common::config::LockWatchConfig;
//!
//! let txn = TransactionId::new("txn-1");
//! let conn = ConnectionId::new("conn-7");
//! let row = ResourceId::new("accounts:42");
//! assert_eq!(txn.as_str(), "txn-1");
//! assert!(LockWatchConfig::default().validate().is_ok());
//! # let _ = (conn, row);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{ErrorCode, LockWatchError, LockWatchResult};
pub use types::{ConnectionId, ResourceId, TransactionId};
