//! Configuration for LockWatch.
//!
//! This module provides configuration structures for the registry and the
//! deadlock detector, loadable from TOML.

mod watch;

pub use watch::{DeadlockConfig, LockWatchConfig, LockWatchConfigBuilder, RegistryConfig};
