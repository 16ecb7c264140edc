//! Error handling for LockWatch.
//!
//! The event path never fails; these errors only surface from
//! configuration handling and from starting the background monitor.

mod watch;

pub use watch::{ErrorCode, LockWatchError};

/// Result type alias for LockWatch operations.
pub type LockWatchResult<T> = std::result::Result<T, LockWatchError>;
