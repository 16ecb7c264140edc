//! Type definitions for LockWatch.
//!
//! Identifiers are opaque to the engine: nothing beyond equality and
//! ordering is assumed about their contents.

mod ids;

pub use ids::{ConnectionId, ResourceId, TransactionId};
