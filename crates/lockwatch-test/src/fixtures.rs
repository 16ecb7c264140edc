use lockwatch_common::types::{ConnectionId, ResourceId, TransactionId};
use lockwatch_txn::DeadlockDetector;

/// Transaction id `t{i}`, zero-padded so ids sort numerically.
pub fn txn(i: usize) -> TransactionId {
    TransactionId::new(format!("t{:06}", i))
}

/// Resource id `r{i}`, zero-padded.
pub fn resource(i: usize) -> ResourceId {
    ResourceId::new(format!("r{:06}", i))
}

/// Connection id `c{i}`, zero-padded.
pub fn connection(i: usize) -> ConnectionId {
    ConnectionId::new(format!("c{:06}", i))
}

/// Builds a ring of `len` transactions starting at `first`.
///
/// Transaction `first + k` holds resource `first + k` and requests the
/// resource of its successor, so the last one waits on the first.
pub fn build_ring(detector: &DeadlockDetector, first: usize, len: usize) {
    for k in 0..len {
        detector.register_lock_acquired(txn(first + k), resource(first + k));
    }
    for k in 0..len {
        let next = first + (k + 1) % len;
        detector.register_lock_request(txn(first + k), resource(next));
    }
}

/// Builds a chain `first -> first+1 -> ... -> first+len-1` with no cycle.
pub fn build_chain(detector: &DeadlockDetector, first: usize, len: usize) {
    for k in 0..len {
        detector.register_lock_acquired(txn(first + k), resource(first + k));
    }
    for k in 0..len.saturating_sub(1) {
        detector.register_lock_request(txn(first + k), resource(first + k + 1));
    }
}
