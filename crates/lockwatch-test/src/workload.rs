use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lockwatch_common::types::{ResourceId, TransactionId};
use lockwatch_txn::DeadlockDetector;

use crate::fixtures::{resource, txn};

/// A lock event produced by a workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOp {
    /// The transaction acquired the resource.
    Acquire(TransactionId, ResourceId),
    /// The transaction is waiting for the resource.
    Request(TransactionId, ResourceId),
    /// The transaction released the resource.
    Release(TransactionId, ResourceId),
}

impl LockOp {
    /// Applies the event to a detector.
    pub fn apply(&self, detector: &DeadlockDetector) {
        match self {
            LockOp::Acquire(t, r) => detector.register_lock_acquired(t.clone(), r.clone()),
            LockOp::Request(t, r) => detector.register_lock_request(t.clone(), r.clone()),
            LockOp::Release(t, r) => detector.register_lock_released(t, r),
        }
    }
}

/// Generates a reproducible stream of random lock events.
pub fn random_ops(seed: u64, transactions: usize, resources: usize, count: usize) -> Vec<LockOp> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let t = txn(rng.gen_range(0..transactions));
            let r = resource(rng.gen_range(0..resources));
            match rng.gen_range(0..3) {
                0 => LockOp::Acquire(t, r),
                1 => LockOp::Request(t, r),
                _ => LockOp::Release(t, r),
            }
        })
        .collect()
}
