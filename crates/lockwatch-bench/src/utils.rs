//! Benchmark utilities and helpers.

use lockwatch_common::types::{ConnectionId, ResourceId, TransactionId};
use lockwatch_txn::DeadlockDetector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates sequential transaction ids.
pub fn generate_transaction_ids(count: usize) -> Vec<TransactionId> {
    (0..count)
        .map(|i| TransactionId::new(format!("txn{:08}", i)))
        .collect()
}

/// Generates sequential connection ids.
pub fn generate_connection_ids(count: usize) -> Vec<ConnectionId> {
    (0..count)
        .map(|i| ConnectionId::new(format!("conn{:08}", i)))
        .collect()
}

/// Generates sequential resource ids.
pub fn generate_resource_ids(count: usize) -> Vec<ResourceId> {
    (0..count)
        .map(|i| ResourceId::new(format!("row{:08}", i)))
        .collect()
}

/// Builds a detector holding a wait chain of `len` transactions and no cycle.
pub fn chain_detector(len: usize) -> DeadlockDetector {
    let detector = DeadlockDetector::new();
    let txns = generate_transaction_ids(len);
    let resources = generate_resource_ids(len);

    for (t, r) in txns.iter().zip(&resources) {
        detector.register_lock_acquired(t.clone(), r.clone());
    }
    for i in 1..len {
        detector.register_lock_request(txns[i - 1].clone(), resources[i].clone());
    }
    detector
}

/// Builds a detector holding a single ring of `len` transactions.
pub fn ring_detector(len: usize) -> DeadlockDetector {
    let detector = chain_detector(len);
    if len > 1 {
        detector.register_lock_request(
            TransactionId::new(format!("txn{:08}", len - 1)),
            ResourceId::new(format!("row{:08}", 0)),
        );
    }
    detector
}

/// Builds a detector with random holdings and requests.
///
/// Each transaction holds one resource; requests only point at resources
/// held by higher-numbered transactions, so the graph stays acyclic and a
/// detection pass has to visit everything.
pub fn random_acyclic_detector(transactions: usize, requests: usize) -> DeadlockDetector {
    let mut rng = StdRng::seed_from_u64(42);
    let detector = DeadlockDetector::new();
    let txns = generate_transaction_ids(transactions);
    let resources = generate_resource_ids(transactions);

    for (t, r) in txns.iter().zip(&resources) {
        detector.register_lock_acquired(t.clone(), r.clone());
    }
    if transactions < 2 {
        return detector;
    }
    for _ in 0..requests {
        let waiter = rng.gen_range(0..transactions - 1);
        let holder = rng.gen_range(waiter + 1..transactions);
        detector.register_lock_request(txns[waiter].clone(), resources[holder].clone());
    }
    detector
}
