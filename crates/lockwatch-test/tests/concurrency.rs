//! Concurrency tests for the registry and the deadlock detector.
//!
//! Many threads drive disjoint transactions at once; the final state must
//! match the arithmetic expectation exactly.

use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

use lockwatch_test::fixtures::{build_ring, connection, resource, txn};
use lockwatch_test::workload::random_ops;
use lockwatch_txn::{
    DeadlockDetector, LockWatch, TransactionContext, TransactionRegistry, TransactionStatus,
};

const THREADS: usize = 8;
const PER_THREAD: usize = 200;
const READERS: usize = 4;
const APPENDS: u64 = 5_000;

#[test]
fn test_concurrent_contexts_and_locks() {
    let registry = Arc::new(TransactionRegistry::new());
    let detector = Arc::new(DeadlockDetector::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            let detector = Arc::clone(&detector);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    let n = worker * PER_THREAD + i;
                    registry.register_transaction(connection(n), txn(n));
                    registry.record_query(&txn(n), "q1", "SELECT 1", 1);
                    // Two resources per transaction, one also requested by a neighbour.
                    detector.register_lock_acquired(txn(n), resource(2 * n));
                    detector.register_lock_acquired(txn(n), resource(2 * n + 1));
                    detector.register_lock_request(txn(n), resource(usize::MAX - n));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let total = THREADS * PER_THREAD;
    assert_eq!(registry.context_count(), total);
    assert_eq!(registry.get_active_transaction_count(), total);
    assert_eq!(registry.stats().contexts_created(), total as u64);
    assert_eq!(registry.stats().queries_recorded(), total as u64);
    assert_eq!(detector.held_resource_count(), 2 * total);
    assert_eq!(detector.waiting_transaction_count(), total);
    assert_eq!(detector.transaction_count(), total);
    assert!(detector.check_for_deadlock().is_none());
}

#[test]
fn test_concurrent_first_access_creates_once() {
    let registry = Arc::new(TransactionRegistry::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|i| registry.get_or_create_transaction_context(&txn(i)))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(registry.context_count(), PER_THREAD);
    assert_eq!(registry.stats().contexts_created(), PER_THREAD as u64);
    for contexts in &results[1..] {
        for (a, b) in results[0].iter().zip(contexts) {
            assert!(Arc::ptr_eq(a, b));
        }
    }
}

#[test]
fn test_concurrent_completion_leaves_nothing_behind() {
    let watch = Arc::new(LockWatch::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let watch = Arc::clone(&watch);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    let n = worker * PER_THREAD + i;
                    watch.begin(connection(n), txn(n));
                    watch.lock_acquired(txn(n), resource(n));
                    watch.lock_requested(txn(n), resource(n + 1));
                    watch.complete(&connection(n), TransactionStatus::Committed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let detector = watch.detector();
    assert_eq!(detector.transaction_count(), 0);
    assert_eq!(detector.held_resource_count(), 0);
    assert_eq!(watch.registry().get_active_transaction_count(), 0);
    assert_eq!(watch.registry().stats().committed(), (THREADS * PER_THREAD) as u64);
}

#[test]
fn test_detection_during_concurrent_mutation() {
    let detector = Arc::new(DeadlockDetector::new());

    // A permanent ring that every check must see while noise churns around it.
    build_ring(&detector, 1_000_000, 3);
    let ring: BTreeSet<_> = (1_000_000..1_000_003).map(txn).collect();

    let writers: Vec<_> = (0..4u64)
        .map(|seed| {
            let detector = Arc::clone(&detector);
            thread::spawn(move || {
                for op in random_ops(seed, 50, 20, 5_000) {
                    op.apply(&detector);
                }
            })
        })
        .collect();

    let reader = {
        let detector = Arc::clone(&detector);
        thread::spawn(move || {
            let mut found = 0;
            for _ in 0..200 {
                for event in detector.detect_all_deadlocks() {
                    if event.participants == ring {
                        found += 1;
                    }
                    assert!(event.participants.contains(&event.recommended_victim));
                    assert_eq!(event.lock_chain.len(), event.participants.len());
                }
            }
            found
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    assert_eq!(reader.join().unwrap(), 200);
}

#[test]
fn test_metrics_during_appends() {
    let context = Arc::new(TransactionContext::new(txn(0)));
    let barrier = Arc::new(Barrier::new(READERS + 1));

    // Query i takes i ms, so any prefix of k queries sums to k(k-1)/2.
    let writer = {
        let context = Arc::clone(&context);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..APPENDS {
                assert!(context.add_query(format!("q{}", i), "UPDATE t SET x = x + 1", i));
            }
        })
    };

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let context = Arc::clone(&context);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut last = 0;
                while last < APPENDS as usize {
                    let metrics = context.build_metrics();
                    let k = metrics.query_count as u64;

                    assert!(metrics.query_count >= last);
                    assert_eq!(metrics.total_execution_time_ms, k * k.saturating_sub(1) / 2);
                    assert_eq!(metrics.max_execution_time_ms, k.saturating_sub(1));
                    last = metrics.query_count;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let metrics = context.build_metrics();
    assert_eq!(metrics.query_count, APPENDS as usize);
    assert_eq!(metrics.total_execution_time_ms, APPENDS * (APPENDS - 1) / 2);

    let ids: Vec<String> = context.queries().into_iter().map(|q| q.query_id).collect();
    let expected: Vec<String> = (0..APPENDS).map(|i| format!("q{}", i)).collect();
    assert_eq!(ids, expected);
}
