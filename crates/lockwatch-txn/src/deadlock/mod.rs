//! Deadlock detection using wait-for graph analysis.
//!
//! This module turns a stream of lock events into deadlock reports:
//! - A lock table recording which transaction holds each resource and which
//!   resources each transaction is still waiting for
//! - A wait-for graph (WFG) derived from that table on demand
//! - Cycle detection using DFS
//! - Victim selection by registered cost
//!
//! # Wait-For Graph
//!
//! An edge exists from T1 to T2 when T1 waits for a resource held by T2:
//! ```text
//! T1 waits for R2, held by T2:  T1 -> T2
//! T2 waits for R3, held by T3:  T2 -> T3
//! T3 waits for R1, held by T1:  T3 -> T1 (cycle = deadlock!)
//! ```
//!
//! # Deadlock Resolution
//!
//! The detector only recommends a victim; aborting it is up to the caller.
//! The victim is the participant with the lowest registered cost, where an
//! unregistered cost counts as zero. Equal costs go to the smallest
//! transaction id.
//!
//! # Consistency
//!
//! Every event is applied under a single mutex. A detection pass copies the
//! edges under that mutex and traverses the copy after releasing it, so a
//! reported cycle always existed at one instant.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use lockwatch_common::config::DeadlockConfig;
use lockwatch_common::constants::DEFAULT_TRANSACTION_COST;
use lockwatch_common::types::{ResourceId, TransactionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Kind of deadlock detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeadlockType {
    /// Transactions wait on each other in a cycle.
    CircularWait,
}

impl fmt::Display for DeadlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlockType::CircularWait => write!(f, "CircularWait"),
        }
    }
}

/// One edge of a detected cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockChainLink {
    /// The blocked transaction.
    pub waiter: TransactionId,
    /// The resource it is waiting for.
    pub resource: ResourceId,
    /// The transaction holding that resource.
    pub holder: TransactionId,
}

impl fmt::Display for LockChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} waits for {} held by {}",
            self.waiter, self.resource, self.holder
        )
    }
}

/// Result of deadlock detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlockEvent {
    /// The transactions forming the cycle.
    pub participants: BTreeSet<TransactionId>,
    /// Kind of deadlock.
    pub deadlock_type: DeadlockType,
    /// The participant recommended for abort.
    pub recommended_victim: TransactionId,
    /// The cycle's edges in order, starting from the smallest participant.
    pub lock_chain: Vec<LockChainLink>,
    /// When the deadlock was detected.
    pub detection_time: SystemTime,
}

impl DeadlockEvent {
    /// Returns the number of transactions in the cycle.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Returns true if the transaction is part of the cycle.
    pub fn involves(&self, txn_id: &TransactionId) -> bool {
        self.participants.contains(txn_id)
    }

    /// Renders the lock chain as a single line.
    pub fn describe_chain(&self) -> String {
        self.lock_chain
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl fmt::Display for DeadlockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} among {} transactions, victim {}: {}",
            self.deadlock_type,
            self.participant_count(),
            self.recommended_victim,
            self.describe_chain()
        )
    }
}

/// An outgoing wait-for edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct WaitEdge {
    /// The transaction being waited on.
    holder: TransactionId,
    /// The resource that links the two.
    resource: ResourceId,
}

/// Point-in-time wait-for graph.
///
/// Built from the detector's lock table and traversed without holding any
/// lock. Nodes and edges are kept in ascending order so traversal is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct WaitForGraph {
    /// Edges: waiter -> holders it is waiting for, with the linking resource.
    edges: BTreeMap<TransactionId, Vec<WaitEdge>>,
    /// Registered costs of the transactions in the graph.
    costs: HashMap<TransactionId, i64>,
}

impl WaitForGraph {
    /// Returns the number of transactions with outgoing edges.
    pub fn waiter_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns the number of wait edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Returns the transactions a waiter is blocked on.
    pub fn get_waits(&self, waiter: &TransactionId) -> Vec<TransactionId> {
        self.edges
            .get(waiter)
            .map(|edges| edges.iter().map(|e| e.holder.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the cost used for victim selection.
    pub fn cost_of(&self, txn_id: &TransactionId) -> i64 {
        self.costs
            .get(txn_id)
            .copied()
            .unwrap_or(DEFAULT_TRANSACTION_COST)
    }

    /// Finds the first cycle in ascending transaction order.
    pub fn find_cycle(&self) -> Option<Vec<LockChainLink>> {
        self.find_cycle_excluding(&HashSet::new())
    }

    /// Finds node-disjoint cycles until none remain.
    pub fn find_all_cycles(&self) -> Vec<Vec<LockChainLink>> {
        let mut excluded: HashSet<&TransactionId> = HashSet::new();
        let mut cycles = Vec::new();

        while let Some(cycle) = self.find_cycle_excluding(&excluded) {
            for link in &cycle {
                if let Some((waiter, _)) = self.edges.get_key_value(&link.waiter) {
                    excluded.insert(waiter);
                }
            }
            cycles.push(cycle);
        }

        cycles
    }

    /// Iterative DFS that ignores `excluded` nodes.
    ///
    /// `links[i]` is the edge leaving `stack[i]`; when an edge reaches a
    /// node already on the stack at depth `d`, `links[d..]` is the cycle.
    fn find_cycle_excluding<'a>(
        &'a self,
        excluded: &HashSet<&'a TransactionId>,
    ) -> Option<Vec<LockChainLink>> {
        let mut visited: HashSet<&'a TransactionId> = HashSet::new();

        for start in self.edges.keys() {
            if excluded.contains(start) || visited.contains(start) {
                continue;
            }

            let mut stack: Vec<(&'a TransactionId, usize)> = vec![(start, 0)];
            let mut on_stack: HashMap<&'a TransactionId, usize> = HashMap::new();
            let mut links: Vec<LockChainLink> = Vec::new();
            visited.insert(start);
            on_stack.insert(start, 0);

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                let edges = self.edges.get(node).map(Vec::as_slice).unwrap_or(&[]);

                if top.1 == edges.len() {
                    stack.pop();
                    on_stack.remove(node);
                    links.pop();
                    continue;
                }

                let edge = &edges[top.1];
                top.1 += 1;

                if excluded.contains(&edge.holder) {
                    continue;
                }

                links.push(LockChainLink {
                    waiter: node.clone(),
                    resource: edge.resource.clone(),
                    holder: edge.holder.clone(),
                });

                if let Some(&depth) = on_stack.get(&edge.holder) {
                    return Some(rotate_to_smallest(links.split_off(depth)));
                }

                if visited.insert(&edge.holder) {
                    on_stack.insert(&edge.holder, stack.len());
                    stack.push((&edge.holder, 0));
                } else {
                    links.pop();
                }
            }
        }

        None
    }

    /// Picks the participant with the lowest cost, then the smallest id.
    pub fn select_victim<'a>(
        &self,
        participants: impl IntoIterator<Item = &'a TransactionId>,
    ) -> Option<TransactionId> {
        participants
            .into_iter()
            .min_by(|a, b| {
                self.cost_of(a)
                    .cmp(&self.cost_of(b))
                    .then_with(|| a.cmp(b))
            })
            .cloned()
    }
}

/// Starts the chain at its smallest waiter.
fn rotate_to_smallest(mut chain: Vec<LockChainLink>) -> Vec<LockChainLink> {
    let start = chain
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.waiter.cmp(&b.waiter))
        .map_or(0, |(i, _)| i);
    chain.rotate_left(start);
    chain
}

/// Statistics about deadlock detection.
#[derive(Debug, Default)]
pub struct DeadlockStats {
    /// Number of detection checks performed.
    pub checks: AtomicU64,
    /// Number of deadlocks found.
    pub deadlocks_found: AtomicU64,
    /// Number of lock events applied.
    pub lock_events: AtomicU64,
}

impl DeadlockStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Lock facts reported by the instrumentation layer.
#[derive(Debug, Default)]
struct LockTable {
    /// Resource -> the transaction holding it.
    held_by: HashMap<ResourceId, TransactionId>,
    /// Transaction -> resources it holds (inverse of `held_by`).
    holdings: HashMap<TransactionId, BTreeSet<ResourceId>>,
    /// Transaction -> resources requested but not yet acquired.
    waiting_for: HashMap<TransactionId, BTreeSet<ResourceId>>,
    /// Registered abort costs.
    costs: HashMap<TransactionId, i64>,
}

impl LockTable {
    fn drop_holding(&mut self, txn_id: &TransactionId, resource: &ResourceId) {
        if let Some(resources) = self.holdings.get_mut(txn_id) {
            resources.remove(resource);
            if resources.is_empty() {
                self.holdings.remove(txn_id);
            }
        }
    }

    fn drop_wait(&mut self, txn_id: &TransactionId, resource: &ResourceId) -> bool {
        let Some(resources) = self.waiting_for.get_mut(txn_id) else {
            return false;
        };
        let removed = resources.remove(resource);
        if resources.is_empty() {
            self.waiting_for.remove(txn_id);
        }
        removed
    }

    fn snapshot(&self) -> WaitForGraph {
        let mut graph = WaitForGraph::default();

        for (waiter, resources) in &self.waiting_for {
            let mut edges: Vec<WaitEdge> = resources
                .iter()
                .filter_map(|resource| {
                    self.held_by
                        .get(resource)
                        .filter(|holder| *holder != waiter)
                        .map(|holder| WaitEdge {
                            holder: holder.clone(),
                            resource: resource.clone(),
                        })
                })
                .collect();

            if edges.is_empty() {
                continue;
            }
            edges.sort();

            for txn_id in std::iter::once(waiter).chain(edges.iter().map(|e| &e.holder)) {
                if let Some(&cost) = self.costs.get(txn_id) {
                    graph.costs.insert(txn_id.clone(), cost);
                }
            }
            graph.edges.insert(waiter.clone(), edges);
        }

        graph
    }
}

/// Maintains the lock table and answers whether a deadlock exists now.
pub struct DeadlockDetector {
    /// The lock table, guarded as a whole.
    table: Mutex<LockTable>,
    /// Configuration.
    config: DeadlockConfig,
    /// Statistics.
    stats: DeadlockStats,
}

impl DeadlockDetector {
    /// Creates a new deadlock detector.
    pub fn new() -> Self {
        Self::with_config(DeadlockConfig::default())
    }

    /// Creates a detector with custom configuration.
    pub fn with_config(config: DeadlockConfig) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            config,
            stats: DeadlockStats::new(),
        }
    }

    /// Records that `txn_id` now holds `resource`.
    ///
    /// A pending request by `txn_id` for the same resource is satisfied. If
    /// another transaction was recorded as holder, it is replaced.
    pub fn register_lock_acquired(&self, txn_id: TransactionId, resource: ResourceId) {
        self.stats.lock_events.fetch_add(1, AtomicOrdering::Relaxed);
        let mut table = self.table.lock();

        table.drop_wait(&txn_id, &resource);

        if let Some(previous) = table.held_by.insert(resource.clone(), txn_id.clone()) {
            if previous != txn_id {
                debug!(
                    "resource {} moved from {} to {} without a release",
                    resource, previous, txn_id
                );
                table.drop_holding(&previous, &resource);
            }
        }

        table.holdings.entry(txn_id).or_default().insert(resource);
    }

    /// Records that `txn_id` is waiting for `resource`.
    ///
    /// The resource need not be held by anyone. A request for a resource
    /// the transaction already holds is ignored.
    pub fn register_lock_request(&self, txn_id: TransactionId, resource: ResourceId) {
        self.stats.lock_events.fetch_add(1, AtomicOrdering::Relaxed);
        let mut table = self.table.lock();

        if table.held_by.get(&resource) == Some(&txn_id) {
            debug!(
                "ignoring request by {} for {} which it already holds",
                txn_id, resource
            );
            return;
        }

        table.waiting_for.entry(txn_id).or_default().insert(resource);
    }

    /// Records that `txn_id` released `resource`.
    ///
    /// Ignored unless `txn_id` is the recorded holder. Waiters are not
    /// granted the resource; a later acquisition event does that.
    pub fn register_lock_released(&self, txn_id: &TransactionId, resource: &ResourceId) {
        self.stats.lock_events.fetch_add(1, AtomicOrdering::Relaxed);
        let mut table = self.table.lock();

        if table.held_by.get(resource) != Some(txn_id) {
            debug!(
                "ignoring release by {} of {} which it does not hold",
                txn_id, resource
            );
            return;
        }

        table.held_by.remove(resource);
        table.drop_holding(txn_id, resource);
    }

    /// Stores the abort cost of a transaction, replacing any previous value.
    pub fn register_transaction_cost(&self, txn_id: TransactionId, cost: i64) {
        self.table.lock().costs.insert(txn_id, cost);
    }

    /// Returns the registered cost, or the default when none was registered.
    pub fn transaction_cost(&self, txn_id: &TransactionId) -> i64 {
        self.table
            .lock()
            .costs
            .get(txn_id)
            .copied()
            .unwrap_or(DEFAULT_TRANSACTION_COST)
    }

    /// Returns true if the transaction holds or waits for any resource.
    pub fn is_transaction_active(&self, txn_id: &TransactionId) -> bool {
        let table = self.table.lock();
        table.holdings.get(txn_id).is_some_and(|r| !r.is_empty())
            || table.waiting_for.get(txn_id).is_some_and(|r| !r.is_empty())
    }

    /// Returns the resources the transaction is waiting for.
    pub fn get_resources_waiting_for(&self, txn_id: &TransactionId) -> BTreeSet<ResourceId> {
        self.table
            .lock()
            .waiting_for
            .get(txn_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the resources the transaction holds.
    pub fn get_resources_held_by(&self, txn_id: &TransactionId) -> BTreeSet<ResourceId> {
        self.table
            .lock()
            .holdings
            .get(txn_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Removes every hold, wait and cost of a finished transaction.
    pub fn on_transaction_completed(&self, txn_id: &TransactionId) {
        let mut table = self.table.lock();

        if let Some(resources) = table.holdings.remove(txn_id) {
            for resource in &resources {
                if table.held_by.get(resource) == Some(txn_id) {
                    table.held_by.remove(resource);
                }
            }
        }
        table.waiting_for.remove(txn_id);
        table.costs.remove(txn_id);

        debug!("cleared lock state for transaction {}", txn_id);
    }

    /// Copies the current wait-for graph.
    pub fn wait_for_graph(&self) -> WaitForGraph {
        self.table.lock().snapshot()
    }

    /// Checks for a deadlock, returning the first cycle found.
    pub fn check_for_deadlock(&self) -> Option<DeadlockEvent> {
        self.stats.checks.fetch_add(1, AtomicOrdering::Relaxed);

        let graph = self.wait_for_graph();
        let cycle = graph.find_cycle()?;
        Some(self.build_event(&graph, cycle))
    }

    /// Runs a full detection pass, returning every node-disjoint cycle.
    pub fn detect_all_deadlocks(&self) -> Vec<DeadlockEvent> {
        self.stats.checks.fetch_add(1, AtomicOrdering::Relaxed);

        let graph = self.wait_for_graph();
        graph
            .find_all_cycles()
            .into_iter()
            .map(|cycle| self.build_event(&graph, cycle))
            .collect()
    }

    fn build_event(&self, graph: &WaitForGraph, lock_chain: Vec<LockChainLink>) -> DeadlockEvent {
        let participants: BTreeSet<TransactionId> =
            lock_chain.iter().map(|link| link.waiter.clone()).collect();

        // A cycle always has at least one link, so a victim always exists.
        let recommended_victim = graph
            .select_victim(&participants)
            .unwrap_or_else(|| lock_chain[0].waiter.clone());

        self.stats
            .deadlocks_found
            .fetch_add(1, AtomicOrdering::Relaxed);

        let event = DeadlockEvent {
            participants,
            deadlock_type: DeadlockType::CircularWait,
            recommended_victim,
            lock_chain,
            detection_time: SystemTime::now(),
        };

        if self.config.log_events {
            warn!("deadlock detected: {}", event);
        }

        event
    }

    /// Returns the number of transactions holding or waiting for resources.
    pub fn transaction_count(&self) -> usize {
        let table = self.table.lock();
        let mut txns: HashSet<&TransactionId> = table.holdings.keys().collect();
        txns.extend(table.waiting_for.keys());
        txns.len()
    }

    /// Returns the number of resources currently held.
    pub fn held_resource_count(&self) -> usize {
        self.table.lock().held_by.len()
    }

    /// Returns the number of transactions with pending requests.
    pub fn waiting_transaction_count(&self) -> usize {
        self.table.lock().waiting_for.len()
    }

    /// Drops all lock state and costs.
    pub fn clear(&self) {
        *self.table.lock() = LockTable::default();
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DeadlockConfig {
        &self.config
    }

    /// Returns statistics.
    pub fn stats(&self) -> &DeadlockStats {
        &self.stats
    }
}

impl Default for DeadlockDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeadlockDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlockDetector")
            .field("transactions", &self.transaction_count())
            .field("held_resources", &self.held_resource_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(id: &str) -> TransactionId {
        TransactionId::new(id)
    }

    fn res(id: &str) -> ResourceId {
        ResourceId::new(id)
    }

    fn participants(ids: &[&str]) -> BTreeSet<TransactionId> {
        ids.iter().map(|id| txn(id)).collect()
    }

    /// A holds R1 and wants R2, B holds R2 and wants R1.
    fn two_cycle(detector: &DeadlockDetector) {
        detector.register_lock_acquired(txn("A"), res("R1"));
        detector.register_lock_acquired(txn("B"), res("R2"));
        detector.register_lock_request(txn("A"), res("R2"));
        detector.register_lock_request(txn("B"), res("R1"));
    }

    #[test]
    fn test_requests_only_no_deadlock() {
        let detector = DeadlockDetector::new();

        detector.register_lock_request(txn("A"), res("R1"));
        detector.register_lock_request(txn("B"), res("R2"));

        assert!(detector.check_for_deadlock().is_none());
        assert!(detector.is_transaction_active(&txn("A")));
    }

    #[test]
    fn test_chain_no_deadlock() {
        let detector = DeadlockDetector::new();

        // A -> B -> C (no cycle)
        detector.register_lock_acquired(txn("B"), res("R1"));
        detector.register_lock_acquired(txn("C"), res("R2"));
        detector.register_lock_request(txn("A"), res("R1"));
        detector.register_lock_request(txn("B"), res("R2"));

        assert!(detector.check_for_deadlock().is_none());
        assert_eq!(detector.wait_for_graph().edge_count(), 2);
    }

    #[test]
    fn test_two_cycle() {
        let detector = DeadlockDetector::new();
        two_cycle(&detector);

        let event = detector.check_for_deadlock().unwrap();
        assert_eq!(event.participants, participants(&["A", "B"]));
        assert_eq!(event.deadlock_type, DeadlockType::CircularWait);
        assert_eq!(event.lock_chain.len(), 2);
        assert_eq!(
            event.lock_chain[0],
            LockChainLink {
                waiter: txn("A"),
                resource: res("R2"),
                holder: txn("B"),
            }
        );
        assert_eq!(
            event.describe_chain(),
            "A waits for R2 held by B -> B waits for R1 held by A"
        );
    }

    #[test]
    fn test_three_cycle() {
        let detector = DeadlockDetector::new();

        detector.register_lock_acquired(txn("A"), res("R1"));
        detector.register_lock_acquired(txn("B"), res("R2"));
        detector.register_lock_acquired(txn("C"), res("R3"));
        detector.register_lock_request(txn("A"), res("R2"));
        detector.register_lock_request(txn("B"), res("R3"));
        detector.register_lock_request(txn("C"), res("R1"));

        let event = detector.check_for_deadlock().unwrap();
        assert_eq!(event.participants, participants(&["A", "B", "C"]));
        assert_eq!(event.participant_count(), 3);

        let waiters: Vec<&str> = event.lock_chain.iter().map(|l| l.waiter.as_str()).collect();
        assert_eq!(waiters, vec!["A", "B", "C"]);
        assert_eq!(event.lock_chain[2].holder, txn("A"));
    }

    #[test]
    fn test_cycle_excludes_tail() {
        let detector = DeadlockDetector::new();

        // Z waits on A, which sits in an A <-> B cycle. Z is not a participant.
        two_cycle(&detector);
        detector.register_lock_acquired(txn("Z"), res("R9"));
        detector.register_lock_request(txn("Z"), res("R1"));

        let event = detector.check_for_deadlock().unwrap();
        assert_eq!(event.participants, participants(&["A", "B"]));
        assert!(!event.involves(&txn("Z")));
    }

    #[test]
    fn test_victim_lowest_cost() {
        let detector = DeadlockDetector::new();
        two_cycle(&detector);
        detector.register_transaction_cost(txn("A"), 1000);
        detector.register_transaction_cost(txn("B"), 100);

        let event = detector.check_for_deadlock().unwrap();
        assert_eq!(event.recommended_victim, txn("B"));
    }

    #[test]
    fn test_victim_unregistered_cost_is_zero() {
        let detector = DeadlockDetector::new();
        two_cycle(&detector);
        detector.register_transaction_cost(txn("A"), 5);

        let event = detector.check_for_deadlock().unwrap();
        assert_eq!(event.recommended_victim, txn("B"));
        assert_eq!(detector.transaction_cost(&txn("B")), 0);
    }

    #[test]
    fn test_victim_tie_break_smallest_id() {
        let detector = DeadlockDetector::new();
        two_cycle(&detector);

        let event = detector.check_for_deadlock().unwrap();
        assert_eq!(event.recommended_victim, txn("A"));

        detector.register_transaction_cost(txn("A"), 7);
        detector.register_transaction_cost(txn("B"), 7);
        let event = detector.check_for_deadlock().unwrap();
        assert_eq!(event.recommended_victim, txn("A"));
    }

    #[test]
    fn test_release_resolves_deadlock() {
        let detector = DeadlockDetector::new();
        two_cycle(&detector);
        assert!(detector.check_for_deadlock().is_some());

        detector.register_lock_released(&txn("A"), &res("R1"));
        assert!(detector.check_for_deadlock().is_none());

        // B still waits for R1 until an acquisition is reported.
        assert!(detector.get_resources_waiting_for(&txn("B")).contains(&res("R1")));
    }

    #[test]
    fn test_release_by_non_holder_ignored() {
        let detector = DeadlockDetector::new();
        detector.register_lock_acquired(txn("A"), res("R1"));

        detector.register_lock_released(&txn("B"), &res("R1"));
        assert_eq!(detector.get_resources_held_by(&txn("A")), BTreeSet::from([res("R1")]));
        assert_eq!(detector.held_resource_count(), 1);
    }

    #[test]
    fn test_acquire_clears_pending_request() {
        let detector = DeadlockDetector::new();

        detector.register_lock_request(txn("A"), res("R1"));
        detector.register_lock_request(txn("A"), res("R2"));
        detector.register_lock_acquired(txn("A"), res("R1"));

        assert_eq!(detector.get_resources_waiting_for(&txn("A")), BTreeSet::from([res("R2")]));
        assert_eq!(detector.get_resources_held_by(&txn("A")), BTreeSet::from([res("R1")]));
    }

    #[test]
    fn test_request_for_held_resource_ignored() {
        let detector = DeadlockDetector::new();

        detector.register_lock_acquired(txn("A"), res("R1"));
        detector.register_lock_request(txn("A"), res("R1"));

        assert!(detector.get_resources_waiting_for(&txn("A")).is_empty());
        assert_eq!(detector.waiting_transaction_count(), 0);
    }

    #[test]
    fn test_acquire_replaces_previous_holder() {
        let detector = DeadlockDetector::new();

        detector.register_lock_acquired(txn("A"), res("R1"));
        detector.register_lock_acquired(txn("B"), res("R1"));

        assert!(detector.get_resources_held_by(&txn("A")).is_empty());
        assert!(!detector.is_transaction_active(&txn("A")));
        assert_eq!(detector.get_resources_held_by(&txn("B")), BTreeSet::from([res("R1")]));
    }

    #[test]
    fn test_transaction_completed_cleanup() {
        let detector = DeadlockDetector::new();

        detector.register_lock_acquired(txn("A"), res("R1"));
        detector.register_lock_acquired(txn("A"), res("R2"));
        detector.register_lock_acquired(txn("A"), res("R3"));
        detector.register_lock_request(txn("A"), res("R4"));
        detector.register_transaction_cost(txn("A"), 10);

        detector.on_transaction_completed(&txn("A"));
        assert!(!detector.is_transaction_active(&txn("A")));
        assert!(detector.get_resources_held_by(&txn("A")).is_empty());
        assert!(detector.get_resources_waiting_for(&txn("A")).is_empty());
        assert_eq!(detector.transaction_cost(&txn("A")), 0);
        assert_eq!(detector.transaction_count(), 0);

        // Completing again is harmless.
        detector.on_transaction_completed(&txn("A"));
        assert_eq!(detector.held_resource_count(), 0);
    }

    #[test]
    fn test_completion_resolves_deadlock() {
        let detector = DeadlockDetector::new();
        two_cycle(&detector);

        let victim = detector.check_for_deadlock().unwrap().recommended_victim;
        detector.on_transaction_completed(&victim);
        assert!(detector.check_for_deadlock().is_none());
    }

    #[test]
    fn test_detect_all_deadlocks() {
        let detector = DeadlockDetector::new();

        // Two separate cycles
        two_cycle(&detector);
        detector.register_lock_acquired(txn("C"), res("R3"));
        detector.register_lock_acquired(txn("D"), res("R4"));
        detector.register_lock_request(txn("C"), res("R4"));
        detector.register_lock_request(txn("D"), res("R3"));

        let events = detector.detect_all_deadlocks();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].participants, participants(&["A", "B"]));
        assert_eq!(events[1].participants, participants(&["C", "D"]));

        let first = detector.check_for_deadlock().unwrap();
        assert_eq!(first.participants, participants(&["A", "B"]));
    }

    #[test]
    fn test_overlapping_cycles_reported_once() {
        let detector = DeadlockDetector::new();

        // A <-> B and B <-> C share B.
        detector.register_lock_acquired(txn("A"), res("RA"));
        detector.register_lock_acquired(txn("B"), res("RB"));
        detector.register_lock_acquired(txn("C"), res("RC"));
        detector.register_lock_request(txn("A"), res("RB"));
        detector.register_lock_request(txn("B"), res("RA"));
        detector.register_lock_request(txn("B"), res("RC"));
        detector.register_lock_request(txn("C"), res("RB"));

        let events = detector.detect_all_deadlocks();
        assert_eq!(events.len(), 1);
        assert!(events[0].involves(&txn("B")));
    }

    #[test]
    fn test_get_waits() {
        let detector = DeadlockDetector::new();

        detector.register_lock_acquired(txn("B"), res("R1"));
        detector.register_lock_acquired(txn("C"), res("R2"));
        detector.register_lock_request(txn("A"), res("R1"));
        detector.register_lock_request(txn("A"), res("R2"));

        let graph = detector.wait_for_graph();
        assert_eq!(graph.get_waits(&txn("A")), vec![txn("B"), txn("C")]);
        assert_eq!(graph.waiter_count(), 1);
    }

    #[test]
    fn test_stats() {
        let detector = DeadlockDetector::new();
        two_cycle(&detector);

        detector.check_for_deadlock();
        detector.register_lock_released(&txn("A"), &res("R1"));
        detector.check_for_deadlock();

        assert_eq!(detector.stats().checks.load(AtomicOrdering::Relaxed), 2);
        assert_eq!(detector.stats().deadlocks_found.load(AtomicOrdering::Relaxed), 1);
        assert_eq!(detector.stats().lock_events.load(AtomicOrdering::Relaxed), 5);
    }

    #[test]
    fn test_clear() {
        let detector = DeadlockDetector::new();
        two_cycle(&detector);

        detector.clear();
        assert_eq!(detector.transaction_count(), 0);
        assert!(detector.check_for_deadlock().is_none());
    }

    #[test]
    fn test_event_serialize() {
        let detector = DeadlockDetector::new();
        two_cycle(&detector);

        let event = detector.check_for_deadlock().unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["recommended_victim"], "A");
        assert_eq!(json["deadlock_type"], "CircularWait");
        assert_eq!(json["participants"], serde_json::json!(["A", "B"]));

        let back: DeadlockEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_long_chain_into_cycle() {
        let detector = DeadlockDetector::new();

        // t0000 -> t0001 -> ... -> t1999 -> t1998 (cycle at the tail)
        let n = 2000;
        for i in 0..n {
            detector.register_lock_acquired(txn(&format!("t{:04}", i)), res(&format!("r{:04}", i)));
        }
        for i in 0..n - 1 {
            detector.register_lock_request(txn(&format!("t{:04}", i)), res(&format!("r{:04}", i + 1)));
        }
        detector.register_lock_request(txn(&format!("t{:04}", n - 1)), res(&format!("r{:04}", n - 2)));

        let event = detector.check_for_deadlock().unwrap();
        assert_eq!(
            event.participants,
            participants(&["t1998", "t1999"])
        );
    }
}
