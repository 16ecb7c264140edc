//! # lockwatch-test
//!
//! Integration tests for LockWatch.
//!
//! This crate contains:
//! - Fixtures for building lock scenarios
//! - Random lock workloads for concurrency tests

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Scenario builders and identifier helpers.
pub mod fixtures;

/// Workload generators.
pub mod workload;
