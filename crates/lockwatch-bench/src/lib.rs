//! LockWatch Performance Benchmarks
//!
//! This crate contains benchmarks for the LockWatch engine:
//! - Deadlock detection over chains, rings and random graphs
//! - Lock event ingestion
//! - Transaction registry bookkeeping and query recording
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p lockwatch-bench
//! ```

pub mod utils;
