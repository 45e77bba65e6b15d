//! Analysis modules.
//!
//! Aggregation of scan results into per-category error statistics.

pub mod aggregator;

pub use aggregator::*;
