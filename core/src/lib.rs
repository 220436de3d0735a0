//! megaline-core: monthly billing and revenue analytics for a telecom
//! usage dataset.
//!
//! Data flow:
//!   loader -> normalizer -> aggregator -> billing -> {report, comparator}

pub mod aggregator;
pub mod billing;
pub mod calculator;
pub mod comparator;
pub mod config;
pub mod error;
pub mod loader;
pub mod normalizer;
pub mod pipeline;
pub mod rate_table;
pub mod report;
pub mod rng;
pub mod segments;
pub mod snapshot;
pub mod stats;
pub mod synthetic;
pub mod types;
