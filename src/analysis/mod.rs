//! Acceptance policy and result summaries.

pub mod aggregator;

pub use aggregator::*;
