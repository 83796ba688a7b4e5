//! Evaluation rounds.
//!
//! A round fans one [`EvaluationTask`] per agent out to the worker pool and
//! fans the finished result batches back in through the [`BatchCoordinator`].

pub mod coordinator;
pub mod task;

pub use coordinator::{BatchCoordinator, RoundOptions, RoundStats};
pub use task::EvaluationTask;
