//! Genotick evaluation engine.
//!
//! Evaluates a population of predictive robots against a shared batch of
//! time-ordered input records on a bounded worker pool, then merges each
//! robot's ordered predictions into a per-agent aggregate map.
//!
//! The interpreter that turns a robot program into predictions and the
//! store that holds robots are plugged in through the [`Interpreter`] and
//! [`Population`] traits.

pub mod analysis;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod interpreter;
pub mod models;
pub mod pool;
pub mod population;
pub mod report;

pub use error::{InterpreterError, PoolError, PopulationError, RoundError, TaskError};
pub use evaluation::{BatchCoordinator, RoundOptions, RoundStats};
pub use interpreter::Interpreter;
pub use models::{AgentId, AgentResult, AggregateMap, Prediction, ResultBatch, Robot};
pub use pool::{PoolOptions, TaskHandle, Wait, WorkerPool};
pub use population::{Agent, FsPopulation, MemoryPopulation, Population};
