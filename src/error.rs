//! Error types for the evaluation engine.

use crate::models::AgentId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a population backend.
#[derive(Error, Debug)]
pub enum PopulationError {
    /// No agent is stored under this identity
    #[error("Agent not found: {0}")]
    NotFound(AgentId),

    /// Population directory failed validation
    #[error("Population path '{}' {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Every candidate identity was already taken
    #[error("Unable to find a free agent identity after {attempts} attempts")]
    IdentityExhausted { attempts: usize },

    /// Filesystem error
    #[error("Population I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Agent (de)serialization error
    #[error("Agent serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by an interpreter while evaluating an agent.
#[derive(Error, Debug)]
pub enum InterpreterError {
    /// The agent's program cannot be executed
    #[error("Malformed agent {agent}: {reason}")]
    MalformedAgent { agent: AgentId, reason: String },

    /// The interpreter itself failed
    #[error("Interpreter fault: {0}")]
    Fault(String),
}

/// Terminal failure of one evaluation task.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Population(#[from] PopulationError),

    #[error(transparent)]
    Interpreter(#[from] InterpreterError),

    /// Interpreter broke the one-result-per-record contract
    #[error("Interpreter produced {actual} predictions for {expected} input records")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Evaluation task panicked: {0}")]
    Panicked(String),

    #[error("Evaluation task was cancelled")]
    Cancelled,

    /// The pool closed while the task was still queued for a slot
    #[error("Worker pool shut down before the task could start")]
    PoolShutDown,
}

/// Errors raised by the worker pool itself.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Worker pool has been shut down")]
    ShutDown,

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Failure of a whole evaluation round.
#[derive(Error, Debug)]
pub enum RoundError {
    #[error("Failed to list population: {0}")]
    Population(#[from] PopulationError),

    #[error("Could not submit evaluation of agent {agent}: {source}")]
    Submit {
        agent: AgentId,
        #[source]
        source: PoolError,
    },

    #[error("Evaluation of agent {agent} failed: {source}")]
    TaskFailed {
        agent: AgentId,
        #[source]
        source: TaskError,
    },
}

impl RoundError {
    /// The agent whose task broke the round, if any.
    pub fn agent(&self) -> Option<AgentId> {
        match self {
            RoundError::Population(_) => None,
            RoundError::Submit { agent, .. } | RoundError::TaskFailed { agent, .. } => Some(*agent),
        }
    }
}

pub type PopulationResult<T> = std::result::Result<T, PopulationError>;
