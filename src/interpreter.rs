//! Interpreter seam.
//!
//! The interpreter turns one agent's program plus the ordered input batch
//! into one prediction per input record. It lives outside this crate; the
//! evaluation engine only depends on this trait.

use crate::error::InterpreterError;
use crate::models::Prediction;
use crate::population::Agent;
use async_trait::async_trait;

/// Executes an agent against an ordered batch of input records.
///
/// Implementations must return exactly one prediction per record, in record
/// order. A list of any other length fails the evaluation task.
#[async_trait]
pub trait Interpreter<A, R>: Send + Sync + 'static
where
    A: Agent,
    R: Send + Sync + 'static,
{
    async fn evaluate(&self, agent: &A, records: &[R]) -> Result<Vec<Prediction>, InterpreterError>;
}
