//! One agent's evaluation against the round's input batch.

use std::sync::Arc;

use tracing::debug;

use crate::error::TaskError;
use crate::interpreter::Interpreter;
use crate::models::{AgentId, ResultBatch};
use crate::population::{Agent, Population};

/// Unit of work run on the pool: fetch, interpret, optionally record and persist.
pub struct EvaluationTask<P, I, R> {
    pub agent: AgentId,
    pub records: Arc<[R]>,
    pub population: Arc<P>,
    pub interpreter: Arc<I>,
    pub update_agent: bool,
}

impl<P, I, R> EvaluationTask<P, I, R>
where
    P: Population,
    I: Interpreter<P::Agent, R>,
    R: Send + Sync + 'static,
{
    /// Produce the agent's result batch.
    ///
    /// When `update_agent` is set, every prediction is recorded into the
    /// agent in result order and the agent is persisted once, after the
    /// whole batch exists.
    pub async fn run(self) -> Result<ResultBatch, TaskError> {
        let mut agent = self.population.fetch(self.agent).await?;
        let predictions = self.interpreter.evaluate(&agent, &self.records).await?;

        if predictions.len() != self.records.len() {
            return Err(TaskError::LengthMismatch {
                expected: self.records.len(),
                actual: predictions.len(),
            });
        }

        let batch = ResultBatch::from_predictions(self.agent, predictions);

        if self.update_agent {
            for prediction in batch.predictions() {
                agent.record_prediction(prediction);
            }
            self.population.persist(agent).await?;
            debug!("Recorded {} predictions for agent {}", batch.len(), self.agent);
        }

        Ok(batch)
    }
}
