//! Fan-out / fan-in of one evaluation round.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error, info};

use crate::analysis;
use crate::error::{RoundError, TaskError};
use crate::evaluation::task::EvaluationTask;
use crate::interpreter::Interpreter;
use crate::models::{AgentId, AggregateMap, ResultBatch};
use crate::pool::{TaskHandle, Wait, WorkerPool};
use crate::population::Population;

/// Per-round switches.
#[derive(Debug, Clone)]
pub struct RoundOptions {
    /// Record predictions into each agent and persist it.
    pub update_agents: bool,
    /// Keep only batches with as many UP as DOWN predictions.
    pub require_symmetrical_batches: bool,
    /// How long one wait on a pending task may last before it is retried.
    /// `None` waits without interruption.
    pub wait_slice: Option<Duration>,
}

impl Default for RoundOptions {
    fn default() -> Self {
        Self {
            update_agents: true,
            require_symmetrical_batches: false,
            wait_slice: Some(Duration::from_millis(500)),
        }
    }
}

/// Bookkeeping for a finished round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundStats {
    /// Tasks handed to the pool.
    pub submitted: usize,
    /// Batches merged into the map.
    pub accepted: usize,
    /// Batches dropped by the acceptance policy.
    pub discarded: usize,
}

/// Runs evaluation rounds on a shared worker pool.
pub struct BatchCoordinator<I> {
    pool: Arc<WorkerPool>,
    interpreter: Arc<I>,
}

impl<I> BatchCoordinator<I> {
    pub fn new(pool: Arc<WorkerPool>, interpreter: Arc<I>) -> Self {
        Self { pool, interpreter }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Evaluate every agent of `population` against `records`.
    ///
    /// Returns the merged results of every accepted batch, or the first task
    /// failure. An empty input batch yields an empty map without submitting
    /// any task.
    pub async fn evaluate_round<P, R>(
        &self,
        records: impl Into<Arc<[R]>>,
        population: Arc<P>,
        options: &RoundOptions,
    ) -> Result<AggregateMap, RoundError>
    where
        P: Population,
        I: Interpreter<P::Agent, R>,
        R: Send + Sync + 'static,
    {
        let (map, _) = self.run_round(records.into(), population, options).await?;
        Ok(map)
    }

    /// Evaluate a round and append its results to `map`.
    ///
    /// `map` is only touched when the whole round succeeds.
    pub async fn evaluate_round_into<P, R>(
        &self,
        records: impl Into<Arc<[R]>>,
        population: Arc<P>,
        options: &RoundOptions,
        map: &mut AggregateMap,
    ) -> Result<RoundStats, RoundError>
    where
        P: Population,
        I: Interpreter<P::Agent, R>,
        R: Send + Sync + 'static,
    {
        let (round, stats) = self.run_round(records.into(), population, options).await?;
        map.append(round);
        Ok(stats)
    }

    async fn run_round<P, R>(
        &self,
        records: Arc<[R]>,
        population: Arc<P>,
        options: &RoundOptions,
    ) -> Result<(AggregateMap, RoundStats), RoundError>
    where
        P: Population,
        I: Interpreter<P::Agent, R>,
        R: Send + Sync + 'static,
    {
        let mut stats = RoundStats::default();
        let mut map = AggregateMap::new();

        if records.is_empty() {
            debug!("Empty input batch, skipping round");
            return Ok((map, stats));
        }

        let agents = population.list_identities().await?;
        info!(
            "Evaluating {} agents against {} records on {} workers",
            agents.len(),
            records.len(),
            self.pool.capacity()
        );

        let mut handles = Vec::with_capacity(agents.len());
        for agent in agents {
            let task = EvaluationTask {
                agent,
                records: Arc::clone(&records),
                population: Arc::clone(&population),
                interpreter: Arc::clone(&self.interpreter),
                update_agent: options.update_agents,
            };
            let handle = self
                .pool
                .submit(task.run())
                .map_err(|source| RoundError::Submit { agent, source })?;
            handles.push((agent, handle));
            stats.submitted += 1;
        }

        let mut pending: FuturesUnordered<_> = handles
            .into_iter()
            .map(|(agent, handle)| await_batch(agent, handle, options.wait_slice))
            .collect();

        while let Some(outcome) = pending.next().await {
            let batch = match outcome {
                Ok(batch) => batch,
                Err((agent, source)) => {
                    error!("Evaluation of agent {} failed: {}", agent, source);
                    return Err(RoundError::TaskFailed { agent, source });
                }
            };

            if analysis::accept(&batch, options.require_symmetrical_batches) {
                debug!("Merging {} results for agent {}", batch.len(), batch.agent());
                map.merge(batch);
                stats.accepted += 1;
            } else {
                debug!("Discarding asymmetrical batch of agent {}", batch.agent());
                stats.discarded += 1;
            }
        }

        info!(
            "Round complete: {} submitted, {} accepted, {} discarded",
            stats.submitted, stats.accepted, stats.discarded
        );
        Ok((map, stats))
    }
}

/// Wait for one task, retrying interrupted waits on the same handle.
async fn await_batch(
    agent: AgentId,
    mut handle: TaskHandle<ResultBatch>,
    slice: Option<Duration>,
) -> Result<ResultBatch, (AgentId, TaskError)> {
    loop {
        match handle.wait(slice).await {
            Ok(Wait::Ready(batch)) => return Ok(batch),
            Ok(Wait::Interrupted) => debug!("Still waiting on agent {}", agent),
            Err(e) => return Err((agent, e)),
        }
    }
}
