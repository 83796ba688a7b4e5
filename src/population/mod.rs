//! Population storage abstractions.
//!
//! A population stores agents by identity. The evaluation engine only
//! consumes the [`Population`] trait; two backends are provided:
//! - [`FsPopulation`]: one JSON file per agent in a directory
//! - [`MemoryPopulation`]: a mutex-guarded map, for tests and embedding

pub mod fs;
pub mod memory;

pub use fs::FsPopulation;
pub use memory::MemoryPopulation;

use crate::error::PopulationResult;
use crate::models::{AgentId, Prediction};
use async_trait::async_trait;

/// A stored predictive agent, as seen by the evaluation engine.
pub trait Agent: Send + Sync + 'static {
    /// Identity under which the agent is stored, `None` before its first persist.
    fn identity(&self) -> Option<AgentId>;

    /// Called by the population when it assigns a fresh identity.
    fn assign_identity(&mut self, id: AgentId);

    /// Append one prediction to the agent's history.
    fn record_prediction(&mut self, prediction: Prediction);
}

/// Durable collection of agents keyed by identity.
///
/// Guarantees:
/// - `fetch` returns an owned copy; mutations are only visible after `persist`.
/// - `persist` is an idempotent upsert keyed by the agent's identity and
///   assigns a fresh unique identity to agents that have none.
#[async_trait]
pub trait Population: Send + Sync + 'static {
    type Agent: Agent;

    /// Identities of every stored agent.
    async fn list_identities(&self) -> PopulationResult<Vec<AgentId>>;

    /// Load one agent. Returns `PopulationError::NotFound` if absent.
    async fn fetch(&self, id: AgentId) -> PopulationResult<Self::Agent>;

    /// Store an agent and return the identity it is stored under.
    async fn persist(&self, agent: Self::Agent) -> PopulationResult<AgentId>;

    /// Delete one agent. Returns `PopulationError::NotFound` if absent.
    async fn remove(&self, id: AgentId) -> PopulationResult<()>;

    async fn count(&self) -> PopulationResult<usize> {
        Ok(self.list_identities().await?.len())
    }

    /// Identities in `from..to`, or every identity when the range is not
    /// a valid non-empty slice of the listing.
    ///
    /// `to` may equal the number of stored agents, so the last identity is
    /// reachable; anything past that falls back to the full listing.
    async fn list_range(&self, from: usize, to: usize) -> PopulationResult<Vec<AgentId>> {
        let ids = self.list_identities().await?;
        Ok(slice_range(ids, from, to))
    }

    async fn remove_all(&self) -> PopulationResult<usize> {
        let ids = self.list_identities().await?;
        for id in &ids {
            self.remove(*id).await?;
        }
        Ok(ids.len())
    }
}

fn slice_range(ids: Vec<AgentId>, from: usize, to: usize) -> Vec<AgentId> {
    if from < to && to <= ids.len() {
        ids[from..to].to_vec()
    } else {
        ids
    }
}
