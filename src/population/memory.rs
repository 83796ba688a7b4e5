//! In-memory population backed by a `BTreeMap<AgentId, A>`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{Agent, Population};
use crate::error::{PopulationError, PopulationResult};
use crate::models::AgentId;

/// In-memory population. Identities are assigned sequentially from 1.
#[derive(Debug)]
pub struct MemoryPopulation<A> {
    agents: Mutex<BTreeMap<AgentId, A>>,
    next_id: AtomicU64,
    fetches: AtomicUsize,
    persists: AtomicUsize,
}

impl<A> Default for MemoryPopulation<A> {
    fn default() -> Self {
        Self {
            agents: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            fetches: AtomicUsize::new(0),
            persists: AtomicUsize::new(0),
        }
    }
}

impl<A: Agent + Clone> MemoryPopulation<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store agents without going through `persist`, so the persist counter
    /// stays at zero.
    pub fn seed(agents: impl IntoIterator<Item = A>) -> Self {
        let population = Self::new();
        for agent in agents {
            population.insert(agent);
        }
        population
    }

    /// Store an agent, assigning an identity when it has none.
    pub fn insert(&self, mut agent: A) -> AgentId {
        let id = match agent.identity() {
            Some(id) => {
                self.next_id.fetch_max(id.value().saturating_add(1), Ordering::SeqCst);
                id
            }
            None => {
                let id = AgentId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
                agent.assign_identity(id);
                id
            }
        };
        self.lock().insert(id, agent);
        id
    }

    /// Current stored state of an agent.
    pub fn snapshot(&self, id: AgentId) -> Option<A> {
        self.lock().get(&id).cloned()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn persist_count(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<AgentId, A>> {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<A: Agent + Clone> Population for MemoryPopulation<A> {
    type Agent = A;

    async fn list_identities(&self) -> PopulationResult<Vec<AgentId>> {
        Ok(self.lock().keys().copied().collect())
    }

    async fn fetch(&self, id: AgentId) -> PopulationResult<A> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.lock()
            .get(&id)
            .cloned()
            .ok_or(PopulationError::NotFound(id))
    }

    async fn persist(&self, agent: A) -> PopulationResult<AgentId> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        Ok(self.insert(agent))
    }

    async fn remove(&self, id: AgentId) -> PopulationResult<()> {
        self.lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(PopulationError::NotFound(id))
    }
}
