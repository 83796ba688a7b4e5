//! Data models for the evaluation engine.
//!
//! This module contains the core data structures shared by the worker
//! pool, the evaluation tasks and the batch coordinator: agent identities,
//! predictions, result batches and the aggregate map a round produces.

use crate::population::Agent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Unique, stable handle identifying one agent in a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(u64);

impl AgentId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AgentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(AgentId)
    }
}

impl From<u64> for AgentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Discrete output of evaluating one agent against one input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    /// The agent expects the next value to rise.
    Up,
    /// The agent expects the next value to fall.
    Down,
    /// The agent abstains.
    Out,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prediction::Up => write!(f, "UP"),
            Prediction::Down => write!(f, "DOWN"),
            Prediction::Out => write!(f, "OUT"),
        }
    }
}

impl Prediction {
    /// Returns an arrow representation of the prediction.
    pub fn arrow(&self) -> &'static str {
        match self {
            Prediction::Up => "↑",
            Prediction::Down => "↓",
            Prediction::Out => "·",
        }
    }
}

/// One agent's prediction for one input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Agent that produced the prediction.
    pub agent: AgentId,
    /// The prediction itself.
    pub prediction: Prediction,
}

/// Per-prediction tallies over a batch or a history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionCounts {
    pub up: usize,
    pub down: usize,
    pub out: usize,
}

impl PredictionCounts {
    /// Tally a sequence of predictions.
    pub fn from_predictions<'a>(predictions: impl IntoIterator<Item = &'a Prediction>) -> Self {
        let mut counts = Self::default();
        for prediction in predictions {
            counts.add(*prediction);
        }
        counts
    }

    pub fn add(&mut self, prediction: Prediction) {
        match prediction {
            Prediction::Up => self.up += 1,
            Prediction::Down => self.down += 1,
            Prediction::Out => self.out += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.up + self.down + self.out
    }

    /// Whether UP and DOWN votes balance. OUT votes are ignored.
    pub fn is_symmetrical(&self) -> bool {
        self.up == self.down
    }
}

impl std::ops::AddAssign for PredictionCounts {
    fn add_assign(&mut self, other: Self) {
        self.up += other.up;
        self.down += other.down;
        self.out += other.out;
    }
}

/// The full ordered list of results one evaluation task produced.
///
/// The i-th result always corresponds to the i-th input record of the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultBatch {
    agent: AgentId,
    results: Vec<AgentResult>,
}

impl ResultBatch {
    /// Tag an ordered prediction list with the agent that produced it.
    pub fn from_predictions(agent: AgentId, predictions: impl IntoIterator<Item = Prediction>) -> Self {
        let results = predictions
            .into_iter()
            .map(|prediction| AgentResult { agent, prediction })
            .collect();
        Self { agent, results }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn results(&self) -> &[AgentResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn predictions(&self) -> impl Iterator<Item = Prediction> + '_ {
        self.results.iter().map(|r| r.prediction)
    }

    pub fn counts(&self) -> PredictionCounts {
        let mut counts = PredictionCounts::default();
        for prediction in self.predictions() {
            counts.add(prediction);
        }
        counts
    }

    pub fn is_symmetrical(&self) -> bool {
        self.counts().is_symmetrical()
    }

    pub fn into_results(self) -> Vec<AgentResult> {
        self.results
    }
}

/// Per-agent accumulation of accepted result batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateMap {
    entries: HashMap<AgentId, Vec<AgentResult>>,
}

impl AggregateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a whole batch, in order, to its agent's entry.
    pub fn merge(&mut self, batch: ResultBatch) {
        let agent = batch.agent();
        self.entries
            .entry(agent)
            .or_default()
            .extend(batch.into_results());
    }

    /// Append every entry of `other` after the existing results of the same agent.
    pub fn append(&mut self, other: AggregateMap) {
        for (agent, results) in other.entries {
            self.entries.entry(agent).or_default().extend(results);
        }
    }

    pub fn get(&self, agent: &AgentId) -> Option<&[AgentResult]> {
        self.entries.get(agent).map(Vec::as_slice)
    }

    pub fn contains(&self, agent: &AgentId) -> bool {
        self.entries.contains_key(agent)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &Vec<AgentResult>)> {
        self.entries.iter()
    }
}

impl IntoIterator for AggregateMap {
    type Item = (AgentId, Vec<AgentResult>);
    type IntoIter = std::collections::hash_map::IntoIter<AgentId, Vec<AgentResult>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A stored predictive agent.
///
/// The program is opaque to this crate; only the interpreter understands it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    /// Identity assigned by the population on first persist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AgentId>,
    /// Program evaluated by the interpreter.
    #[serde(default)]
    pub program: serde_json::Value,
    /// Every prediction recorded for this robot, oldest first.
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    /// When the robot was created.
    pub created_at: DateTime<Utc>,
}

impl Robot {
    /// Creates a robot with no identity and an empty history.
    pub fn new(program: serde_json::Value) -> Self {
        Self {
            id: None,
            program,
            predictions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn counts(&self) -> PredictionCounts {
        PredictionCounts::from_predictions(&self.predictions)
    }
}

impl Agent for Robot {
    fn identity(&self) -> Option<AgentId> {
        self.id
    }

    fn assign_identity(&mut self, id: AgentId) {
        self.id = Some(id);
    }

    fn record_prediction(&mut self, prediction: Prediction) {
        self.predictions.push(prediction);
    }
}

/// Prediction tallies for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent: AgentId,
    pub counts: PredictionCounts,
}

impl AgentSummary {
    pub fn is_symmetrical(&self) -> bool {
        self.counts.is_symmetrical()
    }
}
