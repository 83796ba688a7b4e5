//! Result batch acceptance and per-agent statistics.
//!
//! This module decides which result batches a round keeps and computes
//! prediction summaries over aggregate maps and stored robots.

use crate::models::{AgentSummary, AggregateMap, PredictionCounts, ResultBatch, Robot};

/// Whether a finished batch may be merged into the round's map.
///
/// With `require_symmetrical` set, a batch is kept only when its UP and
/// DOWN counts are equal. Rejection always drops the whole batch.
pub fn accept(batch: &ResultBatch, require_symmetrical: bool) -> bool {
    !require_symmetrical || batch.is_symmetrical()
}

/// Summarize each agent's merged results, ordered by agent identity.
pub fn summarize_round(map: &AggregateMap) -> Vec<AgentSummary> {
    let mut summaries: Vec<AgentSummary> = map
        .iter()
        .map(|(agent, results)| AgentSummary {
            agent: *agent,
            counts: PredictionCounts::from_predictions(results.iter().map(|r| &r.prediction)),
        })
        .collect();

    summaries.sort_by_key(|s| s.agent);
    summaries
}

/// Summarize the recorded history of stored robots, ordered by identity.
///
/// Robots without an identity have never been persisted and are skipped.
pub fn summarize_robots(robots: &[Robot]) -> Vec<AgentSummary> {
    let mut summaries: Vec<AgentSummary> = robots
        .iter()
        .filter_map(|robot| {
            robot.id.map(|agent| AgentSummary {
                agent,
                counts: robot.counts(),
            })
        })
        .collect();

    summaries.sort_by_key(|s| s.agent);
    summaries
}

/// Sum the counts of every summary.
pub fn totals(summaries: &[AgentSummary]) -> PredictionCounts {
    let mut total = PredictionCounts::default();
    for summary in summaries {
        total += summary.counts;
    }
    total
}

/// Agents whose UP and DOWN votes do not balance.
pub fn asymmetric_agents(summaries: &[AgentSummary]) -> Vec<&AgentSummary> {
    summaries.iter().filter(|s| !s.is_symmetrical()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentId, Prediction};
    use crate::population::Agent;

    use crate::models::Prediction::{Down, Out, Up};

    fn batch(agent: u64, predictions: &[Prediction]) -> ResultBatch {
        ResultBatch::from_predictions(AgentId::new(agent), predictions.iter().copied())
    }

    #[test]
    fn test_accept_symmetrical_batch() {
        let balanced = batch(1, &[Up, Up, Down, Down]);
        assert!(accept(&balanced, true));
        assert!(accept(&balanced, false));
    }

    #[test]
    fn test_reject_asymmetrical_batch_only_when_required() {
        let skewed = batch(1, &[Up, Up, Down]);
        assert!(!accept(&skewed, true));
        assert!(accept(&skewed, false));
    }

    #[test]
    fn test_out_votes_do_not_count() {
        assert!(accept(&batch(1, &[Out, Out, Out]), true));
        assert!(accept(&batch(1, &[Up, Out, Down]), true));
        assert!(!accept(&batch(1, &[Down, Out, Out]), true));
    }

    #[test]
    fn test_summarize_round_sorted() {
        let mut map = AggregateMap::new();
        map.merge(batch(5, &[Up, Up, Out]));
        map.merge(batch(2, &[Down]));

        let summaries = summarize_round(&map);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].agent, AgentId::new(2));
        assert_eq!(summaries[1].counts.up, 2);
        assert_eq!(summaries[1].counts.out, 1);

        let total = totals(&summaries);
        assert_eq!(total.total(), 4);
        assert_eq!(asymmetric_agents(&summaries).len(), 2);
    }

    #[test]
    fn test_summarize_robots_skips_unsaved() {
        let mut saved = Robot::new(serde_json::Value::Null);
        saved.assign_identity(AgentId::new(8));
        saved.record_prediction(Up);
        saved.record_prediction(Down);

        let unsaved = Robot::new(serde_json::Value::Null);

        let summaries = summarize_robots(&[unsaved, saved]);
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].is_symmetrical());
        assert!(asymmetric_agents(&summaries).is_empty());
    }
}
