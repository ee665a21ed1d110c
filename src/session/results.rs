//! Raw result normalization
//!
//! The platform reports whatever it saw at the end of a match. Before rating,
//! those reports are reconciled with the roster captured when the match
//! started so that every registered participant appears exactly once.

use crate::types::{ParticipantId, RawResult, RawResultBatch};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Registered participants of one match, in join order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRoster {
    participants: Vec<(ParticipantId, String)>,
}

impl MatchRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant; a repeated id keeps its first display name
    pub fn register(&mut self, id: impl Into<ParticipantId>, display_name: impl Into<String>) {
        let id = id.into();
        if !self.contains(&id) {
            self.participants.push((id, display_name.into()));
        }
    }

    /// Builder form of [`MatchRoster::register`]
    pub fn with(mut self, id: impl Into<ParticipantId>, display_name: impl Into<String>) -> Self {
        self.register(id, display_name);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.iter().any(|(known, _)| known == id)
    }

    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, name)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.participants
            .iter()
            .map(|(id, name)| (id.as_str(), name.as_str()))
    }
}

/// One participant's result as reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedScore {
    pub id: ParticipantId,
    pub score: f64,
    pub forfeit: bool,
}

impl ReportedScore {
    pub fn finished(id: impl Into<ParticipantId>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
            forfeit: false,
        }
    }

    pub fn forfeited(id: impl Into<ParticipantId>) -> Self {
        Self {
            id: id.into(),
            score: 0.0,
            forfeit: true,
        }
    }
}

/// Reconcile platform reports with the roster
///
/// Reports from unregistered ids are ignored and only the first report per
/// id counts. Forfeits and registered participants that never reported get a
/// score of 0.0. Reported finishers come first, in report order, followed by
/// the zero-score entries in roster order.
pub fn normalize_results(roster: &MatchRoster, reports: &[ReportedScore]) -> RawResultBatch {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut batch = RawResultBatch::with_capacity(roster.len());

    for report in reports {
        let Some(display_name) = roster.display_name(&report.id) else {
            debug!("Ignoring result of unregistered participant {}", report.id);
            continue;
        };
        if !seen.insert(report.id.as_str()) {
            continue;
        }
        if report.forfeit {
            continue;
        }

        batch.push(RawResult::new(
            report.id.clone(),
            display_name,
            sanitize_score(report.score),
        ));
    }

    let reported: HashSet<ParticipantId> = batch.iter().map(|entry| entry.id.clone()).collect();
    for (id, display_name) in roster.iter() {
        if !reported.contains(id) {
            batch.push(RawResult::new(id, display_name, 0.0));
        }
    }

    batch
}

fn sanitize_score(score: f64) -> f64 {
    if score.is_finite() && score > 0.0 {
        score
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> MatchRoster {
        MatchRoster::new()
            .with("1", "Alice")
            .with("2", "Bob")
            .with("3", "Charlie")
    }

    fn scores(batch: &RawResultBatch) -> Vec<(&str, f64)> {
        batch
            .iter()
            .map(|entry| (entry.display_name.as_str(), entry.score))
            .collect()
    }

    #[test]
    fn test_all_reported() {
        let batch = normalize_results(
            &roster(),
            &[
                ReportedScore::finished("2", 31.5),
                ReportedScore::finished("1", 44.0),
                ReportedScore::finished("3", 12.25),
            ],
        );

        assert_eq!(
            scores(&batch),
            vec![("Bob", 31.5), ("Alice", 44.0), ("Charlie", 12.25)]
        );
    }

    #[test]
    fn test_missing_and_forfeited_get_zero() {
        let batch = normalize_results(
            &roster(),
            &[
                ReportedScore::finished("1", 44.0),
                ReportedScore::forfeited("3"),
            ],
        );

        assert_eq!(
            scores(&batch),
            vec![("Alice", 44.0), ("Bob", 0.0), ("Charlie", 0.0)]
        );
    }

    #[test]
    fn test_unregistered_and_duplicate_reports_ignored() {
        let batch = normalize_results(
            &roster(),
            &[
                ReportedScore::finished("99", 500.0),
                ReportedScore::finished("1", 44.0),
                ReportedScore::finished("1", 1.0),
                ReportedScore::finished("2", -3.0),
            ],
        );

        assert_eq!(batch.len(), 3);
        assert_eq!(
            scores(&batch),
            vec![("Alice", 44.0), ("Bob", 0.0), ("Charlie", 0.0)]
        );
    }

    #[test]
    fn test_roster_keeps_first_registration() {
        let mut roster = MatchRoster::new();
        roster.register("1", "Alice");
        roster.register("1", "Impostor");

        assert_eq!(roster.len(), 1);
        assert_eq!(roster.display_name("1"), Some("Alice"));
    }
}
