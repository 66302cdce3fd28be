//! Metrics for reconciliation runs
//!
//! Recorded through the `metrics` facade using Prometheus naming conventions. Nothing is
//! exported from here; a host process installs whatever recorder it wants.

use std::fmt;

/// Enum representing all metric names used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Run metrics
    RunsCompleted,
    RunDuration,
    InputRows,
    RowsCollapsed,

    // Matching metrics
    PairsExact,
    PairsFuzzyConfirmed,
    PairsFuzzyRejected,
    PairsExcluded,
    PairsUnmatched,
    MatchScore,
    DecisionsRequested,

    // Resolution metrics
    ConflictsResolved,

    // Audit metrics
    RecordsDropped,
    DataLossDetected,
    SchemaIssues,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RunsCompleted => "conf_reconcile_runs_completed_total",
            MetricName::RunDuration => "conf_reconcile_run_duration_seconds",
            MetricName::InputRows => "conf_reconcile_input_rows_total",
            MetricName::RowsCollapsed => "conf_reconcile_rows_collapsed_total",

            MetricName::PairsExact => "conf_reconcile_pairs_exact_total",
            MetricName::PairsFuzzyConfirmed => "conf_reconcile_pairs_fuzzy_confirmed_total",
            MetricName::PairsFuzzyRejected => "conf_reconcile_pairs_fuzzy_rejected_total",
            MetricName::PairsExcluded => "conf_reconcile_pairs_excluded_total",
            MetricName::PairsUnmatched => "conf_reconcile_pairs_unmatched_total",
            MetricName::MatchScore => "conf_reconcile_match_score",
            MetricName::DecisionsRequested => "conf_reconcile_decisions_requested_total",

            MetricName::ConflictsResolved => "conf_reconcile_conflicts_resolved_total",

            MetricName::RecordsDropped => "conf_reconcile_records_dropped_total",
            MetricName::DataLossDetected => "conf_reconcile_data_loss_detected_total",
            MetricName::SchemaIssues => "conf_reconcile_schema_issues_total",
        }
    }

    /// All metric names, e.g. for describing them to a recorder up front
    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            RunsCompleted,
            RunDuration,
            InputRows,
            RowsCollapsed,
            PairsExact,
            PairsFuzzyConfirmed,
            PairsFuzzyRejected,
            PairsExcluded,
            PairsUnmatched,
            MatchScore,
            DecisionsRequested,
            ConflictsResolved,
            RecordsDropped,
            DataLossDetected,
            SchemaIssues,
        ]
        .into_iter()
    }
}

// ============================================================================
// Reconcile Metrics
// ============================================================================

pub mod reconcile {
    use super::MetricName;
    use crate::pipeline::processing::matching::MatchClassification;

    /// Record input rows for one side of a run ("source" or "candidate")
    pub fn input_rows(side: &'static str, count: usize) {
        ::metrics::counter!(MetricName::InputRows.as_str(), "side" => side).increment(count as u64);
    }

    pub fn rows_collapsed(side: &'static str, count: usize) {
        ::metrics::counter!(MetricName::RowsCollapsed.as_str(), "side" => side)
            .increment(count as u64);
    }

    /// Record the classification and best score for one catalog record
    pub fn pair_classified(classification: MatchClassification, score: u8) {
        let metric_name = match classification {
            MatchClassification::Exact => MetricName::PairsExact,
            MatchClassification::FuzzyConfirmed { .. } => MetricName::PairsFuzzyConfirmed,
            MatchClassification::FuzzyRejected { .. } => MetricName::PairsFuzzyRejected,
            MatchClassification::Excluded => MetricName::PairsExcluded,
            MatchClassification::Unmatched => MetricName::PairsUnmatched,
        };
        ::metrics::counter!(metric_name.as_str()).increment(1);
        ::metrics::histogram!(MetricName::MatchScore.as_str()).record(score as f64);
    }

    /// A question was put to the decision port ("match" or "conflict")
    pub fn decision_requested(kind: &'static str) {
        ::metrics::counter!(MetricName::DecisionsRequested.as_str(), "kind" => kind).increment(1);
    }

    pub fn conflict_resolved(reason: &'static str) {
        ::metrics::counter!(MetricName::ConflictsResolved.as_str(), "reason" => reason)
            .increment(1);
    }

    pub fn records_dropped(count: usize) {
        ::metrics::counter!(MetricName::RecordsDropped.as_str()).increment(count as u64);
    }

    pub fn data_loss_detected() {
        ::metrics::counter!(MetricName::DataLossDetected.as_str()).increment(1);
    }

    pub fn schema_issues(count: usize) {
        ::metrics::counter!(MetricName::SchemaIssues.as_str()).increment(count as u64);
    }

    /// Record a completed run and its wall-clock duration
    pub fn run_completed(secs: f64) {
        ::metrics::counter!(MetricName::RunsCompleted.as_str()).increment(1);
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique_and_prefixed() {
        let mut seen = HashSet::new();
        for metric in MetricName::all_metrics() {
            let name = metric.as_str();
            assert!(name.starts_with("conf_reconcile_"), "{}", name);
            assert!(seen.insert(name), "duplicate metric name {}", name);
            assert_eq!(metric.to_string(), name);
        }
    }

    #[test]
    fn test_helpers_without_recorder_are_noops() {
        reconcile::pair_classified(
            crate::pipeline::processing::matching::MatchClassification::Exact,
            100,
        );
        reconcile::decision_requested("match");
        reconcile::run_completed(0.01);
    }
}
