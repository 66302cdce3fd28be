//! Merge audit trail: one [`MergeRecord`] per output slot plus run-level counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::EventRecord;
use crate::observability::metrics::reconcile as metrics;
use crate::pipeline::processing::dedupe::CollapsedGroup;
use crate::pipeline::processing::resolve::ConflictResolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Excluded,
    NoMatch,
    /// Feed record that no catalog record claimed
    Unmatched,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Fuzzy => "fuzzy",
            MatchType::Excluded => "excluded",
            MatchType::NoMatch => "no_match",
            MatchType::Unmatched => "unmatched",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    Merged,
    KeptSource,
    KeptCandidate,
    Dropped,
}

/// Audit entry for one output slot.
///
/// `source`/`candidate` snapshots are present only for the input records this slot
/// accounts for. A kept catalog record still names its best candidate and score, but
/// that candidate owns a separate entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub source_name: Option<String>,
    pub candidate_name: Option<String>,
    pub score: u8,
    pub match_type: MatchType,
    pub action: MergeAction,
    pub year: i32,
    pub source: Option<EventRecord>,
    pub candidate: Option<EventRecord>,
    pub merged: Option<EventRecord>,
    #[serde(default)]
    pub conflicts: Vec<ConflictResolution>,
    /// Why the record was dropped, when it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MergeRecord {
    fn display_name(&self) -> &str {
        self.source_name
            .as_deref()
            .or(self.candidate_name.as_deref())
            .unwrap_or("<unnamed>")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedIdentity {
    pub name: String,
    pub year: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputCounts {
    pub source_raw: usize,
    pub candidate_raw: usize,
    /// After same-source duplicates were collapsed
    pub source: usize,
    pub candidate: usize,
    #[serde(default)]
    pub collapsed: Vec<CollapsedGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchCounters {
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub excluded: usize,
    pub no_matches: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub inputs: InputCounts,
    pub counters: MatchCounters,
    pub total_output: usize,
    pub records: Vec<MergeRecord>,
    pub dropped: Vec<DroppedIdentity>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Default for MergeReport {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            inputs: InputCounts::default(),
            counters: MatchCounters::default(),
            total_output: 0,
            records: Vec::new(),
            dropped: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn source_count(&self) -> usize {
        self.inputs.source
    }

    pub fn candidate_count(&self) -> usize {
        self.inputs.candidate
    }

    /// Append an audit entry, bumping its match-type counter and the dropped list
    pub fn add_record(&mut self, record: MergeRecord) {
        let counter = match record.match_type {
            MatchType::Exact => &mut self.counters.exact_matches,
            MatchType::Fuzzy => &mut self.counters.fuzzy_matches,
            MatchType::Excluded => &mut self.counters.excluded,
            MatchType::NoMatch => &mut self.counters.no_matches,
            MatchType::Unmatched => &mut self.counters.unmatched,
        };
        *counter += 1;

        if record.action == MergeAction::Dropped {
            let identity = DroppedIdentity {
                name: record.display_name().to_string(),
                year: record.year,
                reason: record
                    .reason
                    .clone()
                    .unwrap_or_else(|| "no reason recorded".to_string()),
            };
            warn!("Dropped {} {}: {}", identity.name, identity.year, identity.reason);
            metrics::records_dropped(1);
            self.dropped.push(identity);
        }

        self.records.push(record);
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.errors.push(message);
    }

    /// False (with an error appended) when the output is smaller than the larger input
    pub fn validate_no_data_loss(&mut self) -> bool {
        let expected = self.source_count().max(self.candidate_count());
        if self.total_output >= expected {
            return true;
        }

        metrics::data_loss_detected();
        self.add_error(format!(
            "Data loss: {} output records but inputs had {} catalog and {} feed records ({} dropped)",
            self.total_output,
            self.source_count(),
            self.candidate_count(),
            self.dropped.len()
        ));
        false
    }

    /// Human-readable rendering: counters, the first `max_messages` warnings and errors,
    /// then every dropped conference.
    pub fn summary(&self, max_messages: usize) -> String {
        let mut out = String::new();
        let i = &self.inputs;
        let c = &self.counters;

        let _ = writeln!(out, "Merge report");
        let _ = writeln!(
            out,
            "  Catalog records:      {} ({} before collapsing duplicates)",
            i.source, i.source_raw
        );
        let _ = writeln!(
            out,
            "  Feed records:         {} ({} before collapsing duplicates)",
            i.candidate, i.candidate_raw
        );
        let _ = writeln!(out, "  Exact matches:        {}", c.exact_matches);
        let _ = writeln!(out, "  Fuzzy matches:        {}", c.fuzzy_matches);
        let _ = writeln!(out, "  Excluded pairs:       {}", c.excluded);
        let _ = writeln!(out, "  No matches:           {}", c.no_matches);
        let _ = writeln!(out, "  Unmatched feed rows:  {}", c.unmatched);
        let _ = writeln!(out, "  Total output:         {}", self.total_output);

        render_messages(&mut out, "Warnings", &self.warnings, max_messages);
        render_messages(&mut out, "Errors", &self.errors, max_messages);

        let _ = writeln!(out, "Dropped conferences ({}):", self.dropped.len());
        for d in &self.dropped {
            let _ = writeln!(out, "  - {} {}: {}", d.name, d.year, d.reason);
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn render_messages(out: &mut String, title: &str, messages: &[String], max: usize) {
    let _ = writeln!(out, "{} ({}):", title, messages.len());
    for message in messages.iter().take(max) {
        let _ = writeln!(out, "  - {}", message);
    }
    if messages.len() > max {
        let _ = writeln!(out, "  ... and {} more", messages.len() - max);
    }
}

/// Check that every input identity owns exactly one slot in the report.
///
/// Returns one message per identity that is missing or accounted for more than once.
pub fn trace_identities(
    source: &[EventRecord],
    candidates: &[EventRecord],
    report: &MergeReport,
) -> Vec<String> {
    let mut problems = Vec::new();
    problems.extend(trace_side(
        "catalog",
        source,
        report.records.iter().filter_map(|r| r.source.as_ref()),
    ));
    problems.extend(trace_side(
        "feed",
        candidates,
        report.records.iter().filter_map(|r| r.candidate.as_ref()),
    ));
    problems
}

fn trace_side<'a>(
    side: &str,
    inputs: &[EventRecord],
    slots: impl Iterator<Item = &'a EventRecord>,
) -> Vec<String> {
    let mut balance: BTreeMap<(String, i32), i64> = BTreeMap::new();
    for record in inputs {
        *balance.entry((record.conference.clone(), record.year)).or_default() += 1;
    }
    for record in slots {
        *balance.entry((record.conference.clone(), record.year)).or_default() -= 1;
    }

    balance
        .into_iter()
        .filter(|(_, n)| *n != 0)
        .map(|((name, year), n)| {
            if n > 0 {
                format!("{} record '{} {}' has no slot in the output", side, name, year)
            } else {
                format!("{} record '{} {}' is accounted for {} extra time(s)", side, name, year, -n)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, match_type: MatchType, action: MergeAction) -> MergeRecord {
        let record = EventRecord::new(name, 2026);
        MergeRecord {
            source_name: Some(name.to_string()),
            candidate_name: None,
            score: 0,
            match_type,
            action,
            year: 2026,
            source: Some(record.clone()),
            candidate: None,
            merged: Some(record),
            conflicts: Vec::new(),
            reason: None,
        }
    }

    #[test]
    fn test_add_record_updates_counters() {
        let mut report = MergeReport::new();
        report.add_record(entry("A", MatchType::Exact, MergeAction::Merged));
        report.add_record(entry("B", MatchType::NoMatch, MergeAction::KeptSource));
        report.add_record(entry("C", MatchType::Unmatched, MergeAction::KeptCandidate));

        assert_eq!(report.counters.exact_matches, 1);
        assert_eq!(report.counters.no_matches, 1);
        assert_eq!(report.counters.unmatched, 1);
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn test_dropped_record_is_listed_and_fails_loss_check() {
        let mut report = MergeReport::new();
        report.inputs.source = 2;
        report.inputs.candidate = 1;

        report.add_record(entry("PyCon Test", MatchType::Exact, MergeAction::Merged));
        let mut dropped = entry("PyCon Gone", MatchType::NoMatch, MergeAction::Dropped);
        dropped.merged = None;
        dropped.reason = Some("cancelled".to_string());
        report.add_record(dropped);
        report.total_output = 1;

        assert!(!report.validate_no_data_loss());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("Data loss"));
        assert_eq!(
            report.dropped,
            vec![DroppedIdentity {
                name: "PyCon Gone".to_string(),
                year: 2026,
                reason: "cancelled".to_string()
            }]
        );
        assert!(report.summary(10).contains("  - PyCon Gone 2026: cancelled"));
    }

    #[test]
    fn test_no_loss_when_output_covers_larger_input() {
        let mut report = MergeReport::new();
        report.inputs.source = 3;
        report.inputs.candidate = 2;
        report.total_output = 3;
        assert!(report.validate_no_data_loss());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_summary_is_deterministic_and_truncates() {
        let build = || {
            let mut report = MergeReport::new();
            for n in 0..5 {
                report.warnings.push(format!("warning {}", n));
            }
            report.errors.push("boom".to_string());
            report
        };
        let first = build().summary(2);
        let second = build().summary(2);
        assert_eq!(first, second);
        assert!(first.contains("Warnings (5):"));
        assert!(first.contains("  - warning 1"));
        assert!(!first.contains("warning 2"));
        assert!(first.contains("... and 3 more"));
        assert!(first.contains("Errors (1):\n  - boom"));
    }

    #[test]
    fn test_trace_identities_finds_gaps_and_duplicates() {
        let source = vec![EventRecord::new("A", 2026), EventRecord::new("B", 2026)];
        let candidates = vec![EventRecord::new("C", 2026)];

        let mut report = MergeReport::new();
        report.add_record(entry("A", MatchType::Exact, MergeAction::Merged));
        report.add_record(entry("A", MatchType::Exact, MergeAction::Merged));

        let problems = trace_identities(&source, &candidates, &report);
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.contains("'A 2026' is accounted for 1 extra")));
        assert!(problems.iter().any(|p| p.contains("catalog record 'B 2026' has no slot")));
        assert!(problems.iter().any(|p| p.contains("feed record 'C 2026' has no slot")));
    }

    #[test]
    fn test_report_serializes_match_types_snake_case() {
        let mut report = MergeReport::new();
        report.add_record(entry("A", MatchType::NoMatch, MergeAction::KeptSource));
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["records"][0]["match_type"], "no_match");
        assert_eq!(json["records"][0]["action"], "kept_source");
        assert_eq!(json["counters"]["no_matches"], 1);
    }
}
