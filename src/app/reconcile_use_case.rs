use serde_json::Value;
use std::time::Instant;
use tracing::{info, info_span, warn};

use crate::app::ports::{DecisionPort, MappingRepository};
use crate::config::ReconcileConfig;
use crate::constants::{CANDIDATE_LABEL, SOURCE_LABEL};
use crate::domain::{EventRecord, KnownMappings};
use crate::error::Result;
use crate::observability::metrics::reconcile as metrics;
use crate::pipeline::processing::audit::{
    trace_identities, MatchType, MergeAction, MergeRecord, MergeReport,
};
use crate::pipeline::processing::dedupe::{deduplicate, DedupOutcome};
use crate::pipeline::processing::finalize::finalize_records;
use crate::pipeline::processing::matching::{FuzzyMatcher, MatchClassification, SourceMatch};
use crate::pipeline::processing::quality_gate::RecordValidator;
use crate::pipeline::processing::resolve::ConflictResolver;
use crate::pipeline::processing::validation::validate_inputs;

/// Everything a run produces
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub merged: Vec<EventRecord>,
    pub report: MergeReport,
    /// Mappings as they stand after the run, including decisions made during it
    pub mappings: KnownMappings,
}

/// Use case for reconciling a curated catalog against one external feed
pub struct ReconcileUseCase {
    config: ReconcileConfig,
    mappings: Box<dyn MappingRepository>,
    validator: Option<Box<dyn RecordValidator>>,
}

impl ReconcileUseCase {
    pub fn new(config: ReconcileConfig, mappings: Box<dyn MappingRepository>) -> Self {
        Self {
            config,
            mappings,
            validator: None,
        }
    }

    /// Run merged output through a record validator; findings become report warnings
    pub fn with_validator(mut self, validator: Box<dyn RecordValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Reconcile catalog rows against feed rows.
    ///
    /// Structural input problems abort before any matching. A decision the port cannot
    /// supply aborts the run. Data loss and schema findings are reported, not raised.
    pub fn run(
        &self,
        source_rows: &[Value],
        candidate_rows: &[Value],
        port: &mut dyn DecisionPort,
    ) -> Result<ReconcileOutcome> {
        let started = Instant::now();
        let mut report = MergeReport::new();
        let span = info_span!("reconcile", run_id = %report.run_id);
        let _enter = span.enter();

        let inputs = validate_inputs(source_rows, candidate_rows, &mut report)?;
        let mut known = self.mappings.load()?;

        report.inputs.source_raw = inputs.source.len();
        report.inputs.candidate_raw = inputs.candidates.len();
        metrics::input_rows(SOURCE_LABEL, inputs.source.len());
        metrics::input_rows(CANDIDATE_LABEL, inputs.candidates.len());

        let key_fields = &self.config.dedupe.key_fields;
        let source = deduplicate(inputs.source, key_fields, &known);
        let candidates = deduplicate(inputs.candidates, key_fields, &known);
        record_collapsed(&mut report, SOURCE_LABEL, &source);
        record_collapsed(&mut report, CANDIDATE_LABEL, &candidates);
        report.inputs.source = source.records.len();
        report.inputs.candidate = candidates.records.len();

        let matcher = FuzzyMatcher::new(self.config.matching.clone());
        let outcome =
            matcher.match_records(&source.records, &candidates.records, &mut known, port)?;

        let resolver = ConflictResolver::new(&self.config.resolution);
        let mut merged = Vec::with_capacity(source.records.len() + candidates.records.len());

        for source_match in &outcome.matches {
            let record = &source.records[source_match.source_index];
            let candidate = source_match
                .best
                .as_ref()
                .filter(|_| source_match.classification.is_merge())
                .map(|best| &outcome.candidates[best.candidate_index].record);

            let entry = match candidate {
                Some(candidate) => {
                    self.merge_pair(source_match, record, candidate, &resolver, port)?
                }
                None => kept_source(source_match, record),
            };
            if let Some(output) = &entry.merged {
                merged.push(output.clone());
            }
            report.add_record(entry);
        }

        for (_, candidate) in outcome.unclaimed_candidates() {
            let mut output = candidate.record.clone();
            output.conference = candidate.canonical_name.clone();
            report.add_record(MergeRecord {
                source_name: None,
                candidate_name: Some(candidate.record.conference.clone()),
                score: 0,
                match_type: MatchType::Unmatched,
                action: MergeAction::KeptCandidate,
                year: candidate.record.year,
                source: None,
                candidate: Some(candidate.record.clone()),
                merged: Some(output.clone()),
                conflicts: Vec::new(),
                reason: None,
            });
            merged.push(output);
        }

        report.total_output = merged.len();
        finalize_records(&mut merged, &self.config.output, &resolver);

        if let Some(validator) = &self.validator {
            let mut issues = 0;
            for record in &merged {
                for issue in validator.validate(record) {
                    report.add_warning(issue.render(record));
                    issues += 1;
                }
            }
            metrics::schema_issues(issues);
        }

        for problem in trace_identities(&source.records, &candidates.records, &report) {
            report.add_error(problem);
        }
        if !report.validate_no_data_loss() {
            warn!("Run {} lost records; see report errors", report.run_id);
        }

        if known.has_changes() {
            match self.mappings.save(&known) {
                Ok(()) => known.mark_saved(),
                Err(e) => report.add_warning(format!("Failed to save name mappings: {}", e)),
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        metrics::run_completed(elapsed);
        info!(
            "Reconciled {} catalog and {} feed records into {} in {:.3}s",
            report.inputs.source, report.inputs.candidate, report.total_output, elapsed
        );

        Ok(ReconcileOutcome {
            merged,
            report,
            mappings: known,
        })
    }

    fn merge_pair(
        &self,
        source_match: &SourceMatch,
        record: &EventRecord,
        candidate: &EventRecord,
        resolver: &ConflictResolver,
        port: &mut dyn DecisionPort,
    ) -> Result<MergeRecord> {
        let resolved = resolver.resolve_record(record, candidate, &record.identity(), port)?;
        let mut output = resolved.record;

        let fuzzy = matches!(
            source_match.classification,
            MatchClassification::FuzzyConfirmed { .. }
        );
        if fuzzy && output.alt_name.is_none() && candidate.conference != record.conference {
            output.alt_name = Some(candidate.conference.clone());
        }

        Ok(MergeRecord {
            source_name: Some(record.conference.clone()),
            candidate_name: Some(candidate.conference.clone()),
            score: source_match.best.as_ref().map_or(0, |b| b.score),
            match_type: if fuzzy { MatchType::Fuzzy } else { MatchType::Exact },
            action: MergeAction::Merged,
            year: record.year,
            source: Some(record.clone()),
            candidate: Some(candidate.clone()),
            merged: Some(output),
            conflicts: resolved.conflicts,
            reason: None,
        })
    }
}

// Catalog record kept as-is; its best candidate, if any, owns a separate entry
fn kept_source(source_match: &SourceMatch, record: &EventRecord) -> MergeRecord {
    let match_type = match source_match.classification {
        MatchClassification::Excluded => MatchType::Excluded,
        MatchClassification::FuzzyRejected { prompted: true } => MatchType::Fuzzy,
        _ => MatchType::NoMatch,
    };
    MergeRecord {
        source_name: Some(record.conference.clone()),
        candidate_name: source_match.best.as_ref().map(|b| b.candidate_name.clone()),
        score: source_match.best.as_ref().map_or(0, |b| b.score),
        match_type,
        action: MergeAction::KeptSource,
        year: record.year,
        source: Some(record.clone()),
        candidate: None,
        merged: Some(record.clone()),
        conflicts: Vec::new(),
        reason: None,
    }
}

fn record_collapsed(report: &mut MergeReport, label: &'static str, outcome: &DedupOutcome) {
    let collapsed: usize = outcome.collapsed.iter().map(|g| g.members - 1).sum();
    if collapsed > 0 {
        metrics::rows_collapsed(label, collapsed);
    }
    for group in &outcome.collapsed {
        report.add_warning(format!(
            "{}: collapsed {} rows sharing identity '{}'",
            label, group.members, group.key
        ));
        report.inputs.collapsed.push(group.clone());
    }
}
