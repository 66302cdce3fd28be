//! Field-level conflict resolution between a catalog record and its matched feed record.
//!
//! Each field is resolved with the strategy from [`strategy::strategy_for`]. Rules are
//! tried in a fixed order and only when none applies is the decision port asked:
//!
//! 1. `SourceWins` fields keep a present catalog value.
//! 2. `Place` values are normalized to "City, Country" before comparing.
//! 3. A placeholder yields to a real value; two placeholders keep the catalog side.
//! 4. Values equal after trimming are kept.
//! 5. Text heuristics: a prefix/suffix yields to the longer value; values sharing first
//!    and last token resolve to the shorter one.
//! 6. Places: a substring yields to the longer value.
//! 7. Otherwise the decision port picks; an unavailable port aborts the run.

pub mod strategy;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::app::ports::DecisionPort;
use crate::config::ResolutionConfig;
use crate::domain::{EventRecord, Field, RecordIdentity};
use crate::error::{ReconcileError, Result};
use crate::observability::metrics::reconcile as metrics;
use crate::pipeline::processing::normalize::normalize_place;

pub use strategy::{strategy_for, ResolutionReason, Strategy};

/// Chosen value for one field and why
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: Option<String>,
    pub reason: ResolutionReason,
}

impl Resolution {
    fn new(value: Option<&str>, reason: ResolutionReason) -> Self {
        Self {
            value: value.map(str::to_string),
            reason,
        }
    }
}

/// Audit entry for one column whose catalog and feed values differed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    /// Column name; a known [`Field`] or a column carried in `extra`
    pub field: String,
    pub source_value: Option<String>,
    pub candidate_value: Option<String>,
    pub chosen: Option<String>,
    pub reason: ResolutionReason,
}

/// A merged record plus the conflicts settled while building it
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    pub record: EventRecord,
    pub conflicts: Vec<ConflictResolution>,
}

pub struct ConflictResolver {
    placeholders: Vec<String>,
}

impl ConflictResolver {
    pub fn new(config: &ResolutionConfig) -> Self {
        Self {
            placeholders: config.placeholders.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Missing, blank, or one of the configured placeholder tokens (case-insensitive)
    pub fn is_placeholder(&self, value: Option<&str>) -> bool {
        match value.map(str::trim) {
            None | Some("") => true,
            Some(v) => {
                let lower = v.to_lowercase();
                self.placeholders.iter().any(|p| *p == lower)
            }
        }
    }

    pub fn resolve_field(
        &self,
        source: Option<&str>,
        candidate: Option<&str>,
        field: Field,
        identity: &RecordIdentity,
        port: &mut dyn DecisionPort,
    ) -> Result<Resolution> {
        let resolution = self.resolve_with(strategy_for(field), source, candidate, field, identity, port)?;
        metrics::conflict_resolved(resolution.reason.as_str());
        Ok(resolution)
    }

    fn resolve_with(
        &self,
        strategy: Strategy,
        source: Option<&str>,
        candidate: Option<&str>,
        field: Field,
        identity: &RecordIdentity,
        port: &mut dyn DecisionPort,
    ) -> Result<Resolution> {
        let source_placeholder = self.is_placeholder(source);
        let candidate_placeholder = self.is_placeholder(candidate);

        if strategy == Strategy::SourceWins && !source_placeholder {
            return Ok(Resolution::new(source, ResolutionReason::SourcePriority));
        }

        let prepare = |value: Option<&str>, placeholder: bool| -> Option<String> {
            match (strategy, value) {
                (Strategy::Place, Some(v)) if !placeholder => Some(normalize_place(v)),
                (_, v) => v.map(str::to_string),
            }
        };
        let source_value = prepare(source, source_placeholder);
        let candidate_value = prepare(candidate, candidate_placeholder);

        let (s, c) = match (source_placeholder, candidate_placeholder) {
            (true, false) => {
                return Ok(Resolution::new(
                    candidate_value.as_deref(),
                    ResolutionReason::SourcePlaceholder,
                ))
            }
            (false, true) => {
                return Ok(Resolution::new(
                    source_value.as_deref(),
                    ResolutionReason::CandidatePlaceholder,
                ))
            }
            (true, true) => return Ok(Resolution::new(source, ResolutionReason::BothPlaceholder)),
            (false, false) => (
                source_value.as_deref().unwrap_or_default(),
                candidate_value.as_deref().unwrap_or_default(),
            ),
        };

        let (st, ct) = (s.trim(), c.trim());
        if st == ct {
            return Ok(Resolution::new(Some(s), ResolutionReason::Equal));
        }

        if matches!(strategy, Strategy::Text | Strategy::Place | Strategy::Deadline) {
            if let Some(longer) = superset(st, ct) {
                return Ok(Resolution::new(Some(longer), ResolutionReason::Superset));
            }
        }
        if matches!(strategy, Strategy::Text | Strategy::Place) && same_anchor_tokens(st, ct) {
            let shorter = if ct.chars().count() < st.chars().count() { ct } else { st };
            return Ok(Resolution::new(Some(shorter), ResolutionReason::PaddingRemoved));
        }
        if strategy == Strategy::Place && (st.contains(ct) || ct.contains(st)) {
            let longer = if ct.chars().count() > st.chars().count() { ct } else { st };
            return Ok(Resolution::new(Some(longer), ResolutionReason::PlaceSuperset));
        }

        let prompt = format!(
            "{}: '{}' differs between catalog ('{}') and feed ('{}'). Keep the catalog value?",
            identity, field, st, ct
        );
        metrics::decision_requested("conflict");
        let keep_source = port.decide(&prompt).map_err(|e| ReconcileError::AmbiguousConflict {
            identity: identity.to_string(),
            detail: format!("field '{}': {}", field, e),
        })?;

        if keep_source {
            Ok(Resolution::new(Some(st), ResolutionReason::HumanSource))
        } else {
            Ok(Resolution::new(Some(ct), ResolutionReason::HumanCandidate))
        }
    }

    /// Merge a matched feed record into a catalog record.
    ///
    /// The catalog record keeps its name and year. The CFP pair is settled first, then
    /// every other field; columns outside the known fields keep the catalog value and
    /// are filled from the feed where missing. Every column whose values differ is
    /// logged under its column name.
    pub fn resolve_record(
        &self,
        source: &EventRecord,
        candidate: &EventRecord,
        identity: &RecordIdentity,
        port: &mut dyn DecisionPort,
    ) -> Result<ResolvedRecord> {
        let mut merged = source.clone();
        let mut conflicts = Vec::new();
        let mut settled: Vec<Field> = Vec::new();

        if let Some(extended) = self.extension_side(source, candidate) {
            info!("{}: treating CFP values as a deadline extension", identity);
            for field in [Field::Cfp, Field::CfpExt] {
                let chosen = extended.get(field).map(str::to_string);
                conflicts.push(ConflictResolution {
                    field: field.as_str().to_string(),
                    source_value: source.get(field).map(str::to_string),
                    candidate_value: candidate.get(field).map(str::to_string),
                    chosen: chosen.clone(),
                    reason: ResolutionReason::CfpExtension,
                });
                metrics::conflict_resolved(ResolutionReason::CfpExtension.as_str());
                merged.set(field, chosen);
                settled.push(field);
            }
        }

        for field in Field::ALL {
            if settled.contains(&field) {
                continue;
            }
            let (s, c) = (source.get(field), candidate.get(field));
            if s.is_none() && c.is_none() {
                continue;
            }

            let resolution = self.resolve_field(s, c, field, identity, port)?;
            if s.map(str::trim) != c.map(str::trim) {
                debug!(
                    "{}: {} resolved to {:?} ({})",
                    identity, field, resolution.value, resolution.reason
                );
                conflicts.push(ConflictResolution {
                    field: field.as_str().to_string(),
                    source_value: s.map(str::to_string),
                    candidate_value: c.map(str::to_string),
                    chosen: resolution.value.clone(),
                    reason: resolution.reason,
                });
            }
            merged.set(field, resolution.value);
        }

        let columns: BTreeSet<&String> = source.extra.keys().chain(candidate.extra.keys()).collect();
        for column in columns {
            let s = source.extra.get(column).filter(|v| !v.is_null());
            let c = candidate.extra.get(column).filter(|v| !v.is_null());
            let (chosen, reason) = match (s, c) {
                (None, None) => continue,
                (Some(s), Some(c)) if s == c => continue,
                (Some(s), Some(_)) => (s, ResolutionReason::SourcePriority),
                (Some(s), None) => (s, ResolutionReason::CandidatePlaceholder),
                (None, Some(c)) => (c, ResolutionReason::SourcePlaceholder),
            };

            debug!("{}: extra column {} resolved ({})", identity, column, reason);
            metrics::conflict_resolved(reason.as_str());
            conflicts.push(ConflictResolution {
                field: column.clone(),
                source_value: s.map(render_extra),
                candidate_value: c.map(render_extra),
                chosen: Some(render_extra(chosen)),
                reason,
            });
            merged.extra.insert(column.clone(), chosen.clone());
        }

        Ok(ResolvedRecord {
            record: merged,
            conflicts,
        })
    }

    // The side whose cfp_ext equals the other side's cfp knows both the original and the
    // extended deadline, provided its own cfp is a real, earlier value.
    fn extension_side<'a>(
        &self,
        source: &'a EventRecord,
        candidate: &'a EventRecord,
    ) -> Option<&'a EventRecord> {
        let real = |v: Option<&'a str>| v.filter(|x| !self.is_placeholder(Some(*x))).map(str::trim);

        let pairs = [(source, candidate), (candidate, source)];
        pairs.into_iter().find_map(|(plain, extended)| {
            let original = real(extended.cfp.as_deref())?;
            match (real(plain.cfp.as_deref()), real(extended.cfp_ext.as_deref())) {
                (Some(cfp), Some(ext)) if cfp == ext && original != ext => Some(extended),
                _ => None,
            }
        })
    }
}

fn render_extra(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_string)
}

fn superset<'a>(a: &'a str, b: &'a str) -> Option<&'a str> {
    let (longer, shorter) = if a.chars().count() >= b.chars().count() { (a, b) } else { (b, a) };
    if longer.starts_with(shorter) || longer.ends_with(shorter) {
        Some(longer)
    } else {
        None
    }
}

fn same_anchor_tokens(a: &str, b: &str) -> bool {
    let mut left = a.split_whitespace();
    let mut right = b.split_whitespace();
    let (lf, rf) = (left.next(), right.next());
    let (ll, rl) = (left.next_back().or(lf), right.next_back().or(rf));
    lf.is_some() && lf == rf && ll == rl
}
