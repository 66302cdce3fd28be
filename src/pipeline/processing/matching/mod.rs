pub mod scorer;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::ports::DecisionPort;
use crate::config::MatchingConfig;
use crate::domain::{EventRecord, KnownMappings};
use crate::error::{ReconcileError, Result};
use crate::observability::metrics::reconcile as metrics;
use crate::pipeline::processing::normalize::normalize;

pub use scorer::{conference_scorer, shares_anchor_tokens};

/// How a catalog record relates to its best-scoring feed candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchClassification {
    /// Score at the exact tier; merged without asking
    Exact,
    /// Fuzzy score and accepted, either now by the decision port or by an earlier decision
    FuzzyConfirmed { prompted: bool },
    /// Fuzzy score and declined, either now or by an earlier decision
    FuzzyRejected { prompted: bool },
    /// The best candidate is on the exclusion list
    Excluded,
    /// No candidate reached the fuzzy threshold
    Unmatched,
}

impl MatchClassification {
    pub fn is_merge(&self) -> bool {
        matches!(
            self,
            MatchClassification::Exact | MatchClassification::FuzzyConfirmed { .. }
        )
    }
}

/// Best candidate found for one catalog record. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub candidate_index: usize,
    pub candidate_name: String,
    pub score: u8,
    pub classification: MatchClassification,
}

/// Matching result for one catalog record
#[derive(Debug, Clone)]
pub struct SourceMatch {
    pub source_index: usize,
    /// Normalized catalog name
    pub source_key: String,
    /// Best candidate considered, if the feed had any record for the same year
    pub best: Option<MatchCandidate>,
    pub classification: MatchClassification,
}

/// A feed record annotated with the catalog identity it was linked to
#[derive(Debug, Clone)]
pub struct IndexedCandidate {
    pub record: EventRecord,
    /// Normalized name this row is known by after matching
    pub canonical_name: String,
    pub matched_source: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub matches: Vec<SourceMatch>,
    pub candidates: Vec<IndexedCandidate>,
}

impl MatchOutcome {
    pub fn unclaimed_candidates(&self) -> impl Iterator<Item = (usize, &IndexedCandidate)> {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.matched_source.is_none())
    }
}

/// Links catalog records to feed records by name similarity within the same year
pub struct FuzzyMatcher {
    config: MatchingConfig,
}

struct Scored {
    index: usize,
    score: u8,
    anchored: bool,
    excluded: bool,
}

impl FuzzyMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Find and classify the best candidate for every catalog record.
    ///
    /// Candidates are claimed by at most one catalog record, in catalog order. Confirmed
    /// and rejected decisions are written into `known` as they are made.
    pub fn match_records(
        &self,
        source: &[EventRecord],
        candidates: &[EventRecord],
        known: &mut KnownMappings,
        port: &mut dyn DecisionPort,
    ) -> Result<MatchOutcome> {
        let mut indexed: Vec<IndexedCandidate> = candidates
            .iter()
            .map(|record| IndexedCandidate {
                canonical_name: normalize(&record.conference, known),
                record: record.clone(),
                matched_source: None,
            })
            .collect();

        let mut matches = Vec::with_capacity(source.len());
        for (source_index, record) in source.iter().enumerate() {
            let source_key = normalize(&record.conference, known);
            let outcome = self.match_one(source_index, record, &source_key, &mut indexed, known, port)?;
            matches.push(outcome);
        }

        info!(
            "Matched {} catalog records against {} feed records ({} feed records unclaimed)",
            source.len(),
            candidates.len(),
            indexed.iter().filter(|c| c.matched_source.is_none()).count()
        );

        Ok(MatchOutcome {
            matches,
            candidates: indexed,
        })
    }

    fn match_one(
        &self,
        source_index: usize,
        record: &EventRecord,
        source_key: &str,
        indexed: &mut [IndexedCandidate],
        known: &mut KnownMappings,
        port: &mut dyn DecisionPort,
    ) -> Result<SourceMatch> {
        let scored: Vec<Scored> = indexed
            .iter()
            .enumerate()
            .filter(|(_, c)| c.matched_source.is_none() && c.record.year == record.year)
            .map(|(index, c)| Scored {
                index,
                score: conference_scorer(source_key, &c.canonical_name),
                anchored: shares_anchor_tokens(source_key, &c.canonical_name),
                excluded: self.is_excluded(source_key, &c.canonical_name, known),
            })
            .collect();

        let best_overall = best_of(scored.iter());
        let best_allowed = best_of(scored.iter().filter(|s| !s.excluded));

        let (chosen, classification) = match best_allowed {
            Some(best) if best.score >= self.config.fuzzy_threshold => {
                let candidate_key = indexed[best.index].canonical_name.clone();
                let classification =
                    self.classify(record, source_key, &candidate_key, best.score, known, port)?;
                (Some(best), classification)
            }
            _ => match best_overall {
                Some(best) if best.excluded => (Some(best), MatchClassification::Excluded),
                other => (other, MatchClassification::Unmatched),
            },
        };

        let best = chosen.map(|s| MatchCandidate {
            candidate_index: s.index,
            candidate_name: indexed[s.index].record.conference.clone(),
            score: s.score,
            classification,
        });

        if classification.is_merge() {
            if let Some(s) = chosen {
                indexed[s.index].matched_source = Some(source_index);
                indexed[s.index].canonical_name = source_key.to_string();
            }
        }

        metrics::pair_classified(classification, best.as_ref().map_or(0, |b| b.score));
        debug!(
            "'{}' ({}) best candidate {:?} -> {:?}",
            record.conference,
            record.year,
            best.as_ref().map(|b| (&b.candidate_name, b.score)),
            classification
        );

        Ok(SourceMatch {
            source_index,
            source_key: source_key.to_string(),
            best,
            classification,
        })
    }

    fn classify(
        &self,
        record: &EventRecord,
        source_key: &str,
        candidate_key: &str,
        score: u8,
        known: &mut KnownMappings,
        port: &mut dyn DecisionPort,
    ) -> Result<MatchClassification> {
        if score >= self.config.exact_score {
            return Ok(MatchClassification::Exact);
        }
        if known.is_rejected(source_key, candidate_key) {
            debug!("'{}' vs '{}' previously rejected", source_key, candidate_key);
            return Ok(MatchClassification::FuzzyRejected { prompted: false });
        }
        if known.is_confirmed(source_key, candidate_key) {
            return Ok(MatchClassification::FuzzyConfirmed { prompted: false });
        }

        let prompt = format!(
            "Is '{}' the same conference as '{}' ({}, similarity {})?",
            candidate_key, source_key, record.year, score
        );
        metrics::decision_requested("match");
        let accepted = port.decide(&prompt).map_err(|e| ReconcileError::AmbiguousConflict {
            identity: record.identity().to_string(),
            detail: format!("name match '{}' vs '{}': {}", source_key, candidate_key, e),
        })?;
        if accepted {
            info!("Confirmed '{}' as a variant of '{}'", candidate_key, source_key);
            known.confirm(source_key, candidate_key);
            Ok(MatchClassification::FuzzyConfirmed { prompted: true })
        } else {
            info!("Rejected '{}' as a variant of '{}'", candidate_key, source_key);
            known.reject(source_key, candidate_key);
            Ok(MatchClassification::FuzzyRejected { prompted: true })
        }
    }

    fn is_excluded(&self, a: &str, b: &str, known: &KnownMappings) -> bool {
        self.config.excluded_pairs.iter().any(|[x, y]| {
            let x = normalize(x, known);
            let y = normalize(y, known);
            (x == a && y == b) || (x == b && y == a)
        })
    }
}

// Highest score wins; ties go to a candidate sharing first and last token, then to the
// earliest candidate.
fn best_of<'a>(scored: impl Iterator<Item = &'a Scored>) -> Option<&'a Scored> {
    scored.fold(None, |best: Option<&Scored>, s| match best {
        Some(b) if (b.score, b.anchored) >= (s.score, s.anchored) => Some(b),
        _ => Some(s),
    })
}
