// Reconciliation stages: validation, normalization, dedupe, matching, resolution, audit

pub mod audit;
pub mod dedupe;
pub mod finalize;
pub mod matching;
pub mod normalize;
pub mod quality_gate;
pub mod resolve;
pub mod validation;

pub use audit::{trace_identities, MatchType, MergeAction, MergeRecord, MergeReport};
pub use dedupe::{deduplicate, KeyField};
pub use matching::{conference_scorer, FuzzyMatcher, MatchClassification};
pub use normalize::{normalize, normalize_place};
pub use resolve::{ConflictResolver, ResolutionReason};
pub use validation::validate_inputs;
