/// Scoring and placeholder constants shared across the reconciliation stages.
/// Thresholds are defined relative to `conference_scorer`, not any other similarity measure.

/// Score at which a catalog/feed pair is accepted without asking anyone
pub const EXACT_MATCH_SCORE: u8 = 100;

/// Lowest score that is offered to the decision port as a possible match
pub const FUZZY_MATCH_THRESHOLD: u8 = 90;

/// Value written into `cfp` when no deadline is known after merging
pub const CFP_SENTINEL: &str = "TBA";

/// Time of day appended to date-only deadlines (deadlines are end-of-day AoE)
pub const DEFAULT_CFP_TIME: &str = "23:59:00";

/// Case-insensitive values that mean "unknown" rather than a real value
pub const PLACEHOLDER_VALUES: &[&str] = &["tba", "tbd", "cancelled", "none", "n/a", "nan"];

/// Columns every input row must carry
pub const REQUIRED_COLUMNS: &[&str] = &["conference", "year", "start", "end"];

// Source labels used in audit records and validation messages
pub const SOURCE_LABEL: &str = "source";
pub const CANDIDATE_LABEL: &str = "candidate";

/// Number of warnings/errors rendered by default in a report summary
pub const DEFAULT_SUMMARY_MESSAGES: usize = 10;
