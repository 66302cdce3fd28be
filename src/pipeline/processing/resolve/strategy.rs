use serde::{Deserialize, Serialize};

use crate::domain::Field;

/// How a field's two candidate values are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Placeholder rules and equality only, then ask
    Generic,
    /// Generic plus prefix/suffix and padding heuristics
    Text,
    /// Catalog value wins whenever it is present
    SourceWins,
    /// Text rules over normalized "City, Country" values, plus substring containment
    Place,
    /// Generic plus prefix rule, so a date-only deadline yields to the same date with a time
    Deadline,
}

/// Why a value was chosen; rendered in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionReason {
    SourcePriority,
    SourcePlaceholder,
    CandidatePlaceholder,
    BothPlaceholder,
    Equal,
    Superset,
    PaddingRemoved,
    PlaceSuperset,
    HumanSource,
    HumanCandidate,
    CfpExtension,
}

impl ResolutionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionReason::SourcePriority => "source_priority",
            ResolutionReason::SourcePlaceholder => "source_placeholder",
            ResolutionReason::CandidatePlaceholder => "candidate_placeholder",
            ResolutionReason::BothPlaceholder => "both_placeholder",
            ResolutionReason::Equal => "equal",
            ResolutionReason::Superset => "superset",
            ResolutionReason::PaddingRemoved => "padding_removed",
            ResolutionReason::PlaceSuperset => "place_superset",
            ResolutionReason::HumanSource => "human_source",
            ResolutionReason::HumanCandidate => "human_candidate",
            ResolutionReason::CfpExtension => "cfp_extension",
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(
            self,
            ResolutionReason::HumanSource | ResolutionReason::HumanCandidate
        )
    }
}

impl std::fmt::Display for ResolutionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution strategy per field
pub fn strategy_for(field: Field) -> Strategy {
    match field {
        Field::Sponsor => Strategy::SourceWins,
        Field::Place => Strategy::Place,
        Field::Cfp | Field::CfpExt => Strategy::Deadline,
        Field::Start | Field::End | Field::Timezone => Strategy::Generic,
        Field::CfpLink
        | Field::Link
        | Field::Sub
        | Field::Finaid
        | Field::Twitter
        | Field::Mastodon
        | Field::Bluesky
        | Field::Note
        | Field::AltName => Strategy::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_field_has_a_strategy() {
        let table: Vec<(Field, Strategy)> =
            Field::ALL.iter().map(|f| (*f, strategy_for(*f))).collect();
        assert_eq!(table.len(), Field::ALL.len());
        assert!(table.contains(&(Field::Sponsor, Strategy::SourceWins)));
        assert!(table.contains(&(Field::Cfp, Strategy::Deadline)));
    }

    #[test]
    fn test_reason_names_serialize_like_as_str() {
        for reason in [ResolutionReason::SourcePlaceholder, ResolutionReason::CfpExtension] {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, serde_json::json!(reason.as_str()));
        }
    }
}
