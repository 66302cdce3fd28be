//! Domain data shapes shared across the reconciliation stages.

pub mod mappings;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use mappings::KnownMappings;

/// One conference instance as it appears in the catalog or in a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub conference: String,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfp_ext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfp_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    /// Topic tags, comma separated (e.g. "PY,DATA")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finaid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastodon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bluesky: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_name: Option<String>,
    /// Columns this engine does not interpret; carried through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Every non-identity field that takes part in conflict resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Start,
    End,
    Cfp,
    CfpExt,
    CfpLink,
    Link,
    Place,
    Sub,
    Sponsor,
    Finaid,
    Twitter,
    Mastodon,
    Bluesky,
    Timezone,
    Note,
    AltName,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::Start,
        Field::End,
        Field::Cfp,
        Field::CfpExt,
        Field::CfpLink,
        Field::Link,
        Field::Place,
        Field::Sub,
        Field::Sponsor,
        Field::Finaid,
        Field::Twitter,
        Field::Mastodon,
        Field::Bluesky,
        Field::Timezone,
        Field::Note,
        Field::AltName,
    ];

    /// Column name as it appears in input rows
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Start => "start",
            Field::End => "end",
            Field::Cfp => "cfp",
            Field::CfpExt => "cfp_ext",
            Field::CfpLink => "cfp_link",
            Field::Link => "link",
            Field::Place => "place",
            Field::Sub => "sub",
            Field::Sponsor => "sponsor",
            Field::Finaid => "finaid",
            Field::Twitter => "twitter",
            Field::Mastodon => "mastodon",
            Field::Bluesky => "bluesky",
            Field::Timezone => "timezone",
            Field::Note => "note",
            Field::AltName => "alt_name",
        }
    }

    pub fn from_column(column: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.as_str() == column)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EventRecord {
    pub fn new(conference: impl Into<String>, year: i32) -> Self {
        Self {
            conference: conference.into(),
            year,
            start: None,
            end: None,
            cfp: None,
            cfp_ext: None,
            cfp_link: None,
            link: None,
            place: None,
            sub: None,
            sponsor: None,
            finaid: None,
            twitter: None,
            mastodon: None,
            bluesky: None,
            timezone: None,
            note: None,
            alt_name: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn set(&mut self, field: Field, value: Option<String>) {
        *self.slot_mut(field) = value;
    }

    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity {
            name: self.conference.clone(),
            year: self.year,
        }
    }

    fn slot(&self, field: Field) -> &Option<String> {
        match field {
            Field::Start => &self.start,
            Field::End => &self.end,
            Field::Cfp => &self.cfp,
            Field::CfpExt => &self.cfp_ext,
            Field::CfpLink => &self.cfp_link,
            Field::Link => &self.link,
            Field::Place => &self.place,
            Field::Sub => &self.sub,
            Field::Sponsor => &self.sponsor,
            Field::Finaid => &self.finaid,
            Field::Twitter => &self.twitter,
            Field::Mastodon => &self.mastodon,
            Field::Bluesky => &self.bluesky,
            Field::Timezone => &self.timezone,
            Field::Note => &self.note,
            Field::AltName => &self.alt_name,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Start => &mut self.start,
            Field::End => &mut self.end,
            Field::Cfp => &mut self.cfp,
            Field::CfpExt => &mut self.cfp_ext,
            Field::CfpLink => &mut self.cfp_link,
            Field::Link => &mut self.link,
            Field::Place => &mut self.place,
            Field::Sub => &mut self.sub,
            Field::Sponsor => &mut self.sponsor,
            Field::Finaid => &mut self.finaid,
            Field::Twitter => &mut self.twitter,
            Field::Mastodon => &mut self.mastodon,
            Field::Bluesky => &mut self.bluesky,
            Field::Timezone => &mut self.timezone,
            Field::Note => &mut self.note,
            Field::AltName => &mut self.alt_name,
        }
    }
}

/// Name and year of a record, used in audit entries and prompts
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordIdentity {
    pub name: String,
    pub year: i32,
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_accessors_round_trip_every_field() {
        let mut record = EventRecord::new("PyCon Test", 2026);
        for field in Field::ALL {
            assert_eq!(record.get(field), None);
            record.set(field, Some(format!("value-{}", field)));
        }
        for field in Field::ALL {
            assert_eq!(record.get(field), Some(format!("value-{}", field).as_str()));
        }
        assert_eq!(Field::from_column("cfp_ext"), Some(Field::CfpExt));
        assert_eq!(Field::from_column("conference"), None);
    }

    #[test]
    fn test_unknown_columns_land_in_extra() {
        let row = json!({
            "conference": "PyCon Test",
            "year": 2026,
            "start": "2026-05-01",
            "end": "2026-05-03",
            "location": [{"latitude": 52.2, "longitude": 21.0}]
        });
        let record: EventRecord = serde_json::from_value(row).unwrap();
        assert_eq!(record.start.as_deref(), Some("2026-05-01"));
        assert!(record.extra.contains_key("location"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["location"][0]["latitude"], json!(52.2));
        assert!(back.get("cfp").is_none());
    }

    #[test]
    fn test_identity_display() {
        let record = EventRecord::new("EuroPython", 2025);
        assert_eq!(record.identity().to_string(), "EuroPython 2025");
    }
}
