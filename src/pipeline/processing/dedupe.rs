use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::domain::{EventRecord, Field, KnownMappings};
use crate::pipeline::processing::normalize::{normalize, normalize_place};

/// Fields that can make up the identity key used to collapse rows within one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyField {
    Name,
    Year,
    Place,
}

/// Result of collapsing duplicate rows
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Surviving rows, in order of first appearance
    pub records: Vec<EventRecord>,
    /// Groups that had more than one member
    pub collapsed: Vec<CollapsedGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollapsedGroup {
    pub key: String,
    pub members: usize,
}

/// Collapse rows that share an identity key into one row per key.
///
/// Survivors take, per field, the first non-null value seen; when two rows both carry a
/// value the textually longer one is kept. Output never has more rows than input.
pub fn deduplicate(
    records: Vec<EventRecord>,
    key_fields: &[KeyField],
    known: &KnownMappings,
) -> DedupOutcome {
    let input_len = records.len();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, EventRecord, usize)> = Vec::new();

    for record in records {
        let key = identity_key(&record, key_fields, known);
        match index.get(&key) {
            Some(&slot) => {
                let (_, survivor, members) = &mut groups[slot];
                merge_into(survivor, record);
                *members += 1;
            }
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, record, 1));
            }
        }
    }

    let mut collapsed = Vec::new();
    let mut survivors = Vec::with_capacity(groups.len());
    for (key, record, members) in groups {
        if members > 1 {
            info!("Collapsed {} rows sharing identity '{}'", members, key);
            collapsed.push(CollapsedGroup { key, members });
        }
        survivors.push(record);
    }

    debug!("Deduplicated {} rows into {}", input_len, survivors.len());
    DedupOutcome {
        records: survivors,
        collapsed,
    }
}

/// Identity key for a record under the given key fields, e.g. "PyCon Poland|2026"
pub fn identity_key(record: &EventRecord, key_fields: &[KeyField], known: &KnownMappings) -> String {
    key_fields
        .iter()
        .map(|field| match field {
            KeyField::Name => normalize(&record.conference, known),
            KeyField::Year => record.year.to_string(),
            KeyField::Place => record.place.as_deref().map(normalize_place).unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn merge_into(survivor: &mut EventRecord, other: EventRecord) {
    for field in Field::ALL {
        let merged = union_value(survivor.get(field), other.get(field));
        survivor.set(field, merged);
    }

    for (column, value) in other.extra {
        match survivor.extra.get(&column) {
            Some(existing) if !existing.is_null() => {
                if !value.is_null() && value.to_string().len() > existing.to_string().len() {
                    survivor.extra.insert(column, value);
                }
            }
            _ => {
                survivor.extra.insert(column, value);
            }
        }
    }
}

fn union_value(first: Option<&str>, second: Option<&str>) -> Option<String> {
    match (first, second) {
        (Some(a), Some(b)) if b.chars().count() > a.chars().count() => Some(b.to_string()),
        (Some(a), _) => Some(a.to_string()),
        (None, b) => b.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(name: &str, year: i32) -> EventRecord {
        EventRecord::new(name, year)
    }

    #[test]
    fn test_collapses_rows_with_same_name_and_year() {
        let mut a = record("PyCon PL 2026", 2026);
        a.link = Some("https://pl.pycon.org".to_string());
        a.cfp = Some("TBA".to_string());
        let mut b = record("PyCon Poland", 2026);
        b.link = Some("https://pl.pycon.org/2026".to_string());
        b.cfp = Some("2026-03-01 23:59:00".to_string());
        b.place = Some("Gliwice, Poland".to_string());

        let outcome = deduplicate(
            vec![a, b],
            &[KeyField::Name, KeyField::Year],
            &KnownMappings::new(),
        );

        assert_eq!(outcome.records.len(), 1);
        let merged = &outcome.records[0];
        assert_eq!(merged.conference, "PyCon PL 2026");
        assert_eq!(merged.link.as_deref(), Some("https://pl.pycon.org/2026"));
        assert_eq!(merged.cfp.as_deref(), Some("2026-03-01 23:59:00"));
        assert_eq!(merged.place.as_deref(), Some("Gliwice, Poland"));
        assert_eq!(
            outcome.collapsed,
            vec![CollapsedGroup {
                key: "PyCon Poland|2026".to_string(),
                members: 2
            }]
        );
    }

    #[test]
    fn test_equal_length_values_keep_the_first() {
        let mut a = record("EuroPython", 2025);
        a.start = Some("2025-07-14".to_string());
        let mut b = record("EuroPython", 2025);
        b.start = Some("2025-07-15".to_string());

        let outcome = deduplicate(vec![a, b], &[KeyField::Name], &KnownMappings::new());
        assert_eq!(outcome.records[0].start.as_deref(), Some("2025-07-14"));
    }

    #[test]
    fn test_year_in_key_keeps_editions_apart() {
        let rows = vec![record("PyCon US", 2025), record("PyCon US", 2026)];
        let by_name = deduplicate(rows.clone(), &[KeyField::Name], &KnownMappings::new());
        let by_name_year =
            deduplicate(rows, &[KeyField::Name, KeyField::Year], &KnownMappings::new());
        assert_eq!(by_name.records.len(), 1);
        assert_eq!(by_name_year.records.len(), 2);
    }

    #[test]
    fn test_place_in_key_uses_normalized_place() {
        let mut a = record("PyData", 2026);
        a.place = Some("Berlin,DE".to_string());
        let mut b = record("PyData", 2026);
        b.place = Some("Berlin, Germany".to_string());
        let mut c = record("PyData", 2026);
        c.place = Some("London, UK".to_string());

        let outcome = deduplicate(
            vec![a, b, c],
            &[KeyField::Name, KeyField::Year, KeyField::Place],
            &KnownMappings::new(),
        );
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].place.as_deref(), Some("Berlin, Germany"));
    }

    #[test]
    fn test_extra_columns_union() {
        let mut a = record("SciPy", 2026);
        a.extra.insert("location".to_string(), serde_json::Value::Null);
        let mut b = record("SciPy", 2026);
        b.extra.insert("location".to_string(), json!([{"latitude": 30.2}]));
        b.extra.insert("archived".to_string(), json!(true));

        let outcome = deduplicate(vec![a, b], &[KeyField::Name], &KnownMappings::new());
        let merged = &outcome.records[0];
        assert_eq!(merged.extra["location"], json!([{"latitude": 30.2}]));
        assert_eq!(merged.extra["archived"], json!(true));
    }

    #[test]
    fn test_singletons_unchanged_and_idempotent_count() {
        let mut solo = record("DjangoCon Europe", 2026);
        solo.note = Some("hybrid".to_string());
        let rows = vec![
            solo.clone(),
            record("PyCon US 2026", 2026),
            record("PyCon US", 2026),
            record("PyCon  US", 2026),
            record("PyCon DE", 2026),
        ];
        let known = KnownMappings::new();
        let key = [KeyField::Name, KeyField::Year];

        let once = deduplicate(rows.clone(), &key, &known);
        assert!(once.records.len() <= rows.len());
        assert_eq!(once.records.len(), 3);
        assert_eq!(once.records[0], solo);

        let twice = deduplicate(once.records.clone(), &key, &known);
        assert_eq!(twice.records.len(), once.records.len());
        assert!(twice.collapsed.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let outcome = deduplicate(Vec::new(), &[KeyField::Name], &KnownMappings::new());
        assert!(outcome.records.is_empty());
        assert!(outcome.collapsed.is_empty());
    }

    fn arb_record() -> impl Strategy<Value = EventRecord> {
        let name = prop::sample::select(vec![
            "PyCon PL", "PyCon Poland", "PyCon PL 2026", "PyCon +PL", "PyCon DE", "PyCon US",
            "EuroPython", "EuroPython Conf", "SciPy", "PyData Berlin 2025",
        ]);
        let place = prop::option::of(prop::sample::select(vec![
            "Berlin,DE", "Berlin, Germany", "Warsaw, PL", " , ", "Online",
        ]));
        let link = prop::option::of(r"https://[a-z]{1,8}\.test(/[0-9]{0,4})?");
        (name, 2025..=2026i32, place, link).prop_map(|(name, year, place, link)| {
            let mut record = EventRecord::new(name, year);
            record.place = place.map(str::to_string);
            record.link = link;
            record
        })
    }

    fn arb_key() -> impl Strategy<Value = Vec<KeyField>> {
        prop::sample::select(vec![
            vec![KeyField::Name],
            vec![KeyField::Name, KeyField::Year],
            vec![KeyField::Name, KeyField::Year, KeyField::Place],
        ])
    }

    proptest! {
        #[test]
        fn prop_dedupe_never_grows_and_is_idempotent_in_count(
            rows in prop::collection::vec(arb_record(), 0..12),
            key in arb_key(),
        ) {
            let known = KnownMappings::new();
            let once = deduplicate(rows.clone(), &key, &known);
            prop_assert!(once.records.len() <= rows.len());

            let twice = deduplicate(once.records.clone(), &key, &known);
            prop_assert_eq!(twice.records.len(), once.records.len());
            prop_assert!(twice.collapsed.is_empty());
        }
    }
}
