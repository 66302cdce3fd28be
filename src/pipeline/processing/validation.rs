use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::constants::{CANDIDATE_LABEL, REQUIRED_COLUMNS, SOURCE_LABEL};
use crate::domain::{EventRecord, Field};
use crate::error::{ReconcileError, Result};
use crate::pipeline::processing::audit::MergeReport;

/// Both input collections, checked and typed
#[derive(Debug, Clone)]
pub struct ValidatedInputs {
    pub source: Vec<EventRecord>,
    pub candidates: Vec<EventRecord>,
}

/// Check raw rows before any matching happens.
///
/// Every structural problem gets its own message (`source row 3: missing required column
/// 'end'`); if there are any, they are copied into the report's errors and the run is
/// aborted with [`ReconcileError::InputValidation`]. An empty catalog is an error, an
/// empty feed only a warning.
pub fn validate_inputs(
    source_rows: &[Value],
    candidate_rows: &[Value],
    report: &mut MergeReport,
) -> Result<ValidatedInputs> {
    let mut errors = Vec::new();

    if source_rows.is_empty() {
        errors.push(format!("{}: no rows to reconcile", SOURCE_LABEL));
    }
    if candidate_rows.is_empty() {
        report.add_warning(format!(
            "{}: no rows supplied, catalog passes through unchanged",
            CANDIDATE_LABEL
        ));
    }

    let source = convert_rows(SOURCE_LABEL, source_rows, &mut errors);
    let candidates = convert_rows(CANDIDATE_LABEL, candidate_rows, &mut errors);

    if !errors.is_empty() {
        for message in &errors {
            report.add_error(message.clone());
        }
        return Err(ReconcileError::InputValidation { errors });
    }

    info!(
        "Validated {} catalog rows and {} feed rows",
        source.len(),
        candidates.len()
    );
    Ok(ValidatedInputs { source, candidates })
}

fn convert_rows(label: &str, rows: &[Value], errors: &mut Vec<String>) -> Vec<EventRecord> {
    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let location = format!("{} row {}", label, i + 1);
        match check_row(&location, row) {
            Ok(object) => match serde_json::from_value::<EventRecord>(Value::Object(object)) {
                Ok(record) => records.push(record),
                Err(e) => errors.push(format!("{}: {}", location, e)),
            },
            Err(problems) => errors.extend(problems),
        }
    }
    debug!("{}: {} of {} rows usable", label, records.len(), rows.len());
    records
}

// Returns the row with `year` coerced to a number, or every problem found in it
fn check_row(location: &str, row: &Value) -> std::result::Result<Map<String, Value>, Vec<String>> {
    let Some(object) = row.as_object() else {
        return Err(vec![format!("{}: expected an object", location)]);
    };

    let mut problems: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !object.contains_key(**column))
        .map(|column| format!("{}: missing required column '{}'", location, column))
        .collect();

    if let Some(name) = object.get("conference") {
        if !name.as_str().is_some_and(|s| !s.trim().is_empty()) {
            problems.push(format!("{}: 'conference' must be a non-empty string", location));
        }
    }

    let year = object.get("year").map(|value| match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    });
    let year = match year {
        Some(Some(y)) if i32::try_from(y).is_ok() => Some(y),
        Some(_) => {
            problems.push(format!("{}: 'year' must be an integer", location));
            None
        }
        None => None,
    };

    for field in Field::ALL {
        if let Some(value) = object.get(field.as_str()) {
            if !(value.is_string() || value.is_null()) {
                problems.push(format!(
                    "{}: column '{}' must be a string or null",
                    location, field
                ));
            }
        }
    }

    if !problems.is_empty() {
        return Err(problems);
    }

    let mut object = object.clone();
    if let Some(y) = year {
        object.insert("year".to_string(), Value::from(y));
    }
    Ok(object)
}
