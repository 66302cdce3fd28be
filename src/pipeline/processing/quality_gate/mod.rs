use chrono::NaiveDate;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::EventRecord;
use crate::error::{ReconcileError, Result};

/// Schema the merged output is checked against
pub const CONFERENCE_SCHEMA: &str = include_str!("../../../../schemas/conference.v1.json");

/// Individual quality issue found in a merged record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    /// The type of quality issue
    pub issue_type: QualityIssueType,
    /// Severity level of the issue
    pub severity: QualitySeverity,
    /// Human-readable description of the issue
    pub description: String,
    /// Field that triggered this issue, as a JSON pointer where available
    pub field: Option<String>,
}

/// Types of quality issues that can be detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityIssueType {
    /// Value does not match the record schema
    SchemaViolation,
    /// Date/time inconsistencies
    TemporalInconsistency,
}

/// Severity levels for quality issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualitySeverity {
    /// Minor issue, record can proceed
    Info,
    /// Notable issue worth flagging
    Warning,
    /// Significant issue requiring attention
    Error,
}

impl std::fmt::Display for QualitySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            QualitySeverity::Info => "info",
            QualitySeverity::Warning => "warning",
            QualitySeverity::Error => "error",
        };
        f.write_str(label)
    }
}

impl QualityIssue {
    /// One-line rendering used for report warnings
    pub fn render(&self, record: &EventRecord) -> String {
        match &self.field {
            Some(field) if !field.is_empty() => format!(
                "[{}] {}: {} ({})",
                self.severity,
                record.identity(),
                self.description,
                field
            ),
            _ => format!("[{}] {}: {}", self.severity, record.identity(), self.description),
        }
    }
}

/// Record-level checks run over merged output. Findings never change the output.
pub trait RecordValidator {
    fn validate(&self, record: &EventRecord) -> Vec<QualityIssue>;
}

/// Validates records against the conference JSON schema, plus a date-order check the
/// schema cannot express.
pub struct JsonSchemaValidator {
    compiled: JSONSchema,
}

impl JsonSchemaValidator {
    /// Validator for the bundled conference schema
    pub fn bundled() -> Result<Self> {
        Self::from_schema_str(CONFERENCE_SCHEMA)
    }

    pub fn from_schema_str(schema: &str) -> Result<Self> {
        let schema_json: Value = serde_json::from_str(schema)?;
        // jsonschema 0.17 expects a schema with 'static lifetime; the validator lives for the run
        let schema_static: &'static Value = Box::leak(Box::new(schema_json));
        let compiled = JSONSchema::options()
            .compile(schema_static)
            .map_err(|e| ReconcileError::Config(format!("Failed to compile JSON Schema: {}", e)))?;
        Ok(Self { compiled })
    }

    fn check_schema(&self, instance: &Value) -> Vec<QualityIssue> {
        match self.compiled.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| QualityIssue {
                    issue_type: QualityIssueType::SchemaViolation,
                    severity: QualitySeverity::Error,
                    description: error.to_string(),
                    field: Some(error.instance_path.to_string()),
                })
                .collect(),
        }
    }

    fn check_dates(&self, record: &EventRecord) -> Vec<QualityIssue> {
        let mut issues = Vec::new();
        let start = parse_date(record.start.as_deref());
        let end = parse_date(record.end.as_deref());

        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                issues.push(QualityIssue {
                    issue_type: QualityIssueType::TemporalInconsistency,
                    severity: QualitySeverity::Warning,
                    description: format!("ends ({}) before it starts ({})", end, start),
                    field: Some("/end".to_string()),
                });
            }
        }

        if let (Some(start), Some(cfp)) = (start, parse_date(record.cfp.as_deref())) {
            if cfp > start {
                issues.push(QualityIssue {
                    issue_type: QualityIssueType::TemporalInconsistency,
                    severity: QualitySeverity::Info,
                    description: format!("CFP closes ({}) after the event starts ({})", cfp, start),
                    field: Some("/cfp".to_string()),
                });
            }
        }
        issues
    }
}

impl RecordValidator for JsonSchemaValidator {
    fn validate(&self, record: &EventRecord) -> Vec<QualityIssue> {
        let mut issues = match serde_json::to_value(record) {
            Ok(instance) => self.check_schema(&instance),
            Err(e) => vec![QualityIssue {
                issue_type: QualityIssueType::SchemaViolation,
                severity: QualitySeverity::Error,
                description: format!("record could not be serialized: {}", e),
                field: None,
            }],
        };
        issues.extend(self.check_dates(record));
        issues
    }
}

// Accepts "YYYY-MM-DD" optionally followed by a time
fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    let date = value.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_record() -> EventRecord {
        let mut record = EventRecord::new("PyCon Test", 2026);
        record.start = Some("2026-05-01".to_string());
        record.end = Some("2026-05-03".to_string());
        record.cfp = Some("2026-02-15 23:59:00".to_string());
        record.link = Some("https://pycon.test".to_string());
        record.sub = Some("PY,DATA".to_string());
        record
    }

    #[test]
    fn test_valid_record_has_no_issues() {
        let validator = JsonSchemaValidator::bundled().unwrap();
        assert!(validator.validate(&valid_record()).is_empty());
    }

    #[test]
    fn test_schema_violations_are_errors() {
        let validator = JsonSchemaValidator::bundled().unwrap();
        let mut record = valid_record();
        record.link = Some("pycon.test".to_string());
        record.cfp = None;

        let issues = validator.validate(&record);
        assert_eq!(issues.len(), 2, "{:?}", issues);
        assert!(issues.iter().all(|i| i.severity == QualitySeverity::Error));
        assert!(issues.iter().any(|i| i.field.as_deref() == Some("/link")));
    }

    #[test]
    fn test_date_order_warnings() {
        let validator = JsonSchemaValidator::bundled().unwrap();
        let mut record = valid_record();
        record.end = Some("2026-04-30".to_string());
        record.cfp = Some("2026-06-01 23:59:00".to_string());

        let issues = validator.validate(&record);
        let temporal: Vec<_> = issues
            .iter()
            .filter(|i| i.issue_type == QualityIssueType::TemporalInconsistency)
            .collect();
        assert_eq!(temporal.len(), 2);
        assert!(temporal[0].render(&record).starts_with("[warning] PyCon Test 2026: ends"));
    }

    #[test]
    fn test_broken_schema_is_config_error() {
        let err = JsonSchemaValidator::from_schema_str(r#"{"type": 12}"#).err().unwrap();
        assert!(matches!(err, ReconcileError::Config(_)));
    }
}
