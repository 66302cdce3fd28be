use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::constants::{
    CFP_SENTINEL, DEFAULT_CFP_TIME, EXACT_MATCH_SCORE, FUZZY_MATCH_THRESHOLD, PLACEHOLDER_VALUES,
};
use crate::error::{ReconcileError, Result};
use crate::pipeline::processing::dedupe::KeyField;

/// Tunables for a reconciliation run, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub matching: MatchingConfig,
    pub resolution: ResolutionConfig,
    pub dedupe: DedupeConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Score at or above which a pair is accepted automatically
    pub exact_score: u8,
    /// Score at or above which a pair is offered for confirmation
    pub fuzzy_threshold: u8,
    /// Unordered name pairs that must never be proposed as matches
    pub excluded_pairs: Vec<[String; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Case-insensitive tokens treated as "no value"
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeConfig {
    pub key_fields: Vec<KeyField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub cfp_sentinel: String,
    pub default_cfp_time: String,
    /// Sort merged output by deadline, start date and name
    pub sort: bool,
    /// Warnings/errors rendered by the summary
    pub summary_messages: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            exact_score: EXACT_MATCH_SCORE,
            fuzzy_threshold: FUZZY_MATCH_THRESHOLD,
            excluded_pairs: Vec::new(),
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            placeholders: PLACEHOLDER_VALUES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for DedupeConfig {
    fn default() -> Self {
        // Same conference in different years must stay separate rows within one source
        Self {
            key_fields: vec![KeyField::Name, KeyField::Year],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cfp_sentinel: CFP_SENTINEL.to_string(),
            default_cfp_time: DEFAULT_CFP_TIME.to_string(),
            sort: true,
            summary_messages: crate::constants::DEFAULT_SUMMARY_MESSAGES,
        }
    }
}

impl ReconcileConfig {
    /// Load configuration from a TOML file; missing sections fall back to defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: ReconcileConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let m = &self.matching;
        if m.exact_score > 100 || m.fuzzy_threshold > m.exact_score {
            return Err(ReconcileError::Config(format!(
                "thresholds must satisfy fuzzy_threshold <= exact_score <= 100 (got {} / {})",
                m.fuzzy_threshold, m.exact_score
            )));
        }
        if self.dedupe.key_fields.is_empty() {
            return Err(ReconcileError::Config(
                "dedupe.key_fields must name at least one field".to_string(),
            ));
        }
        Ok(())
    }
}
