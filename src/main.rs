use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use conf_reconcile::app::ports::DecisionPort;
use conf_reconcile::app::ReconcileUseCase;
use conf_reconcile::config::ReconcileConfig;
use conf_reconcile::infra::{
    JsonFileMappingRepository, RefusingDecisionPort, ScriptedDecisions, StdinDecisionPort,
};
use conf_reconcile::logging;
use conf_reconcile::pipeline::processing::quality_gate::JsonSchemaValidator;

const MAPPINGS_ENV: &str = "CONF_RECONCILE_MAPPINGS";
const DEFAULT_MAPPINGS_PATH: &str = "data/known_mappings.json";

/// Reconcile a curated conference catalog against an external feed.
#[derive(Parser, Debug)]
#[command(name = "conf-reconcile", version, about = "Merge a conference feed into a curated catalog")]
struct Cli {
    /// Catalog rows (JSON array of objects)
    catalog: PathBuf,

    /// Feed rows (JSON array of objects)
    feed: PathBuf,

    /// TOML configuration file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Known-mappings JSON file (falls back to $CONF_RECONCILE_MAPPINGS)
    #[arg(long)]
    mappings: Option<PathBuf>,

    /// Where to write the merged records
    #[arg(long, default_value = "merged.json")]
    output: PathBuf,

    /// Where to write the merge report
    #[arg(long, default_value = "merge_report.json")]
    report: PathBuf,

    /// Never prompt; any open question fails the run
    #[arg(long, conflicts_with = "answers")]
    batch: bool,

    /// Pre-recorded y/n answers, one per line
    #[arg(long)]
    answers: Option<PathBuf>,

    /// Skip schema validation of the merged output
    #[arg(long)]
    no_schema: bool,
}

fn load_rows(path: &Path) -> Result<Vec<Value>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let json: Value = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;
    match json {
        Value::Array(rows) => Ok(rows),
        _ => bail!("{} must contain a JSON array of rows", path.display()),
    }
}

fn decision_port(cli: &Cli) -> Result<Box<dyn DecisionPort>> {
    if cli.batch {
        return Ok(Box::new(RefusingDecisionPort));
    }
    if let Some(path) = &cli.answers {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read answers {}", path.display()))?;
        return Ok(Box::new(ScriptedDecisions::parse(&content)?));
    }
    Ok(Box::new(StdinDecisionPort::stdin()))
}

fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    // Dropped at the end of main, after the last log line, so the file writer flushes
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ReconcileConfig::load(path)?,
        None => ReconcileConfig::default(),
    };
    let mappings_path = cli
        .mappings
        .clone()
        .or_else(|| std::env::var(MAPPINGS_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MAPPINGS_PATH));
    info!("Using name mappings at {}", mappings_path.display());

    let catalog = load_rows(&cli.catalog)?;
    let feed = load_rows(&cli.feed)?;

    let summary_messages = config.output.summary_messages;
    let mut use_case =
        ReconcileUseCase::new(config, Box::new(JsonFileMappingRepository::new(&mappings_path)));
    if !cli.no_schema {
        use_case = use_case.with_validator(Box::new(JsonSchemaValidator::bundled()?));
    }

    let mut port = decision_port(&cli)?;
    let outcome = use_case
        .run(&catalog, &feed, port.as_mut())
        .context("Reconciliation failed")?;

    fs::write(&cli.output, serde_json::to_string_pretty(&outcome.merged)?)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    fs::write(&cli.report, outcome.report.to_json()?)
        .with_context(|| format!("Failed to write {}", cli.report.display()))?;

    println!("{}", outcome.report.summary(summary_messages));
    println!(
        "Wrote {} records to {} and the report to {}",
        outcome.merged.len(),
        cli.output.display(),
        cli.report.display()
    );

    if !outcome.report.errors.is_empty() {
        warn!("Run finished with {} error(s)", outcome.report.errors.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_rows_reads_arrays_only() {
        let dir = tempdir().unwrap();
        let rows = dir.path().join("catalog.json");
        fs::write(&rows, r#"[{"conference": "PyCon Test", "year": 2026}]"#).unwrap();
        assert_eq!(load_rows(&rows).unwrap().len(), 1);

        let object = dir.path().join("feed.json");
        fs::write(&object, r#"{"conference": "PyCon Test"}"#).unwrap();
        let err = load_rows(&object).unwrap_err();
        assert!(err.to_string().contains("must contain a JSON array"));

        assert!(load_rows(Path::new("/nonexistent/feed.json")).is_err());
    }
}
