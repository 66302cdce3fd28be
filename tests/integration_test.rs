use anyhow::Result;
use serde_json::{json, Value};
use tempfile::tempdir;

use conf_reconcile::app::ports::MappingRepository;
use conf_reconcile::app::ReconcileUseCase;
use conf_reconcile::config::ReconcileConfig;
use conf_reconcile::error::ReconcileError;
use conf_reconcile::infra::{
    InMemoryMappingRepository, JsonFileMappingRepository, RefusingDecisionPort, ScriptedDecisions,
};
use conf_reconcile::pipeline::processing::audit::{MatchType, MergeAction, MergeRecord};
use conf_reconcile::pipeline::processing::resolve::ResolutionReason;

fn row(name: &str, extra: Value) -> Value {
    let mut base = json!({
        "conference": name,
        "year": 2026,
        "start": "2026-05-01",
        "end": "2026-05-03",
    });
    if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    base
}

fn use_case() -> ReconcileUseCase {
    ReconcileUseCase::new(
        ReconcileConfig::default(),
        Box::new(InMemoryMappingRepository::default()),
    )
}

#[test]
fn scenario_a_identical_records_merge_exactly() -> Result<()> {
    let source = vec![row("PyCon Test", json!({"link": "https://pycon.test"}))];
    let candidates = vec![row("PyCon Test", json!({"link": "https://pycon.test/2026"}))];
    let mut port = ScriptedDecisions::new(Vec::new());

    let outcome = use_case().run(&source, &candidates, &mut port)?;

    assert_eq!(outcome.merged.len(), 1);
    assert_eq!(outcome.report.counters.exact_matches, 1);
    assert_eq!(outcome.report.records[0].score, 100);
    assert_eq!(port.calls(), 0);
    assert_eq!(outcome.merged[0].link.as_deref(), Some("https://pycon.test/2026"));
    assert!(outcome.report.errors.is_empty());
    Ok(())
}

#[test]
fn scenario_b_unrelated_records_are_both_kept() -> Result<()> {
    let source = vec![row("PyCon US", json!({}))];
    let candidates = vec![row("DjangoCon Europe", json!({}))];
    let mut port = ScriptedDecisions::new(Vec::new());

    let mut outcome = use_case().run(&source, &candidates, &mut port)?;

    assert_eq!(outcome.report.counters.no_matches, 1);
    assert_eq!(outcome.report.counters.unmatched, 1);
    assert_eq!(outcome.merged.len(), 2);
    assert_eq!(outcome.report.total_output, 2);
    assert_eq!(port.calls(), 0);
    assert!(outcome.report.validate_no_data_loss());

    let actions: Vec<MergeAction> = outcome.report.records.iter().map(|r| r.action).collect();
    assert_eq!(actions, vec![MergeAction::KeptSource, MergeAction::KeptCandidate]);
    Ok(())
}

#[test]
fn scenario_c_placeholder_cfp_takes_feed_deadline() -> Result<()> {
    let source = vec![row("PyCon Test", json!({"cfp": "TBA"}))];
    let candidates = vec![row("PyCon Test", json!({"cfp": "2026-02-15 23:59:00"}))];
    let mut port = ScriptedDecisions::new(Vec::new());

    let outcome = use_case().run(&source, &candidates, &mut port)?;

    assert_eq!(outcome.merged[0].cfp.as_deref(), Some("2026-02-15 23:59:00"));
    let conflict = &outcome.report.records[0].conflicts[0];
    assert_eq!(conflict.reason, ResolutionReason::SourcePlaceholder);
    assert_eq!(conflict.chosen.as_deref(), Some("2026-02-15 23:59:00"));
    Ok(())
}

#[test]
fn scenario_d_dropped_record_is_data_loss() -> Result<()> {
    let source = vec![
        row("PyCon Test", json!({})),
        row("PyCon Cancelled Edition", json!({})),
    ];
    let candidates = vec![row("PyCon Test", json!({}))];
    let mut port = ScriptedDecisions::new(Vec::new());

    let outcome = use_case().run(&source, &candidates, &mut port)?;
    let mut report = outcome.report;
    assert!(report.validate_no_data_loss());

    // A downstream step removes one output record and logs it
    report.add_record(MergeRecord {
        source_name: Some("PyCon Cancelled Edition".to_string()),
        candidate_name: None,
        score: 0,
        match_type: MatchType::NoMatch,
        action: MergeAction::Dropped,
        year: 2026,
        source: None,
        candidate: None,
        merged: None,
        conflicts: Vec::new(),
        reason: Some("event cancelled".to_string()),
    });
    report.total_output -= 1;

    assert!(!report.validate_no_data_loss());
    assert!(report.errors.iter().any(|e| e.contains("Data loss")));
    assert_eq!(report.dropped.len(), 1);
    assert!(report
        .summary(10)
        .contains("PyCon Cancelled Edition 2026: event cancelled"));
    Ok(())
}

#[test]
fn every_record_has_a_traceable_slot() -> Result<()> {
    let source = vec![
        row("PyCon PL", json!({"place": "Gliwice, PL"})),
        row("EuroPython", json!({"cfp": "2026-01-10"})),
        row("SciPy", json!({})),
    ];
    let candidates = vec![
        row("PyCon Poland 2026", json!({"place": "Gliwice, Poland"})),
        row("EuroPython Conference", json!({})),
        row("PyData Berlin", json!({})),
        row("PyData Berlin 2026", json!({"link": "https://pydata.org/berlin2026"})),
    ];
    let mut port = ScriptedDecisions::new(vec![true]);

    let outcome = use_case().run(&source, &candidates, &mut port)?;
    let report = &outcome.report;

    assert_eq!(report.inputs.candidate_raw, 4);
    assert_eq!(report.inputs.candidate, 3);
    assert_eq!(report.counters.exact_matches, 1);
    assert_eq!(report.counters.fuzzy_matches, 1);
    assert_eq!(report.counters.no_matches, 1);
    assert_eq!(report.counters.unmatched, 1);
    assert_eq!(outcome.merged.len(), 4);
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    let europython = outcome
        .merged
        .iter()
        .find(|r| r.conference == "EuroPython")
        .expect("EuroPython kept");
    assert_eq!(europython.cfp.as_deref(), Some("2026-01-10 23:59:00"));
    assert_eq!(europython.alt_name.as_deref(), Some("EuroPython Conference"));

    // Known deadlines sort ahead of the sentinel
    assert_eq!(outcome.merged[0].conference, "EuroPython");
    assert!(outcome.merged[1..].iter().all(|r| r.cfp.as_deref() == Some("TBA")));
    Ok(())
}

#[test]
fn decisions_persist_between_runs() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("known_mappings.json");
    let source = vec![row("EuroPython", json!({}))];
    let candidates = vec![row("EuroPython Conference", json!({}))];

    let first = ReconcileUseCase::new(
        ReconcileConfig::default(),
        Box::new(JsonFileMappingRepository::new(&path)),
    );
    let mut port = ScriptedDecisions::new(vec![true]);
    first.run(&source, &candidates, &mut port)?;
    assert_eq!(port.calls(), 1);

    let stored = JsonFileMappingRepository::new(&path).load()?;
    assert_eq!(stored.confirmed["EuroPython"], vec!["EuroPython Conference"]);

    // The confirmed variant now normalizes to the catalog name, so no question is asked
    let second = ReconcileUseCase::new(
        ReconcileConfig::default(),
        Box::new(JsonFileMappingRepository::new(&path)),
    );
    let outcome = second.run(&source, &candidates, &mut RefusingDecisionPort)?;
    assert_eq!(outcome.report.counters.exact_matches, 1);
    assert_eq!(outcome.merged.len(), 1);
    Ok(())
}

#[test]
fn rejected_pairs_are_not_asked_again() -> Result<()> {
    let repo = InMemoryMappingRepository::default();
    let mut known = repo.load()?;
    known.reject("EuroPython", "EuroPython Conference");
    let use_case = ReconcileUseCase::new(
        ReconcileConfig::default(),
        Box::new(InMemoryMappingRepository::new(known)),
    );

    let outcome = use_case.run(
        &[row("EuroPython", json!({}))],
        &[row("EuroPython Conference", json!({}))],
        &mut RefusingDecisionPort,
    )?;
    assert_eq!(outcome.report.counters.no_matches, 1);
    assert_eq!(outcome.merged.len(), 2);
    Ok(())
}

#[test]
fn malformed_input_aborts_before_matching() {
    let source = vec![json!({"conference": "PyCon Test", "year": 2026, "start": "2026-05-01"})];
    let mut port = ScriptedDecisions::new(Vec::new());

    let err = use_case().run(&source, &[], &mut port).unwrap_err();
    match err {
        ReconcileError::InputValidation { errors } => {
            assert_eq!(errors, vec!["source row 1: missing required column 'end'"]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(port.calls(), 0);
}

#[test]
fn excluded_pairs_from_config_stay_apart() -> Result<()> {
    let mut config = ReconcileConfig::default();
    config.matching.excluded_pairs = vec![[
        "PyCon Test".to_string(),
        "PyCon Test Conference".to_string(),
    ]];
    let use_case = ReconcileUseCase::new(config, Box::new(InMemoryMappingRepository::default()));

    let outcome = use_case.run(
        &[row("PyCon Test", json!({}))],
        &[row("PyCon Test Conference", json!({}))],
        &mut RefusingDecisionPort,
    )?;
    assert_eq!(outcome.report.counters.excluded, 1);
    assert_eq!(outcome.report.counters.unmatched, 1);
    assert_eq!(outcome.merged.len(), 2);
    Ok(())
}
