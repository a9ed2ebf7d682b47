//! Causal analyzer behavior: cause/effect search, chain assembly, scoring.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use raildiag::catalog::PatternCatalog;
use raildiag::causal::CausalAnalyzer;
use raildiag::classifier::Classifier;
use raildiag::types::SignalRecord;

fn analyzer() -> CausalAnalyzer {
    let classifier = Arc::new(
        Classifier::new(Arc::new(PatternCatalog::builtin()), 64)
            .expect("builtin catalog is valid"),
    );
    CausalAnalyzer::new(classifier, 64)
}

fn snapshot(codes: &[&str]) -> BTreeSet<String> {
    codes.iter().map(|c| (*c).to_owned()).collect()
}

fn timestamp() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid timestamp")
}

// ---------- root causes and effects ----------

#[test]
fn root_causes_come_from_table_and_seeds() {
    let analyzer = analyzer();
    let classifier =
        Classifier::new(Arc::new(PatternCatalog::builtin()), 16).expect("valid catalog");
    let all = snapshot(&["B_EMERGENCY_BRAKING", "F_R_PRESSURE_MPA", "B_BCU_FAULT"]);

    let classification = classifier.classify("B_EMERGENCY_BRAKING", "");
    let causes = analyzer.find_root_causes("B_EMERGENCY_BRAKING", &classification, &all);

    assert!(causes.contains(&"F_R_PRESSURE_MPA".to_owned()));
    assert!(!causes.contains(&"B_EMERGENCY_BRAKING".to_owned()), "never its own cause");
}

#[test]
fn effects_are_symmetric_to_causes() {
    let analyzer = analyzer();
    let classifier =
        Classifier::new(Arc::new(PatternCatalog::builtin()), 16).expect("valid catalog");
    let all = snapshot(&["F_R_PRESSURE_MPA", "B_BCU_FAULT", "B_EMERGENCY_BRAKING"]);

    let classification = classifier.classify("F_R_PRESSURE_MPA", "");
    let effects = analyzer.find_potential_effects("F_R_PRESSURE_MPA", &classification, &all);

    assert!(effects.contains(&"B_BCU_FAULT".to_owned()));
    assert!(effects.contains(&"B_EMERGENCY_BRAKING".to_owned()));
}

#[test]
fn absent_seeds_are_filtered_out() {
    let analyzer = analyzer();
    let classifier =
        Classifier::new(Arc::new(PatternCatalog::builtin()), 16).expect("valid catalog");
    // Snapshot without any seed signals present.
    let all = snapshot(&["B_BCU_FAULT"]);

    let classification = classifier.classify("B_BCU_FAULT", "");
    let causes = analyzer.find_root_causes("B_BCU_FAULT", &classification, &all);

    // Table entry still contributes its declared root cause, but no seed
    // that is absent from the snapshot sneaks in.
    assert!(!causes.contains(&"B_COMPRESSOR_FAULT".to_owned()));
}

#[test]
fn component_state_heuristic_requires_presence() {
    let analyzer = analyzer();
    let classifier =
        Classifier::new(Arc::new(PatternCatalog::builtin()), 16).expect("valid catalog");
    let all = snapshot(&["B_BCU_FAULT", "B_BCU_POWER_OK", "F_BCU_VOLTAGE"]);

    let classification = classifier.classify("B_BCU_FAULT", "");
    let causes = analyzer.find_root_causes("B_BCU_FAULT", &classification, &all);

    assert!(causes.contains(&"B_BCU_POWER_OK".to_owned()));
    assert!(causes.contains(&"F_BCU_VOLTAGE".to_owned()));
}

// ---------- chain assembly ----------

#[test]
fn full_brake_chain_has_full_coverage() {
    let analyzer = analyzer();
    let all = snapshot(&["F_R_PRESSURE_MPA", "B_BCU_FAULT", "B_EMERGENCY_BRAKING"]);

    let chains = analyzer.build_causal_chains("F_R_PRESSURE_MPA", &all, timestamp());

    assert_eq!(chains.len(), 1);
    let chain = &chains[0];
    assert_eq!(chain.chain_id, "brake_pressure_loss");
    assert!((chain.confidence - 1.0).abs() < f64::EPSILON);
    assert!(chain
        .affected_systems
        .contains(&raildiag::types::Subsystem::Brakes));
}

#[test]
fn partial_chain_has_proportional_confidence() {
    let analyzer = analyzer();
    let all = snapshot(&["F_R_PRESSURE_MPA", "B_BCU_FAULT"]);

    let chains = analyzer.build_causal_chains("F_R_PRESSURE_MPA", &all, timestamp());

    assert_eq!(chains.len(), 1);
    assert!((chains[0].confidence - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn single_present_signal_emits_no_chain() {
    let analyzer = analyzer();
    let all = snapshot(&["F_R_PRESSURE_MPA"]);

    let chains = analyzer.build_causal_chains("F_R_PRESSURE_MPA", &all, timestamp());
    assert!(chains.is_empty());
}

#[test]
fn chain_confidence_is_bounded() {
    let analyzer = analyzer();
    let all = snapshot(&[
        "F_R_PRESSURE_MPA",
        "B_BCU_FAULT",
        "B_EMERGENCY_BRAKING",
        "B_PANTOGRAPH_DOWN",
        "F_HV_VOLTAGE",
        "B_CONVERTER_FAULT",
    ]);
    for code in &all {
        for chain in analyzer.build_causal_chains(code, &all, timestamp()) {
            assert!((0.0..=1.0).contains(&chain.confidence), "{}", chain.chain_id);
        }
    }
}

// ---------- severity assessment ----------

#[test]
fn severity_escalates_one_step_on_critical_chain() {
    let analyzer = analyzer();
    let classifier =
        Classifier::new(Arc::new(PatternCatalog::builtin()), 16).expect("valid catalog");
    let all = snapshot(&["F_R_PRESSURE_MPA", "B_BCU_FAULT", "B_EMERGENCY_BRAKING"]);

    // F_R_PRESSURE_MPA classifies as medium; the brake chain is critical.
    let classification = classifier.classify("F_R_PRESSURE_MPA", "");
    let chains = analyzer.build_causal_chains("F_R_PRESSURE_MPA", &all, timestamp());
    assert_eq!(analyzer.assess_severity(&classification, &chains), "high");
}

#[test]
fn severity_never_deescalates() {
    let analyzer = analyzer();
    let classifier =
        Classifier::new(Arc::new(PatternCatalog::builtin()), 16).expect("valid catalog");

    // Critical signal with no chains stays critical.
    let classification = classifier.classify("B_EMERGENCY_BRAKING", "");
    assert_eq!(analyzer.assess_severity(&classification, &[]), "critical");

    // High signal escalated by a critical chain becomes critical.
    let all = snapshot(&["F_R_PRESSURE_MPA", "B_BCU_FAULT", "B_EMERGENCY_BRAKING"]);
    let chains = analyzer.build_causal_chains("B_BCU_FAULT", &all, timestamp());
    let high = classifier.classify("B_BCU_FAULT", "");
    assert_eq!(analyzer.assess_severity(&high, &chains), "critical");
}

// ---------- confidence ----------

#[test]
fn confidence_is_reproducible_and_bounded() {
    let analyzer = analyzer();
    let causes = vec!["A".to_owned(), "B".to_owned()];
    let effects = vec!["C".to_owned()];

    let confidence = analyzer.calculate_confidence(&causes, &effects, &[]);
    // 0.2 base + 0.2 causes + 0.1 effects.
    assert!((confidence - 0.5).abs() < 1e-9);
}

#[test]
fn confidence_contributions_are_capped() {
    let analyzer = analyzer();
    let many: Vec<String> = (0..20).map(|i| format!("S{i}")).collect();

    let confidence = analyzer.calculate_confidence(&many, &many, &[]);
    // 0.2 + 0.4 cap + 0.3 cap.
    assert!((confidence - 0.9).abs() < 1e-9);
    assert!((0.0..=1.0).contains(&confidence));
}

#[test]
fn confidence_includes_mean_chain_coverage() {
    let analyzer = analyzer();
    let all = snapshot(&["F_R_PRESSURE_MPA", "B_BCU_FAULT", "B_EMERGENCY_BRAKING"]);
    let chains = analyzer.build_causal_chains("F_R_PRESSURE_MPA", &all, timestamp());

    let confidence = analyzer.calculate_confidence(&[], &[], &chains);
    // 0.2 base + 0.3 × 1.0 coverage.
    assert!((confidence - 0.5).abs() < 1e-9);
}

// ---------- recommendations and related faults ----------

#[test]
fn recommendations_are_capped_and_ordered() {
    let analyzer = analyzer();
    let classifier =
        Classifier::new(Arc::new(PatternCatalog::builtin()), 16).expect("valid catalog");
    let classification = classifier.classify("B_EMERGENCY_BRAKING", "");
    let causes = vec![
        "F_R_PRESSURE_MPA".to_owned(),
        "B_COMPRESSOR_FAULT".to_owned(),
        "F_BP_PRESSURE_MPA".to_owned(),
        "B_EXTRA_ONE".to_owned(),
    ];

    let recommendations = analyzer.generate_recommendations(
        "B_EMERGENCY_BRAKING",
        &classification,
        &causes,
        &[],
    );

    assert!(recommendations.len() <= 5);
    assert!(recommendations[0].contains("Stop the train"));
    // At most 3 causes named in the final line.
    let causes_line = recommendations
        .iter()
        .find(|r| r.starts_with("Check possible root causes"));
    if let Some(line) = causes_line {
        assert!(!line.contains("B_EXTRA_ONE"));
    }
}

#[test]
fn related_faults_share_component_and_are_severe() {
    let analyzer = analyzer();
    let all = snapshot(&[
        "B_BCU_FAULT",
        "B_BCU_FAULT_3",
        "F_R_PRESSURE_MPA",
        "B_DOOR_CLOSED",
    ]);

    let related = analyzer.find_related_faults("B_BCU_FAULT", &all);

    assert!(related.contains(&"B_BCU_FAULT_3".to_owned()));
    assert!(!related.contains(&"B_BCU_FAULT".to_owned()), "excludes itself");
    assert!(!related.contains(&"F_R_PRESSURE_MPA".to_owned()), "different component");
    assert!(related.len() <= 5);
}

// ---------- batch pipeline ----------

#[test]
fn empty_fault_list_yields_empty_results() {
    let analyzer = analyzer();
    let all = snapshot(&["B_BCU_FAULT"]);
    let results = analyzer.analyze_fault_signals(&[], &all, timestamp());
    assert!(results.is_empty());
}

#[test]
fn bad_signal_degrades_without_aborting_batch() {
    let analyzer = analyzer();
    let all = snapshot(&["B_BCU_FAULT", "F_R_PRESSURE_MPA", "B_EMERGENCY_BRAKING"]);
    let faults = vec![
        SignalRecord::from_code("B_BCU_FAULT"),
        SignalRecord::from_code(""),
        SignalRecord::from_code("B_EMERGENCY_BRAKING"),
    ];

    let results = analyzer.analyze_fault_signals(&faults, &all, timestamp());

    assert_eq!(results.len(), 3);
    let fallback = &results[1];
    assert_eq!(fallback.severity_assessment, "medium");
    assert!((fallback.confidence_score - 0.3).abs() < 1e-9);
    assert!(fallback.possible_root_causes.is_empty());
    assert_eq!(fallback.recommendations.len(), 1);
}

#[test]
fn diagnostic_results_are_cached_per_snapshot() {
    let analyzer = analyzer();
    let all = snapshot(&["B_BCU_FAULT", "F_R_PRESSURE_MPA"]);
    let fault = SignalRecord::from_code("B_BCU_FAULT");

    let first = analyzer.diagnose(&fault, &all, timestamp());
    let second = analyzer.diagnose(&fault, &all, timestamp());
    assert_eq!(first, second);
    assert_eq!(analyzer.cache_stats().hits, 1);

    // A different snapshot is a different cache key.
    let other = snapshot(&["B_BCU_FAULT"]);
    analyzer.diagnose(&fault, &other, timestamp());
    assert_eq!(analyzer.cache_stats().entries, 2);
}

#[test]
fn cache_hit_keeps_the_original_analysis_time() {
    let analyzer = analyzer();
    let all = snapshot(&["B_BCU_FAULT", "F_R_PRESSURE_MPA"]);
    let fault = SignalRecord::from_code("B_BCU_FAULT");

    let first = analyzer.diagnose(&fault, &all, timestamp());
    let later = timestamp() + chrono::Duration::hours(1);
    let second = analyzer.diagnose(&fault, &all, later);
    assert_eq!(second.analyzed_at, first.analyzed_at);
}

#[test]
fn clearing_result_cache_is_idempotent() {
    let analyzer = analyzer();
    let all = snapshot(&["F_R_PRESSURE_MPA", "B_BCU_FAULT", "B_EMERGENCY_BRAKING"]);
    let fault = SignalRecord::from_code("F_R_PRESSURE_MPA");

    let before = analyzer.diagnose(&fault, &all, timestamp());
    analyzer.clear_cache();
    let after = analyzer.diagnose(&fault, &all, timestamp());
    assert_eq!(before, after);
}

#[test]
fn diagnostic_confidence_is_bounded() {
    let analyzer = analyzer();
    let all = snapshot(&[
        "F_R_PRESSURE_MPA",
        "B_BCU_FAULT",
        "B_EMERGENCY_BRAKING",
        "B_PANTOGRAPH_DOWN",
        "F_HV_VOLTAGE",
        "B_CONVERTER_FAULT",
        "B_BATTERY_DISCHARGE",
        "B_HVAC_OFF",
    ]);
    let faults: Vec<SignalRecord> = all
        .iter()
        .map(|code| SignalRecord::from_code(code.as_str()))
        .collect();

    for result in analyzer.analyze_fault_signals(&faults, &all, timestamp()) {
        assert!(
            (0.0..=1.0).contains(&result.confidence_score),
            "{}: {}",
            result.signal_code,
            result.confidence_score
        );
    }
}
