//! Health aggregation: the overall state machine and per-subsystem counters.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use raildiag::catalog::PatternCatalog;
use raildiag::classifier::Classifier;
use raildiag::health::HealthAggregator;
use raildiag::source::{SignalSource, StaticSource};
use raildiag::types::{HealthStatus, SignalRecord, Subsystem};

fn aggregator() -> HealthAggregator {
    let classifier = Arc::new(
        Classifier::new(Arc::new(PatternCatalog::builtin()), 64)
            .expect("builtin catalog is valid"),
    );
    HealthAggregator::new(classifier)
}

fn records(codes: &[&str]) -> Vec<SignalRecord> {
    codes.iter().map(|c| SignalRecord::from_code(*c)).collect()
}

fn timestamp() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid timestamp")
}

#[test]
fn empty_snapshot_is_unknown() {
    let report = aggregator().analyze_system_health(&[], timestamp());
    assert_eq!(report.overall_status, HealthStatus::Unknown);
    assert!(report.systems_status.is_empty());
    assert!(report.critical_faults.is_empty());
    assert!(report.recommendations.is_empty());
}

#[test]
fn healthy_snapshot_stays_healthy() {
    let report = aggregator().analyze_system_health(
        &records(&["B_DOOR_CLOSED", "B_TRAIN_READY", "W_SPEED_KPH"]),
        timestamp(),
    );
    assert_eq!(report.overall_status, HealthStatus::Healthy);
    assert!(report.critical_faults.is_empty());
}

#[test]
fn one_critical_signal_makes_the_report_critical() {
    let report = aggregator().analyze_system_health(
        &records(&["B_DOOR_CLOSED", "B_EMERGENCY_BRAKING", "W_SPEED_KPH"]),
        timestamp(),
    );
    assert_eq!(report.overall_status, HealthStatus::Critical);
    assert_eq!(report.critical_faults, vec!["B_EMERGENCY_BRAKING".to_owned()]);
    assert!(!report.recommendations.is_empty());
}

#[test]
fn high_signal_makes_the_report_warning() {
    let report = aggregator().analyze_system_health(
        &records(&["B_DOOR_CLOSED", "B_BCU_FAULT"]),
        timestamp(),
    );
    assert_eq!(report.overall_status, HealthStatus::Warning);
    assert!(report.critical_faults.is_empty());
}

#[test]
fn critical_is_terminal_within_a_pass() {
    // A HIGH signal after a CRITICAL one must not downgrade the status.
    let report = aggregator().analyze_system_health(
        &records(&["B_EMERGENCY_BRAKING", "B_BCU_FAULT"]),
        timestamp(),
    );
    assert_eq!(report.overall_status, HealthStatus::Critical);
}

#[test]
fn a_fresh_pass_starts_from_healthy() {
    let aggregator = aggregator();
    let critical = aggregator
        .analyze_system_health(&records(&["B_EMERGENCY_BRAKING"]), timestamp());
    assert_eq!(critical.overall_status, HealthStatus::Critical);

    let healthy = aggregator.analyze_system_health(&records(&["B_DOOR_CLOSED"]), timestamp());
    assert_eq!(healthy.overall_status, HealthStatus::Healthy);
}

#[test]
fn subsystem_counters_accumulate() {
    let report = aggregator().analyze_system_health(
        &records(&["B_BCU_FAULT", "B_EMERGENCY_BRAKING", "B_RADIO_FAULT"]),
        timestamp(),
    );

    let brakes = report
        .systems_status
        .get(&Subsystem::Brakes)
        .expect("brakes entry");
    assert_eq!(brakes.fault_count, 2);
    assert_eq!(brakes.critical_count, 1);
    assert_eq!(brakes.status, HealthStatus::Critical);

    let comms = report
        .systems_status
        .get(&Subsystem::Communication)
        .expect("comms entry");
    assert_eq!(comms.fault_count, 1);
    assert_eq!(comms.critical_count, 0);
    assert_eq!(comms.status, HealthStatus::Warning);
}

#[test]
fn subsystem_status_never_downgrades() {
    // Critical brake signal first, then a merely-HIGH brake signal.
    let report = aggregator().analyze_system_health(
        &records(&["B_EMERGENCY_BRAKING", "B_BCU_FAULT"]),
        timestamp(),
    );
    let brakes = report
        .systems_status
        .get(&Subsystem::Brakes)
        .expect("brakes entry");
    assert_eq!(brakes.status, HealthStatus::Critical);
}

#[test]
fn medium_and_low_signals_do_not_count_as_faults() {
    let report = aggregator().analyze_system_health(
        &records(&["F_R_PRESSURE_MPA", "B_DOOR_CLOSED"]),
        timestamp(),
    );
    assert_eq!(report.overall_status, HealthStatus::Healthy);
    assert!(report.systems_status.is_empty());
}

#[test]
fn works_against_a_signal_source() {
    let source = StaticSource::new(records(&["B_BCU_FAULT", "B_DOOR_CLOSED"]));
    let report = aggregator().analyze_system_health(&source.list_signals(), timestamp());
    assert_eq!(report.overall_status, HealthStatus::Warning);
}

#[test]
fn critical_recommendations_name_the_faults() {
    let report = aggregator().analyze_system_health(
        &records(&["B_EMERGENCY_BRAKING"]),
        timestamp(),
    );
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("B_EMERGENCY_BRAKING")));
}
