//! Snapshot-wide health aggregation.
//!
//! [`HealthAggregator`] folds per-signal classifications over an entire
//! telemetry snapshot into a [`HealthReport`]. The overall status follows a
//! one-way state machine per pass: healthy → warning (first HIGH signal) →
//! critical (any CRITICAL signal, terminal). Subsystem statuses escalate
//! the same way and are never downgraded within a pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::classifier::Classifier;
use crate::types::{
    Criticality, HealthReport, HealthStatus, SignalRecord, Subsystem, SystemHealth,
};

/// Maximum critical fault codes named in the report recommendations.
const MAX_NAMED_FAULTS: usize = 3;

/// Folds classifications into a system-wide health verdict.
pub struct HealthAggregator {
    classifier: Arc<Classifier>,
}

impl HealthAggregator {
    /// Build an aggregator over `classifier`.
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self { classifier }
    }

    /// Single-pass health fold over a snapshot at `timestamp`.
    ///
    /// An empty snapshot yields `unknown`; a fresh pass otherwise always
    /// starts from `healthy`.
    pub fn analyze_system_health(
        &self,
        records: &[SignalRecord],
        timestamp: DateTime<Utc>,
    ) -> HealthReport {
        if records.is_empty() {
            return HealthReport {
                overall_status: HealthStatus::Unknown,
                systems_status: BTreeMap::new(),
                critical_faults: Vec::new(),
                recommendations: Vec::new(),
                generated_at: timestamp,
            };
        }

        let mut overall = HealthStatus::Healthy;
        let mut systems_status: BTreeMap<Subsystem, SystemHealth> = BTreeMap::new();
        let mut critical_faults = Vec::new();

        for record in records {
            let classification = self.classifier.classify_record(record);

            match classification.criticality {
                Criticality::Critical => {
                    overall = HealthStatus::Critical;
                    critical_faults.push(record.signal_code.clone());
                }
                Criticality::High => {
                    if overall == HealthStatus::Healthy {
                        overall = HealthStatus::Warning;
                    }
                }
                Criticality::Medium | Criticality::Low => continue,
            }

            let system = systems_status.entry(classification.system).or_default();
            system.fault_count = system.fault_count.saturating_add(1);
            match classification.criticality {
                Criticality::Critical => {
                    system.critical_count = system.critical_count.saturating_add(1);
                    system.status = HealthStatus::Critical;
                }
                _ => {
                    if system.status == HealthStatus::Healthy {
                        system.status = HealthStatus::Warning;
                    }
                }
            }
        }

        debug!(
            signals = records.len(),
            status = %overall,
            critical = critical_faults.len(),
            "health pass complete"
        );

        let recommendations = recommendations_for(overall, &critical_faults);

        HealthReport {
            overall_status: overall,
            systems_status,
            critical_faults,
            recommendations,
            generated_at: timestamp,
        }
    }
}

/// Report-level recommendations derived from the final overall status.
fn recommendations_for(status: HealthStatus, critical_faults: &[String]) -> Vec<String> {
    match status {
        HealthStatus::Critical => {
            let named: Vec<&str> = critical_faults
                .iter()
                .take(MAX_NAMED_FAULTS)
                .map(String::as_str)
                .collect();
            vec![
                "Immediate maintenance intervention required before continued service".to_owned(),
                format!("Critical faults: {}", named.join(", ")),
            ]
        }
        HealthStatus::Warning => {
            vec!["Schedule a depot inspection for the degraded subsystems".to_owned()]
        }
        HealthStatus::Healthy | HealthStatus::Unknown => Vec::new(),
    }
}
