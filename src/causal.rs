//! Causal-chain inference over the static relationship table.
//!
//! [`CausalAnalyzer`] reasons about which faults are plausible root causes
//! or downstream effects of an observed fault: table lookups against the
//! catalog's declared relationships, hand-authored per-subsystem seeds, and
//! a component-scoped heuristic, all filtered to signals actually present
//! in the current snapshot. Scoring is a fixed, reproducible recipe: a
//! coverage ratio and an additive confidence heuristic, not a calibrated
//! probability.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::BoundedCache;
use crate::catalog::PatternCatalog;
use crate::classifier::Classifier;
use crate::types::{
    CacheStats, CausalChain, Criticality, DiagnosticResult, SignalClassification, SignalRecord,
};

/// Minimum number of declared signals that must be present in the snapshot
/// before a chain is emitted.
const MIN_CHAIN_COVERAGE: usize = 2;

/// Maximum recommendations per diagnostic result.
const MAX_RECOMMENDATIONS: usize = 5;

/// Maximum related faults per diagnostic result.
const MAX_RELATED_FAULTS: usize = 5;

/// Maximum root causes named inline in a recommendation line.
const MAX_NAMED_CAUSES: usize = 3;

/// Confidence assigned to the fallback result when a single fault cannot
/// be analyzed.
const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Component-state suffixes probed by the root-cause heuristic.
const STATE_SUFFIXES: [&str; 4] = ["POWER_OK", "READY", "CONNECTED", "FAULT"];

/// Result-cache key: signal code plus a fingerprint of the snapshot the
/// result was computed against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DiagKey {
    code: String,
    snapshot: u64,
}

/// The causal diagnostic analyzer. Shares the classifier (and through it
/// the catalog); owns its own bounded result cache.
pub struct CausalAnalyzer {
    catalog: Arc<PatternCatalog>,
    classifier: Arc<Classifier>,
    cache: BoundedCache<DiagKey, DiagnosticResult>,
}

impl CausalAnalyzer {
    /// Build an analyzer over the same catalog as `classifier`, with a
    /// result cache of `cache_capacity` entries.
    pub fn new(classifier: Arc<Classifier>, cache_capacity: usize) -> Self {
        Self {
            catalog: Arc::clone(classifier.catalog()),
            classifier,
            cache: BoundedCache::new(cache_capacity),
        }
    }

    // ── Root-cause / effect search ──────────────────────────────

    /// Candidate root causes for `code`: declared table entries where it
    /// appears as an effect, subsystem seeds present in the snapshot, and
    /// present component-state signals. The signal never causes itself.
    pub fn find_root_causes(
        &self,
        code: &str,
        classification: &SignalClassification,
        all_signals: &BTreeSet<String>,
    ) -> Vec<String> {
        let mut causes: BTreeSet<String> = BTreeSet::new();

        for entry in self.catalog.entries_with_effect(code) {
            causes.extend(entry.root_causes.iter().cloned());
        }

        if let Some(entry) = self.catalog.subsystem_entry(classification.system) {
            causes.extend(
                entry
                    .root_cause_seeds
                    .iter()
                    .filter(|seed| all_signals.contains(*seed))
                    .cloned(),
            );
        }

        causes.extend(self.component_state_signals(&classification.component, all_signals));

        causes.remove(code);
        causes.into_iter().collect()
    }

    /// Candidate downstream effects for `code`, symmetric to
    /// [`CausalAnalyzer::find_root_causes`].
    pub fn find_potential_effects(
        &self,
        code: &str,
        classification: &SignalClassification,
        all_signals: &BTreeSet<String>,
    ) -> Vec<String> {
        let mut effects: BTreeSet<String> = BTreeSet::new();

        for entry in self.catalog.entries_with_root_cause(code) {
            effects.extend(entry.effects.iter().cloned());
        }

        if let Some(entry) = self.catalog.subsystem_entry(classification.system) {
            effects.extend(
                entry
                    .effect_seeds
                    .iter()
                    .filter(|seed| all_signals.contains(*seed))
                    .cloned(),
            );
        }

        effects.remove(code);
        effects.into_iter().collect()
    }

    /// Component-scoped state codes present in the snapshot, e.g.
    /// `B_BCU_POWER_OK` or `F_BCU_VOLTAGE` for component `BCU`.
    fn component_state_signals(
        &self,
        component: &str,
        all_signals: &BTreeSet<String>,
    ) -> Vec<String> {
        if component.is_empty() || component == "UNKNOWN" {
            return Vec::new();
        }

        let mut found: Vec<String> = STATE_SUFFIXES
            .iter()
            .map(|suffix| format!("B_{component}_{suffix}"))
            .filter(|candidate| all_signals.contains(candidate))
            .collect();

        let voltage = format!("F_{component}_VOLTAGE");
        if all_signals.contains(&voltage) {
            found.push(voltage);
        }

        found
    }

    // ── Chain assembly ──────────────────────────────────────────

    /// Assemble causal chains for `code` against the declared relationship
    /// table. A chain is only emitted when at least two of its declared
    /// signals are present; confidence is the coverage ratio
    /// present/declared.
    pub fn build_causal_chains(
        &self,
        code: &str,
        all_signals: &BTreeSet<String>,
        timestamp: DateTime<Utc>,
    ) -> Vec<CausalChain> {
        let mut chains = Vec::new();

        for entry in self.catalog.entries_involving(code) {
            let present: Vec<&String> = entry
                .declared_signals()
                .filter(|signal| all_signals.contains(*signal))
                .collect();

            let declared = entry.declared_count();
            if present.len() < MIN_CHAIN_COVERAGE || declared == 0 {
                continue;
            }

            #[allow(clippy::cast_precision_loss)]
            let confidence = (present.len() as f64 / declared as f64).clamp(0.0, 1.0);

            let affected_systems = present
                .iter()
                .map(|signal| self.classifier.classify(signal, "").system)
                .collect();

            debug!(
                chain = %entry.id,
                present = present.len(),
                declared,
                "causal chain assembled"
            );

            chains.push(CausalChain {
                chain_id: entry.id.clone(),
                root_cause_signals: entry.root_causes.clone(),
                effect_signals: entry.effects.clone(),
                description: entry.description.clone(),
                severity: entry.severity,
                confidence,
                affected_systems,
                detected_at: timestamp,
            });
        }

        chains
    }

    // ── Scoring ─────────────────────────────────────────────────

    /// Severity assessment: the signal's own criticality, escalated one
    /// step when any chain carries a critical/high severity tag. Never
    /// de-escalates.
    pub fn assess_severity(
        &self,
        classification: &SignalClassification,
        chains: &[CausalChain],
    ) -> String {
        let own = classification.criticality.as_label();
        let escalate = chains.iter().any(|chain| chain.severity.rank() <= 2);
        if !escalate {
            return own.to_owned();
        }
        match own {
            "low" | "medium" => "high".to_owned(),
            _ => "critical".to_owned(),
        }
    }

    /// Additive confidence heuristic, clamped to `[0, 1]`:
    /// 0.2 base, up to 0.4 from root causes, up to 0.3 from effects, plus
    /// 0.3 × mean chain coverage when chains exist.
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate_confidence(
        &self,
        root_causes: &[String],
        effects: &[String],
        chains: &[CausalChain],
    ) -> f64 {
        let mut confidence = 0.2;
        confidence += (root_causes.len() as f64 * 0.1).min(0.4);
        confidence += (effects.len() as f64 * 0.1).min(0.3);

        if !chains.is_empty() {
            let mean: f64 =
                chains.iter().map(|chain| chain.confidence).sum::<f64>() / chains.len() as f64;
            confidence += 0.3 * mean;
        }

        confidence.clamp(0.0, 1.0)
    }

    /// Up to five operator recommendations, most urgent first: the
    /// criticality-driven action, the subsystem's fixed texts, then a line
    /// naming the leading root causes.
    pub fn generate_recommendations(
        &self,
        code: &str,
        classification: &SignalClassification,
        root_causes: &[String],
        effects: &[String],
    ) -> Vec<String> {
        debug!(
            signal = code,
            causes = root_causes.len(),
            effects = effects.len(),
            "generating recommendations"
        );

        let mut recommendations = Vec::new();

        match classification.criticality {
            Criticality::Critical => recommendations.push(
                "Stop the train at the next safe location and contact maintenance control \
                 immediately"
                    .to_owned(),
            ),
            Criticality::High => recommendations.push(
                "Reduce speed and schedule an inspection at the next depot stop".to_owned(),
            ),
            Criticality::Medium | Criticality::Low => {}
        }

        if let Some(entry) = self.catalog.subsystem_entry(classification.system) {
            recommendations.extend(entry.recommendations.iter().cloned());
        }

        if !root_causes.is_empty() {
            let named: Vec<&str> = root_causes
                .iter()
                .take(MAX_NAMED_CAUSES)
                .map(String::as_str)
                .collect();
            recommendations.push(format!("Check possible root causes: {}", named.join(", ")));
        }

        recommendations.truncate(MAX_RECOMMENDATIONS);
        recommendations
    }

    /// Other snapshot signals on the same component whose own classification
    /// is HIGH or CRITICAL.
    pub fn find_related_faults(&self, code: &str, all_signals: &BTreeSet<String>) -> Vec<String> {
        let component = self.classifier.classify(code, "").component;
        if component == "UNKNOWN" {
            // Unknown components would relate every unclassifiable signal
            // to every other one.
            return Vec::new();
        }

        all_signals
            .iter()
            .filter(|signal| signal.as_str() != code)
            .filter(|signal| {
                let other = self.classifier.classify(signal, "");
                other.component == component
                    && matches!(other.criticality, Criticality::High | Criticality::Critical)
            })
            .take(MAX_RELATED_FAULTS)
            .cloned()
            .collect()
    }

    // ── Batch pipeline ──────────────────────────────────────────

    /// Full diagnostic for one faulted signal against a snapshot.
    ///
    /// Results are cached per `(code, snapshot)` pair, so a hit returns the
    /// earlier result unchanged: `analyzed_at` is the time of the original
    /// analysis, not of this call. Call [`CausalAnalyzer::clear_cache`] to
    /// force reanalysis.
    pub fn diagnose(
        &self,
        fault: &SignalRecord,
        all_signals: &BTreeSet<String>,
        timestamp: DateTime<Utc>,
    ) -> DiagnosticResult {
        let code = fault.signal_code.as_str();
        let key = DiagKey {
            code: code.to_owned(),
            snapshot: snapshot_fingerprint(all_signals),
        };
        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }

        let result = if code.trim().is_empty() {
            warn!("empty fault code, degrading diagnostic result");
            fallback_result(code, timestamp)
        } else {
            let classification = self.classifier.classify_record(fault);
            let root_causes = self.find_root_causes(code, &classification, all_signals);
            let effects = self.find_potential_effects(code, &classification, all_signals);
            let chains = self.build_causal_chains(code, all_signals, timestamp);
            let severity_assessment = self.assess_severity(&classification, &chains);
            let confidence_score = self.calculate_confidence(&root_causes, &effects, &chains);
            let recommendations =
                self.generate_recommendations(code, &classification, &root_causes, &effects);
            let related_faults = self.find_related_faults(code, all_signals);

            DiagnosticResult {
                signal_code: code.to_owned(),
                possible_root_causes: root_causes,
                potential_effects: effects,
                causal_chains: chains,
                severity_assessment,
                confidence_score,
                recommendations,
                related_faults,
                analyzed_at: timestamp,
            }
        };

        self.cache.insert(key, result.clone());
        result
    }

    /// Diagnose a batch of faulted signals. One bad signal never aborts the
    /// batch: it degrades to a fallback result and analysis continues.
    /// An empty fault list yields an empty result list.
    pub fn analyze_fault_signals(
        &self,
        faults: &[SignalRecord],
        all_signals: &BTreeSet<String>,
        timestamp: DateTime<Utc>,
    ) -> Vec<DiagnosticResult> {
        faults
            .iter()
            .map(|fault| self.diagnose(fault, all_signals, timestamp))
            .collect()
    }

    /// Drop the result cache. Never changes observable results.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cache counters for observability tooling.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Fallback diagnostic when a single fault cannot be analyzed.
fn fallback_result(code: &str, timestamp: DateTime<Utc>) -> DiagnosticResult {
    DiagnosticResult {
        signal_code: code.to_owned(),
        possible_root_causes: Vec::new(),
        potential_effects: Vec::new(),
        causal_chains: Vec::new(),
        severity_assessment: "medium".to_owned(),
        confidence_score: FALLBACK_CONFIDENCE,
        recommendations: vec![
            "Signal could not be analyzed; schedule a manual inspection".to_owned()
        ],
        related_faults: Vec::new(),
        analyzed_at: timestamp,
    }
}

/// Order-independent fingerprint of the snapshot's signal set (the set is
/// already sorted, so hashing in iteration order is stable).
fn snapshot_fingerprint(all_signals: &BTreeSet<String>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for signal in all_signals {
        signal.hash(&mut hasher);
    }
    hasher.finish()
}
