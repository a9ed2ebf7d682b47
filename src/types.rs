//! Core data model for the classification and diagnostic engine.
//!
//! Everything here is an immutable value: records come in from the
//! collaborator layer, classifications and diagnostic results are derived
//! from them and never mutated after creation. All public types are
//! serde-serializable so the calling layer can render or persist them
//! however it likes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Input ───────────────────────────────────────────────────────

/// One raw telemetry signal as supplied by the external loader.
///
/// Only `signal_code` is mandatory. Codes follow the convention
/// `<TYPE>_<COMPONENT>[...]_<WAGON?>`, e.g. `B_BCU_FAULT` or
/// `F_R_PRESSURE_MPA`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Signal code, e.g. `B_EMERGENCY_BRAKING`.
    pub signal_code: String,
    /// Free-text description from the telemetry export. May be empty.
    #[serde(default)]
    pub description: String,
    /// Wagon identifier as exported. Accepts a string or a bare number.
    #[serde(default, deserialize_with = "de_string_or_int")]
    pub wagon: Option<String>,
    /// Line/route metadata, if present.
    #[serde(default)]
    pub line: Option<String>,
}

impl SignalRecord {
    /// Build a record from a code alone (empty description, no metadata).
    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            signal_code: code.into(),
            description: String::new(),
            wagon: None,
            line: None,
        }
    }
}

/// Accept `"3"` or `3` for the wagon field; exports are inconsistent.
fn de_string_or_int<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

// ── Classification ──────────────────────────────────────────────

/// Criticality tier assigned to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Criticality {
    /// Emergency-tier signal; immediate operational impact.
    Critical,
    /// Safety-, power- or brake-critical, or a generic fault.
    High,
    /// Warning or out-of-band measurement.
    Medium,
    /// Informational.
    Low,
}

impl Criticality {
    /// Base severity score contributed by this tier.
    pub fn base_score(self) -> u8 {
        match self {
            Self::Critical => 80,
            Self::High => 60,
            Self::Medium => 40,
            Self::Low => 20,
        }
    }

    /// Lowercase label used in severity assessments.
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "CRITICAL"),
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// Functional train subsystem a signal belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Subsystem {
    /// Propulsion: motors, inverters, traction control.
    Traction,
    /// Brake system: BCU, WSP, pneumatics.
    Brakes,
    /// Door system: DCU, steps, ramps.
    Doors,
    /// Power supply: pantograph, converters, batteries.
    Power,
    /// HVAC and climate control.
    Climate,
    /// Passenger information systems.
    InfoSystems,
    /// Radio, train bus and other comms.
    Communication,
    /// No subsystem pattern matched.
    Unknown,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Traction => "TRACTION",
            Self::Brakes => "BRAKES",
            Self::Doors => "DOORS",
            Self::Power => "POWER",
            Self::Climate => "CLIMATE",
            Self::InfoSystems => "INFO_SYSTEMS",
            Self::Communication => "COMMUNICATION",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{name}")
    }
}

/// Derived classification of a single signal.
///
/// A pure function of `(signal_code, description, catalog)`: identical
/// inputs always yield an identical value, which is what licenses the
/// memoization cache in front of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalClassification {
    /// The classified signal code.
    pub signal_code: String,
    /// Criticality tier.
    pub criticality: Criticality,
    /// Subsystem the signal belongs to.
    pub system: Subsystem,
    /// Extracted component abbreviation, or `"UNKNOWN"`.
    pub component: String,
    /// Functional category name, or `"unknown"`.
    pub function_type: String,
    /// Wagon number if the code carries a trailing `_<1..=11>` suffix.
    pub wagon_number: Option<u8>,
    /// Whether the signal represents a train-level aggregate rather than a
    /// single-wagon measurement.
    pub is_train_level: bool,
    /// Additive severity score in `0..=100`.
    pub severity_score: u8,
    /// Up to 5 hint strings pointing at likely-related signals.
    pub related_signals: Vec<String>,
}

// ── Causal analysis ─────────────────────────────────────────────

/// Severity tag on a declared causal relationship.
///
/// Priority ranks are fixed: critical=1, high=2, medium=3, low=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLabel {
    /// Rank 1.
    Critical,
    /// Rank 2.
    High,
    /// Rank 3.
    Medium,
    /// Rank 4.
    Low,
}

impl SeverityLabel {
    /// Fixed priority rank (lower = more severe).
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Medium => 3,
            Self::Low => 4,
        }
    }
}

impl fmt::Display for SeverityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A declared root-cause/effect relationship observed in a snapshot.
///
/// Only built when at least two of the declared signals are actually
/// present; `confidence` is the coverage ratio present/declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalChain {
    /// Identifier of the catalog entry this chain was built from.
    pub chain_id: String,
    /// Declared root-cause signal codes.
    pub root_cause_signals: BTreeSet<String>,
    /// Declared downstream effect signal codes.
    pub effect_signals: BTreeSet<String>,
    /// Human-readable description of the relationship.
    pub description: String,
    /// Severity tag declared on the catalog entry.
    pub severity: SeverityLabel,
    /// Coverage confidence in `[0, 1]`: fraction of declared signals present.
    pub confidence: f64,
    /// Subsystems of the declared signals present in the snapshot.
    pub affected_systems: BTreeSet<Subsystem>,
    /// When the chain was assembled.
    pub detected_at: DateTime<Utc>,
}

/// Ranked diagnostic explanation for one faulted signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    /// The faulted signal this result explains.
    pub signal_code: String,
    /// Candidate root-cause signal codes.
    pub possible_root_causes: Vec<String>,
    /// Candidate downstream effect signal codes.
    pub potential_effects: Vec<String>,
    /// Causal chains involving this signal with ≥2 signals present.
    pub causal_chains: Vec<CausalChain>,
    /// Assessed severity label (never below the signal's own criticality).
    pub severity_assessment: String,
    /// Heuristic confidence in `[0, 1]`. Reproducible, not calibrated.
    pub confidence_score: f64,
    /// Up to 5 operator recommendations, most urgent first.
    pub recommendations: Vec<String>,
    /// Up to 5 other faulted signals on the same component.
    pub related_faults: Vec<String>,
    /// When the analysis ran.
    pub analyzed_at: DateTime<Utc>,
}

// ── Health ──────────────────────────────────────────────────────

/// Aggregate status for the whole train or one subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No HIGH or CRITICAL signals observed.
    Healthy,
    /// At least one HIGH signal observed.
    Warning,
    /// At least one CRITICAL signal observed. Terminal for the pass.
    Critical,
    /// Nothing observed (empty snapshot).
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Per-subsystem health counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemHealth {
    /// Escalation state for this subsystem (never downgraded in a pass).
    pub status: HealthStatus,
    /// Number of HIGH or CRITICAL signals seen.
    pub fault_count: u32,
    /// Number of CRITICAL signals seen.
    pub critical_count: u32,
}

impl Default for SystemHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Healthy,
            fault_count: 0,
            critical_count: 0,
        }
    }
}

/// System-wide health verdict for one telemetry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Global status after folding the whole snapshot.
    pub overall_status: HealthStatus,
    /// Per-subsystem status and counters (only subsystems with faults).
    pub systems_status: BTreeMap<Subsystem, SystemHealth>,
    /// Codes of all CRITICAL signals, in snapshot order.
    pub critical_faults: Vec<String>,
    /// Report-level recommendations derived from the final status.
    pub recommendations: Vec<String>,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
}

// ── Observability ───────────────────────────────────────────────

/// Counters for one memoization cache. Informational only; correctness
/// never depends on retention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Maximum number of entries retained.
    pub capacity: usize,
    /// Entries currently held.
    pub entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to recompute.
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
}
