//! Pattern-driven signal classification with memoization.
//!
//! [`Classifier`] maps one signal record to a [`SignalClassification`] by
//! scanning the catalog's pattern tables in fixed priority order. It never
//! fails outward: classification feeds a UI that must stay responsive under
//! malformed input, so anything unclassifiable degrades to a LOW/UNKNOWN
//! result instead of propagating an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use crate::cache::BoundedCache;
use crate::catalog::{CatalogError, PatternCatalog};
use crate::types::{CacheStats, Criticality, SignalClassification, SignalRecord, Subsystem};

/// Highest wagon number a trailing suffix is accepted for.
const MAX_WAGON: u8 = 11;

/// Code fragments marking a train-level aggregate signal.
const AGGREGATE_MARKERS: [&str; 7] = [
    "CONSIST_", "TRAIN_", "GLOBAL_", "TOTAL_", "ALL_", "MASTER_", "GENERAL_",
];

/// Maximum number of related-signal hints per classification.
const MAX_RELATED: usize = 5;

/// Severity score assigned to the degraded fallback classification.
const DEGRADED_SCORE: u8 = 30;

/// Memoization key: the full inputs, not a hashed concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClassifyKey {
    code: String,
    description: String,
}

/// The signal classifier. Cheap to share behind an [`Arc`]; all methods
/// take `&self`.
pub struct Classifier {
    catalog: Arc<PatternCatalog>,
    cache: BoundedCache<ClassifyKey, SignalClassification>,
    re_prefix_token: Regex,
    re_prefix_alnum: Regex,
    re_upper_run: Regex,
    re_wagon_suffix: Regex,
}

impl Classifier {
    /// Build a classifier over `catalog` with a memoization cache of
    /// `cache_capacity` entries.
    ///
    /// Fails fast on an invalid catalog; this is the construction-time
    /// error boundary the per-call paths rely on.
    pub fn new(catalog: Arc<PatternCatalog>, cache_capacity: usize) -> Result<Self, CatalogError> {
        catalog.validate()?;
        Ok(Self {
            catalog,
            cache: BoundedCache::new(cache_capacity),
            re_prefix_token: Regex::new(r"^[A-Z]+_([A-Z]{3,})(?:_|$)")?,
            re_prefix_alnum: Regex::new(r"^[A-Z]+_([A-Z]{2,}[0-9]{1,3})(?:_|$)")?,
            re_upper_run: Regex::new(r"[A-Z]{3,}")?,
            re_wagon_suffix: Regex::new(r"_([0-9]{1,2})$")?,
        })
    }

    /// The catalog this classifier matches against.
    pub fn catalog(&self) -> &Arc<PatternCatalog> {
        &self.catalog
    }

    /// Classify one signal. Deterministic for a fixed catalog; memoized.
    pub fn classify(&self, code: &str, description: &str) -> SignalClassification {
        let key = ClassifyKey {
            code: code.to_owned(),
            description: description.to_owned(),
        };
        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }

        let classification = if code.trim().is_empty() {
            warn!(description, "empty signal code, degrading classification");
            degraded(code)
        } else {
            self.classify_uncached(code, description)
        };

        self.cache.insert(key, classification.clone());
        classification
    }

    /// Classify a record (code + description).
    pub fn classify_record(&self, record: &SignalRecord) -> SignalClassification {
        self.classify(&record.signal_code, &record.description)
    }

    /// Classify a whole snapshot. Order-independent; duplicate codes
    /// overwrite.
    pub fn classify_batch(
        &self,
        records: &[SignalRecord],
    ) -> BTreeMap<String, SignalClassification> {
        records
            .iter()
            .map(|record| (record.signal_code.clone(), self.classify_record(record)))
            .collect()
    }

    /// Drop the memoization cache. Never changes observable results.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cache counters for observability tooling.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn classify_uncached(&self, code: &str, description: &str) -> SignalClassification {
        let code_uc = code.to_uppercase();
        let text = format!("{} {}", code_uc, description.to_uppercase());

        let criticality = self.criticality_of(&text);
        let system = self.subsystem_of(&text);
        let component = self.extract_component(&code_uc);
        let function_type = self.function_type_of(&text, &code_uc);
        let wagon_number = self.wagon_number_of(code);
        let is_train_level = is_train_level(&code_uc, wagon_number);
        let severity_score = severity_score(criticality, system, &function_type);
        let related_signals = self.related_signals(&code_uc, &component, system);

        SignalClassification {
            signal_code: code.to_owned(),
            criticality,
            system,
            component,
            function_type,
            wagon_number,
            is_train_level,
            severity_score,
            related_signals,
        }
    }

    /// Criticality tiers in fixed priority order: emergency, then the three
    /// HIGH tiers, then generic keyword sniffing.
    fn criticality_of(&self, text: &str) -> Criticality {
        let tiers = &self.catalog.criticality;
        if matches_any(text, &tiers.emergency) {
            return Criticality::Critical;
        }
        if matches_any(text, &tiers.safety)
            || matches_any(text, &tiers.power_critical)
            || matches_any(text, &tiers.brake_critical)
        {
            return Criticality::High;
        }
        if matches_any(text, &tiers.fault_keywords) {
            return Criticality::High;
        }
        if matches_any(text, &tiers.warning_keywords) {
            return Criticality::Medium;
        }
        Criticality::Low
    }

    /// First subsystem entry with a matching pattern, in table order.
    fn subsystem_of(&self, text: &str) -> Subsystem {
        self.catalog
            .subsystems
            .iter()
            .find(|entry| matches_any(text, &entry.patterns))
            .map_or(Subsystem::Unknown, |entry| entry.system)
    }

    /// Three-stage component extraction with abbreviation canonicalization.
    fn extract_component(&self, code_uc: &str) -> String {
        let token = self
            .re_prefix_token
            .captures(code_uc)
            .and_then(|c| c.get(1))
            .or_else(|| {
                self.re_prefix_alnum
                    .captures(code_uc)
                    .and_then(|c| c.get(1))
            })
            .map(|m| m.as_str().to_owned())
            .or_else(|| {
                self.re_upper_run
                    .find(code_uc)
                    .map(|m| m.as_str().to_owned())
            });

        if let Some(token) = token {
            return match self.catalog.canonical_component(&token) {
                Some(canonical) => canonical.to_owned(),
                None => token,
            };
        }

        // Fallback: second underscore-delimited token, truncated.
        match code_uc.split('_').nth(1) {
            Some(second) if !second.is_empty() => second.chars().take(4).collect(),
            _ => "UNKNOWN".to_owned(),
        }
    }

    /// Functional category by pattern table, then by code prefix.
    fn function_type_of(&self, text: &str, code_uc: &str) -> String {
        if let Some(entry) = self
            .catalog
            .functions
            .iter()
            .find(|entry| matches_any(text, &entry.patterns))
        {
            return entry.name.clone();
        }

        if code_uc.starts_with("B_") {
            "states".to_owned()
        } else if ["F_", "S_", "W_", "DW_"]
            .iter()
            .any(|prefix| code_uc.starts_with(prefix))
        {
            "measurements".to_owned()
        } else if code_uc.starts_with("BY_") {
            "diagnostics".to_owned()
        } else {
            "unknown".to_owned()
        }
    }

    /// Trailing `_<digits>` suffix, accepted only in `1..=MAX_WAGON`.
    fn wagon_number_of(&self, code: &str) -> Option<u8> {
        let digits = self.re_wagon_suffix.captures(code)?.get(1)?.as_str();
        let number: u8 = digits.parse().ok()?;
        (1..=MAX_WAGON).contains(&number).then_some(number)
    }

    /// Up to [`MAX_RELATED`] hint strings: a wildcard over the code's type
    /// prefix and component, then a few of the subsystem's raw patterns.
    fn related_signals(&self, code_uc: &str, component: &str, system: Subsystem) -> Vec<String> {
        let mut hints = Vec::new();

        if component != "UNKNOWN" {
            if let Some(prefix) = code_uc.split('_').next().filter(|p| !p.is_empty()) {
                hints.push(format!("{prefix}_{component}*"));
            }
        }

        if let Some(entry) = self.catalog.subsystem_entry(system) {
            hints.extend(entry.patterns.iter().take(3).cloned());
        }

        hints.truncate(MAX_RELATED);
        hints
    }
}

/// Case-insensitive substring match of any pattern in `patterns` against
/// the already-uppercased `text`.
fn matches_any(text: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && text.contains(&pattern.to_uppercase()))
}

/// Train-level rule: no wagon suffix, or a digit in a non-trailing token,
/// or an aggregate marker anywhere in the code.
fn is_train_level(code_uc: &str, wagon_number: Option<u8>) -> bool {
    if wagon_number.is_none() {
        return true;
    }

    let tokens: Vec<&str> = code_uc.split('_').collect();
    let body = &tokens[..tokens.len().saturating_sub(1)];
    if body
        .iter()
        .any(|token| token.chars().any(|c| c.is_ascii_digit()))
    {
        return true;
    }

    AGGREGATE_MARKERS
        .iter()
        .any(|marker| code_uc.contains(marker))
}

/// Criticality base plus subsystem and function modifiers, clamped to 100.
fn severity_score(criticality: Criticality, system: Subsystem, function_type: &str) -> u8 {
    let subsystem_bonus: u8 = match system {
        Subsystem::Brakes => 15,
        Subsystem::Power => 10,
        Subsystem::Traction => 8,
        Subsystem::Doors => 5,
        Subsystem::Climate => 2,
        Subsystem::InfoSystems => 1,
        Subsystem::Communication | Subsystem::Unknown => 0,
    };
    let function_bonus: u8 = match function_type {
        "faults" => 10,
        "controls" => 5,
        "measurements" => 3,
        "states" => 2,
        "diagnostics" => 1,
        _ => 0,
    };

    criticality
        .base_score()
        .saturating_add(subsystem_bonus)
        .saturating_add(function_bonus)
        .min(100)
}

/// The degraded classification returned when a signal cannot be classified.
fn degraded(code: &str) -> SignalClassification {
    SignalClassification {
        signal_code: code.to_owned(),
        criticality: Criticality::Low,
        system: Subsystem::Unknown,
        component: "UNKNOWN".to_owned(),
        function_type: "unknown".to_owned(),
        wagon_number: None,
        is_train_level: true,
        severity_score: DEGRADED_SCORE,
        related_signals: Vec::new(),
    }
}
