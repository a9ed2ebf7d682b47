//! The static pattern catalog: configuration data the engine matches against.
//!
//! A [`PatternCatalog`] is an immutable value constructed once (built-in
//! default or loaded from TOML) and shared behind an `Arc`. Reloading
//! configuration means building a new catalog and a new engine around it;
//! the tables are never mutated in place.
//!
//! An empty or inconsistent catalog is the one genuinely unrecoverable
//! condition in this crate, so it fails fast at construction instead of
//! degrading per-call.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{SeverityLabel, Subsystem};

/// Catalog construction or loading failure.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog file {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The catalog TOML did not parse.
    #[error("failed to parse catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),
    /// A mandatory table is empty.
    #[error("catalog validation failed: {0}")]
    Invalid(&'static str),
    /// An internal matching regex failed to compile.
    #[error("internal pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

/// Criticality-tier pattern lists, scanned in fixed priority order.
///
/// `emergency` forces CRITICAL; `safety`, `power_critical` and
/// `brake_critical` force HIGH; `fault_keywords` and `warning_keywords`
/// are the generic fallback sniffers (HIGH and MEDIUM respectively).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalityTiers {
    /// Patterns that force CRITICAL.
    pub emergency: Vec<String>,
    /// Safety-system patterns (force HIGH).
    pub safety: Vec<String>,
    /// Power-critical patterns (force HIGH).
    pub power_critical: Vec<String>,
    /// Brake-critical patterns (force HIGH).
    pub brake_critical: Vec<String>,
    /// Generic fault keywords (HIGH).
    pub fault_keywords: Vec<String>,
    /// Generic warning/measurement keywords (MEDIUM).
    pub warning_keywords: Vec<String>,
}

/// One subsystem's patterns plus the hand-authored causal seed lists and
/// operator recommendation texts the analyzer draws from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemEntry {
    /// Subsystem these patterns map to.
    pub system: Subsystem,
    /// Substring patterns, first match wins across entries in table order.
    pub patterns: Vec<String>,
    /// Signals worth checking as root causes for faults in this subsystem.
    #[serde(default)]
    pub root_cause_seeds: Vec<String>,
    /// Signals that tend to follow faults in this subsystem.
    #[serde(default)]
    pub effect_seeds: Vec<String>,
    /// Fixed operator recommendations for faults in this subsystem.
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// One functional-category pattern list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionEntry {
    /// Category name, e.g. `faults` or `measurements`.
    pub name: String,
    /// Substring patterns, first match wins across entries in table order.
    pub patterns: Vec<String>,
}

/// One declared root-cause/effect relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalEntry {
    /// Stable identifier, becomes the chain id.
    pub id: String,
    /// Signal codes declared as root causes.
    pub root_causes: BTreeSet<String>,
    /// Signal codes declared as downstream effects.
    pub effects: BTreeSet<String>,
    /// Human-readable description of the relationship.
    pub description: String,
    /// Severity tag for the relationship as a whole.
    pub severity: SeverityLabel,
}

impl CausalEntry {
    /// All declared signals (root causes and effects).
    pub fn declared_signals(&self) -> impl Iterator<Item = &String> {
        self.root_causes.iter().chain(self.effects.iter())
    }

    /// Number of declared signals.
    pub fn declared_count(&self) -> usize {
        self.root_causes.len().saturating_add(self.effects.len())
    }

    /// Whether `code` appears on either side of the relationship.
    pub fn involves(&self, code: &str) -> bool {
        self.root_causes.contains(code) || self.effects.contains(code)
    }
}

/// The full pattern catalog: four logical tables plus the component
/// abbreviation dictionary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCatalog {
    /// Criticality-tier patterns.
    pub criticality: CriticalityTiers,
    /// Subsystem patterns in declaration order.
    pub subsystems: Vec<SubsystemEntry>,
    /// Functional-category patterns in declaration order.
    pub functions: Vec<FunctionEntry>,
    /// Declared causal relationships.
    #[serde(default)]
    pub causal_entries: Vec<CausalEntry>,
    /// Canonical component abbreviation → full name.
    #[serde(default)]
    pub abbreviations: BTreeMap<String, String>,
}

impl PatternCatalog {
    /// Parse a catalog from TOML and validate it.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, CatalogError> {
        let catalog: Self = toml::from_str(toml_str)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a TOML file and validate it.
    pub fn load_from_path(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loading pattern catalog");
        Self::from_toml_str(&contents)
    }

    /// Check the mandatory tables are populated.
    ///
    /// Causal entries and abbreviations may legitimately be empty (the
    /// analyzer then works from seeds and heuristics alone).
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.criticality.emergency.is_empty() {
            return Err(CatalogError::Invalid("no emergency patterns declared"));
        }
        if self.subsystems.is_empty() {
            return Err(CatalogError::Invalid("no subsystem patterns declared"));
        }
        if self.functions.is_empty() {
            return Err(CatalogError::Invalid("no functional patterns declared"));
        }
        if self
            .causal_entries
            .iter()
            .any(|entry| entry.declared_count() == 0)
        {
            return Err(CatalogError::Invalid("causal entry declares no signals"));
        }
        Ok(())
    }

    /// Find the subsystem entry for `system`, if declared.
    pub fn subsystem_entry(&self, system: Subsystem) -> Option<&SubsystemEntry> {
        self.subsystems.iter().find(|entry| entry.system == system)
    }

    /// Canonicalize an extracted component token against the abbreviation
    /// dictionary (substring containment), e.g. `BIM1` → `BIM`.
    pub fn canonical_component(&self, token: &str) -> Option<&str> {
        self.abbreviations
            .keys()
            .find(|abbr| token.contains(abbr.as_str()))
            .map(String::as_str)
    }

    /// Causal entries declaring `code` as an effect.
    pub fn entries_with_effect<'a>(
        &'a self,
        code: &'a str,
    ) -> impl Iterator<Item = &'a CausalEntry> {
        self.causal_entries
            .iter()
            .filter(move |entry| entry.effects.contains(code))
    }

    /// Causal entries declaring `code` as a root cause.
    pub fn entries_with_root_cause<'a>(
        &'a self,
        code: &'a str,
    ) -> impl Iterator<Item = &'a CausalEntry> {
        self.causal_entries
            .iter()
            .filter(move |entry| entry.root_causes.contains(code))
    }

    /// Causal entries in which `code` appears on either side.
    pub fn entries_involving<'a>(
        &'a self,
        code: &'a str,
    ) -> impl Iterator<Item = &'a CausalEntry> {
        self.causal_entries
            .iter()
            .filter(move |entry| entry.involves(code))
    }

    /// The built-in rail catalog.
    ///
    /// Mirrors the hand-curated domain knowledge the engine ships with;
    /// operators replace it wholesale via [`PatternCatalog::load_from_path`].
    pub fn builtin() -> Self {
        let criticality = CriticalityTiers {
            emergency: strings(&[
                "EMERGENCY", "EMERG", "E_STOP", "ESTOP", "EVACUAT", "FIRE", "DERAIL",
            ]),
            safety: strings(&["SAFETY", "VIGILANCE", "DEADMAN", "SIFA", "INTERLOCK"]),
            power_critical: strings(&[
                "POWER_FAIL",
                "BATTERY_LOW",
                "PANTOGRAPH_DOWN",
                "CONVERTER_FAULT",
                "HV_TRIP",
            ]),
            brake_critical: strings(&[
                "BCU_FAULT",
                "BRAKE_FAULT",
                "WSP_FAULT",
                "AIR_LOW",
                "PRESSURE_LOW",
                "PARKING_BRAKE",
            ]),
            fault_keywords: strings(&["FAULT", "FAIL", "ERROR", "ALARM", "TRIP", "OFFLINE"]),
            warning_keywords: strings(&[
                "WARN", "LIMIT", "DEGRAD", "TEMP", "PRESSURE", "VOLTAGE", "CURRENT", "LEVEL",
            ]),
        };

        let subsystems = vec![
            SubsystemEntry {
                system: Subsystem::Brakes,
                patterns: strings(&["BRAK", "BCU", "WSP", "PRESSURE", "_BP_", "MPA", "COMPRESSOR"]),
                root_cause_seeds: strings(&[
                    "F_R_PRESSURE_MPA",
                    "F_BP_PRESSURE_MPA",
                    "B_COMPRESSOR_FAULT",
                ]),
                effect_seeds: strings(&["B_EMERGENCY_BRAKING", "B_TRACTION_INTERLOCK"]),
                recommendations: strings(&[
                    "Verify brake pipe pressure against the gauge in the leading cab",
                    "Inspect the compressor and main reservoir before departure",
                ]),
            },
            SubsystemEntry {
                system: Subsystem::Traction,
                patterns: strings(&["TRACTION", "MOTOR", "INVERTER", "PROPULSION", "TCU", "SPEED"]),
                root_cause_seeds: strings(&["B_TCU_FAULT", "F_MOTOR_TEMP_C", "F_HV_VOLTAGE"]),
                effect_seeds: strings(&["B_TRACTION_CUTOUT", "W_SPEED_KPH"]),
                recommendations: strings(&[
                    "Check traction converter cooling before reapplying power",
                    "Isolate the affected motor bogie if the fault persists",
                ]),
            },
            SubsystemEntry {
                system: Subsystem::Doors,
                patterns: strings(&["DOOR", "DCU", "STEP", "RAMP", "OBSTACLE"]),
                root_cause_seeds: strings(&["B_DCU_FAULT", "B_DOOR_OBSTACLE"]),
                effect_seeds: strings(&["B_DOOR_LOOP_OPEN", "B_TRACTION_INTERLOCK"]),
                recommendations: strings(&[
                    "Inspect the door leaf and obstacle sensors at the next stop",
                    "Cut out the affected door locally and seal it for passengers",
                ]),
            },
            SubsystemEntry {
                system: Subsystem::Power,
                patterns: strings(&[
                    "POWER",
                    "BATTERY",
                    "PANTOGRAPH",
                    "CONVERTER",
                    "VOLTAGE",
                    "HV_",
                    "LV_",
                    "PSU",
                ]),
                root_cause_seeds: strings(&["B_PANTOGRAPH_DOWN", "F_HV_VOLTAGE", "F_BAT_VOLTAGE"]),
                effect_seeds: strings(&["B_CONVERTER_FAULT", "B_BATTERY_DISCHARGE", "B_HVAC_OFF"]),
                recommendations: strings(&[
                    "Confirm catenary voltage and pantograph contact",
                    "Monitor battery discharge; shed non-essential loads if falling",
                ]),
            },
            SubsystemEntry {
                system: Subsystem::Climate,
                patterns: strings(&["HVAC", "CLIMATE", "HEATING", "COOLING", "TEMP", "AC_"]),
                root_cause_seeds: strings(&["B_HVAC_OFF", "F_CAB_TEMP_C"]),
                effect_seeds: strings(&["B_SALOON_OVERTEMP"]),
                recommendations: strings(&[
                    "Check HVAC unit supply breakers in the affected wagon",
                ]),
            },
            SubsystemEntry {
                system: Subsystem::InfoSystems,
                patterns: strings(&["PIS", "DISPLAY", "ANNOUNC", "INFO", "PASSENGER"]),
                root_cause_seeds: strings(&["B_PIS_FAULT"]),
                effect_seeds: strings(&["B_DISPLAY_BLANK"]),
                recommendations: strings(&[
                    "Restart the passenger information controller from the cab panel",
                ]),
            },
            SubsystemEntry {
                system: Subsystem::Communication,
                patterns: strings(&["RADIO", "GSM", "WIFI", "COMM", "ANTENNA", "BIM"]),
                root_cause_seeds: strings(&["B_BIM1_OFFLINE", "F_ANTENNA_SIGNAL"]),
                effect_seeds: strings(&["B_RADIO_LINK_LOST"]),
                recommendations: strings(&[
                    "Verify the train radio link and fall back to the secondary channel",
                ]),
            },
        ];

        let functions = vec![
            FunctionEntry {
                name: "faults".to_owned(),
                patterns: strings(&["FAULT", "FAIL", "ERROR", "ALARM", "TRIP", "EMERGENCY"]),
            },
            FunctionEntry {
                name: "controls".to_owned(),
                patterns: strings(&["CMD", "CONTROL", "REQUEST", "ENABLE", "DISABLE", "APPLY"]),
            },
            FunctionEntry {
                name: "measurements".to_owned(),
                patterns: strings(&[
                    "PRESSURE", "TEMP", "VOLTAGE", "CURRENT", "SPEED", "MPA", "KPH", "LEVEL",
                ]),
            },
            FunctionEntry {
                name: "states".to_owned(),
                patterns: strings(&[
                    "STATUS", "STATE", "ACTIVE", "CLOSED", "OPEN", "READY", "_OK", "_ON", "_OFF",
                ]),
            },
            FunctionEntry {
                name: "diagnostics".to_owned(),
                patterns: strings(&["DIAG", "TEST", "KEY_CODE", "VERSION", "COUNTER"]),
            },
        ];

        let causal_entries = vec![
            CausalEntry {
                id: "brake_pressure_loss".to_owned(),
                root_causes: codeset(&["F_R_PRESSURE_MPA"]),
                effects: codeset(&["B_BCU_FAULT", "B_EMERGENCY_BRAKING"]),
                description: "Falling brake pipe pressure drives a BCU fault and an emergency \
                              brake application"
                    .to_owned(),
                severity: SeverityLabel::Critical,
            },
            CausalEntry {
                id: "power_loss_cascade".to_owned(),
                root_causes: codeset(&["B_PANTOGRAPH_DOWN", "F_HV_VOLTAGE"]),
                effects: codeset(&["B_CONVERTER_FAULT", "B_BATTERY_DISCHARGE", "B_HVAC_OFF"]),
                description: "Loss of catenary supply cascades into converter shutdown, battery \
                              discharge and HVAC load shedding"
                    .to_owned(),
                severity: SeverityLabel::High,
            },
            CausalEntry {
                id: "traction_cutout".to_owned(),
                root_causes: codeset(&["B_TCU_FAULT", "F_MOTOR_TEMP_C"]),
                effects: codeset(&["B_TRACTION_CUTOUT", "W_SPEED_KPH"]),
                description: "Traction control fault or motor overtemperature cuts propulsion \
                              and degrades line speed"
                    .to_owned(),
                severity: SeverityLabel::High,
            },
            CausalEntry {
                id: "door_loop_interruption".to_owned(),
                root_causes: codeset(&["B_DCU_FAULT", "B_DOOR_OBSTACLE"]),
                effects: codeset(&["B_DOOR_LOOP_OPEN", "B_TRACTION_INTERLOCK"]),
                description: "A door controller fault or obstruction opens the door loop and \
                              holds the traction interlock"
                    .to_owned(),
                severity: SeverityLabel::Medium,
            },
            CausalEntry {
                id: "comms_degradation".to_owned(),
                root_causes: codeset(&["B_BIM1_OFFLINE", "F_ANTENNA_SIGNAL"]),
                effects: codeset(&["BY_BIM1_KEY_CODE_3", "B_RADIO_LINK_LOST"]),
                description: "Bus interface module dropout degrades diagnostics reporting and \
                              the radio link"
                    .to_owned(),
                severity: SeverityLabel::Low,
            },
        ];

        let abbreviations = [
            ("BCU", "Brake Control Unit"),
            ("TCU", "Traction Control Unit"),
            ("DCU", "Door Control Unit"),
            ("WSP", "Wheel Slide Protection"),
            ("HVAC", "Heating, Ventilation and Air Conditioning"),
            ("BIM", "Bus Interface Module"),
            ("PIS", "Passenger Information System"),
            ("PANT", "Pantograph"),
            ("BAT", "Battery"),
            ("VCU", "Vehicle Control Unit"),
        ]
        .into_iter()
        .map(|(abbr, name)| (abbr.to_owned(), name.to_owned()))
        .collect();

        Self {
            criticality,
            subsystems,
            functions,
            causal_entries,
            abbreviations,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

fn codeset(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}
