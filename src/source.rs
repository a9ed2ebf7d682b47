//! The narrow capability the external layer supplies to the engine.
//!
//! The engine never introspects its collaborators: anything that can hand
//! over a list of signal records is a [`SignalSource`]. File parsing lives
//! here as collaborator-side glue (the CLI uses it); the classification and
//! causal logic never touch the filesystem.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;

use crate::types::SignalRecord;

/// A supplier of the current telemetry snapshot.
pub trait SignalSource {
    /// The signal records currently known to the collaborator.
    fn list_signals(&self) -> Vec<SignalRecord>;
}

/// An in-memory snapshot, used by tests and the CLI.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<SignalRecord>,
}

impl StaticSource {
    /// Wrap an already-loaded record list.
    pub fn new(records: Vec<SignalRecord>) -> Self {
        Self { records }
    }
}

impl SignalSource for StaticSource {
    fn list_signals(&self) -> Vec<SignalRecord> {
        self.records.clone()
    }
}

/// Load a snapshot from a JSON file containing an array of records.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON array of
/// signal records.
pub fn load_snapshot(path: &Path) -> anyhow::Result<Vec<SignalRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let records: Vec<SignalRecord> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
    tracing::info!(path = %path.display(), records = records.len(), "snapshot loaded");
    Ok(records)
}

/// The set of signal codes present in a snapshot (the analyzer's notion of
/// "presence").
pub fn code_set(records: &[SignalRecord]) -> BTreeSet<String> {
    records
        .iter()
        .map(|record| record.signal_code.clone())
        .collect()
}
