//! raildiag: signal classification and causal diagnostics for rail
//! vehicle telemetry.
//!
//! The engine ingests telemetry signal records (signal code, free-text
//! description, wagon/line metadata), classifies each signal along several
//! independent taxonomies, reasons about plausible root causes and
//! downstream effects of observed faults, and folds a whole snapshot into
//! a system-health verdict. Acquisition, persistence and rendering are the
//! calling layer's business; the engine is pure in-memory computation over
//! an immutable [`catalog::PatternCatalog`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod catalog;
pub mod causal;
pub mod classifier;
pub mod config;
pub mod health;
pub mod logging;
pub mod source;
pub mod types;
