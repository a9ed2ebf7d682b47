#![allow(missing_docs)]

//! raildiag CLI: presentation glue around the classification and
//! diagnostic engine.
//!
//! Reads a JSON snapshot of signal records, runs the requested analysis,
//! and prints human-readable text or JSON. No classification or causal
//! logic lives here.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use raildiag::catalog::PatternCatalog;
use raildiag::causal::CausalAnalyzer;
use raildiag::classifier::Classifier;
use raildiag::config::RaildiagConfig;
use raildiag::health::HealthAggregator;
use raildiag::source::{code_set, load_snapshot};
use raildiag::types::{Criticality, DiagnosticResult, HealthReport, SignalRecord};

#[derive(Parser)]
#[command(name = "raildiag", version, about = "Rail telemetry signal diagnostics")]
struct Cli {
    /// Path to a TOML pattern catalog (default: built-in catalog).
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Emit machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single signal code.
    Classify {
        /// Signal code, e.g. B_BCU_FAULT.
        code: String,
        /// Free-text description accompanying the signal.
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Diagnose faulted signals against a snapshot.
    Diagnose {
        /// JSON snapshot file (array of signal records).
        #[arg(long)]
        snapshot: PathBuf,
        /// Fault codes to diagnose. Defaults to every HIGH/CRITICAL signal
        /// in the snapshot.
        #[arg(long = "fault")]
        faults: Vec<String>,
    },
    /// Aggregate a snapshot into a system health report.
    Health {
        /// JSON snapshot file (array of signal records).
        #[arg(long)]
        snapshot: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = RaildiagConfig::load().context("failed to load configuration")?;
    raildiag::logging::init_cli(&config.logging.level);

    let catalog = resolve_catalog(&cli, &config)?;
    let classifier = Arc::new(
        Classifier::new(Arc::new(catalog), config.engine.classifier_cache_capacity)
            .context("failed to build classifier")?,
    );

    match cli.command {
        Command::Classify { code, description } => {
            let classification = classifier.classify(&code, &description);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&classification)?);
            } else {
                print_classification(&classification);
            }
        }
        Command::Diagnose { snapshot, faults } => {
            let records = load_snapshot(&snapshot)?;
            let analyzer =
                CausalAnalyzer::new(Arc::clone(&classifier), config.engine.analyzer_cache_capacity);
            let results = run_diagnosis(&classifier, &analyzer, &records, &faults);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for result in &results {
                    print_diagnostic(result);
                }
            }
            info!(stats = ?analyzer.cache_stats(), "analyzer cache");
        }
        Command::Health { snapshot } => {
            let records = load_snapshot(&snapshot)?;
            let aggregator = HealthAggregator::new(Arc::clone(&classifier));
            let report = aggregator.analyze_system_health(&records, Utc::now());
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_health(&report);
            }
        }
    }

    info!(stats = ?classifier.cache_stats(), "classifier cache");
    Ok(())
}

/// Pick the catalog: `--catalog` flag, then config file path, then built-in.
fn resolve_catalog(cli: &Cli, config: &RaildiagConfig) -> Result<PatternCatalog> {
    let path = cli
        .catalog
        .clone()
        .or_else(|| config.catalog.path.as_ref().map(PathBuf::from));
    match path {
        Some(p) => PatternCatalog::load_from_path(&p)
            .with_context(|| format!("failed to load catalog {}", p.display())),
        None => Ok(PatternCatalog::builtin()),
    }
}

/// Diagnose the requested faults, defaulting to all HIGH/CRITICAL signals.
fn run_diagnosis(
    classifier: &Classifier,
    analyzer: &CausalAnalyzer,
    records: &[SignalRecord],
    requested: &[String],
) -> Vec<DiagnosticResult> {
    let all_signals = code_set(records);

    let faults: Vec<SignalRecord> = if requested.is_empty() {
        records
            .iter()
            .filter(|record| {
                matches!(
                    classifier.classify_record(record).criticality,
                    Criticality::High | Criticality::Critical
                )
            })
            .cloned()
            .collect()
    } else {
        requested
            .iter()
            .map(|code| {
                records
                    .iter()
                    .find(|record| &record.signal_code == code)
                    .cloned()
                    .unwrap_or_else(|| SignalRecord::from_code(code.clone()))
            })
            .collect()
    };

    analyzer.analyze_fault_signals(&faults, &all_signals, Utc::now())
}

fn print_classification(classification: &raildiag::types::SignalClassification) {
    println!("signal:      {}", classification.signal_code);
    println!("criticality: {}", classification.criticality);
    println!("system:      {}", classification.system);
    println!("component:   {}", classification.component);
    println!("function:    {}", classification.function_type);
    match classification.wagon_number {
        Some(wagon) => println!("wagon:       {wagon}"),
        None => println!("wagon:       -"),
    }
    println!("train-level: {}", classification.is_train_level);
    println!("severity:    {}", classification.severity_score);
    if !classification.related_signals.is_empty() {
        println!("related:     {}", classification.related_signals.join(", "));
    }
}

fn print_diagnostic(result: &DiagnosticResult) {
    println!("== {} ==", result.signal_code);
    println!(
        "severity {} | confidence {:.2}",
        result.severity_assessment, result.confidence_score
    );
    if !result.possible_root_causes.is_empty() {
        println!("root causes: {}", result.possible_root_causes.join(", "));
    }
    if !result.potential_effects.is_empty() {
        println!("effects:     {}", result.potential_effects.join(", "));
    }
    for chain in &result.causal_chains {
        println!(
            "chain {} ({:.0}% coverage): {}",
            chain.chain_id,
            chain.confidence * 100.0,
            chain.description
        );
    }
    for recommendation in &result.recommendations {
        println!("  - {recommendation}");
    }
    if !result.related_faults.is_empty() {
        println!("related faults: {}", result.related_faults.join(", "));
    }
    println!();
}

fn print_health(report: &HealthReport) {
    println!("overall: {}", report.overall_status);
    for (system, health) in &report.systems_status {
        println!(
            "  {system}: {} ({} faults, {} critical)",
            health.status, health.fault_count, health.critical_count
        );
    }
    if !report.critical_faults.is_empty() {
        println!("critical faults: {}", report.critical_faults.join(", "));
    }
    for recommendation in &report.recommendations {
        println!("  - {recommendation}");
    }
}
