//! Service-mode logging bootstrap.
//!
//! Lives in its own test binary: installing the global subscriber is a
//! once-per-process operation, so this must not share a process with other
//! tests that might initialise logging.

use raildiag::logging;

#[test]
fn service_mode_writes_a_rotated_log_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let logs_dir = dir.path().join("logs");

    let guard = logging::init_service(&logs_dir, "info").expect("logging init");
    tracing::info!(component = "raildiag", "service logging smoke line");
    // Dropping the guard flushes the non-blocking writer.
    drop(guard);

    let names: Vec<String> = std::fs::read_dir(&logs_dir)
        .expect("logs directory exists")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        names.iter().any(|name| name.starts_with("raildiag.log")),
        "no rotated log file among {names:?}"
    );
}
