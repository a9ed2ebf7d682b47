//! CLI smoke tests: argument wiring and output shape, not engine logic.

use std::io::Write;

use assert_cmd::Command;

fn snapshot_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write snapshot");
    file
}

#[test]
fn classify_prints_taxonomies() {
    let output = Command::cargo_bin("raildiag")
        .expect("binary builds")
        .args(["classify", "B_BCU_FAULT"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(stdout.contains("HIGH"));
    assert!(stdout.contains("BRAKES"));
    assert!(stdout.contains("BCU"));
}

#[test]
fn classify_json_is_machine_readable() {
    let output = Command::cargo_bin("raildiag")
        .expect("binary builds")
        .args(["classify", "B_EMERGENCY_BRAKING", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(parsed["criticality"], "CRITICAL");
    assert_eq!(parsed["system"], "BRAKES");
}

#[test]
fn health_reports_critical_snapshot() {
    let snapshot = snapshot_file(
        r#"[
            {"signal_code": "B_EMERGENCY_BRAKING"},
            {"signal_code": "B_DOOR_CLOSED", "wagon": 3},
            {"signal_code": "W_SPEED_KPH", "description": "line speed"}
        ]"#,
    );

    let output = Command::cargo_bin("raildiag")
        .expect("binary builds")
        .args(["health", "--json", "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(parsed["overall_status"], "critical");
    assert_eq!(parsed["critical_faults"][0], "B_EMERGENCY_BRAKING");
}

#[test]
fn diagnose_defaults_to_severe_signals() {
    let snapshot = snapshot_file(
        r#"[
            {"signal_code": "F_R_PRESSURE_MPA"},
            {"signal_code": "B_BCU_FAULT"},
            {"signal_code": "B_EMERGENCY_BRAKING"}
        ]"#,
    );

    let output = Command::cargo_bin("raildiag")
        .expect("binary builds")
        .args(["diagnose", "--json", "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let results = parsed.as_array().expect("array of results");
    // F_R_PRESSURE_MPA is only MEDIUM; the two faults are diagnosed.
    assert_eq!(results.len(), 2);
}

#[test]
fn explicit_fault_codes_are_honored() {
    let snapshot = snapshot_file(
        r#"[
            {"signal_code": "F_R_PRESSURE_MPA"},
            {"signal_code": "B_BCU_FAULT"},
            {"signal_code": "B_EMERGENCY_BRAKING"}
        ]"#,
    );

    let output = Command::cargo_bin("raildiag")
        .expect("binary builds")
        .args(["diagnose", "--json", "--fault", "F_R_PRESSURE_MPA", "--snapshot"])
        .arg(snapshot.path())
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let results = parsed.as_array().expect("array of results");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["signal_code"], "F_R_PRESSURE_MPA");
    assert_eq!(results[0]["causal_chains"][0]["chain_id"], "brake_pressure_loss");
}

#[test]
fn custom_catalog_is_loaded() {
    let mut catalog = tempfile::NamedTempFile::new().expect("temp file");
    catalog
        .write_all(
            br#"
[criticality]
emergency = ["METEOR"]

[[subsystems]]
system = "POWER"
patterns = ["METEOR"]

[[functions]]
name = "faults"
patterns = ["METEOR"]
"#,
        )
        .expect("write catalog");

    let output = Command::cargo_bin("raildiag")
        .expect("binary builds")
        .args(["classify", "B_METEOR_STRIKE", "--json", "--catalog"])
        .arg(catalog.path())
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(parsed["criticality"], "CRITICAL");
    assert_eq!(parsed["system"], "POWER");
}

#[test]
fn missing_snapshot_fails_with_context() {
    Command::cargo_bin("raildiag")
        .expect("binary builds")
        .args(["health", "--snapshot", "/nonexistent/snapshot.json"])
        .assert()
        .failure();
}
