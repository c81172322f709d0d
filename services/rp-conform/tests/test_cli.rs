#[cfg(not(miri))]
use std::process::Command;

#[cfg(not(miri))]
fn rp_conform() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rp-conform"))
}

#[test]
#[cfg(not(miri))] // Skip under miri - process spawning not supported
fn test_cli_help() {
    let output = rp_conform()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ASCOM Alpaca conformance checker"));
    assert!(stdout.contains("--device-type"));
    assert!(stdout.contains("--simulate"));
    assert!(stdout.contains("--report"));
}

#[test]
#[cfg(not(miri))]
fn test_cli_missing_config_file() {
    let output = rp_conform()
        .args(["--config", "/nonexistent/rp-conform.json"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
#[cfg(not(miri))]
fn test_cli_simulated_filter_wheel_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let report_path = dir.path().join("report.json");
    std::fs::write(
        &config_path,
        r#"{
            "general": { "poll_interval": "10ms" },
            "simulator": { "filter_move_duration": "20ms" }
        }"#,
    )
    .unwrap();

    let output = rp_conform()
        .arg("--config")
        .arg(&config_path)
        .args([
            "--device-type",
            "filter-wheel",
            "--simulate",
            "--log-level",
            "warn",
        ])
        .arg("--report")
        .arg(&report_path)
        .output()
        .expect("Failed to execute command");

    assert!(
        output.status.success(),
        "stdout: {} stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No issues found!"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["cancelled"], false);
    assert!(report["entries"].as_array().is_some_and(|e| !e.is_empty()));
}
