//! Integration tests that run the tracelink binary

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn tracelink_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tracelink"))
}

fn fixtures_dir() -> &'static Path {
    Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../tracelink-core/tests/fixtures"
    ))
}

fn fixture(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Run against the fixture tree with an empty config, so nothing from the
/// surrounding checkout leaks in
fn run_report(temp: &Path, extra: &[&str]) -> Output {
    tracelink_bin()
        .arg("-c")
        .arg(temp.join("config.yaml"))
        .arg("report")
        .arg("--requirements")
        .arg(fixture("requirements"))
        .arg("--tests")
        .arg(fixture("tests"))
        .args(extra)
        .output()
        .expect("Failed to run tracelink")
}

#[test]
fn test_report_markdown_to_file() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("reports/traceability.md");
    let results = fixture("results/LastTest.log");

    let output = run_report(
        temp.path(),
        &[
            "--results",
            results.to_str().unwrap(),
            "--format",
            "markdown",
            "--output",
            out.to_str().unwrap(),
        ],
    );
    assert!(
        output.status.success(),
        "report should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let content = std::fs::read_to_string(&out).expect("report file should exist");
    assert!(content.contains("**Requirement Coverage**: **80.0%** ✅"));
    assert!(content.contains("### STR-CORE-002"));
    assert!(content.contains("## Requirements Needing Attention"));
    assert!(
        !content.contains("STR-EXTS-009"),
        "P2 requirements are outside the default filter"
    );
}

#[test]
fn test_check_below_threshold_exits_one() {
    let temp = tempfile::tempdir().unwrap();
    let results = fixture("results/LastTest.log");

    let output = run_report(
        temp.path(),
        &[
            "--results",
            results.to_str().unwrap(),
            "--threshold",
            "90",
            "--check",
        ],
    );
    assert_eq!(output.status.code(), Some(1));

    // Without --check the verdict doesn't change the exit status
    let output = run_report(
        temp.path(),
        &["--results", results.to_str().unwrap(), "--threshold", "90"],
    );
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_no_requirements_exits_two() {
    let temp = tempfile::tempdir().unwrap();
    let empty = temp.path().join("empty");
    std::fs::create_dir_all(&empty).unwrap();

    let output = tracelink_bin()
        .arg("-c")
        .arg(temp.path().join("config.yaml"))
        .arg("report")
        .arg("--requirements")
        .arg(&empty)
        .output()
        .expect("Failed to run tracelink");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No requirements found"), "stderr: {}", stderr);
}

#[test]
fn test_json_report_from_ctest_xml() {
    let temp = tempfile::tempdir().unwrap();
    let results = fixture("results/Test.xml");

    let output = run_report(
        temp.path(),
        &["--results", results.to_str().unwrap(), "--format", "json"],
    );
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"coverage_percent\""));
    assert!(stdout.contains("\"STR-CORE-404\""), "dangling annotation listed");
    assert!(stdout.contains("\"ADR-SYNC-007\""), "orphan listed");
}

#[test]
fn test_index_command() {
    let temp = tempfile::tempdir().unwrap();

    let output = tracelink_bin()
        .arg("-c")
        .arg(temp.path().join("config.yaml"))
        .arg("index")
        .arg("--requirements")
        .arg(fixture("requirements"))
        .arg("--tests")
        .arg(fixture("tests"))
        .output()
        .expect("Failed to run tracelink");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"REQ-F-001\""));
    assert!(stdout.contains("\"STR-EXTS-009\""));
    assert!(stdout.contains("\"STR-CORE-003\""));
    assert!(stdout.contains("\"ADR-SYNC-007\""));
    assert!(stdout.contains("\"TEST-UNIT-OFFSET-CALC\""));
    assert!(stdout.contains("\"test-source\""));
}

#[test]
fn test_roots_from_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let config = temp.path().join("config.yaml");
    std::fs::write(
        &config,
        format!(
            "requirements:\n  - \"{}\"\ntests:\n  - \"{}\"\nresults: \"{}\"\npriorities: [P0]\n",
            fixture("requirements").display(),
            fixture("tests").display(),
            fixture("results/LastTest.log").display(),
        ),
    )
    .unwrap();

    let output = tracelink_bin()
        .arg("-c")
        .arg(&config)
        .arg("--format")
        .arg("markdown")
        .output()
        .expect("Failed to run tracelink");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("**Total Requirements**: 2"));
    assert!(stdout.contains("**Requirement Coverage**: **100.0%** ✅"));
}
