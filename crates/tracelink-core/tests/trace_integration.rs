//! Integration tests running the whole pipeline over the fixture tree
#![cfg(feature = "walk")]

use std::path::{Path, PathBuf};
use tracelink_core::pipeline::{TraceInputs, run, scan_catalog};
use tracelink_core::{CoverageOptions, MatchConfidence, Priority, ResultFormat, Status, Verdict};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn fixture_path(name: &str) -> PathBuf {
    Path::new(FIXTURES_DIR).join(name)
}

fn inputs(results: &str) -> TraceInputs {
    TraceInputs {
        requirements: vec![fixture_path("requirements")],
        tests: vec![fixture_path("tests")],
        results: Some(fixture_path(results)),
        ..Default::default()
    }
}

#[test]
fn test_catalog_from_fixtures() {
    let (catalog, warnings) = scan_catalog(&inputs("results/LastTest.log")).unwrap();
    assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);

    let ids: Vec<&str> = catalog.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "REQ-F-001",
            "REQ-F-002",
            "STR-CORE-001",
            "STR-CORE-002",
            "STR-CORE-003",
            "STR-EXTS-009"
        ],
        "templates and READMEs must not contribute definitions"
    );

    let sync = catalog.get("STR-CORE-001").unwrap();
    assert_eq!(sync.title, "Time synchronization accuracy");
    assert_eq!(sync.priority, Priority(0));
    assert_eq!(sync.acceptance_criteria.len(), 2);
    assert_eq!(sync.defined_at.line, 8);

    let bmca = catalog.get("STR-CORE-002").unwrap();
    assert_eq!(
        bmca.acceptance_criteria,
        [
            "Given two candidate grandmasters",
            "When announce messages arrive",
            "Then the better clock is selected"
        ]
    );

    // Front matter and heading describe the same definition
    let offset = catalog.get("REQ-F-001").unwrap();
    assert_eq!(offset.title, "Offset calculation");
    assert_eq!(offset.defined_at.line, 2);
    assert_eq!(offset.acceptance_criteria.len(), 1);

    // The canonical STR-CORE-003 lives in the top-level directory
    let recovery = catalog.get("STR-CORE-003").unwrap();
    assert_eq!(recovery.priority, Priority(1));
    assert_eq!(catalog.conflicts().len(), 1);
    assert_eq!(catalog.conflicts()[0].count(), 1);

    let orphans: Vec<&str> = catalog.orphans().iter().map(|o| o.id.as_str()).collect();
    assert_eq!(orphans, ["ADR-SYNC-007"]);

    // Outgoing references stay within the defining section
    let offset_refs: Vec<&str> = offset.references.iter().map(|id| id.as_str()).collect();
    assert_eq!(offset_refs, ["STR-CORE-001"]);

    let cases = catalog.test_cases();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].id, "TEST-UNIT-OFFSET-CALC");
    assert_eq!(cases[0].title, "test_offset");
    let case_refs: Vec<&str> = cases[0].references.iter().map(|id| id.as_str()).collect();
    assert_eq!(case_refs, ["REQ-F-001", "STR-CORE-001", "STR-CORE-404"]);
}

#[test]
fn test_report_from_block_log() {
    let trace = run(&inputs("results/LastTest.log"), &CoverageOptions::default()).unwrap();
    assert_eq!(trace.results.format, Some(ResultFormat::Block));

    let report = &trace.report;
    assert_eq!(report.total(), 5);
    assert_eq!(report.excluded, 1);
    assert_eq!(report.tested, 4);
    assert_eq!(report.coverage_percent(), 80.0);
    assert_eq!(report.verdict(), Verdict::Pass);

    assert_eq!(report.breakdown.passing, 3);
    assert_eq!(report.breakdown.partial, 1);
    assert_eq!(report.breakdown.failing, 1);
    assert_eq!(report.breakdown.no_tests, 0);

    let sync = report
        .requirements
        .iter()
        .find(|r| r.requirement.id.as_str() == "STR-CORE-001")
        .unwrap();
    assert_eq!(sync.status, Status::Partial);
    assert_eq!(sync.coverage, 50.0);
    assert!(
        sync.tests
            .test_cases
            .contains("tests/test_offset.cpp::OffsetTest::NegativeDelay")
    );

    let attention: Vec<&str> = report
        .needs_attention()
        .map(|r| r.requirement.id.as_str())
        .collect();
    assert_eq!(attention, ["STR-CORE-003"]);

    assert_eq!(report.dangling.len(), 1);
    assert_eq!(report.dangling[0].id.as_str(), "STR-CORE-404");
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].name, "test_unknown_requirement");
}

#[test]
fn test_file_level_annotation_links_by_stem() {
    let trace = run(&inputs("results/LastTest.log"), &CoverageOptions::default()).unwrap();
    let link = trace
        .links
        .links
        .iter()
        .find(|l| l.file_level)
        .expect("test_bmca_select.cpp has no declaration");
    assert_eq!(link.test.name, "bmca_select");
    assert_eq!(link.resolution.confidence, MatchConfidence::Exact);
    assert_eq!(link.resolution.matched, ["bmca_selection_suite"]);
}

#[test]
fn test_report_from_ctest_xml() {
    let trace = run(&inputs("results/Test.xml"), &CoverageOptions::default()).unwrap();
    assert_eq!(trace.results.format, Some(ResultFormat::Structured));
    assert_eq!(trace.results.passing.len(), 3);
    assert_eq!(trace.results.failing.len(), 1);
    assert_eq!(trace.report.breakdown.passing, 4);
    assert_eq!(trace.report.breakdown.failing, 1);
}

#[test]
fn test_missing_results_degrades_to_zero() {
    let trace = run(&inputs("results/missing.xml"), &CoverageOptions::default()).unwrap();
    assert!(trace.results.is_empty());
    assert_eq!(trace.warnings.len(), 1);
    assert_eq!(trace.report.tested, 0);
    assert_eq!(trace.report.coverage_percent(), 0.0);
    assert_eq!(trace.report.verdict(), Verdict::Fail);
}

#[test]
fn test_priority_filter_is_configurable() {
    let options = CoverageOptions {
        priorities: [Priority(0)].into_iter().collect(),
        threshold: 100.0,
    };
    let trace = run(&inputs("results/LastTest.log"), &options).unwrap();
    assert_eq!(trace.report.total(), 2);
    assert_eq!(trace.report.coverage_percent(), 100.0);
    assert!(trace.report.is_passing(100.0));
}
