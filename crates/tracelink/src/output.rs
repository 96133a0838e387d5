//! Output formatting for traceability reports

use eyre::Result;
use facet::Facet;
use owo_colors::OwoColorize;
use tracelink_core::{
    Catalog, CoverageReport, OccurrenceKind, Outcome, RequirementCoverage, Status, Verdict,
};

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(format!(
                "unknown format '{}' (expected text, json or markdown)",
                other
            )),
        }
    }
}

/// Render a coverage report in the specified format
pub fn render_report(
    report: &CoverageReport,
    format: OutputFormat,
    verbose: bool,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report, verbose)),
        OutputFormat::Json => render_json(report),
        OutputFormat::Markdown => Ok(render_markdown(report)),
    }
}

fn colored_percent(percent: f64) -> String {
    let percent_str = format!("{:.1}%", percent);
    if percent >= 80.0 {
        percent_str.green().to_string()
    } else if percent >= 50.0 {
        percent_str.yellow().to_string()
    } else {
        percent_str.red().to_string()
    }
}

fn colored_status(status: Status) -> String {
    match status {
        Status::Passing => status.as_str().green().to_string(),
        Status::Partial => status.as_str().yellow().to_string(),
        Status::Failing => status.as_str().red().to_string(),
        Status::NoTests => status.as_str().dimmed().to_string(),
    }
}

fn render_text(report: &CoverageReport, verbose: bool) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!(
        "{} {} Traceability Report\n",
        "##".bold(),
        "Requirements".cyan().bold()
    ));
    output.push('\n');

    let verdict = match report.verdict() {
        Verdict::Pass => "PASS".green().bold().to_string(),
        Verdict::Fail => "FAIL".red().bold().to_string(),
    };
    output.push_str(&format!(
        "Coverage: {} ({}/{} requirements tested, threshold {}%) {}\n",
        colored_percent(report.coverage_percent()),
        report.tested,
        report.total(),
        report.threshold,
        verdict
    ));

    let breakdown: Vec<String> = Status::ALL
        .iter()
        .map(|status| format!("{} {}", report.breakdown.count(*status), status))
        .collect();
    output.push_str(&format!("  Status: {}\n", breakdown.join(", ").dimmed()));
    if report.excluded > 0 {
        output.push_str(&format!(
            "  {}\n",
            format!("{} requirements outside the priority filter", report.excluded).dimmed()
        ));
    }
    output.push('\n');

    // Per-requirement lines
    for entry in &report.requirements {
        let req = &entry.requirement;
        output.push_str(&format!(
            "  {} {} {} ({}) {}\n",
            req.id.as_str().green(),
            req.priority.to_string().dimmed(),
            req.title,
            colored_status(entry.status),
            format!(
                "{}/{} passing",
                entry.tests.passing.len(),
                entry.tests.test_cases.len()
            )
            .dimmed()
        ));
        if verbose {
            output.push_str(&format!(
                "      {}\n",
                req.defined_at.to_string().dimmed()
            ));
            for test in &entry.tests.test_cases {
                let mark = match entry.tests.outcome_of(test) {
                    Some(Outcome::Passed) => "+".green().to_string(),
                    Some(Outcome::Failed) => "x".red().to_string(),
                    None => "?".yellow().to_string(),
                };
                output.push_str(&format!("      {} {}\n", mark, test));
            }
        }
    }
    output.push('\n');

    let attention: Vec<&RequirementCoverage> = report.needs_attention().collect();
    if !attention.is_empty() {
        output.push_str(&format!(
            "{} Needs Attention ({}):\n",
            "?".yellow().bold(),
            attention.len()
        ));
        for entry in attention {
            output.push_str(&format!(
                "  {} {} ({}): {}\n",
                "-".yellow(),
                entry.requirement.id.as_str(),
                entry.requirement.priority,
                entry.requirement.title
            ));
        }
        output.push('\n');
    }

    if !report.conflicts.is_empty() {
        output.push_str(&format!(
            "{} Duplicate Definitions ({}):\n",
            "!".red().bold(),
            report.conflicts.len()
        ));
        for conflict in &report.conflicts {
            output.push_str(&format!(
                "  {} {} kept at {}\n",
                "-".red(),
                conflict.id.as_str().yellow(),
                conflict.canonical
            ));
            for duplicate in &conflict.duplicates {
                output.push_str(&format!("      also {}\n", duplicate.to_string().dimmed()));
            }
        }
        output.push('\n');
    }

    if !report.orphans.is_empty() {
        output.push_str(&format!(
            "{} Referenced But Never Defined ({}):\n",
            "?".yellow().bold(),
            report.orphans.len()
        ));
        for orphan in &report.orphans {
            output.push_str(&format!(
                "  {} {} first seen at {}\n",
                "-".yellow(),
                orphan.id.as_str(),
                orphan.first_seen.to_string().dimmed()
            ));
        }
        output.push('\n');
    }

    if !report.dangling.is_empty() {
        output.push_str(&format!(
            "{} Unknown Requirements In Annotations ({}):\n",
            "!".red().bold(),
            report.dangling.len()
        ));
        for dangling in &report.dangling {
            output.push_str(&format!(
                "  {} {} - unknown requirement {}\n",
                "-".red(),
                dangling.test,
                dangling.id.as_str().yellow()
            ));
        }
        output.push('\n');
    }

    if !report.unresolved.is_empty() {
        output.push_str(&format!(
            "{} Tests Without Results ({}):\n",
            "?".yellow().bold(),
            report.unresolved.len()
        ));
        for test in &report.unresolved {
            output.push_str(&format!("  {} {}\n", "-".yellow(), test.to_string().dimmed()));
        }
        output.push('\n');
    }

    output
}

#[derive(Facet)]
struct JsonReport {
    coverage_percent: f64,
    threshold: f64,
    verdict: String,
    total_requirements: usize,
    tested_requirements: usize,
    excluded_requirements: usize,
    breakdown: JsonBreakdown,
    requirements: Vec<JsonRequirement>,
    needs_attention: Vec<String>,
    conflicts: Vec<JsonConflict>,
    orphans: Vec<JsonOrphan>,
    dangling: Vec<JsonDangling>,
    unresolved_tests: Vec<String>,
}

#[derive(Facet)]
struct JsonBreakdown {
    passing: usize,
    partial: usize,
    no_tests: usize,
    failing: usize,
}

#[derive(Facet)]
struct JsonRequirement {
    id: String,
    title: String,
    priority: String,
    status: String,
    coverage: f64,
    defined_at: String,
    acceptance_criteria: Vec<String>,
    tests: Vec<JsonTest>,
}

#[derive(Facet)]
struct JsonTest {
    id: String,
    outcome: String,
}

#[derive(Facet)]
struct JsonConflict {
    id: String,
    canonical: String,
    duplicates: Vec<String>,
}

#[derive(Facet)]
struct JsonOrphan {
    id: String,
    first_seen: String,
}

#[derive(Facet)]
struct JsonDangling {
    test: String,
    id: String,
}

fn outcome_label(outcome: Option<Outcome>) -> &'static str {
    match outcome {
        Some(Outcome::Passed) => "passed",
        Some(Outcome::Failed) => "failed",
        None => "unresolved",
    }
}

fn render_json(report: &CoverageReport) -> Result<String> {
    let json_report = JsonReport {
        coverage_percent: report.coverage_percent(),
        threshold: report.threshold,
        verdict: match report.verdict() {
            Verdict::Pass => "pass".to_string(),
            Verdict::Fail => "fail".to_string(),
        },
        total_requirements: report.total(),
        tested_requirements: report.tested,
        excluded_requirements: report.excluded,
        breakdown: JsonBreakdown {
            passing: report.breakdown.passing,
            partial: report.breakdown.partial,
            no_tests: report.breakdown.no_tests,
            failing: report.breakdown.failing,
        },
        requirements: report
            .requirements
            .iter()
            .map(|entry| JsonRequirement {
                id: entry.requirement.id.to_string(),
                title: entry.requirement.title.clone(),
                priority: entry.requirement.priority.to_string(),
                status: entry.status.as_str().to_string(),
                coverage: entry.coverage,
                defined_at: entry.requirement.defined_at.to_string(),
                acceptance_criteria: entry.requirement.acceptance_criteria.clone(),
                tests: entry
                    .tests
                    .test_cases
                    .iter()
                    .map(|test| JsonTest {
                        id: test.clone(),
                        outcome: outcome_label(entry.tests.outcome_of(test)).to_string(),
                    })
                    .collect(),
            })
            .collect(),
        needs_attention: report
            .needs_attention()
            .map(|entry| entry.requirement.id.to_string())
            .collect(),
        conflicts: report
            .conflicts
            .iter()
            .map(|c| JsonConflict {
                id: c.id.to_string(),
                canonical: c.canonical.to_string(),
                duplicates: c.duplicates.iter().map(ToString::to_string).collect(),
            })
            .collect(),
        orphans: report
            .orphans
            .iter()
            .map(|o| JsonOrphan {
                id: o.id.to_string(),
                first_seen: o.first_seen.to_string(),
            })
            .collect(),
        dangling: report
            .dangling
            .iter()
            .map(|d| JsonDangling {
                test: d.test.to_string(),
                id: d.id.to_string(),
            })
            .collect(),
        unresolved_tests: report.unresolved.iter().map(ToString::to_string).collect(),
    };

    facet_json::to_string_pretty(&json_report)
        .map_err(|e| eyre::eyre!("JSON serialization failed: {}", e))
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Passing => "✅ PASSING",
        Status::Partial => "⚠️ PARTIAL",
        Status::NoTests => "📋 NO TESTS",
        Status::Failing => "❌ FAILING",
    }
}

fn render_markdown(report: &CoverageReport) -> String {
    let mut output = String::new();
    let total = report.total();
    let percent = report.coverage_percent();
    let mark = match report.verdict() {
        Verdict::Pass => "✅",
        Verdict::Fail => "❌",
    };

    output.push_str("# Requirements to Test Cases Traceability Report\n\n");
    output.push_str("## Summary Statistics\n\n");
    output.push_str("### Overall Coverage\n\n");
    output.push_str(&format!("**Total Requirements**: {}\n", total));
    output.push_str(&format!(
        "**Requirements with Passing Tests**: {}\n",
        report.tested
    ));
    output.push_str(&format!(
        "**Requirements without Passing Tests**: {}\n\n",
        total - report.tested
    ));
    output.push_str(&format!(
        "**Requirement Coverage**: **{:.1}%** {}\n",
        percent, mark
    ));
    output.push_str(&format!("**Threshold**: {}%\n\n", report.threshold));

    output.push_str("### Status Breakdown\n\n");
    output.push_str("| Status | Count | Percentage |\n");
    output.push_str("|--------|-------|------------|\n");
    for status in Status::ALL {
        let count = report.breakdown.count(status);
        let pct = if total > 0 {
            count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        output.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            status_label(status),
            count,
            pct
        ));
    }
    output.push('\n');

    output.push_str("## Requirements Detail\n\n");
    for entry in &report.requirements {
        let req = &entry.requirement;
        output.push_str(&format!(
            "### {}: {} ({})\n\n",
            req.id, req.title, req.priority
        ));

        output.push_str("**Acceptance Criteria**:\n\n");
        for criterion in &req.acceptance_criteria {
            output.push_str(&format!("- {}\n", criterion));
        }
        output.push('\n');

        output.push_str(&format!(
            "**Linked Test Cases**: {} tests ({} passing, {} failing)\n\n",
            entry.tests.test_cases.len(),
            entry.tests.passing.len(),
            entry.tests.failing.len()
        ));
        output.push_str("| Test Case | Status |\n");
        output.push_str("|-----------|--------|\n");
        if entry.tests.test_cases.is_empty() {
            output.push_str("| *(no tests)* | 📋 |\n");
        }
        for test in &entry.tests.test_cases {
            let mark = match entry.tests.outcome_of(test) {
                Some(Outcome::Passed) => "✅",
                Some(Outcome::Failed) => "❌",
                None => "⚠️",
            };
            output.push_str(&format!("| `{}` | {} |\n", test, mark));
        }
        output.push('\n');

        output.push_str(&format!("**Coverage**: {:.0}%\n", entry.coverage));
        output.push_str(&format!("**Status**: {}\n\n", status_label(entry.status)));
        output.push_str("---\n\n");
    }

    let attention: Vec<&RequirementCoverage> = report.needs_attention().collect();
    if !attention.is_empty() {
        output.push_str("## Requirements Needing Attention\n\n");
        for (i, entry) in attention.iter().enumerate() {
            output.push_str(&format!(
                "{}. **{}** ({}): {}\n",
                i + 1,
                entry.requirement.id,
                entry.requirement.priority,
                entry.requirement.title
            ));
        }
        output.push('\n');
    }

    if !report.conflicts.is_empty() {
        output.push_str("## Duplicate Definitions\n\n");
        for conflict in &report.conflicts {
            output.push_str(&format!(
                "- `{}` kept at `{}` ({} duplicates)\n",
                conflict.id,
                conflict.canonical,
                conflict.count()
            ));
        }
        output.push('\n');
    }

    if !report.dangling.is_empty() {
        output.push_str("## Unknown Requirements In Annotations\n\n");
        for dangling in &report.dangling {
            output.push_str(&format!("- `{}` names `{}`\n", dangling.test, dangling.id));
        }
        output.push('\n');
    }

    output
}

#[derive(Facet)]
struct JsonIndex {
    requirements: Vec<JsonIndexEntry>,
    test_cases: Vec<JsonTestCase>,
    conflicts: Vec<JsonConflict>,
    orphans: Vec<JsonIndexOrphan>,
}

#[derive(Facet)]
struct JsonIndexEntry {
    id: String,
    title: String,
    priority: String,
    category: String,
    defined_at: String,
    acceptance_criteria: Vec<String>,
    referenced_from: Vec<String>,
    references: Vec<String>,
    hash: String,
    source_type: String,
}

#[derive(Facet)]
struct JsonTestCase {
    id: String,
    title: String,
    file: String,
    references: Vec<String>,
    hash: String,
    source_type: String,
}

#[derive(Facet)]
struct JsonIndexOrphan {
    id: String,
    first_seen: String,
    source_type: String,
}

/// Source type of index entries found in test sources
const TEST_SOURCE: &str = "test-source";

/// Render the definition index
pub fn render_index(catalog: &Catalog, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let index = JsonIndex {
                requirements: catalog
                    .iter()
                    .map(|r| JsonIndexEntry {
                        id: r.id.to_string(),
                        title: r.title.clone(),
                        priority: r.priority.to_string(),
                        category: r.category().to_string(),
                        defined_at: r.defined_at.to_string(),
                        acceptance_criteria: r.acceptance_criteria.clone(),
                        referenced_from: r
                            .referenced_from
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect(),
                        references: r.references.iter().map(ToString::to_string).collect(),
                        hash: r.hash.clone(),
                        source_type: OccurrenceKind::Definition.to_string(),
                    })
                    .collect(),
                test_cases: catalog
                    .test_cases()
                    .iter()
                    .map(|c| JsonTestCase {
                        id: c.id.clone(),
                        title: c.title.clone(),
                        file: c.file.display().to_string(),
                        references: c.references.iter().map(ToString::to_string).collect(),
                        hash: c.hash.clone(),
                        source_type: TEST_SOURCE.to_string(),
                    })
                    .collect(),
                conflicts: catalog
                    .conflicts()
                    .iter()
                    .map(|c| JsonConflict {
                        id: c.id.to_string(),
                        canonical: c.canonical.to_string(),
                        duplicates: c.duplicates.iter().map(ToString::to_string).collect(),
                    })
                    .collect(),
                orphans: catalog
                    .orphans()
                    .iter()
                    .map(|o| JsonIndexOrphan {
                        id: o.id.to_string(),
                        first_seen: o.first_seen.to_string(),
                        source_type: OccurrenceKind::Reference.to_string(),
                    })
                    .collect(),
            };
            facet_json::to_string_pretty(&index)
                .map_err(|e| eyre::eyre!("JSON serialization failed: {}", e))
        }
        OutputFormat::Markdown => {
            let mut output = String::from("| ID | Priority | Title | Defined At |\n");
            output.push_str("|----|----------|-------|------------|\n");
            for r in catalog.iter() {
                output.push_str(&format!(
                    "| `{}` | {} | {} | `{}` |\n",
                    r.id, r.priority, r.title, r.defined_at
                ));
            }
            for c in catalog.test_cases() {
                output.push_str(&format!(
                    "| `{}` | - | {} | `{}` |\n",
                    c.id,
                    c.title,
                    c.file.display()
                ));
            }
            Ok(output)
        }
        OutputFormat::Text => {
            let mut output = String::new();
            for r in catalog.iter() {
                output.push_str(&format!(
                    "{} {} {} {}\n",
                    r.id.as_str().green(),
                    r.priority.to_string().dimmed(),
                    r.title,
                    r.defined_at.to_string().dimmed()
                ));
            }
            for c in catalog.test_cases() {
                output.push_str(&format!(
                    "{} {} {}\n",
                    c.id.as_str().cyan(),
                    c.title,
                    c.file.display().to_string().dimmed()
                ));
            }
            for conflict in catalog.conflicts() {
                output.push_str(&format!(
                    "{} {} defined {} times, kept {}\n",
                    "!".red().bold(),
                    conflict.id.as_str().yellow(),
                    conflict.count() + 1,
                    conflict.canonical
                ));
            }
            for orphan in catalog.orphans() {
                output.push_str(&format!(
                    "{} {} never defined, first seen {}\n",
                    "?".yellow().bold(),
                    orphan.id,
                    orphan.first_seen
                ));
            }
            Ok(output)
        }
    }
}
