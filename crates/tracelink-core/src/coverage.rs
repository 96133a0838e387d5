//! Coverage aggregation and verdict

use crate::annotations::TestId;
use crate::catalog::{Catalog, Conflict, Orphan, Requirement};
use crate::grammar::Priority;
use crate::linking::{Dangling, Links, TestSets};
use facet::Facet;
use std::collections::BTreeSet;

/// Verification status of one requirement, derived from its test sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
#[repr(u8)]
pub enum Status {
    /// No test claims the requirement
    NoTests,
    /// Nothing failing (unresolved tests don't count against it)
    Passing,
    /// Some passing, some failing
    Partial,
    /// Failing, nothing passing
    Failing,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Passing,
        Status::Partial,
        Status::NoTests,
        Status::Failing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NoTests => "no-tests",
            Status::Passing => "passing",
            Status::Partial => "partial",
            Status::Failing => "failing",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the run met its coverage threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum Verdict {
    Pass,
    Fail,
}

/// What the aggregate counts, and what it must reach
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageOptions {
    /// Priorities included in the aggregate
    pub priorities: BTreeSet<Priority>,
    /// Minimum aggregate coverage, in percent
    pub threshold: f64,
}

impl CoverageOptions {
    pub const DEFAULT_THRESHOLD: f64 = 75.0;
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            priorities: [Priority(0), Priority(1)].into_iter().collect(),
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

/// One requirement with its linked tests
#[derive(Debug, Clone)]
pub struct RequirementCoverage {
    pub requirement: Requirement,
    pub tests: TestSets,
    pub status: Status,
    /// Share of linked tests passing, in percent
    pub coverage: f64,
}

impl RequirementCoverage {
    pub fn is_tested(&self) -> bool {
        self.tests.is_tested()
    }
}

/// Requirement count per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusBreakdown {
    pub passing: usize,
    pub partial: usize,
    pub no_tests: usize,
    pub failing: usize,
}

impl StatusBreakdown {
    pub fn count(&self, status: Status) -> usize {
        match status {
            Status::Passing => self.passing,
            Status::Partial => self.partial,
            Status::NoTests => self.no_tests,
            Status::Failing => self.failing,
        }
    }

    fn add(&mut self, status: Status) {
        match status {
            Status::Passing => self.passing += 1,
            Status::Partial => self.partial += 1,
            Status::NoTests => self.no_tests += 1,
            Status::Failing => self.failing += 1,
        }
    }
}

/// Traceability report model for one run
#[derive(Debug, Clone)]
pub struct CoverageReport {
    /// Requirements inside the priority filter, sorted by id
    pub requirements: Vec<RequirementCoverage>,
    /// Requirements left out by the priority filter
    pub excluded: usize,
    /// Requirements with at least one passing test
    pub tested: usize,
    pub breakdown: StatusBreakdown,
    pub threshold: f64,
    pub conflicts: Vec<Conflict>,
    pub orphans: Vec<Orphan>,
    pub dangling: Vec<Dangling>,
    /// Annotated tests that matched no result
    pub unresolved: Vec<TestId>,
}

impl CoverageReport {
    /// Aggregate coverage over the catalog
    pub fn compute(catalog: &Catalog, links: &Links, options: &CoverageOptions) -> Self {
        let mut requirements = Vec::new();
        let mut excluded = 0;
        let mut breakdown = StatusBreakdown::default();

        for requirement in catalog.iter() {
            if !options.priorities.contains(&requirement.priority) {
                excluded += 1;
                continue;
            }
            let tests = links.tests_for(requirement.id.as_str());
            let status = tests.status();
            breakdown.add(status);
            requirements.push(RequirementCoverage {
                requirement: requirement.clone(),
                coverage: tests.coverage(),
                tests,
                status,
            });
        }

        let tested = requirements.iter().filter(|r| r.is_tested()).count();

        CoverageReport {
            requirements,
            excluded,
            tested,
            breakdown,
            threshold: options.threshold,
            conflicts: catalog.conflicts().to_vec(),
            orphans: catalog.orphans().to_vec(),
            dangling: links.dangling.clone(),
            unresolved: links.unresolved().map(|l| l.test.clone()).collect(),
        }
    }

    /// Requirements counted by the aggregate
    pub fn total(&self) -> usize {
        self.requirements.len()
    }

    /// Aggregate coverage (0.0 - 100.0); 0 when nothing is counted
    pub fn coverage_percent(&self) -> f64 {
        if self.requirements.is_empty() {
            return 0.0;
        }
        (self.tested as f64 / self.requirements.len() as f64) * 100.0
    }

    /// Whether the aggregate reaches `threshold`
    pub fn is_passing(&self, threshold: f64) -> bool {
        self.coverage_percent() >= threshold
    }

    pub fn verdict(&self) -> Verdict {
        if self.is_passing(self.threshold) {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Counted requirements without a passing test
    pub fn needs_attention(&self) -> impl Iterator<Item = &RequirementCoverage> {
        self.requirements.iter().filter(|r| !r.is_tested())
    }
}
