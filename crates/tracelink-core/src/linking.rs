//! Linking annotated tests to results and requirements
//!
//! Result files rarely use the exact in-source test name: CTest prefixes
//! suites, Catch2 reporters append tags. A test's *short name* (the last
//! `::` segment of its id) is therefore looked up as a substring of every
//! result name:
//!
//! - any passing name containing it → passed (exact)
//! - otherwise any failing name containing it → failed (exact)
//! - otherwise the test's most discriminating token (longest alphanumeric
//!   run over three characters) is looked up the same way, and accepted only
//!   when exactly one result name on one side contains it (heuristic)
//! - anything else stays unresolved: the test still counts as a test case,
//!   but neither as passing nor as failing

use crate::annotations::{TestAnnotation, TestId};
use crate::catalog::Catalog;
use crate::coverage::Status;
use crate::grammar::Identifier;
use crate::results::{Outcome, TestResults};
use facet::Facet;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// How a test was matched to a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
#[repr(u8)]
pub enum MatchConfidence {
    /// The short name occurs in a result name
    Exact,
    /// Only a single discriminating token matched, on one side only
    Heuristic,
    /// No match, or an ambiguous one
    Unresolved,
}

impl MatchConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchConfidence::Exact => "exact",
            MatchConfidence::Heuristic => "heuristic",
            MatchConfidence::Unresolved => "unresolved",
        }
    }
}

/// Result lookup for one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// `None` when unresolved
    pub outcome: Option<Outcome>,
    pub confidence: MatchConfidence,
    /// Result names that matched on the chosen side
    pub matched: Vec<String>,
}

impl Resolution {
    fn unresolved() -> Self {
        Self {
            outcome: None,
            confidence: MatchConfidence::Unresolved,
            matched: Vec::new(),
        }
    }
}

fn containing<'a>(names: &'a BTreeSet<String>, needle: &str) -> Vec<&'a String> {
    names.iter().filter(|name| name.contains(needle)).collect()
}

/// The longest alphanumeric token longer than three characters; the first
/// one wins a tie.
pub fn discriminating_token(short_name: &str) -> Option<&str> {
    short_name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() > 3)
        .fold(None::<&str>, |best, token| match best {
            Some(b) if b.chars().count() >= token.chars().count() => Some(b),
            _ => Some(token),
        })
}

/// Look up a test's short name in the results
pub fn resolve(short_name: &str, results: &TestResults) -> Resolution {
    if short_name.is_empty() {
        return Resolution::unresolved();
    }

    let passed = containing(&results.passing, short_name);
    let failed = containing(&results.failing, short_name);
    // A passing match wins even if a failing name matches too
    if !passed.is_empty() {
        return Resolution {
            outcome: Some(Outcome::Passed),
            confidence: MatchConfidence::Exact,
            matched: passed.into_iter().cloned().collect(),
        };
    }
    if !failed.is_empty() {
        return Resolution {
            outcome: Some(Outcome::Failed),
            confidence: MatchConfidence::Exact,
            matched: failed.into_iter().cloned().collect(),
        };
    }

    let Some(token) = discriminating_token(short_name) else {
        return Resolution::unresolved();
    };
    let passed = containing(&results.passing, token);
    let failed = containing(&results.failing, token);
    match (passed.as_slice(), failed.as_slice()) {
        ([only], []) => Resolution {
            outcome: Some(Outcome::Passed),
            confidence: MatchConfidence::Heuristic,
            matched: vec![(*only).clone()],
        },
        ([], [only]) => Resolution {
            outcome: Some(Outcome::Failed),
            confidence: MatchConfidence::Heuristic,
            matched: vec![(*only).clone()],
        },
        _ => {
            if passed.len() + failed.len() > 1 {
                debug!(
                    "'{}' is ambiguous: token '{}' matches {} results",
                    short_name,
                    token,
                    passed.len() + failed.len()
                );
            }
            Resolution::unresolved()
        }
    }
}

/// Tests linked to one requirement, by composite test id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSets {
    pub test_cases: BTreeSet<String>,
    pub passing: BTreeSet<String>,
    pub failing: BTreeSet<String>,
}

impl TestSets {
    pub fn status(&self) -> Status {
        if self.test_cases.is_empty() {
            Status::NoTests
        } else if self.failing.is_empty() {
            Status::Passing
        } else if !self.passing.is_empty() {
            Status::Partial
        } else {
            Status::Failing
        }
    }

    /// Share of linked tests that pass, in percent (0 without tests)
    pub fn coverage(&self) -> f64 {
        if self.test_cases.is_empty() {
            return 0.0;
        }
        self.passing.len() as f64 / self.test_cases.len() as f64 * 100.0
    }

    /// Outcome of one linked test, `None` when unresolved
    pub fn outcome_of(&self, test: &str) -> Option<Outcome> {
        if self.passing.contains(test) {
            Some(Outcome::Passed)
        } else if self.failing.contains(test) {
            Some(Outcome::Failed)
        } else {
            None
        }
    }

    pub fn is_tested(&self) -> bool {
        !self.passing.is_empty()
    }
}

/// One annotated test with its result lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestLink {
    pub test: TestId,
    pub requirement_ids: Vec<Identifier>,
    pub resolution: Resolution,
    pub file_level: bool,
}

/// An annotation naming an identifier the catalog doesn't define
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dangling {
    pub test: TestId,
    pub id: Identifier,
}

/// Every annotated test, resolved and attached to requirements
#[derive(Debug, Clone, Default)]
pub struct Links {
    pub links: Vec<TestLink>,
    pub by_requirement: BTreeMap<String, TestSets>,
    pub dangling: Vec<Dangling>,
}

impl Links {
    /// Resolve each annotation and attach it to the requirements it names
    pub fn link(catalog: &Catalog, annotations: &[TestAnnotation], results: &TestResults) -> Self {
        let mut links = Links::default();

        for annotation in annotations {
            let resolution = resolve(annotation.test.short_name(), results);
            let test_key = annotation.test.to_string();

            for id in &annotation.requirement_ids {
                if !catalog.contains(id.as_str()) {
                    warn!("{} claims unknown identifier {}", test_key, id);
                    links.dangling.push(Dangling {
                        test: annotation.test.clone(),
                        id: id.clone(),
                    });
                    continue;
                }

                let sets = links
                    .by_requirement
                    .entry(id.as_str().to_string())
                    .or_default();
                sets.test_cases.insert(test_key.clone());
                match resolution.outcome {
                    Some(Outcome::Passed) => {
                        sets.failing.remove(&test_key);
                        sets.passing.insert(test_key.clone());
                    }
                    Some(Outcome::Failed) => {
                        if !sets.passing.contains(&test_key) {
                            sets.failing.insert(test_key.clone());
                        }
                    }
                    None => {}
                }
            }

            links.links.push(TestLink {
                test: annotation.test.clone(),
                requirement_ids: annotation.requirement_ids.clone(),
                resolution,
                file_level: annotation.file_level,
            });
        }

        links
    }

    /// Linked tests for a requirement (empty when none)
    pub fn tests_for(&self, id: &str) -> TestSets {
        self.by_requirement.get(id).cloned().unwrap_or_default()
    }

    /// Links that matched no result
    pub fn unresolved(&self) -> impl Iterator<Item = &TestLink> {
        self.links
            .iter()
            .filter(|l| l.resolution.confidence == MatchConfidence::Unresolved)
    }
}
