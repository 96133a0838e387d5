//! tracelink-core - Core library for requirement traceability analysis
//!
//! This crate provides the building blocks for:
//! - Extracting requirement definitions and references from markdown documents
//! - Extracting `@satisfies` annotations from test sources
//! - Reading test results (CTest XML and ctest logs)
//! - Linking tests to results and computing per-requirement coverage
//!
//! # Features
//!
//! - `walk` - Enable [`WalkDocuments`], [`WalkTests`] and the [`pipeline`]
//!   module for gitignore-aware directory walking (brings in `ignore` and `globset`)
//! - `parallel` - Parse files in parallel (brings in `rayon`)
//!
//! # Requirement documents
//!
//! Requirements are defined by markdown headings whose first token is an
//! identifier, or by a front-matter `id` field:
//!
//! ```markdown
//! ### STR-CORE-001: Time synchronization (P0)
//!
//! - The system SHALL synchronize within 1us
//! ```
//!
//! # Test annotations
//!
//! Tests claim requirements with a comment marker above the declaration:
//!
//! ```cpp
//! // @satisfies STR-CORE-001
//! TEST_CASE("offset converges", "[sync]") { ... }
//! ```
//!
//! # In-memory inputs (for testing)
//!
//! ```
//! use tracelink_core::{
//!     Catalog, CoverageOptions, CoverageReport, Documents, Links, MemoryDocuments,
//!     MemoryTests, TestResults, TestSources,
//! };
//!
//! let docs = MemoryDocuments::new()
//!     .add("req/stakeholder.md", "### STR-CORE-001: Time sync (P0)\n")
//!     .scan()
//!     .unwrap();
//! let catalog = Catalog::build(&docs.documents);
//!
//! let tests = MemoryTests::new()
//!     .add("tests/test_sync.cpp", "// @satisfies STR-CORE-001\nvoid test_sync() {}\n")
//!     .scan()
//!     .unwrap();
//! let results = TestResults::parse("1/1 Testing: test_sync\nTest Passed.\n");
//!
//! let links = Links::link(&catalog, &tests.annotations, &results);
//! let report = CoverageReport::compute(&catalog, &links, &CoverageOptions::default());
//! assert_eq!(report.coverage_percent(), 100.0);
//! ```

use facet::Facet;
use std::path::PathBuf;

pub mod annotations;
pub mod catalog;
pub mod coverage;
pub mod documents;
pub mod grammar;
pub mod linking;
pub mod markdown;
#[cfg(feature = "walk")]
pub mod pipeline;
pub mod results;
mod sources;

pub use annotations::{
    AnnotationScan, MemoryTests, TestAnnotation, TestCase, TestId, TestSources,
};
pub use catalog::{Catalog, Conflict, Orphan, Requirement};
pub use coverage::{CoverageOptions, CoverageReport, RequirementCoverage, Status, Verdict};
pub use documents::{
    DocumentScan, Documents, Location, MemoryDocuments, PathDocuments, ScannedDocument,
};
pub use grammar::{Category, Identifier, OccurrenceKind, Priority};
pub use linking::{Links, MatchConfidence, Resolution, TestSets};
pub use results::{Outcome, ResultFormat, TestResults};
pub use sources::{SourceFile, split_roots};

#[cfg(feature = "walk")]
pub use annotations::WalkTests;
#[cfg(feature = "walk")]
pub use documents::WalkDocuments;

/// Byte span of a match within a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
pub struct SourceSpan {
    /// Byte offset from start of line
    pub offset: usize,
    /// Byte length
    pub length: usize,
}

impl SourceSpan {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }
}

/// Errors that stop a run
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The requirement roots define no identifier at all
    #[error("No requirements found under {}", display_roots(roots))]
    NoRequirements { roots: Vec<PathBuf> },
}

fn display_roots(roots: &[PathBuf]) -> String {
    if roots.is_empty() {
        return "(no roots given)".to_string();
    }
    roots
        .iter()
        .map(|root| root.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
