//! One traceability run over files on disk

use crate::annotations::{AnnotationScan, TestSources, WalkTests};
use crate::catalog::Catalog;
use crate::coverage::{CoverageOptions, CoverageReport};
use crate::documents::{DocumentScan, Documents, WalkDocuments};
use crate::linking::Links;
use crate::results::TestResults;
use crate::TraceError;
use eyre::Result;
use std::path::PathBuf;
use tracing::info;

/// Where a run reads its inputs from
#[derive(Debug, Clone, Default)]
pub struct TraceInputs {
    /// Roots holding requirement documents
    pub requirements: Vec<PathBuf>,
    /// Roots holding test sources
    pub tests: Vec<PathBuf>,
    /// Results artifact (XML or ctest log)
    pub results: Option<PathBuf>,
    /// Extra ignore globs, applied to both trees
    pub ignore: Vec<String>,
    /// Replaces the default document extensions when set
    pub document_extensions: Option<Vec<String>>,
    /// Replaces the default test source extensions when set
    pub test_extensions: Option<Vec<String>>,
}

/// Everything a run produced
#[derive(Debug)]
pub struct Trace {
    pub catalog: Catalog,
    pub annotations: AnnotationScan,
    pub results: TestResults,
    pub links: Links,
    pub report: CoverageReport,
    /// Non-fatal problems met along the way
    pub warnings: Vec<String>,
}

/// Scan requirement documents and fold them into a catalog, with the test
/// cases named under the test roots attached
pub fn scan_catalog(inputs: &TraceInputs) -> Result<(Catalog, Vec<String>)> {
    let documents = scan_documents(inputs)?;
    let mut warnings = documents.warnings;
    let mut catalog = Catalog::build(&documents.documents);
    if !inputs.tests.is_empty() {
        let tests = scan_tests(inputs)?;
        warnings.extend(tests.warnings);
        catalog = catalog.with_test_cases(tests.test_cases);
    }
    Ok((catalog, warnings))
}

fn scan_documents(inputs: &TraceInputs) -> Result<DocumentScan> {
    let mut documents = WalkDocuments::new(inputs.requirements.iter()).ignore(inputs.ignore.iter());
    if let Some(extensions) = &inputs.document_extensions {
        documents = documents.extensions(extensions.iter());
    }
    documents.scan()
}

fn scan_tests(inputs: &TraceInputs) -> Result<AnnotationScan> {
    let mut tests = WalkTests::new(inputs.tests.iter()).ignore(inputs.ignore.iter());
    if let Some(extensions) = &inputs.test_extensions {
        tests = tests.extensions(extensions.iter());
    }
    tests.scan()
}

/// Run the whole pipeline.
///
/// Fails with [`TraceError::NoRequirements`] when the requirement roots
/// define nothing; every other problem degrades to a warning.
pub fn run(inputs: &TraceInputs, options: &CoverageOptions) -> Result<Trace> {
    #[cfg(feature = "parallel")]
    let (documents, annotations) = rayon::join(|| scan_documents(inputs), || scan_tests(inputs));
    #[cfg(not(feature = "parallel"))]
    let (documents, annotations) = (scan_documents(inputs), scan_tests(inputs));

    let documents = documents?;
    let annotations = annotations?;
    let catalog = Catalog::build(&documents.documents)
        .with_test_cases(annotations.test_cases.iter().cloned());

    if catalog.is_empty() {
        return Err(TraceError::NoRequirements {
            roots: inputs.requirements.clone(),
        }
        .into());
    }

    let results = match &inputs.results {
        Some(path) => TestResults::load(path),
        None => TestResults::default(),
    };

    let links = Links::link(&catalog, &annotations.annotations, &results);
    let report = CoverageReport::compute(&catalog, &links, options);

    info!(
        "{} requirements from {} documents, {} annotated tests, {} results",
        catalog.len(),
        documents.documents.len(),
        annotations.annotations.len(),
        results.len()
    );

    let mut warnings = documents.warnings;
    warnings.extend(annotations.warnings.iter().cloned());
    warnings.extend(results.warnings.iter().cloned());

    Ok(Trace {
        catalog,
        annotations,
        results,
        links,
        report,
        warnings,
    })
}
