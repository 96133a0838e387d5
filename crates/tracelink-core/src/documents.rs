//! Requirement document scanner
//!
//! Turns one markdown document into a list of identifier occurrences. A
//! document defines identifiers two ways:
//!
//! - its front matter carries an `id:` field (the document's primary
//!   definition, titled by the `title:` field or the file stem)
//! - a heading starts with an identifier (`### STR-CORE-001: Title (P0)`)
//!
//! Each definition owns a *section*: the lines after it up to the next
//! definition heading or the end of the document. Within that section the
//! scanner picks up
//!
//! - a `- priority: P<n>` bullet
//! - acceptance criteria: bullets containing `SHALL` or `MUST`, and every
//!   non-empty, non-comment line of a fenced block that follows an
//!   "Acceptance Criteria" label
//!
//! Every other appearance of an identifier is a reference. The identifiers
//! mentioned inside a definition's section are its outgoing references, and
//! a short hash of the section text lets index consumers notice edits.

use crate::grammar::{
    HeadingDefinition, Identifier, LineContext, OccurrenceKind, Priority, classify_line,
    heading_definition, is_acceptance_label, obligation_bullet, priority_bullet,
    scan_identifiers,
};
use crate::markdown::{FrontMatter, Outline};
use crate::sources::{SourceFile, map_files, short_hash, sort_canonical};
use eyre::Result;
use facet::Facet;
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where something was found
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
pub struct Location {
    /// File, as shown in reports
    pub file: PathBuf,
    /// Line number (1-indexed)
    pub line: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// What a definition says about its identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionDetails {
    pub title: String,
    /// Priority if the document states one
    pub priority: Option<Priority>,
    pub acceptance_criteria: Vec<String>,
    /// Other identifiers mentioned within the section
    pub references: BTreeSet<Identifier>,
    /// Short content hash of the section text
    pub hash: String,
}

/// One appearance of an identifier in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub id: Identifier,
    pub kind: OccurrenceKind,
    pub location: Location,
    /// Present for definitions only
    pub details: Option<DefinitionDetails>,
}

impl Occurrence {
    pub fn is_definition(&self) -> bool {
        self.kind == OccurrenceKind::Definition
    }
}

/// All occurrences found in one document
#[derive(Debug, Clone)]
pub struct ScannedDocument {
    /// File, as shown in reports
    pub path: PathBuf,
    pub front_matter: FrontMatter,
    pub occurrences: Vec<Occurrence>,
    /// Problems worth reporting that didn't stop the scan
    pub warnings: Vec<String>,
}

impl ScannedDocument {
    /// Scan one document's content (no I/O).
    pub fn scan(path: &Path, content: &str) -> Self {
        let outline = Outline::parse(content);
        let mut warnings = Vec::new();
        if let Some(error) = &outline.front_matter_error {
            let warning = format!("Ignoring front matter in {}: {}", path.display(), error);
            warn!("{}", warning);
            warnings.push(warning);
        }

        let lines: Vec<&str> = content.lines().collect();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Front-matter primary definition
        let primary = outline.front_matter.id.as_deref().and_then(|value| {
            let value = value.trim();
            let line = outline
                .front_matter_id_line
                .filter(|&l| lines.get(l - 1).is_some_and(|text| text.contains(value)))
                .or_else(|| {
                    (2..outline.front_matter_lines)
                        .find(|&l| lines.get(l - 1).is_some_and(|text| text.contains(value)))
                })
                .unwrap_or(1);
            let id = Identifier::parse(value);
            if id.is_none() && !value.is_empty() {
                let warning = format!(
                    "{}:{}: front matter id '{}' is not a well-formed identifier",
                    path.display(),
                    line,
                    value
                );
                warn!("{}", warning);
                warnings.push(warning);
            }
            id.map(|id| (id, line))
        });

        // Heading definitions, by line
        let heading_defs: Vec<(usize, HeadingDefinition)> = outline
            .headings
            .iter()
            .filter_map(|h| {
                let line = lines.get(h.line - 1)?;
                heading_definition(line).map(|def| (h.line, def))
            })
            .collect();
        let boundaries: Vec<usize> = heading_defs.iter().map(|(line, _)| *line).collect();
        let section_end = |after: usize| -> usize {
            boundaries
                .iter()
                .copied()
                .find(|&b| b > after)
                .unwrap_or(lines.len() + 1)
        };

        let mut definitions: HashMap<usize, DefinitionDetails> = HashMap::new();
        // Line of a heading that repeats the primary id; it folds into the
        // front-matter definition instead of defining a second time
        let mut collapsed_heading: Option<usize> = None;

        if let Some((primary_id, primary_line)) = &primary {
            let body_start = outline.front_matter_lines + 1;
            let (mut priority, mut criteria) = section_details(
                &lines,
                &outline,
                body_start..section_end(outline.front_matter_lines),
            );

            let mut span_end = section_end(outline.front_matter_lines);
            if let Some((line, def)) = heading_defs.iter().find(|(_, d)| d.id == *primary_id) {
                collapsed_heading = Some(*line);
                span_end = span_end.max(section_end(*line));
                let (heading_priority, heading_criteria) =
                    section_details(&lines, &outline, line + 1..section_end(*line));
                priority = priority.or(def.priority).or(heading_priority);
                for criterion in heading_criteria {
                    if !criteria.contains(&criterion) {
                        criteria.push(criterion);
                    }
                }
            }

            let front_matter_priority = outline
                .front_matter
                .priority
                .as_deref()
                .and_then(Priority::parse);
            let title = outline
                .front_matter
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| stem.clone());
            let (references, hash) = section_summary(&lines, primary_id, 1..span_end);

            definitions.insert(
                *primary_line,
                DefinitionDetails {
                    title,
                    priority: front_matter_priority.or(priority),
                    acceptance_criteria: criteria,
                    references,
                    hash,
                },
            );
        }

        for (line, def) in &heading_defs {
            if Some(*line) == collapsed_heading {
                continue;
            }
            let (section_priority, criteria) =
                section_details(&lines, &outline, line + 1..section_end(*line));
            let title = if def.title.is_empty() {
                stem.clone()
            } else {
                def.title.clone()
            };
            let (references, hash) = section_summary(&lines, &def.id, *line..section_end(*line));
            definitions.insert(
                *line,
                DefinitionDetails {
                    title,
                    priority: def.priority.or(section_priority),
                    acceptance_criteria: criteria,
                    references,
                    hash,
                },
            );
        }

        let mut occurrences = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let line_num = idx + 1;
            let context = if outline.is_heading(line_num) {
                LineContext::Heading
            } else {
                LineContext::Text
            };

            for found in classify_line(line, context) {
                let location = Location {
                    file: path.to_path_buf(),
                    line: line_num,
                };

                let is_primary_line = primary
                    .as_ref()
                    .is_some_and(|(id, l)| *l == line_num && *id == found.id);
                let is_collapsed =
                    found.kind == OccurrenceKind::Definition && collapsed_heading == Some(line_num);

                if is_collapsed {
                    continue;
                }

                let kind = if is_primary_line {
                    OccurrenceKind::Definition
                } else {
                    found.kind
                };
                let details = match kind {
                    OccurrenceKind::Definition => definitions.remove(&line_num),
                    OccurrenceKind::Reference => None,
                };
                occurrences.push(Occurrence {
                    id: found.id,
                    kind,
                    location,
                    details,
                });
            }
        }

        debug!(
            "{}: {} definitions, {} references",
            path.display(),
            occurrences.iter().filter(|o| o.is_definition()).count(),
            occurrences.iter().filter(|o| !o.is_definition()).count()
        );

        Self {
            path: path.to_path_buf(),
            front_matter: outline.front_matter,
            occurrences,
            warnings,
        }
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Occurrence> {
        self.occurrences.iter().filter(|o| o.is_definition())
    }

    pub fn references(&self) -> impl Iterator<Item = &Occurrence> {
        self.occurrences.iter().filter(|o| !o.is_definition())
    }
}

/// Priority and acceptance criteria found in `range` (1-indexed line numbers).
fn section_details(
    lines: &[&str],
    outline: &Outline,
    range: Range<usize>,
) -> (Option<Priority>, Vec<String>) {
    let mut priority = None;
    let mut criteria = Vec::new();
    let mut awaiting_fence = false;

    let mut line_num = range.start.max(1);
    while line_num < range.end && line_num <= lines.len() {
        if let Some(fence) = outline.fence_at(line_num) {
            if awaiting_fence {
                criteria.extend(
                    fence
                        .body
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty() && !is_comment(l))
                        .map(str::to_string),
                );
                awaiting_fence = false;
            }
            line_num = fence.end_line + 1;
            continue;
        }

        let line = lines[line_num - 1];
        if is_acceptance_label(line) {
            awaiting_fence = true;
        } else if outline.is_heading(line_num) {
            awaiting_fence = false;
        } else {
            if priority.is_none() {
                priority = priority_bullet(line);
            }
            if let Some(item) = obligation_bullet(line) {
                criteria.push(item.to_string());
            }
        }
        line_num += 1;
    }

    (priority, criteria)
}

/// Identifiers other than `id` mentioned in `span` (1-indexed line
/// numbers), and the short hash of the span's text.
fn section_summary(
    lines: &[&str],
    id: &Identifier,
    span: Range<usize>,
) -> (BTreeSet<Identifier>, String) {
    let start = span.start.max(1) - 1;
    let end = (span.end - 1).min(lines.len()).max(start);
    let section = &lines[start..end];

    let references = section
        .iter()
        .flat_map(|line| scan_identifiers(line))
        .map(|m| m.id)
        .filter(|found| found != id)
        .collect();
    (references, short_hash(&section.join("\n")))
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("//") || line.starts_with("<!--")
}

/// Scanned documents plus the warnings raised while reading them
#[derive(Debug, Default)]
pub struct DocumentScan {
    /// Documents in canonical order
    pub documents: Vec<ScannedDocument>,
    pub warnings: Vec<String>,
}

/// Trait for providing requirement documents to scan
pub trait Documents {
    fn scan(self) -> Result<DocumentScan>;
}

/// Default extensions for requirement documents
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Default ignore globs: templates, workshop notes and generator fixtures.
pub const DEFAULT_IGNORE: &[&str] = &[
    "**/templates/**",
    "**/spec-kit-templates/**",
    "**/*-template.md",
    "**/REQUIREMENTS-ELICITATION-SESSION-*",
    "**/test-perfect-gen.md",
];

fn scan_files(mut files: Vec<SourceFile>) -> DocumentScan {
    sort_canonical(&mut files);
    let (documents, mut warnings) =
        map_files(&files, |file, content| ScannedDocument::scan(&file.display, content));
    warnings.extend(documents.iter().flat_map(|d| d.warnings.iter().cloned()));
    DocumentScan {
        documents,
        warnings,
    }
}

/// Documents from an explicit list of file paths
pub struct PathDocuments(Vec<SourceFile>);

impl PathDocuments {
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self(paths.into_iter().map(SourceFile::new).collect())
    }
}

impl Documents for PathDocuments {
    fn scan(self) -> Result<DocumentScan> {
        Ok(scan_files(self.0))
    }
}

/// In-memory documents (useful for testing)
#[derive(Default)]
pub struct MemoryDocuments(Vec<(PathBuf, String)>);

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document with content
    pub fn add(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.0.push((path.into(), content.into()));
        self
    }
}

impl Documents for MemoryDocuments {
    fn scan(mut self) -> Result<DocumentScan> {
        self.0
            .sort_by(|(a, _), (b, _)| crate::sources::canonical_cmp(a, b));
        let documents: Vec<ScannedDocument> = self
            .0
            .iter()
            .map(|(path, content)| ScannedDocument::scan(path, content))
            .collect();
        let warnings = documents
            .iter()
            .flat_map(|d| d.warnings.iter().cloned())
            .collect();
        Ok(DocumentScan {
            documents,
            warnings,
        })
    }
}

/// Requirement documents found by walking directory trees
#[cfg(feature = "walk")]
pub struct WalkDocuments {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    ignore: Vec<String>,
}

#[cfg(feature = "walk")]
impl WalkDocuments {
    /// Walk the given roots with the default extensions and ignore list
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            extensions: DOCUMENT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignore: DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the accepted extensions
    pub fn extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Add ignore globs
    pub fn ignore(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignore.extend(patterns.into_iter().map(Into::into));
        self
    }
}

#[cfg(feature = "walk")]
impl Documents for WalkDocuments {
    fn scan(self) -> Result<DocumentScan> {
        let set = crate::sources::WalkFiles::new(self.roots)
            .extensions(self.extensions)
            .ignore(self.ignore)
            .skip_readme(true)
            .collect(|_| true)?;
        let mut warnings = set.warnings;
        let mut scan = scan_files(set.files);
        warnings.append(&mut scan.warnings);
        scan.warnings = warnings;
        Ok(scan)
    }
}
