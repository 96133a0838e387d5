//! Test annotation extraction
//!
//! Test sources declare what they verify with a comment marker placed above
//! the test:
//!
//! ```text
//! // @satisfies STR-CORE-001 - Sync accuracy
//! TEST_CASE("offset converges", "[sync]") { ... }
//! ```
//!
//! Markers accumulate in a pending list until the next test declaration,
//! which takes them all. A file with markers but no recognizable declaration
//! at all gets a single file-level annotation instead.
//!
//! Test sources may also name test cases by identifier (`TEST-UNIT-BMCA-BASIC`
//! in a header comment). Those become [`TestCase`] entries of the index,
//! carrying every requirement identifier their file mentions.

use crate::grammar::{Category, Identifier, scan_identifiers};
use crate::sources::{SourceFile, map_files, short_hash, sort_canonical};
use eyre::Result;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use tracing::debug;

const MARKER_TAGS: &[&str] = &["@satisfies", "@verifies", "@req"];
const COMMENT_MARKERS: &[&str] = &["//", "#", "--", "/*", "*", "!"];

/// Identity of one test: the file it lives in plus its in-file name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestId {
    /// File, as shown in reports
    pub file: PathBuf,
    /// In-file name (`Suite::Name` for GoogleTest-style tests)
    pub name: String,
}

impl TestId {
    pub fn new(file: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            name: name.into(),
        }
    }

    /// Name used to look the test up in results: the last `::` segment
    pub fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }
}

impl Display for TestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.file.display(), self.name)
    }
}

/// Requirement identifiers claimed by one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestAnnotation {
    pub test: TestId,
    /// Claimed identifiers in marker order, without duplicates
    pub requirement_ids: Vec<Identifier>,
    /// Line of the declaration (or of the first marker, for file-level)
    pub line: usize,
    /// True when no declaration was found and the file itself is the test
    pub file_level: bool,
}

/// Identifiers named by a satisfaction marker on `line`.
///
/// The marker must sit in a comment (`// @satisfies REQ-F-001`), and may
/// list several identifiers separated by commas or spaces. Anything after
/// the list (a description) is ignored.
pub fn satisfaction_marker(line: &str) -> Vec<Identifier> {
    for tag in MARKER_TAGS {
        let mut search_from = 0;
        while let Some(pos) = line[search_from..].find(tag) {
            let start = search_from + pos;
            let end = start + tag.len();
            search_from = end;

            let before = line[..start].trim_end();
            if !COMMENT_MARKERS.iter().any(|m| before.ends_with(m)) {
                continue;
            }
            let rest = &line[end..];
            if !rest.starts_with([' ', '\t', ':']) {
                continue;
            }

            let ids = identifier_list(rest.trim_start_matches([' ', '\t', ':']));
            if !ids.is_empty() {
                return ids;
            }
        }
    }
    Vec::new()
}

fn identifier_list(mut text: &str) -> Vec<Identifier> {
    let mut ids = Vec::new();
    while let Some(id) = Identifier::parse_prefix(text) {
        let rest = &text[id.len()..];
        if rest.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            break;
        }
        ids.push(id);
        text = rest.trim_start_matches([',', ' ', '\t']);
    }
    ids
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(is_ident_char)
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

/// Split a leading identifier token off `text`
fn take_ident(text: &str) -> Option<(&str, &str)> {
    let end = text.find(|c: char| !is_ident_char(c)).unwrap_or(text.len());
    let ident = &text[..end];
    is_ident(ident).then(|| (ident, &text[end..]))
}

fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//")
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
        || (trimmed.starts_with('#') && !trimmed.starts_with("#["))
}

/// Match a test declaration, returning the test's in-file name.
///
/// Recognized forms:
/// - `TEST_CASE("name", "[tags]")` (Catch2)
/// - `TEST(Suite, Name)`, `TEST_F(..)`, `TEST_P(..)` as `Suite::Name`
/// - `void test_name(`, `def test_name(`, `fn test_name(`
pub fn test_declaration(line: &str) -> Option<String> {
    if is_comment_line(line) {
        return None;
    }

    let mut rest = line;
    loop {
        let start = rest.find(|c: char| c.is_ascii_alphabetic() || c == '_')?;
        let candidate = &rest[start..];
        let boundary = line.len() - candidate.len();
        let preceded_by_ident = line[..boundary].chars().next_back().is_some_and(is_ident_char);

        let Some((token, after)) = take_ident(candidate) else {
            rest = &candidate[1..];
            continue;
        };

        if !preceded_by_ident {
            if let Some(name) = declaration_after(token, after) {
                return Some(name);
            }
        }
        rest = after;
    }
}

fn declaration_after(token: &str, after: &str) -> Option<String> {
    match token {
        "TEST_CASE" => {
            let args = after.trim_start().strip_prefix('(')?.trim_start();
            let quoted = args.strip_prefix('"')?;
            let name = &quoted[..quoted.find('"')?];
            (!name.is_empty()).then(|| name.to_string())
        }
        "TEST" | "TEST_F" | "TEST_P" => {
            let args = after.trim_start().strip_prefix('(')?;
            let args = &args[..args.find(')')?];
            let (suite, name) = args.split_once(',')?;
            let (suite, name) = (suite.trim(), name.trim());
            (is_ident(suite) && is_ident(name)).then(|| format!("{suite}::{name}"))
        }
        "void" | "def" | "fn" => {
            let name = function_name(after)?;
            name.starts_with("test_").then(|| name.to_string())
        }
        _ => None,
    }
}

/// `  name  (` → `name`
fn function_name(text: &str) -> Option<&str> {
    let trimmed = text.trim_start();
    if trimmed.len() == text.len() {
        return None;
    }
    let (name, rest) = take_ident(trimmed)?;
    rest.trim_start().starts_with('(').then_some(name)
}

/// Whether a line is a Rust test attribute (`#[test]`, `#[tokio::test]`, ...)
fn is_test_attribute(line: &str) -> bool {
    let trimmed = line.trim();
    let Some(inner) = trimmed.strip_prefix("#[") else {
        return false;
    };
    let path = inner
        .split(|c: char| c == ']' || c == '(')
        .next()
        .unwrap_or_default();
    path == "test" || path.ends_with("::test")
}

/// Name of a Rust `fn` declared on `line`, whatever its name
fn rust_fn_name(line: &str) -> Option<&str> {
    let mut rest = line.trim_start();
    loop {
        let (token, after) = take_ident(rest)?;
        match token {
            "pub" | "async" | "unsafe" | "const" | "extern" => rest = after.trim_start(),
            "fn" => return function_name(after),
            _ => return None,
        }
    }
}

/// Extract annotations from one test source file (no I/O).
pub fn extract_annotations(path: &Path, content: &str) -> Vec<TestAnnotation> {
    let mut annotations = Vec::new();
    let mut pending: Vec<Identifier> = Vec::new();
    let mut all_marked: Vec<Identifier> = Vec::new();
    let mut first_marker_line = None;
    let mut saw_declaration = false;
    let mut after_test_attribute = false;

    for (idx, line) in content.lines().enumerate() {
        let line_num = idx + 1;

        let ids = satisfaction_marker(line);
        if !ids.is_empty() {
            first_marker_line.get_or_insert(line_num);
            for id in ids {
                if !all_marked.contains(&id) {
                    all_marked.push(id.clone());
                }
                if !pending.contains(&id) {
                    pending.push(id);
                }
            }
        }

        let mut declared = test_declaration(line);
        if after_test_attribute && declared.is_none() {
            if let Some(name) = rust_fn_name(line) {
                declared = Some(name.to_string());
            }
        }

        if is_test_attribute(line) {
            after_test_attribute = true;
        } else if declared.is_some() || rust_fn_name(line).is_some() {
            after_test_attribute = false;
        }

        if let Some(name) = declared {
            saw_declaration = true;
            if !pending.is_empty() {
                annotations.push(TestAnnotation {
                    test: TestId::new(path, name),
                    requirement_ids: std::mem::take(&mut pending),
                    line: line_num,
                    file_level: false,
                });
            }
        }
    }

    if !saw_declaration {
        if let Some(line) = first_marker_line {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let name = stem.strip_prefix("test_").unwrap_or(&stem).to_string();
            annotations.push(TestAnnotation {
                test: TestId::new(path, name),
                requirement_ids: all_marked,
                line,
                file_level: true,
            });
        }
    } else if !pending.is_empty() {
        debug!(
            "{}: dropping {} trailing annotation(s) with no following test",
            path.display(),
            pending.len()
        );
    }

    annotations
}

/// A test case identifier named in a test source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// e.g. `TEST-UNIT-BMCA-BASIC`
    pub id: String,
    /// Stem of the file naming it
    pub title: String,
    pub file: PathBuf,
    /// Requirement identifiers mentioned anywhere in the file
    pub references: BTreeSet<Identifier>,
    /// Short hash of the identifier plus the file content
    pub hash: String,
}

/// Every `TEST-*` case identifier in `content`, sorted and deduplicated.
///
/// Case identifiers are looser than requirement identifiers: any run of
/// uppercase letters, digits and dashes after `TEST-` counts.
pub fn test_case_ids(content: &str) -> BTreeSet<String> {
    const TAG: &str = "TEST-";
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let bytes = content.as_bytes();
    let mut ids = BTreeSet::new();

    for (start, _) in content.match_indices(TAG) {
        if start > 0 && is_word(bytes[start - 1]) {
            continue;
        }
        let body = &content[start + TAG.len()..];
        let run = body
            .find(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-'))
            .unwrap_or(body.len());
        if body[run..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }
        let tail = body[..run].trim_end_matches('-');
        if !tail.is_empty() {
            ids.insert(format!("{TAG}{tail}"));
        }
    }
    ids
}

/// Test cases named in one test source.
pub fn extract_test_cases(path: &Path, content: &str) -> Vec<TestCase> {
    let ids = test_case_ids(content);
    if ids.is_empty() {
        return Vec::new();
    }

    let references: BTreeSet<Identifier> = scan_identifiers(content)
        .into_iter()
        .map(|m| m.id)
        .filter(|id| id.category() != Category::Test)
        .collect();
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    ids.into_iter()
        .map(|id| TestCase {
            hash: short_hash(&format!("{id}{content}")),
            id,
            title: title.clone(),
            file: path.to_path_buf(),
            references: references.clone(),
        })
        .collect()
}

/// Annotations found across all test sources
#[derive(Debug, Default)]
pub struct AnnotationScan {
    /// Annotations in canonical file order, then line order
    pub annotations: Vec<TestAnnotation>,
    /// Test cases in canonical file order, then identifier order
    pub test_cases: Vec<TestCase>,
    /// Text files read (binary files are skipped)
    pub files_scanned: usize,
    pub warnings: Vec<String>,
}

/// Trait for providing test sources to scan
pub trait TestSources {
    fn scan(self) -> Result<AnnotationScan>;
}

/// Annotations and test cases of one file, or `None` for binary content
fn scan_source(path: &Path, content: &str) -> Option<(Vec<TestAnnotation>, Vec<TestCase>)> {
    if content.contains('\0') {
        debug!("Skipping binary file {}", path.display());
        return None;
    }
    Some((extract_annotations(path, content), extract_test_cases(path, content)))
}

fn collect_scans(
    per_file: impl IntoIterator<Item = Option<(Vec<TestAnnotation>, Vec<TestCase>)>>,
    warnings: Vec<String>,
) -> AnnotationScan {
    let mut scan = AnnotationScan {
        warnings,
        ..Default::default()
    };
    for (annotations, test_cases) in per_file.into_iter().flatten() {
        scan.files_scanned += 1;
        scan.annotations.extend(annotations);
        scan.test_cases.extend(test_cases);
    }
    scan
}

fn scan_files(mut files: Vec<SourceFile>) -> AnnotationScan {
    sort_canonical(&mut files);
    let (per_file, warnings) =
        map_files(&files, |file, content| scan_source(&file.display, content));
    collect_scans(per_file, warnings)
}

/// In-memory test sources (useful for testing)
#[derive(Default)]
pub struct MemoryTests(Vec<(PathBuf, String)>);

impl MemoryTests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a test source with content
    pub fn add(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.0.push((path.into(), content.into()));
        self
    }
}

impl TestSources for MemoryTests {
    fn scan(mut self) -> Result<AnnotationScan> {
        self.0
            .sort_by(|(a, _), (b, _)| crate::sources::canonical_cmp(a, b));
        let per_file = self
            .0
            .iter()
            .map(|(path, content)| scan_source(path, content));
        Ok(collect_scans(per_file, Vec::new()))
    }
}

/// Whether a path (relative to its root) looks like a test source
pub fn is_test_path(relative: &Path) -> bool {
    let named_like_test = relative
        .file_stem()
        .map(|s| s.to_string_lossy())
        .is_some_and(|stem| {
            stem.starts_with("test_") || stem.ends_with("_test") || stem.ends_with("_tests")
        });
    let under_test_dir = relative
        .parent()
        .into_iter()
        .flat_map(|p| p.components())
        .any(|c| is_test_dir_name(c.as_os_str()));
    named_like_test || under_test_dir
}

fn is_test_dir_name(name: &std::ffi::OsStr) -> bool {
    name == "test" || name == "tests"
}

/// Test sources found by walking directory trees
#[cfg(feature = "walk")]
pub struct WalkTests {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    ignore: Vec<String>,
}

#[cfg(feature = "walk")]
impl WalkTests {
    /// Walk the given roots, reading every text file that looks like a test
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            extensions: Vec::new(),
            ignore: Vec::new(),
        }
    }

    /// Only read files with these extensions
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
impl TestSources for WalkTests {
    fn scan(self) -> Result<AnnotationScan> {
        let mut files = Vec::new();
        let mut warnings = Vec::new();

        let base = crate::sources::display_base(&self.roots);

        // A root that is itself a tests directory accepts everything below it
        for root in &self.roots {
            let whole_root = root.file_name().is_some_and(is_test_dir_name);
            let set = crate::sources::WalkFiles::new([root])
                .display_base(&base)
                .extensions(self.extensions.iter().cloned())
                .ignore(self.ignore.iter().cloned())
                .collect(|relative| whole_root || is_test_path(relative))?;
            files.extend(set.files);
            warnings.extend(set.warnings);
        }

        sort_canonical(&mut files);
        files.dedup_by(|a, b| a.path == b.path);

        let mut scan = scan_files(files);
        warnings.append(&mut scan.warnings);
        scan.warnings = warnings;
        debug!(
            "Scanned {} test files, {} annotated tests, {} test cases",
            scan.files_scanned,
            scan.annotations.len(),
            scan.test_cases.len()
        );
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(annotation: &TestAnnotation) -> Vec<&str> {
        annotation.requirement_ids.iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn markers_need_a_comment() {
        assert_eq!(satisfaction_marker("// @satisfies STR-CORE-001 - Sync").len(), 1);
        assert_eq!(satisfaction_marker("    # @verifies REQ-F-002").len(), 1);
        assert_eq!(satisfaction_marker(" * @req: REQ-F-003").len(), 1);
        assert_eq!(satisfaction_marker("/// @satisfies REQ-F-004").len(), 1);
        assert!(satisfaction_marker("printf(\"@satisfies STR-CORE-001\")").is_empty());
        assert!(satisfaction_marker("// @requirement STR-CORE-001").is_empty());
        assert!(satisfaction_marker("// @satisfies nothing").is_empty());
    }

    #[test]
    fn markers_can_list_several_ids() {
        let found =
            satisfaction_marker("// @satisfies STR-CORE-001, STR-CORE-002 REQ-F-001 - desc");
        let found: Vec<_> = found.iter().map(|i| i.as_str()).collect();
        assert_eq!(found, ["STR-CORE-001", "STR-CORE-002", "REQ-F-001"]);
    }

    #[test]
    fn declaration_idioms() {
        assert_eq!(
            test_declaration(r#"TEST_CASE("BMCA selects best master", "[bmca]") {"#),
            Some("BMCA selects best master".to_string())
        );
        assert_eq!(
            test_declaration("TEST(ClockTest, OffsetConverges) {"),
            Some("ClockTest::OffsetConverges".to_string())
        );
        assert_eq!(
            test_declaration("TEST_F(PortFixture, RejectsBadHeader)"),
            Some("PortFixture::RejectsBadHeader".to_string())
        );
        assert_eq!(
            test_declaration("static void test_bmca_select(void) {"),
            Some("test_bmca_select".to_string())
        );
        assert_eq!(
            test_declaration("    def test_offset(self):"),
            Some("test_offset".to_string())
        );
        assert_eq!(
            test_declaration("fn test_roundtrip() {"),
            Some("test_roundtrip".to_string())
        );
    }

    #[test]
    fn non_declarations() {
        assert_eq!(test_declaration("void helper(int x) {"), None);
        assert_eq!(test_declaration("MY_TEST(a, b)"), None);
        assert_eq!(test_declaration("// TEST(Commented, Out)"), None);
        assert_eq!(test_declaration("int main() {"), None);
        assert_eq!(test_declaration("TEST_CASE(\"\")"), None);
    }

    #[test]
    fn pending_markers_attach_to_next_declaration() {
        let content = r#"
// @satisfies STR-CORE-001
// @satisfies STR-CORE-002
// @satisfies STR-CORE-001
TEST_CASE("first", "[a]") {}

void helper() {}

// @verifies REQ-F-010
TEST(Suite, Second) {}

TEST(Suite, Unannotated) {}
"#;
        let found = extract_annotations(Path::new("tests/test_sync.cpp"), content);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].test.to_string(), "tests/test_sync.cpp::first");
        assert_eq!(ids(&found[0]), ["STR-CORE-001", "STR-CORE-002"]);
        assert_eq!(found[0].line, 5);
        assert!(!found[0].file_level);
        assert_eq!(found[1].test.name, "Suite::Second");
        assert_eq!(found[1].test.short_name(), "Second");
        assert_eq!(ids(&found[1]), ["REQ-F-010"]);
    }

    #[test]
    fn trailing_markers_are_dropped() {
        let content = "// @satisfies REQ-F-001\nvoid test_a() {}\n// @satisfies REQ-F-002\n";
        let found = extract_annotations(Path::new("tests/test_x.c"), content);
        assert_eq!(found.len(), 1);
        assert_eq!(ids(&found[0]), ["REQ-F-001"]);
    }

    #[test]
    fn file_level_fallback() {
        let content = r#"// @satisfies STR-CORE-001 - Sync
// @satisfies STR-CORE-003
int main() {
    return run_all();
}
"#;
        let found = extract_annotations(Path::new("tests/test_bmca_select.cpp"), content);
        assert_eq!(found.len(), 1);
        assert!(found[0].file_level);
        assert_eq!(found[0].test.name, "bmca_select");
        assert_eq!(found[0].line, 1);
        assert_eq!(ids(&found[0]), ["STR-CORE-001", "STR-CORE-003"]);
    }

    #[test]
    fn rust_test_attribute() {
        let content = r#"
// @verifies REQ-F-020
#[test]
fn offset_is_computed() {}

// @verifies REQ-F-021
#[tokio::test]
async fn async_offset() {}

fn helper() {}
"#;
        let found = extract_annotations(Path::new("tests/offset.rs"), content);
        let names: Vec<_> = found.iter().map(|a| a.test.name.as_str()).collect();
        assert_eq!(names, ["offset_is_computed", "async_offset"]);
    }

    #[test]
    fn python_markers() {
        let content = "# @satisfies REQ-F-030\ndef test_parse():\n    pass\n";
        let found = extract_annotations(Path::new("tests/test_parse.py"), content);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].test.name, "test_parse");
    }

    #[test]
    fn short_name_strips_qualifiers() {
        assert_eq!(TestId::new("tests/a.cpp", "Suite::Name").short_name(), "Name");
        assert_eq!(TestId::new("tests/a.cpp", "plain").short_name(), "plain");
    }

    #[test]
    fn test_paths() {
        assert!(is_test_path(Path::new("test_sync.cpp")));
        assert!(is_test_path(Path::new("sync_test.cc")));
        assert!(is_test_path(Path::new("unit/tests/sync.cpp")));
        assert!(!is_test_path(Path::new("src/sync.cpp")));
    }

    #[test]
    fn memory_tests_scan_in_canonical_order() {
        let scan = MemoryTests::new()
            .add("tests/test_b.cpp", "// @satisfies REQ-F-002\nvoid test_b() {}\n")
            .add("tests/test_a.cpp", "// @satisfies REQ-F-001\nvoid test_a() {}\n")
            .scan()
            .unwrap();
        assert_eq!(scan.files_scanned, 2);
        let names: Vec<_> = scan.annotations.iter().map(|a| a.test.name.as_str()).collect();
        assert_eq!(names, ["test_a", "test_b"]);
    }

    #[test]
    fn test_case_identifiers() {
        let content = "/*\nTest: TEST-UNIT-BMCA-BASIC (GREEN)\n\
                       Tests: TEST-UNIT-Sync, TEST-INT-01-\n*/\n\
                       printf(\"=== TEST-UNIT-BMCA-BASIC ===\");\nMY_TEST-UNIT-X\n";
        let ids: Vec<_> = test_case_ids(content).into_iter().collect();
        assert_eq!(ids, ["TEST-INT-01", "TEST-UNIT-BMCA-BASIC"]);
    }

    #[test]
    fn test_cases_carry_file_references() {
        let content = "// Test: TEST-UNIT-OFFSET\n// Verifies: REQ-F-001, StR-CORE-002\n\
                       // @satisfies REQ-F-001\nvoid test_offset() {}\n";
        let cases = extract_test_cases(Path::new("tests/test_offset.cpp"), content);
        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.id, "TEST-UNIT-OFFSET");
        assert_eq!(case.title, "test_offset");
        let refs: Vec<_> = case.references.iter().map(|id| id.as_str()).collect();
        assert_eq!(refs, ["REQ-F-001", "StR-CORE-002"]);
        assert_eq!(case.hash.len(), 8);

        let unnamed = extract_test_cases(Path::new("tests/x.cpp"), "// @satisfies REQ-F-001\n");
        assert!(unnamed.is_empty());
    }

    #[test]
    fn binary_sources_are_skipped() {
        let scan = MemoryTests::new()
            .add("tests/blob.bin", "\0\0// @satisfies REQ-F-001\n")
            .add("tests/test_a.cpp", "// @satisfies REQ-F-001\nvoid test_a() {}\n")
            .scan()
            .unwrap();
        assert_eq!(scan.files_scanned, 1);
        assert_eq!(scan.annotations.len(), 1);
    }

    #[cfg(feature = "walk")]
    mod walk_tests {
        use super::super::*;
        use std::fs;

        #[test]
        fn any_text_file_under_a_tests_root() {
            let temp = tempfile::tempdir().unwrap();
            let root = temp.path().join("tests");
            fs::create_dir_all(&root).unwrap();
            fs::write(
                root.join("sync.test.ts"),
                "// @satisfies STR-CORE-001\nit('syncs', () => {});\n",
            )
            .unwrap();
            fs::write(
                root.join("offset_test.go"),
                "// @satisfies REQ-F-001\nfunc TestOffset(t *testing.T) {}\n",
            )
            .unwrap();
            fs::write(root.join("fixture.bin"), b"\x00\x01// @satisfies REQ-F-009\n").unwrap();

            let scan = WalkTests::new([&root]).scan().unwrap();
            assert_eq!(scan.files_scanned, 2);
            assert_eq!(scan.annotations.len(), 2);

            // An explicit extension list narrows the walk
            let scan = WalkTests::new([&root]).extensions(["go"]).scan().unwrap();
            assert_eq!(scan.annotations.len(), 1);
            assert_eq!(scan.annotations[0].requirement_ids[0].as_str(), "REQ-F-001");
        }

        #[test]
        fn same_named_roots_stay_apart() {
            let temp = tempfile::tempdir().unwrap();
            let unit = temp.path().join("unit/tests");
            let integration = temp.path().join("integration/tests");
            for root in [&unit, &integration] {
                fs::create_dir_all(root).unwrap();
                fs::write(
                    root.join("test_sync.cpp"),
                    "// @satisfies STR-CORE-001\nvoid test_sync() {}\n",
                )
                .unwrap();
            }

            let scan = WalkTests::new([&unit, &integration]).scan().unwrap();
            let mut files: Vec<String> = scan
                .annotations
                .iter()
                .map(|a| a.test.file.to_string_lossy().replace('\\', "/"))
                .collect();
            files.sort();
            assert_eq!(
                files,
                ["integration/tests/test_sync.cpp", "unit/tests/test_sync.cpp"]
            );
            assert_ne!(scan.annotations[0].test, scan.annotations[1].test);
        }
    }
}
