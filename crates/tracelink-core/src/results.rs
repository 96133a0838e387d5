//! Test results parsing
//!
//! A results artifact is read in one of three forms, tried in order; the
//! first form that yields any record wins:
//!
//! 1. Structured XML: `<Test>` elements carrying a name (`<Name>` child) and a
//!    status (`<Status>` child or `Status="..."` attribute). Only the exact
//!    status `passed` counts as passing.
//! 2. Legacy log lines: `Test #3: name ......   Passed` (or `Failed`,
//!    `***Failed`)
//! 3. Blocks: a `3/10 Testing: name` header, closed by `Test Passed.` or
//!    `Test Failed.` before the next header
//!
//! Every name ends up in exactly one of the passing and failing sets; when a
//! name is recorded twice, the last record wins.

use crate::sources::decode_lossy;
use facet::Facet;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// Outcome of one test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum Outcome {
    Passed,
    Failed,
}

/// Which form a results artifact was read as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum ResultFormat {
    Structured,
    Legacy,
    Block,
}

impl ResultFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFormat::Structured => "xml",
            ResultFormat::Legacy => "legacy-log",
            ResultFormat::Block => "block-log",
        }
    }
}

/// Passing and failing test names from one results artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestResults {
    pub passing: BTreeSet<String>,
    pub failing: BTreeSet<String>,
    /// Form the artifact was read as (`None` when nothing was recognized)
    pub format: Option<ResultFormat>,
    pub warnings: Vec<String>,
}

impl TestResults {
    /// Record an outcome, replacing any earlier outcome for the same name
    pub fn record(&mut self, name: impl Into<String>, outcome: Outcome) {
        let name = name.into();
        match outcome {
            Outcome::Passed => {
                self.failing.remove(&name);
                self.passing.insert(name);
            }
            Outcome::Failed => {
                self.passing.remove(&name);
                self.failing.insert(name);
            }
        }
    }

    pub fn outcome_of(&self, name: &str) -> Option<Outcome> {
        if self.passing.contains(name) {
            Some(Outcome::Passed)
        } else if self.failing.contains(name) {
            Some(Outcome::Failed)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.passing.len() + self.failing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passing.is_empty() && self.failing.is_empty()
    }

    /// Parse results text, trying each format in order
    pub fn parse(content: &str) -> Self {
        let parsers: [(ResultFormat, fn(&str) -> Vec<(String, Outcome)>); 3] = [
            (ResultFormat::Structured, parse_xml),
            (ResultFormat::Legacy, parse_legacy),
            (ResultFormat::Block, parse_blocks),
        ];

        for (format, parser) in parsers {
            let records = parser(content);
            if records.is_empty() {
                continue;
            }
            let mut results = TestResults {
                format: Some(format),
                ..Default::default()
            };
            for (name, outcome) in records {
                results.record(name, outcome);
            }
            debug!(
                "Parsed {} results: {} passing, {} failing",
                format.as_str(),
                results.passing.len(),
                results.failing.len()
            );
            return results;
        }

        let mut results = TestResults::default();
        if !content.trim().is_empty() {
            let warning = "No test results recognized in results file".to_string();
            warn!("{}", warning);
            results.warnings.push(warning);
        }
        results
    }

    /// Parse raw bytes, decoding invalid UTF-8 lossily
    pub fn parse_bytes(bytes: Vec<u8>) -> Self {
        Self::parse(&decode_lossy(bytes))
    }

    /// Load a results file. A missing or unreadable file yields empty
    /// results and a warning.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self::parse_bytes(bytes),
            Err(e) => {
                let warning = format!("Test results not readable: {}: {}", path.display(), e);
                warn!("{}", warning);
                TestResults {
                    warnings: vec![warning],
                    ..Default::default()
                }
            }
        }
    }
}

fn outcome_from_status(status: &str) -> Outcome {
    if status.trim() == "passed" {
        Outcome::Passed
    } else {
        Outcome::Failed
    }
}

/// Structured XML: `<Test>` elements with a name and a status.
fn parse_xml(content: &str) -> Vec<(String, Outcome)> {
    let mut records = Vec::new();
    let mut pos = 0;

    while let Some(found) = content[pos..].find("<Test") {
        let tag_start = pos + found;
        let after_name = tag_start + "<Test".len();
        pos = after_name;

        // `<TestList>`, `<Testing>` and friends are other elements
        if !content[after_name..].starts_with([' ', '\t', '\r', '\n', '>', '/']) {
            continue;
        }
        let Some(tag_len) = content[after_name..].find('>') else {
            break;
        };
        let tag_end = after_name + tag_len;
        let attributes = &content[after_name..tag_end];
        pos = tag_end + 1;

        if attributes.trim_end().ends_with('/') {
            continue;
        }
        let Some(body_len) = content[pos..].find("</Test>") else {
            break;
        };
        let body = &content[pos..pos + body_len];
        pos += body_len + "</Test>".len();

        let Some(name) = child_text(body, "Name") else {
            continue;
        };
        let status = child_text(body, "Status").or_else(|| attribute(attributes, "Status"));
        if let Some(status) = status {
            records.push((name, outcome_from_status(&status)));
        }
    }

    records
}

fn child_text(body: &str, element: &str) -> Option<String> {
    let open = format!("<{element}>");
    let close = format!("</{element}>");
    let start = body.find(&open)? + open.len();
    let len = body[start..].find(&close)?;
    Some(unescape(body[start..start + len].trim()))
}

fn attribute(attributes: &str, key: &str) -> Option<String> {
    let mut rest = attributes;
    while let Some(found) = rest.find(key) {
        let preceded_ok = rest[..found].ends_with(char::is_whitespace) || found == 0;
        let after = rest[found + key.len()..].trim_start();
        rest = &rest[found + key.len()..];
        if !preceded_ok {
            continue;
        }
        let Some(value) = after.strip_prefix('=') else {
            continue;
        };
        let value = value.trim_start();
        let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let inner = &value[1..];
        let end = inner.find(quote)?;
        return Some(unescape(&inner[..end]));
    }
    None
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Legacy lines: `Test #<n>: <name> .... <Passed|Failed|***Failed>`
fn parse_legacy(content: &str) -> Vec<(String, Outcome)> {
    let mut records = Vec::new();
    let mut pos = 0;

    while let Some(found) = content[pos..].find("Test") {
        let start = pos + found;
        pos = start + "Test".len();
        if let Some((record, end)) = legacy_record(content, pos) {
            records.push(record);
            pos = end;
        }
    }

    records
}

/// Parse one legacy record right after a `Test` keyword at `pos`.
fn legacy_record(content: &str, pos: usize) -> Option<((String, Outcome), usize)> {
    let mut cursor = Cursor::new(content, pos);
    cursor.whitespace(1)?;
    cursor.literal("#")?;
    cursor.take_while(1, |c| c.is_ascii_digit())?;
    cursor.literal(":")?;
    cursor.whitespace(1)?;
    let name = cursor.take_while(1, |c| !c.is_whitespace())?;
    cursor.whitespace(1)?;
    cursor.take_while(1, |c| c == '.')?;
    // ctest prints `***Failed` flush against the dot leader
    cursor.whitespace(0)?;

    let outcome = if cursor.literal("Passed").is_some() {
        Outcome::Passed
    } else if cursor.literal("Failed").is_some() || cursor.literal("***Failed").is_some() {
        Outcome::Failed
    } else {
        return None;
    };

    Some(((name.to_string(), outcome), cursor.pos))
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, pos: usize) -> Self {
        Self { text, pos }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn literal(&mut self, lit: &str) -> Option<()> {
        if self.rest().starts_with(lit) {
            self.pos += lit.len();
            Some(())
        } else {
            None
        }
    }

    fn take_while(&mut self, min: usize, pred: impl Fn(char) -> bool) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        if rest[..len].chars().count() < min {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn whitespace(&mut self, min: usize) -> Option<()> {
        self.take_while(min, char::is_whitespace).map(|_| ())
    }
}

/// Block form: `<i>/<n> Testing: <name>` headers, closed by
/// `Test Passed.` / `Test Failed.`
fn parse_blocks(content: &str) -> Vec<(String, Outcome)> {
    let mut records = Vec::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if let Some(name) = block_header(line) {
            if let Some(open) = current.replace(name.to_string()) {
                debug!("Result block for {} never finished", open);
            }
            continue;
        }

        let outcome = if line.starts_with("Test Passed.") {
            Outcome::Passed
        } else if line.starts_with("Test Failed.") {
            Outcome::Failed
        } else {
            continue;
        };
        if let Some(name) = current.take() {
            records.push((name, outcome));
        }
    }

    records
}

fn block_header(line: &str) -> Option<&str> {
    let mut cursor = Cursor::new(line, 0);
    cursor.take_while(1, |c| c.is_ascii_digit())?;
    cursor.literal("/")?;
    cursor.take_while(1, |c| c.is_ascii_digit())?;
    cursor.whitespace(1)?;
    cursor.literal("Testing:")?;
    let name = cursor.rest().trim();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn block_format_single_test() {
        let results = TestResults::parse("1/1 Testing: foo_test\nTest Passed.\n");
        assert_eq!(results.passing, set(&["foo_test"]));
        assert!(results.failing.is_empty());
        assert_eq!(results.format, Some(ResultFormat::Block));
    }

    #[test]
    fn block_format_with_output_between() {
        let log = r#"Start testing: Jan 01 00:00 UTC
----------------------------------------------------------
1/3 Testing: test_bmca_select
1/3 Test: test_bmca_select
Command: "/build/tests/test_bmca_select"
Output:
----------------------------------------------------------
All tests passed
<end of output>
Test time =   0.01 sec
----------------------------------------------------------
Test Passed.
"test_bmca_select" end time: Jan 01 00:00 UTC
2/3 Testing: test_unterminated
3/3 Testing: test_offset
Output:
assertion failed
Test Failed.
"#;
        let results = TestResults::parse(log);
        assert_eq!(results.passing, set(&["test_bmca_select"]));
        assert_eq!(results.failing, set(&["test_offset"]));
    }

    #[test]
    fn legacy_lines() {
        let log = "\
    Start 1: test_sync
1/3 Test #1: test_sync ........................   Passed    0.01 sec
2/3 Test #2: test_offset ......................***Failed    0.02 sec
3/3 Test #3: test_port ........................   Failed    0.02 sec
";
        let results = TestResults::parse(log);
        assert_eq!(results.format, Some(ResultFormat::Legacy));
        assert_eq!(results.passing, set(&["test_sync"]));
        assert_eq!(results.failing, set(&["test_offset", "test_port"]));
    }

    #[test]
    fn legacy_failure_marker_after_spaces() {
        let results = TestResults::parse("Test #2: test_offset .....   ***Failed  0.02 sec\n");
        assert_eq!(results.failing, set(&["test_offset"]));
    }

    #[test]
    fn structured_children() {
        let xml = r#"<?xml version="1.0"?>
<Site>
  <Testing>
    <TestList><Test>./tests/test_sync</Test></TestList>
    <Test><Name>test_sync</Name><Status>passed</Status></Test>
    <Test>
      <Name>test_a&amp;b</Name>
      <Status>Passed</Status>
    </Test>
    <Test><Name>test_port</Name><Status>notrun</Status></Test>
  </Testing>
</Site>"#;
        let results = TestResults::parse(xml);
        assert_eq!(results.format, Some(ResultFormat::Structured));
        assert_eq!(results.passing, set(&["test_sync"]));
        // status is case-sensitive
        assert_eq!(results.failing, set(&["test_a&b", "test_port"]));
    }

    #[test]
    fn structured_status_attribute() {
        let xml = r#"<Testing>
<Test Status="passed"><Name>test_sync</Name><Path>./tests</Path></Test>
<Test Status="failed"><Name>test_port</Name></Test>
</Testing>"#;
        let results = TestResults::parse(xml);
        assert_eq!(results.passing, set(&["test_sync"]));
        assert_eq!(results.failing, set(&["test_port"]));
    }

    #[test]
    fn last_write_wins() {
        let results = TestResults::parse(
            "1/2 Testing: flaky\nTest Failed.\n2/2 Testing: flaky\nTest Passed.\n",
        );
        assert_eq!(results.passing, set(&["flaky"]));
        assert!(results.failing.is_empty());

        let mut results = results;
        results.record("flaky", Outcome::Failed);
        assert_eq!(results.outcome_of("flaky"), Some(Outcome::Failed));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn first_recognized_format_wins() {
        let mixed = "<Test><Name>xml_test</Name><Status>passed</Status></Test>\n\
                     Test #1: log_test ..... Passed\n";
        let results = TestResults::parse(mixed);
        assert_eq!(results.passing, set(&["xml_test"]));
    }

    #[test]
    fn unrecognized_content_warns() {
        let results = TestResults::parse("nothing to see here\n");
        assert!(results.is_empty());
        assert_eq!(results.format, None);
        assert_eq!(results.warnings.len(), 1);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let mut bytes = b"1/1 Testing: foo_test\n".to_vec();
        bytes.extend_from_slice(b"\xff\xfe garbage\n");
        bytes.extend_from_slice(b"Test Passed.\n");
        let results = TestResults::parse_bytes(bytes);
        assert_eq!(results.passing, set(&["foo_test"]));
    }

    #[test]
    fn missing_file_is_empty_with_warning() {
        let temp = tempfile::tempdir().unwrap();
        let results = TestResults::load(&temp.path().join("LastTest.log"));
        assert!(results.is_empty());
        assert_eq!(results.warnings.len(), 1);
    }
}
