//! Identifier grammar and line matchers
//!
//! Traceable identifiers look like `STR-CORE-001`, `REQ-F-202` or
//! `REQ-NF-REL-004`: a category tag, zero or more upper-case grouping
//! segments and a numeric suffix, joined by `-`. They are only recognized on
//! word boundaries, so `XSTR-CORE-001` or `STR-CORE-001_b` never match.
//!
//! Each occurrence is classified as a *definition* or a *reference*. A
//! definition is a heading whose first token is exactly an identifier (the
//! front-matter `id` field is handled by the document scanner); everything
//! else is a reference.
//!
//! ```
//! use tracelink_core::grammar::{LineContext, OccurrenceKind, classify_line};
//!
//! let found = classify_line("### STR-CORE-001: Sync (see REQ-F-002)", LineContext::Heading);
//! assert_eq!(found.len(), 2);
//! assert_eq!(found[0].id.as_str(), "STR-CORE-001");
//! assert_eq!(found[0].kind, OccurrenceKind::Definition);
//! assert_eq!(found[1].kind, OccurrenceKind::Reference);
//! ```
//!
//! The remaining matchers in this module are the small building blocks the
//! document scanner composes: heading bodies, priority bullets, obligation
//! bullets and acceptance-criteria labels.

use facet::Facet;
use std::fmt::{Display, Formatter};

use crate::SourceSpan;

/// Closed set of identifier categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Facet)]
#[repr(u8)]
pub enum Category {
    /// `StR-*` / `STR-*`
    Stakeholder,
    /// `REQ-*`
    Requirement,
    /// `ARC-*`
    Architecture,
    /// `ADR-*`
    Decision,
    /// `QA-*`
    Quality,
    /// `TEST-*`
    Test,
}

impl Category {
    /// Parse a category from its tag as written in documents
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "StR" | "STR" => Some(Category::Stakeholder),
            "REQ" => Some(Category::Requirement),
            "ARC" => Some(Category::Architecture),
            "ADR" => Some(Category::Decision),
            "QA" => Some(Category::Quality),
            "TEST" => Some(Category::Test),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Stakeholder => "stakeholder-requirement",
            Category::Requirement => "requirement",
            Category::Architecture => "architecture-element",
            Category::Decision => "decision-record",
            Category::Quality => "quality-attribute",
            Category::Test => "test-case",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A well-formed traceable identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier {
    text: String,
    category: Category,
    groups: Vec<String>,
    number: u32,
}

impl Identifier {
    /// Parse a whole string as an identifier.
    pub fn parse(s: &str) -> Option<Self> {
        Self::parse_prefix(s).filter(|id| id.text.len() == s.len())
    }

    /// Match an identifier at the very start of `text`.
    ///
    /// Trailing segments that don't fit the grammar are left unconsumed, so
    /// `REQ-F-001-draft` yields `REQ-F-001`.
    pub fn parse_prefix(text: &str) -> Option<Self> {
        let run_len = text
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(text.len());
        let run = &text[..run_len];

        let mut parts = run.split('-');
        let tag = parts.next()?;
        let category = Category::from_tag(tag)?;

        let mut consumed = tag.len();
        let mut segments: Vec<&str> = Vec::new();
        // (end offset, number of grouping segments, numeric suffix)
        let mut best: Option<(usize, usize, u32)> = None;

        for part in parts {
            if part.is_empty()
                || !part
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
            {
                break;
            }
            consumed += 1 + part.len();
            if part.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(number) = part.parse::<u32>() {
                    best = Some((consumed, segments.len(), number));
                }
            }
            segments.push(part);
        }

        let (end, group_count, number) = best?;
        if text[end..].starts_with('_') {
            return None;
        }

        Some(Self {
            text: text[..end].to_string(),
            category,
            groups: segments[..group_count]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            number,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Grouping segments between the tag and the numeric suffix
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

/// An identifier found in a piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMatch {
    pub id: Identifier,
    pub span: SourceSpan,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Find every well-formed identifier in `text`, left to right.
pub fn scan_identifiers(text: &str) -> Vec<IdMatch> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        // ASCII letters are always char boundaries, so slicing here is safe
        if bytes[i].is_ascii_alphabetic() && (i == 0 || !is_word_byte(bytes[i - 1])) {
            if let Some(id) = Identifier::parse_prefix(&text[i..]) {
                let length = id.len();
                found.push(IdMatch {
                    id,
                    span: SourceSpan::new(i, length),
                });
                i += length;
                continue;
            }
        }
        i += 1;
    }

    found
}

/// Whether an occurrence declares an identifier or merely mentions it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum OccurrenceKind {
    Definition,
    Reference,
}

impl OccurrenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccurrenceKind::Definition => "definition",
            OccurrenceKind::Reference => "reference",
        }
    }
}

impl Display for OccurrenceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the document scanner sees a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineContext {
    /// Body text, table rows, bullets, fenced code
    Text,
    /// A markdown heading (ATX or setext)
    Heading,
}

/// An identifier on a line together with its classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedId {
    pub id: Identifier,
    pub kind: OccurrenceKind,
    pub span: SourceSpan,
}

/// Classify every identifier on one line.
///
/// Only the first token of a heading can be a definition; every other
/// identifier on the line is a reference, whatever its position.
pub fn classify_line(line: &str, context: LineContext) -> Vec<ClassifiedId> {
    let definition_offset = match context {
        LineContext::Heading => heading_definition(line).map(|def| def.offset),
        LineContext::Text => None,
    };

    scan_identifiers(line)
        .into_iter()
        .map(|m| {
            let kind = if Some(m.span.offset) == definition_offset {
                OccurrenceKind::Definition
            } else {
                OccurrenceKind::Reference
            };
            ClassifiedId {
                id: m.id,
                kind,
                span: m.span,
            }
        })
        .collect()
}

/// Strip ATX heading markers (`#` .. `######`), returning the byte offset of
/// the heading body within `line` and the trimmed body.
///
/// Lines without markers (setext headings) are returned trimmed.
pub fn heading_body(line: &str) -> (usize, &str) {
    let indent = line.len() - line.trim_start().len();
    let after_indent = &line[indent..];
    let hashes = after_indent.bytes().take_while(|&b| b == b'#').count();

    let start = if (1..=6).contains(&hashes) {
        indent + hashes
    } else {
        indent
    };
    let body = &line[start..];
    let lead = body.len() - body.trim_start().len();
    (start + lead, body.trim())
}

/// A heading that defines an identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingDefinition {
    pub id: Identifier,
    /// Byte offset of the identifier within the line
    pub offset: usize,
    /// Remainder of the heading, without separators or a `(P<n>)` suffix
    pub title: String,
    /// Priority written as a `(P<n>)` heading suffix
    pub priority: Option<Priority>,
}

/// Match a heading whose first token is exactly an identifier.
///
/// A trailing `:`, `,` or `.` on the token is tolerated (`### REQ-F-001: ...`).
pub fn heading_definition(line: &str) -> Option<HeadingDefinition> {
    let (offset, body) = heading_body(line);
    let token = body.split_whitespace().next()?;
    let bare = token.trim_end_matches([':', ',', '.']);
    let id = Identifier::parse(bare)?;

    let remainder = body[token.len()..].trim_matches(|c: char| " -:,\t".contains(c));
    let (title, priority) = split_priority_suffix(remainder);

    Some(HeadingDefinition {
        id,
        offset,
        title: title.to_string(),
        priority,
    })
}

/// Requirement priority, `P0` being the most important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u32);

impl Priority {
    /// Priority assumed when a definition doesn't state one
    pub const DEFAULT: Priority = Priority(1);

    /// Parse `P<n>` (case-insensitive `P`, surrounding whitespace ignored).
    ///
    /// Levels that don't fit a `u32` are not priorities.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let digits = s.strip_prefix('P').or_else(|| s.strip_prefix('p'))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Priority)
    }

    pub fn level(&self) -> u32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Split a `(P<n>)` suffix off a heading title
pub fn split_priority_suffix(title: &str) -> (&str, Option<Priority>) {
    let trimmed = title.trim_end();
    if let Some(inner) = trimmed.strip_suffix(')') {
        if let Some(open) = inner.rfind('(') {
            if let Some(priority) = Priority::parse(&inner[open + 1..]) {
                return (inner[..open].trim_end(), Some(priority));
            }
        }
    }
    (trimmed, None)
}

/// Content of a markdown bullet line (`- `, `* ` or `+ `), trimmed
pub fn bullet_item(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
        .map(str::trim)
}

/// Match a `priority: P<n>` bullet, tolerating `**` emphasis around the key.
pub fn priority_bullet(line: &str) -> Option<Priority> {
    let item = bullet_item(line)?.replace("**", "");
    let (key, value) = item.split_once(':')?;
    if !key.trim().eq_ignore_ascii_case("priority") {
        return None;
    }
    let token = value
        .split(|c: char| c.is_whitespace() || c == ',' || c == '(')
        .find(|t| !t.is_empty())?;
    Priority::parse(token)
}

/// Match a bullet carrying an imperative obligation (`SHALL` / `MUST`),
/// returning the bullet text without its marker.
pub fn obligation_bullet(line: &str) -> Option<&str> {
    let item = bullet_item(line)?;
    item.split(|c: char| !c.is_ascii_alphabetic())
        .any(|word| word == "SHALL" || word == "MUST")
        .then_some(item)
}

/// Whether a line labels an "Acceptance Criteria" section
pub fn is_acceptance_label(line: &str) -> bool {
    line.to_ascii_lowercase().contains("acceptance criteria")
}
