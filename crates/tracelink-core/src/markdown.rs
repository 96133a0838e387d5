//! Markdown structure needed by the document scanner.
//!
//! This module locates three things in a requirement document:
//! 1. The leading YAML front-matter block (`---` delimited)
//! 2. Headings, ATX or setext
//! 3. Fenced code blocks and their contents
//!
//! Headings and fences come from `pulldown-cmark`, so a `#` line inside a
//! fenced block is never mistaken for a heading.
//!
//! ```
//! use tracelink_core::markdown::Outline;
//!
//! let doc = "---\nid: STR-CORE-001\n---\n# Title\n\n```\nnot # a heading\n```\n";
//! let outline = Outline::parse(doc);
//! assert_eq!(outline.front_matter.id.as_deref(), Some("STR-CORE-001"));
//! assert_eq!(outline.headings.len(), 1);
//! assert_eq!(outline.headings[0].line, 4);
//! assert_eq!(outline.fences.len(), 1);
//! ```

use facet::Facet;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Front-matter metadata of a document (all fields empty when absent).
///
/// Keys other than these are accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Facet)]
pub struct FrontMatter {
    /// Identifier this document defines
    #[facet(default)]
    pub id: Option<String>,

    #[facet(default)]
    pub title: Option<String>,

    /// Priority as written, e.g. `P0`
    #[facet(default)]
    pub priority: Option<String>,
}

impl FrontMatter {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.title.is_none() && self.priority.is_none()
    }
}

/// A heading line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heading {
    /// Line number (1-indexed)
    pub line: usize,
    pub level: u8,
}

/// A fenced code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fence {
    /// Line of the opening fence (1-indexed)
    pub start_line: usize,
    /// Line of the closing fence, or the last line of an unclosed block
    pub end_line: usize,
    /// Info string after the opening fence
    pub info: String,
    /// Block contents without the fences
    pub body: String,
}

/// Structure of one markdown document
#[derive(Debug, Clone, Default)]
pub struct Outline {
    pub front_matter: FrontMatter,
    /// Number of lines taken by the front-matter block, fences included
    pub front_matter_lines: usize,
    /// Line of the top-level `id:` key (1-indexed)
    pub front_matter_id_line: Option<usize>,
    /// Why the front-matter block was ignored, when it was
    pub front_matter_error: Option<String>,
    pub headings: Vec<Heading>,
    pub fences: Vec<Fence>,
}

impl Outline {
    /// Parse the outline of a markdown document.
    pub fn parse(content: &str) -> Self {
        let block = parse_front_matter(content);
        let front_matter_lines = block.lines;

        // Track line starts for computing line numbers from byte offsets
        let line_starts: Vec<usize> = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        let get_line = |offset: usize| -> usize {
            match line_starts.binary_search(&offset) {
                Ok(line) => line + 1,
                Err(line) => line,
            }
        };

        let body_offset = line_starts
            .get(front_matter_lines)
            .copied()
            .unwrap_or(content.len())
            .min(content.len());
        let body = &content[body_offset..];

        let mut headings = Vec::new();
        let mut fences = Vec::new();
        let mut open_fence: Option<Fence> = None;

        for (event, range) in Parser::new_ext(body, Options::empty()).into_offset_iter() {
            let start = body_offset + range.start;
            let end = body_offset + range.end.max(range.start + 1) - 1;
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    headings.push(Heading {
                        line: get_line(start),
                        level: level as u8,
                    });
                }
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    open_fence = Some(Fence {
                        start_line: get_line(start),
                        end_line: get_line(end),
                        info: info.to_string(),
                        body: String::new(),
                    });
                }
                Event::Text(text) => {
                    if let Some(fence) = open_fence.as_mut() {
                        fence.body.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(fence) = open_fence.take() {
                        fences.push(fence);
                    }
                }
                _ => {}
            }
        }

        Self {
            front_matter: block.front_matter,
            front_matter_lines,
            front_matter_id_line: block.id_line,
            front_matter_error: block.error,
            headings,
            fences,
        }
    }

    /// Whether `line` is a heading
    pub fn is_heading(&self, line: usize) -> bool {
        self.headings.iter().any(|h| h.line == line)
    }

    /// The fenced block opening on `line`, if any
    pub fn fence_at(&self, line: usize) -> Option<&Fence> {
        self.fences.iter().find(|f| f.start_line == line)
    }

    /// Whether `line` falls inside a fenced block (fences included)
    pub fn in_fence(&self, line: usize) -> bool {
        self.fences
            .iter()
            .any(|f| (f.start_line..=f.end_line).contains(&line))
    }
}

struct FrontMatterBlock {
    front_matter: FrontMatter,
    lines: usize,
    id_line: Option<usize>,
    error: Option<String>,
}

impl FrontMatterBlock {
    fn absent() -> Self {
        Self {
            front_matter: FrontMatter::default(),
            lines: 0,
            id_line: None,
            error: None,
        }
    }
}

/// Find and deserialize the leading front-matter block.
///
/// A block that fails to deserialize still spans its lines, so the body is
/// parsed from after its closing fence. An unclosed block spans nothing.
fn parse_front_matter(content: &str) -> FrontMatterBlock {
    let mut lines = content.lines();
    match lines.next() {
        Some(first) if first.trim_start_matches('\u{feff}').trim_end() == "---" => {}
        _ => return FrontMatterBlock::absent(),
    }

    let mut yaml = String::new();
    let mut id_line = None;
    for (idx, line) in lines.enumerate() {
        let line_num = idx + 2;
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let parsed = if yaml.trim().is_empty() {
                Ok(FrontMatter::default())
            } else {
                facet_yaml::from_str::<FrontMatter>(&yaml).map_err(|e| e.to_string())
            };
            return match parsed {
                Ok(front_matter) => FrontMatterBlock {
                    front_matter,
                    lines: line_num,
                    id_line,
                    error: None,
                },
                Err(error) => FrontMatterBlock {
                    lines: line_num,
                    error: Some(error),
                    ..FrontMatterBlock::absent()
                },
            };
        }

        if id_line.is_none() && line.starts_with("id:") {
            id_line = Some(line_num);
        }
        yaml.push_str(line);
        yaml.push('\n');
    }

    FrontMatterBlock {
        error: Some("front matter is never closed".to_string()),
        ..FrontMatterBlock::absent()
    }
}
