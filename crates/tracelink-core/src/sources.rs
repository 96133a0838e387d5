//! File discovery and reading shared by the document and test scanners.
//!
//! Every file list handed to a scanner is put in *canonical order* first:
//! sorted by parent directory, then by file name. Deduplication keeps the
//! first definition it sees, so this order is part of the public contract
//! rather than an accident of directory traversal.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

#[cfg(feature = "walk")]
use eyre::{Result, WrapErr};

/// A file to scan: where to read it from, and how to name it in reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path used to read the file
    pub path: PathBuf,
    /// Path shown in reports and used in composite test ids
    pub display: PathBuf,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            display: path.clone(),
            path,
        }
    }
}

/// Compare two paths by (directory, file name).
pub fn canonical_cmp(a: &Path, b: &Path) -> Ordering {
    a.parent()
        .cmp(&b.parent())
        .then_with(|| a.file_name().cmp(&b.file_name()))
}

/// Sort files into canonical order.
pub fn sort_canonical(files: &mut [SourceFile]) {
    files.sort_by(|a, b| canonical_cmp(&a.path, &b.path));
}

/// Read a file, decoding invalid UTF-8 lossily instead of failing.
pub fn read_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(decode_lossy(bytes))
}

/// Decode bytes as UTF-8, replacing invalid sequences.
pub fn decode_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// First eight hex digits of the BLAKE3 hash of `text`.
pub fn short_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().as_str()[..8].to_string()
}

/// Directory that report paths are made relative to.
///
/// For one root this is its parent, so a root of `verification/tests`
/// yields `tests/test_sync.cpp`. For several it is the longest common
/// ancestor of their parents, which keeps same-named roots apart.
pub fn display_base(roots: &[PathBuf]) -> PathBuf {
    let mut parents = roots.iter().map(|r| r.parent().unwrap_or(r));
    let Some(first) = parents.next() else {
        return PathBuf::new();
    };
    let mut base: Vec<Component> = first.components().collect();
    for parent in parents {
        let shared = base
            .iter()
            .zip(parent.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        base.truncate(shared);
    }
    base.iter().collect()
}

/// Split a root list given as one string on `;` and `,`.
///
/// ```
/// assert_eq!(
///     tracelink_core::split_roots("docs/req; docs/arch,tests"),
///     vec!["docs/req", "docs/arch", "tests"]
/// );
/// ```
pub fn split_roots(spec: &str) -> Vec<String> {
    spec.split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read and process every file, in order.
///
/// Unreadable files are logged and reported as warnings; they never abort the
/// run. Output order matches input order even when processing in parallel.
pub(crate) fn map_files<T, F>(files: &[SourceFile], process: F) -> (Vec<T>, Vec<String>)
where
    T: Send,
    F: Fn(&SourceFile, &str) -> T + Sync + Send,
{
    let read_one = |file: &SourceFile| -> Result<T, String> {
        match read_lossy(&file.path) {
            Ok(content) => Ok(process(file, &content)),
            Err(e) => {
                let message = format!("Skipping unreadable file {}: {}", file.path.display(), e);
                warn!("{}", message);
                Err(message)
            }
        }
    };

    #[cfg(feature = "parallel")]
    let results: Vec<Result<T, String>> = {
        use rayon::prelude::*;
        files.par_iter().map(read_one).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<T, String>> = files.iter().map(read_one).collect();

    let mut items = Vec::with_capacity(results.len());
    let mut warnings = Vec::new();
    for result in results {
        match result {
            Ok(item) => items.push(item),
            Err(message) => warnings.push(message),
        }
    }
    (items, warnings)
}

/// Files found under a set of roots, in canonical order
#[derive(Debug, Default)]
pub struct FileSet {
    pub files: Vec<SourceFile>,
    pub warnings: Vec<String>,
}

/// Gitignore-aware walker over one or more roots
#[cfg(feature = "walk")]
pub struct WalkFiles {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    ignore: Vec<String>,
    skip_readme: bool,
    base: Option<PathBuf>,
}

#[cfg(feature = "walk")]
impl WalkFiles {
    /// Create a walker over the given roots
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            extensions: Vec::new(),
            ignore: Vec::new(),
            skip_readme: false,
            base: None,
        }
    }

    /// Only accept these extensions (without the dot)
    pub fn extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extensions
            .extend(extensions.into_iter().map(Into::into));
        self
    }

    /// Skip files matching these globs (relative to their root)
    pub fn ignore(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignore.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Name files relative to `base` instead of [`display_base`] of the roots
    pub fn display_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Skip `README*` files
    pub fn skip_readme(mut self, skip: bool) -> Self {
        self.skip_readme = skip;
        self
    }

    /// Walk all roots and keep files accepted by `accept`.
    ///
    /// `accept` sees each candidate's path relative to its root. A missing
    /// root is a warning, not an error.
    pub fn collect(self, accept: impl Fn(&Path) -> bool) -> Result<FileSet> {
        use globset::{Glob, GlobSetBuilder};
        use ignore::WalkBuilder;

        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore {
            builder.add(
                Glob::new(pattern)
                    .wrap_err_with(|| format!("Invalid ignore pattern '{}'", pattern))?,
            );
        }
        let ignored = builder.build().wrap_err("Failed to build ignore patterns")?;

        let mut set = FileSet::default();
        let base = self.base.clone().unwrap_or_else(|| display_base(&self.roots));

        for root in &self.roots {
            if !root.exists() {
                let warning = format!("Input root not found: {}", root.display());
                warn!("{}", warning);
                set.warnings.push(warning);
                continue;
            }

            let walker = WalkBuilder::new(root)
                .follow_links(true)
                .hidden(false) // Don't skip hidden files (but .git is in .gitignore)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .build();

            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        let warning = format!("Failed to walk {}: {}", root.display(), e);
                        warn!("{}", warning);
                        set.warnings.push(warning);
                        continue;
                    }
                };

                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let path = entry.path();

                if !self.extensions.is_empty()
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_none_or(|ext| !self.extensions.iter().any(|x| x == ext))
                {
                    continue;
                }

                if self.skip_readme
                    && path
                        .file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with("README"))
                {
                    continue;
                }

                let relative = path.strip_prefix(root).unwrap_or(path);
                if ignored.is_match(relative) || !accept(relative) {
                    continue;
                }

                set.files.push(SourceFile {
                    path: path.to_path_buf(),
                    display: path.strip_prefix(&base).unwrap_or(path).to_path_buf(),
                });
            }
        }

        sort_canonical(&mut set.files);
        set.files.dedup_by(|a, b| a.path == b.path);
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_is_directory_then_name() {
        let mut files = vec![
            SourceFile::new("req/b/a.md"),
            SourceFile::new("req/z.md"),
            SourceFile::new("req/a/z.md"),
            SourceFile::new("req/a.md"),
        ];
        sort_canonical(&mut files);
        let order: Vec<_> = files.iter().map(|f| f.path.to_string_lossy().into_owned()).collect();
        assert_eq!(order, ["req/a.md", "req/z.md", "req/a/z.md", "req/b/a.md"]);
    }

    #[test]
    fn lossy_decoding() {
        let text = decode_lossy(b"Test Passed.\xff\n".to_vec());
        assert!(text.starts_with("Test Passed."));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn display_base_of_roots() {
        assert_eq!(
            display_base(&[PathBuf::from("verification/tests")]),
            PathBuf::from("verification")
        );
        assert_eq!(
            display_base(&[PathBuf::from("a/unit/tests"), PathBuf::from("a/integration/tests")]),
            PathBuf::from("a")
        );
        assert_eq!(
            display_base(&[PathBuf::from("tests"), PathBuf::from("b/tests")]),
            PathBuf::new()
        );
        assert_eq!(display_base(&[]), PathBuf::new());
    }

    #[test]
    fn short_hash_is_stable() {
        assert_eq!(short_hash("STR-CORE-001"), short_hash("STR-CORE-001"));
        assert_ne!(short_hash("STR-CORE-001"), short_hash("STR-CORE-002"));
        assert_eq!(short_hash("").len(), 8);
    }

    #[test]
    fn split_roots_handles_both_delimiters() {
        assert_eq!(split_roots("a;b , c;;"), vec!["a", "b", "c"]);
        assert!(split_roots("").is_empty());
    }

    #[cfg(feature = "walk")]
    mod walk_tests {
        use super::super::*;

        #[test]
        fn walk_filters_and_orders() {
            let temp = tempfile::tempdir().unwrap();
            let root = temp.path().join("requirements");
            std::fs::create_dir_all(root.join("templates")).unwrap();
            std::fs::create_dir_all(root.join("core")).unwrap();
            std::fs::write(root.join("b.md"), "# B").unwrap();
            std::fs::write(root.join("a.md"), "# A").unwrap();
            std::fs::write(root.join("README.md"), "# readme").unwrap();
            std::fs::write(root.join("notes.txt"), "text").unwrap();
            std::fs::write(root.join("templates/x.md"), "# tpl").unwrap();
            std::fs::write(root.join("core/c.md"), "# C").unwrap();

            let set = WalkFiles::new([&root, &temp.path().join("missing")])
                .extensions(["md"])
                .ignore(["**/templates/**"])
                .skip_readme(true)
                .collect(|_| true)
                .unwrap();

            let names: Vec<String> = set
                .files
                .iter()
                .map(|f| f.display.to_string_lossy().replace('\\', "/"))
                .collect();
            assert_eq!(
                names,
                ["requirements/a.md", "requirements/b.md", "requirements/core/c.md"]
            );
            assert_eq!(set.warnings.len(), 1);
            assert!(set.warnings[0].contains("missing"));
        }
    }
}
