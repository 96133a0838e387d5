//! Configuration schema for tracelink
//!
//! Config lives at `.config/tracelink/config.yaml` relative to the project
//! root. Every key is optional and command line flags override it:
//!
//! ```yaml
//! requirements:
//!   - docs/requirements
//!   - docs/architecture
//! tests:
//!   - tests
//! results: build/Testing/Temporary/LastTest.log
//! ignore:
//!   - "**/drafts/**"
//! extensions:
//!   documents: [md]
//!   tests: [cpp, hpp]
//! priorities: [P0, P1]
//! threshold: 80.0
//! ```
//!
//! Each root entry may itself hold several roots separated by `;` or `,`.

use eyre::{Result, WrapErr};
use facet::Facet;
use std::path::{Path, PathBuf};
use tracelink_core::pipeline::TraceInputs;
use tracelink_core::{CoverageOptions, Priority, split_roots};

/// Default config location, relative to the project root
pub const DEFAULT_CONFIG_PATH: &str = ".config/tracelink/config.yaml";

/// Root configuration for tracelink
#[derive(Debug, Clone, Default, Facet)]
pub struct Config {
    /// Roots holding requirement documents
    #[facet(default)]
    pub requirements: Vec<String>,

    /// Roots holding test sources
    #[facet(default)]
    pub tests: Vec<String>,

    /// Test results artifact (CTest XML or ctest log)
    #[facet(default)]
    pub results: Option<String>,

    /// Glob patterns to skip, relative to each root
    #[facet(default)]
    pub ignore: Vec<String>,

    /// File extensions to scan
    #[facet(default)]
    pub extensions: Option<ExtensionsConfig>,

    /// Priorities counted by the aggregate (default P0 and P1)
    #[facet(default)]
    pub priorities: Vec<String>,

    /// Minimum aggregate coverage in percent (default 75)
    #[facet(default)]
    pub threshold: Option<f64>,
}

/// Extension overrides for the two scanned trees
#[derive(Debug, Clone, Default, Facet)]
pub struct ExtensionsConfig {
    /// Requirement document extensions (default md, markdown)
    #[facet(default)]
    pub documents: Vec<String>,

    /// Test source extensions (default: every text file)
    #[facet(default)]
    pub tests: Vec<String>,
}

/// Values given on the command line; they win over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub requirements: Vec<String>,
    pub tests: Vec<String>,
    pub results: Option<PathBuf>,
    pub ignore: Vec<String>,
    pub priorities: Vec<String>,
    pub threshold: Option<f64>,
}

/// Load config from `path`. A missing file yields the default config.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("No config file at {}", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = facet_yaml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Walk up from the current directory to the nearest directory holding a
/// tracelink config or a `.git` directory.
pub fn find_project_root() -> Result<PathBuf> {
    let start = std::env::current_dir().wrap_err("Failed to get current directory")?;
    let mut current = start.clone();

    loop {
        if current.join(DEFAULT_CONFIG_PATH).exists() || current.join(".git").exists() {
            return Ok(current);
        }

        if !current.pop() {
            return Ok(start);
        }
    }
}

fn roots(entries: &[String], base: &Path) -> Vec<PathBuf> {
    entries
        .iter()
        .flat_map(|entry| split_roots(entry))
        .map(|root| base.join(root))
        .collect()
}

fn parse_priorities(values: &[String]) -> Result<Vec<Priority>> {
    values
        .iter()
        .flat_map(|v| split_roots(v))
        .map(|v| {
            Priority::parse(&v)
                .ok_or_else(|| eyre::eyre!("Invalid priority '{}' (expected P0, P1, ...)", v))
        })
        .collect()
}

impl Config {
    /// Merge the config with command line overrides into pipeline inputs.
    ///
    /// Relative config paths resolve against `base` (the project root);
    /// command line paths stay relative to the working directory.
    pub fn resolve(
        &self,
        overrides: &Overrides,
        base: &Path,
    ) -> Result<(TraceInputs, CoverageOptions)> {
        let requirements = if overrides.requirements.is_empty() {
            roots(&self.requirements, base)
        } else {
            roots(&overrides.requirements, Path::new(""))
        };
        if requirements.is_empty() {
            eyre::bail!(
                "No requirement roots given\n\n\
                 Pass --requirements <DIR> or add them to {}:\n\n\
                 requirements:\n  \
                   - docs/requirements",
                DEFAULT_CONFIG_PATH
            );
        }

        let tests = if overrides.tests.is_empty() {
            roots(&self.tests, base)
        } else {
            roots(&overrides.tests, Path::new(""))
        };

        let results = overrides
            .results
            .clone()
            .or_else(|| self.results.as_ref().map(|r| base.join(r)));

        let mut ignore = self.ignore.clone();
        ignore.extend(overrides.ignore.iter().cloned());

        let extensions = self.extensions.clone().unwrap_or_default();
        let non_empty = |v: Vec<String>| (!v.is_empty()).then_some(v);

        let inputs = TraceInputs {
            requirements,
            tests,
            results,
            ignore,
            document_extensions: non_empty(extensions.documents),
            test_extensions: non_empty(extensions.tests),
        };

        let mut options = CoverageOptions::default();
        let priorities = if overrides.priorities.is_empty() {
            parse_priorities(&self.priorities)?
        } else {
            parse_priorities(&overrides.priorities)?
        };
        if !priorities.is_empty() {
            options.priorities = priorities.into_iter().collect();
        }
        if let Some(threshold) = overrides.threshold.or(self.threshold) {
            if !(0.0..=100.0).contains(&threshold) {
                eyre::bail!("Threshold must be between 0 and 100, got {}", threshold);
            }
            options.threshold = threshold;
        }

        Ok((inputs, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_is_default() {
        let temp = tempfile::tempdir().unwrap();
        let config = load_config(&temp.path().join("config.yaml")).unwrap();
        assert!(config.requirements.is_empty());
        assert!(config.threshold.is_none());
    }

    #[test]
    fn parses_yaml_config() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "requirements:\n  - docs/req;docs/arch\ntests:\n  - tests\n\
             results: build/LastTest.log\n\
             extensions:\n  tests: [cpp]\npriorities: [P0]\nthreshold: 90.0\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.requirements, ["docs/req;docs/arch"]);
        assert_eq!(config.threshold, Some(90.0));

        let (inputs, options) = config.resolve(&Overrides::default(), Path::new("/repo")).unwrap();
        assert_eq!(
            inputs.requirements,
            [PathBuf::from("/repo/docs/req"), PathBuf::from("/repo/docs/arch")]
        );
        assert_eq!(inputs.results, Some(PathBuf::from("/repo/build/LastTest.log")));
        assert_eq!(inputs.test_extensions, Some(vec!["cpp".to_string()]));
        assert_eq!(inputs.document_extensions, None);
        assert_eq!(options.priorities.len(), 1);
        assert_eq!(options.threshold, 90.0);
    }

    #[test]
    fn command_line_wins() {
        let config = Config {
            requirements: vec!["docs/req".into()],
            threshold: Some(90.0),
            ..Default::default()
        };
        let overrides = Overrides {
            requirements: vec!["other,more".into()],
            threshold: Some(50.0),
            priorities: vec!["P0,P1,P2".into()],
            ..Default::default()
        };
        let (inputs, options) = config.resolve(&overrides, Path::new("/repo")).unwrap();
        assert_eq!(inputs.requirements, [PathBuf::from("other"), PathBuf::from("more")]);
        assert_eq!(options.threshold, 50.0);
        assert_eq!(options.priorities.len(), 3);
    }

    #[test]
    fn rejects_bad_values() {
        let config = Config {
            requirements: vec!["docs".into()],
            ..Default::default()
        };
        let bad_priority = Overrides {
            priorities: vec!["high".into()],
            ..Default::default()
        };
        assert!(config.resolve(&bad_priority, Path::new(".")).is_err());

        let bad_threshold = Overrides {
            threshold: Some(120.0),
            ..Default::default()
        };
        assert!(config.resolve(&bad_threshold, Path::new(".")).is_err());

        assert!(Config::default().resolve(&Overrides::default(), Path::new(".")).is_err());
    }
}
