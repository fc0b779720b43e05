//! pkgmerge configuration (`pkgmerge.toml`).
//!
//! Defines the typed configuration for reference scanning, guidance output
//! and execution strategy. Every section and key is optional; a missing file
//! means all defaults.
//!
//! ```toml
//! [analysis]
//! reference_prefixes = ["rule!", "cons!", "recordType!"]
//!
//! [guidance]
//! max_excerpt_lines = 20
//!
//! [execution]
//! parallel = false
//! ```

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use pkgmerge_core::graph::{DEFAULT_REFERENCE_PREFIXES, GraphOptions};
use pkgmerge_core::guidance::{DEFAULT_MAX_EXCERPT_LINES, GuidanceOptions};
use pkgmerge_core::pipeline::ReconcileOptions;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "pkgmerge.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level pkgmerge configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PkgmergeConfig {
    /// Dependency analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Merge guidance settings.
    #[serde(default)]
    pub guidance: GuidanceConfig,

    /// Execution strategy.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

// ---------------------------------------------------------------------------
// AnalysisConfig
// ---------------------------------------------------------------------------

/// Dependency analysis settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Token prefixes that introduce a named reference in object code
    /// (default: `["rule!", "cons!", "recordType!"]`).
    #[serde(default = "default_reference_prefixes")]
    pub reference_prefixes: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            reference_prefixes: default_reference_prefixes(),
        }
    }
}

fn default_reference_prefixes() -> Vec<String> {
    DEFAULT_REFERENCE_PREFIXES
        .iter()
        .map(|p| (*p).to_owned())
        .collect()
}

// ---------------------------------------------------------------------------
// GuidanceConfig
// ---------------------------------------------------------------------------

/// Merge guidance settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuidanceConfig {
    /// Lines kept per side in each conflict excerpt (default: 20).
    #[serde(default = "default_max_excerpt_lines")]
    pub max_excerpt_lines: usize,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            max_excerpt_lines: default_max_excerpt_lines(),
        }
    }
}

const fn default_max_excerpt_lines() -> usize {
    DEFAULT_MAX_EXCERPT_LINES
}

// ---------------------------------------------------------------------------
// ExecutionConfig
// ---------------------------------------------------------------------------

/// Execution strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Compute deltas, graphs and guidance on a thread pool (default: false).
    ///
    /// Only effective when built with the `parallel` feature. Output is
    /// identical either way.
    #[serde(default)]
    pub parallel: bool,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading or validating configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl PkgmergeConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML, unknown fields or
    ///   invalid values, returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found), parse
    /// errors or validation errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields or invalid
    /// values.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but make no sense.
    ///
    /// # Errors
    /// Returns `ConfigError` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError {
            path: None,
            message,
        };

        for prefix in &self.analysis.reference_prefixes {
            if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
                return Err(invalid(format!(
                    "analysis.reference_prefixes: invalid prefix {prefix:?}\n  \
                     To fix: use non-empty prefixes without whitespace, e.g. \"rule!\"."
                )));
            }
        }
        if self.guidance.max_excerpt_lines == 0 {
            return Err(invalid(
                "guidance.max_excerpt_lines must be at least 1\n  \
                 To fix: remove the key to use the default (20)."
                    .to_owned(),
            ));
        }
        Ok(())
    }

    /// Convert into options for the reconciliation pipeline.
    #[must_use]
    pub fn to_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            graph: GraphOptions {
                reference_prefixes: self.analysis.reference_prefixes.clone(),
            },
            guidance: GuidanceOptions {
                max_excerpt_lines: self.guidance.max_excerpt_lines,
            },
            parallel: self.execution.parallel,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Defaults --

    #[test]
    fn empty_string_gives_defaults() {
        let config = PkgmergeConfig::parse("").unwrap();
        assert_eq!(config, PkgmergeConfig::default());
        assert_eq!(
            config.analysis.reference_prefixes,
            vec!["rule!", "cons!", "recordType!"]
        );
        assert_eq!(config.guidance.max_excerpt_lines, 20);
        assert!(!config.execution.parallel);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PkgmergeConfig::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, PkgmergeConfig::default());
    }

    #[test]
    fn defaults_match_core_defaults() {
        assert_eq!(
            PkgmergeConfig::default().to_options(),
            ReconcileOptions::default()
        );
    }

    // -- Parsing --

    #[test]
    fn full_config_parses() {
        let config = PkgmergeConfig::parse(
            r#"
[analysis]
reference_prefixes = ["rule!", "fn!"]

[guidance]
max_excerpt_lines = 5

[execution]
parallel = true
"#,
        )
        .unwrap();
        let options = config.to_options();
        assert_eq!(options.graph.reference_prefixes, vec!["rule!", "fn!"]);
        assert_eq!(options.guidance.max_excerpt_lines, 5);
        assert!(options.parallel);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = PkgmergeConfig::parse("[guidance]\nmax_excerpt_lines = 3\n").unwrap();
        assert_eq!(config.guidance.max_excerpt_lines, 3);
        assert_eq!(config.analysis, AnalysisConfig::default());
    }

    #[test]
    fn unknown_field_is_rejected_with_line() {
        let err = PkgmergeConfig::parse("[guidance]\nmax_lines = 3\n").unwrap_err();
        assert!(err.message.contains("line 2"), "{}", err.message);
        assert!(err.message.contains("max_lines"), "{}", err.message);
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(PkgmergeConfig::parse("[output]\ncolor = true\n").is_err());
    }

    // -- Validation --

    #[test]
    fn zero_excerpt_lines_is_invalid() {
        let err = PkgmergeConfig::parse("[guidance]\nmax_excerpt_lines = 0\n").unwrap_err();
        assert!(err.message.contains("To fix"));
    }

    #[test]
    fn blank_prefix_is_invalid() {
        let err =
            PkgmergeConfig::parse("[analysis]\nreference_prefixes = [\"\"]\n").unwrap_err();
        assert!(err.message.contains("reference_prefixes"));
    }

    #[test]
    fn load_attaches_path_to_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[execution]\nparallel = \"yes\"\n").unwrap();
        let err = PkgmergeConfig::load(&path).unwrap_err();
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
        assert!(err.to_string().starts_with(&path.display().to_string()));
    }

    // -- ConfigError Display --

    #[test]
    fn config_error_display_without_path() {
        let err = ConfigError {
            path: None,
            message: "bad".to_owned(),
        };
        assert_eq!(err.to_string(), "config error: bad");
    }
}
