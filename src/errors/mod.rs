// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Error types with actionable messages
//!
//! Every error carries a diagnostic code and, where it helps, a hint that
//! points at the file or step to fix.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for etldag operations
pub type EtlDagResult<T> = Result<T, EtlDagError>;

/// Main error type for etldag
#[derive(Error, Debug, Diagnostic)]
pub enum EtlDagError {
    // ─────────────────────────────────────────────────────────────────────────
    // DAG File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("DAG file not found: {path}")]
    #[diagnostic(
        code(etldag::dag_not_found),
        help("Pass the root DAG with --dag, set ETLDAG_DAG, or set `dag:` in .etldag.yaml")
    )]
    DagNotFound { path: PathBuf },

    #[error("Invalid DAG file '{path}': {reason}")]
    #[diagnostic(
        code(etldag::invalid_dag_file),
        help("A DAG file has a `steps:` mapping and an optional `include:` list")
    )]
    InvalidDagFile { path: PathBuf, reason: String },

    #[error("Invalid step URI '{uri}': {reason}")]
    #[diagnostic(
        code(etldag::invalid_step_uri),
        help("Step URIs look like data://garden/<namespace>/<version>/<short_name>")
    )]
    InvalidStepUri { uri: String, reason: String },

    #[error("Included DAG file not found: {path}")]
    #[diagnostic(code(etldag::include_not_found))]
    IncludeNotFound {
        path: PathBuf,
        included_from: PathBuf,
        #[help]
        help: Option<String>,
    },

    #[error("Include cycle detected: {}", .chain.join(" → "))]
    #[diagnostic(
        code(etldag::include_cycle),
        help("A DAG file must not include itself, directly or through other files")
    )]
    IncludeCycle { chain: Vec<String> },

    #[error("Step '{step}' is defined in both '{first}' and '{second}'")]
    #[diagnostic(
        code(etldag::duplicate_step),
        help("Remove one definition, or set `duplicates: warn` in .etldag.yaml to merge them")
    )]
    DuplicateStep {
        step: String,
        first: PathBuf,
        second: PathBuf,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Circular dependency detected: {}", .steps.join(" → "))]
    #[diagnostic(
        code(etldag::circular_dependency),
        help("Review the dependencies of these steps to remove the cycle")
    )]
    CircularDependency { steps: Vec<String> },

    #[error("Step '{step}' not found in DAG")]
    #[diagnostic(code(etldag::unknown_step))]
    UnknownStep {
        step: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid step pattern '{pattern}': {message}")]
    #[diagnostic(
        code(etldag::invalid_pattern),
        help("Step patterns are regular expressions matched against the full step URI")
    )]
    InvalidPattern { pattern: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Metadata Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid metadata file '{path}': {reason}")]
    #[diagnostic(code(etldag::invalid_metadata))]
    InvalidMetadata { path: PathBuf, reason: String },

    #[error("No metadata files matched: {pattern}")]
    #[diagnostic(
        code(etldag::no_metadata_files),
        help("Check that files matching '{pattern}' exist, e.g. steps/**/*.meta.yml")
    )]
    NoMetadataFiles { pattern: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid configuration in '{path}': {message}")]
    #[diagnostic(code(etldag::config_error))]
    ConfigError { path: PathBuf, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(etldag::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(etldag::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(etldag::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(etldag::json_error))]
    Json { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(etldag::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for EtlDagError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for EtlDagError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for EtlDagError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<glob::PatternError> for EtlDagError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl EtlDagError {
    /// Create a file read error from an IO error
    pub fn read_failed(path: &std::path::Path, error: std::io::Error) -> Self {
        Self::FileReadError {
            path: path.to_path_buf(),
            error: error.to_string(),
        }
    }

    /// Create an include-not-found error with the including file as context
    pub fn include_not_found(path: PathBuf, included_from: PathBuf) -> Self {
        let help = Some(format!(
            "Referenced from the `include:` list of '{}'. Relative include paths resolve against the project directory, then against that file's directory.",
            included_from.display()
        ));
        Self::IncludeNotFound {
            path,
            included_from,
            help,
        }
    }

    /// Create an unknown step error, suggesting close matches
    pub fn unknown_step<'a>(step: &str, known: impl IntoIterator<Item = &'a str>) -> Self {
        let short_name = step.rsplit('/').next().unwrap_or(step);
        let candidates: Vec<&str> = known
            .into_iter()
            .filter(|k| !short_name.is_empty() && k.rsplit('/').next() == Some(short_name))
            .take(3)
            .collect();

        let help = if candidates.is_empty() {
            None
        } else {
            Some(format!("Did you mean: {}", candidates.join(", ")))
        };

        Self::UnknownStep {
            step: step.to_string(),
            help,
        }
    }

    /// Create a pattern error from a regex compilation failure
    pub fn invalid_pattern(pattern: &str, error: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_step_suggests_versions() {
        let known = [
            "data://garden/who/2024-01-01/gho",
            "data://meadow/who/2024-01-01/gho",
            "data://garden/un/2024-01-01/population",
            "data://garden/who/2024-01-01/xgho",
        ];
        let err = EtlDagError::unknown_step("data://garden/who/2023-01-01/gho", known);

        match err {
            EtlDagError::UnknownStep { help: Some(help), .. } => {
                assert!(help.contains("data://garden/who/2024-01-01/gho"));
                assert!(!help.contains("population"));
                assert!(!help.contains("xgho"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cycle_message_lists_steps() {
        let err = EtlDagError::CircularDependency {
            steps: vec!["data://a/b/1/c".into(), "data://a/b/1/d".into()],
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected: data://a/b/1/c → data://a/b/1/d"
        );
    }
}
