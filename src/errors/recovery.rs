// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use super::EtlDagError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &EtlDagError) -> Option<Self> {
        match error {
            EtlDagError::CircularDependency { steps } => Some(Self::fix_circular_dependency(steps)),
            EtlDagError::DuplicateStep { step, first, second } => Some(Self::fix_duplicate_step(
                step,
                &first.display().to_string(),
                &second.display().to_string(),
            )),
            EtlDagError::IncludeNotFound { path, .. } => {
                Some(Self::fix_missing_include(&path.display().to_string()))
            }
            EtlDagError::DagNotFound { .. } => Some(Self::point_at_dag()),
            _ => None,
        }
    }

    /// Suggest fixing a circular dependency
    pub fn fix_circular_dependency(steps: &[String]) -> Self {
        Self {
            action: "Remove circular dependency".into(),
            steps: vec![
                format!("Detected cycle: {}", steps.join(" → ")),
                "One of these steps must stop depending on another".into(),
                "Usually the cycle comes from pointing an old version at a newer one".into(),
            ],
            commands: vec![
                "# Inspect what each step depends on:".into(),
                format!("etldag deps {}", steps.first().map(String::as_str).unwrap_or("<step>")),
            ],
        }
    }

    /// Suggest fixing a dependency on a step nobody defines
    pub fn fix_undefined_dependency(step: &str, dependency: &str) -> Self {
        Self {
            action: format!("Define '{}' or point '{}' elsewhere", dependency, step),
            steps: vec![
                format!("'{}' depends on '{}'", step, dependency),
                "No loaded DAG file defines that step".into(),
                "If the step was archived, load the archive with --archive to check".into(),
            ],
            commands: vec![
                "# Find versions of the same dataset:".into(),
                format!(
                    "etldag plan '{}' --only",
                    dependency.rsplit('/').next().unwrap_or(dependency)
                ),
            ],
        }
    }

    /// Suggest fixing a step defined in two files
    pub fn fix_duplicate_step(step: &str, first: &str, second: &str) -> Self {
        Self {
            action: format!("Keep a single definition of '{}'", step),
            steps: vec![
                format!("Defined in: {}", first),
                format!("Also defined in: {}", second),
                "Delete one of the entries, or merge their dependency lists".into(),
            ],
            commands: vec![],
        }
    }

    /// Suggest fixing a missing include
    pub fn fix_missing_include(path: &str) -> Self {
        Self {
            action: format!("Create '{}' or drop it from `include:`", path),
            steps: vec![
                "Relative include paths resolve against the project directory first".into(),
                "If that path does not exist, the including file's directory is used".into(),
                "Absolute paths are used as-is".into(),
            ],
            commands: vec![],
        }
    }

    /// Suggest pointing etldag at the root DAG
    pub fn point_at_dag() -> Self {
        Self {
            action: "Point etldag at the root DAG file".into(),
            steps: vec![
                "etldag looks for dag/main.yml by default".into(),
                "Override it per call, per shell, or per project".into(),
            ],
            commands: vec![
                "etldag validate --dag path/to/main.yml".into(),
                "export ETLDAG_DAG=path/to/main.yml".into(),
                "echo 'dag: path/to/main.yml' >> .etldag.yaml".into(),
            ],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
