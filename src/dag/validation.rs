// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! DAG validation
//!
//! Checks a merged DAG for undefined dependencies, cycles and the naming and
//! versioning conventions of the step corpus.

use serde::Serialize;

use crate::dag::{MergedDag, Scheme, StepGraph, VersionTracker};

/// Knobs for [`DagValidator`]
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Warn when a step depends on an old version of a dataset
    pub warn_outdated: bool,
    /// Schemes that may be referenced without being defined
    pub source_schemes: Vec<Scheme>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            warn_outdated: true,
            source_schemes: Scheme::ALL.into_iter().filter(Scheme::is_source).collect(),
        }
    }
}

/// DAG validator
pub struct DagValidator;

impl DagValidator {
    /// Validate a merged DAG
    pub fn validate(dag: &MergedDag, options: &ValidationOptions) -> ValidationResult {
        let mut result = ValidationResult::new();

        if dag.is_empty() {
            result.add_error("DAG has no steps defined");
            return result;
        }

        for note in dag.notes() {
            result.add_warning(note);
        }

        for (step, entry) in dag.steps() {
            if let Some(shape) = step.expected_shape().filter(|_| step.is_malformed()) {
                result.add_warning(&format!(
                    "Step '{}' does not follow {}://{}",
                    step,
                    step.scheme(),
                    shape
                ));
            }

            if step.is_source() && !entry.dependencies.is_empty() {
                result.add_warning(&format!(
                    "Source step '{}' is defined with {} dependencies",
                    step,
                    entry.dependencies.len()
                ));
            }

            for dep in &entry.repeated_dependencies {
                result.add_warning(&format!("Step '{}' lists '{}' more than once", step, dep));
            }

            for dep in &entry.dependencies {
                if dep == step {
                    result.add_error(&format!("Step '{}' depends on itself", step));
                    continue;
                }

                match dag.get(dep) {
                    None if !options.source_schemes.contains(&dep.scheme()) => {
                        result.add_error(&format!(
                            "Step '{}' depends on undefined step '{}'",
                            step, dep
                        ));
                    }
                    None => {}
                    Some(dep_entry) => {
                        if !entry.archived && dep_entry.archived {
                            result.add_error(&format!(
                                "Active step '{}' depends on archived step '{}'",
                                step, dep
                            ));
                        }
                    }
                }

                if dep.is_private() && !step.is_private() {
                    result.add_warning(&format!(
                        "Public step '{}' depends on private step '{}'",
                        step, dep
                    ));
                }
            }
        }

        let graph = StepGraph::build(dag);
        for cycle in graph.cycles() {
            let names: Vec<String> = cycle.iter().map(|s| s.to_string()).collect();
            result.add_error(&format!("Circular dependency: {}", names.join(" → ")));
        }

        if options.warn_outdated {
            for outdated in VersionTracker::new(dag).outdated_dependencies() {
                result.add_warning(&format!(
                    "Step '{}' depends on '{}' but '{}' exists",
                    outdated.step, outdated.dependency, outdated.newest
                ));
            }
        }

        result
    }
}

/// Result of a validation pass
#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    /// Fold another result into this one, prefixing each message
    pub fn merge(&mut self, prefix: &str, other: ValidationResult) {
        self.errors
            .extend(other.errors.into_iter().map(|e| format!("{}: {}", prefix, e)));
        self.warnings
            .extend(other.warnings.into_iter().map(|w| format!("{}: {}", prefix, w)));
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{DuplicatePolicy, StepUri};
    use std::path::Path;

    fn uri(s: &str) -> StepUri {
        StepUri::parse(s).unwrap()
    }

    fn make_dag(steps: Vec<(&str, Vec<&str>)>) -> MergedDag {
        let mut dag = MergedDag::new();
        for (step, deps) in steps {
            dag.insert(
                uri(step),
                deps.into_iter().map(uri).collect(),
                Path::new("main.yml"),
                false,
                DuplicatePolicy::Error,
            )
            .unwrap();
        }
        dag
    }

    fn validate(dag: &MergedDag) -> ValidationResult {
        DagValidator::validate(dag, &ValidationOptions::default())
    }

    #[test]
    fn test_valid_chain() {
        let dag = make_dag(vec![
            ("data://meadow/who/2024/gho", vec!["snapshot://who/2024/gho.zip"]),
            ("data://garden/who/2024/gho", vec!["data://meadow/who/2024/gho"]),
            (
                "data://garden/owid/latest/covid",
                vec!["etag://covid.ourworldindata.org/data/owid-covid-data.csv"],
            ),
            (
                "data://garden/gapminder/2023/sg",
                vec!["github://open-numbers/ddf--gapminder--systema_globalis"],
            ),
        ]);

        let result = validate(&dag);
        assert!(result.is_valid(), "errors: {:?}", result.errors);
        assert!(!result.has_warnings(), "warnings: {:?}", result.warnings);
    }

    #[test]
    fn test_empty_dag() {
        let result = validate(&MergedDag::new());
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("no steps"));
    }

    #[test]
    fn test_undefined_dependency() {
        let dag = make_dag(vec![(
            "data://garden/who/2024/gho",
            vec!["data://meadow/who/2024/gho"],
        )]);

        let result = validate(&dag);
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("undefined step 'data://meadow/who/2024/gho'"));
    }

    #[test]
    fn test_custom_source_schemes() {
        let dag = make_dag(vec![(
            "data://garden/who/2024/gho",
            vec!["snapshot://who/2024/gho.zip"],
        )]);
        let options = ValidationOptions {
            source_schemes: vec![Scheme::Etag],
            ..Default::default()
        };

        let result = DagValidator::validate(&dag, &options);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_cycle_and_self_dependency() {
        let dag = make_dag(vec![
            ("data://garden/a/2024/x", vec!["data://garden/a/2024/y"]),
            ("data://garden/a/2024/y", vec!["data://garden/a/2024/x"]),
            ("data://garden/a/2024/z", vec!["data://garden/a/2024/z"]),
        ]);

        let result = validate(&dag);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().any(|e| e.contains("depends on itself")));
        assert!(result
            .errors
            .iter()
            .any(|e| e == "Circular dependency: data://garden/a/2024/x → data://garden/a/2024/y"));
    }

    #[test]
    fn test_active_step_on_archived_step() {
        let mut dag = MergedDag::new();
        dag.insert(
            uri("data://garden/a/2020/old"),
            vec![],
            Path::new("archive/a.yml"),
            true,
            DuplicatePolicy::Error,
        )
        .unwrap();
        dag.insert(
            uri("data://garden/b/2024/new"),
            vec![uri("data://garden/a/2020/old")],
            Path::new("main.yml"),
            false,
            DuplicatePolicy::Error,
        )
        .unwrap();

        let result = validate(&dag);
        assert!(result.errors.iter().any(|e| e.contains("archived step")));
    }

    #[test]
    fn test_convention_warnings() {
        let dag = make_dag(vec![
            ("data://garden/who/gho", vec![]),
            ("snapshot://who/2024/gho.zip", vec!["etag://example.com/gho.zip"]),
            (
                "data://garden/who/2024/mortality",
                vec![
                    "data-private://garden/who/2024/raw",
                    "snapshot://who/2024/gho.zip",
                    "snapshot://who/2024/gho.zip",
                ],
            ),
            ("data-private://garden/who/2024/raw", vec![]),
        ]);

        let result = validate(&dag);
        assert!(result.is_valid(), "errors: {:?}", result.errors);
        assert!(result.warnings.iter().any(|w| w.contains("does not follow")));
        assert!(result.warnings.iter().any(|w| w.contains("Source step")));
        assert!(result.warnings.iter().any(|w| w.contains("more than once")));
        assert!(result.warnings.iter().any(|w| w.contains("private step")));
    }

    #[test]
    fn test_outdated_warning_can_be_disabled() {
        let dag = make_dag(vec![
            ("data://garden/un/2023/population", vec![]),
            ("data://garden/un/2024/population", vec![]),
            ("data://garden/who/2024/gho", vec!["data://garden/un/2023/population"]),
        ]);

        let result = validate(&dag);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("but 'data://garden/un/2024/population' exists"));

        let quiet = DagValidator::validate(
            &dag,
            &ValidationOptions {
                warn_outdated: false,
                ..Default::default()
            },
        );
        assert!(!quiet.has_warnings());
    }

    #[test]
    fn test_merge_prefixes_messages() {
        let mut all = ValidationResult::new();
        let mut one = ValidationResult::new();
        one.add_error("missing unit");
        all.merge("gho.meta.yml", one);
        assert_eq!(all.errors, vec!["gho.meta.yml: missing unit"]);
    }
}
