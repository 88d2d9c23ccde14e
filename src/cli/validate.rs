// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Validate command - check the DAG for undefined steps and cycles

use colored::Colorize;
use miette::Result;

use super::{load_dag, DagArgs, OutputFormat};
use crate::config::ProjectConfig;
use crate::dag::{DagValidator, MergedDag, StepGraph, ValidationOptions, ValidationResult};
use crate::errors::RecoverySuggestion;
use crate::utils::{print_error, print_success, print_warning};

/// Run the validate command
pub async fn run(
    args: DagArgs,
    strict: bool,
    no_outdated: bool,
    format: OutputFormat,
    config: &ProjectConfig,
    verbose: bool,
) -> Result<()> {
    let dag = load_dag(config, &args)?;

    let mut options = config.validation_options();
    if no_outdated {
        options.warn_outdated = false;
    }
    let validation = DagValidator::validate(&dag, &options);

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&validation)
                .map_err(|e| miette::miette!("Failed to serialize result: {}", e))?;
            println!("{}", json);
        }
        OutputFormat::Text => report(&dag, &validation, &options, verbose),
    }

    if !validation.is_valid() {
        return Err(miette::miette!(
            "DAG validation failed with {} error(s)",
            validation.errors.len()
        ));
    }
    if strict && validation.has_warnings() {
        return Err(miette::miette!(
            "DAG has {} warning(s) and --strict was given",
            validation.warnings.len()
        ));
    }

    Ok(())
}

fn report(dag: &MergedDag, validation: &ValidationResult, options: &ValidationOptions, verbose: bool) {
    println!("{}", "Validating DAG...".bold());
    println!();
    print_success(&format!(
        "Loaded {} steps from {} file(s)",
        dag.len(),
        dag.files().len()
    ));

    if verbose {
        for file in dag.files() {
            let archived = if file.archived { " (archived)" } else { "" };
            println!(
                "    - {} [{} steps]{}",
                file.path.display(),
                file.step_count,
                archived.dimmed()
            );
        }
    }

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            print_error(error);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if let Some(suggestion) = suggestion_for(dag, options) {
        println!();
        println!("{}", suggestion);
    }

    println!();
    if !validation.is_valid() {
        println!("{}", "DAG is invalid.".red().bold());
    } else if validation.has_warnings() {
        println!("{}", "DAG is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "DAG is valid!".green().bold());
    }
}

/// Suggestion for the first structural problem found
fn suggestion_for(dag: &MergedDag, options: &ValidationOptions) -> Option<RecoverySuggestion> {
    let graph = StepGraph::build(dag);
    if let Some(cycle) = graph.cycles().into_iter().next() {
        let steps: Vec<String> = cycle.iter().map(|s| s.to_string()).collect();
        return Some(RecoverySuggestion::fix_circular_dependency(&steps));
    }

    dag.steps().iter().find_map(|(step, entry)| {
        entry
            .dependencies
            .iter()
            .find(|dep| !dag.contains(dep) && !options.source_schemes.contains(&dep.scheme()))
            .map(|dep| RecoverySuggestion::fix_undefined_dependency(step.as_str(), dep.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{DuplicatePolicy, StepUri};
    use std::path::Path;

    fn make_dag(steps: Vec<(&str, Vec<&str>)>) -> MergedDag {
        let mut dag = MergedDag::new();
        for (step, deps) in steps {
            dag.insert(
                StepUri::parse(step).unwrap(),
                deps.into_iter().map(|d| StepUri::parse(d).unwrap()).collect(),
                Path::new("main.yml"),
                false,
                DuplicatePolicy::Error,
            )
            .unwrap();
        }
        dag
    }

    #[test]
    fn test_suggestion_for_undefined_dependency() {
        let dag = make_dag(vec![
            ("data://meadow/who/2024/gho", vec!["snapshot://who/2024/gho.zip"]),
            ("data://garden/who/2024/gho", vec!["data://meadow/who/2023/gho"]),
        ]);

        let suggestion = suggestion_for(&dag, &ValidationOptions::default()).unwrap();
        assert!(suggestion.action.contains("data://meadow/who/2023/gho"));
    }

    #[test]
    fn test_suggestion_for_cycle() {
        let dag = make_dag(vec![
            ("data://garden/a/2024/x", vec!["data://garden/a/2024/y"]),
            ("data://garden/a/2024/y", vec!["data://garden/a/2024/x"]),
        ]);

        let suggestion = suggestion_for(&dag, &ValidationOptions::default()).unwrap();
        assert_eq!(suggestion.action, "Remove circular dependency");
    }

    #[test]
    fn test_no_suggestion_for_valid_dag() {
        let dag = make_dag(vec![(
            "data://meadow/who/2024/gho",
            vec!["snapshot://who/2024/gho.zip"],
        )]);
        assert!(suggestion_for(&dag, &ValidationOptions::default()).is_none());
    }
}
