// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Plan command - list the steps a run would execute

use colored::Colorize;
use miette::Result;

use super::{load_dag, DagArgs, OutputFormat};
use crate::config::ProjectConfig;
use crate::dag::{StepGraph, StepSelector};

/// Step selection flags
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub patterns: Vec<String>,
    pub exclude: Vec<String>,
    pub only: bool,
    pub downstream: bool,
    pub private: bool,
}

/// Run the plan command
pub async fn run(
    args: DagArgs,
    options: PlanOptions,
    format: OutputFormat,
    config: &ProjectConfig,
    verbose: bool,
) -> Result<()> {
    let dag = load_dag(config, &args)?;
    let graph = StepGraph::build(&dag);

    let selector = StepSelector::new(&options.patterns, &options.exclude)?
        .only(options.only)
        .downstream(options.downstream)
        .private(options.private);
    let plan = selector.select(&dag, &graph)?;

    if format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&plan)
            .map_err(|e| miette::miette!("Failed to serialize plan: {}", e))?;
        println!("{}", json);
        return Ok(());
    }

    if plan.is_empty() {
        println!("{}", "No steps selected.".yellow());
        return Ok(());
    }

    println!(
        "{} ({} matched, {} total)",
        "Execution plan".bold(),
        plan.matched,
        plan.len()
    );
    println!();

    let width = plan.len().to_string().len();
    for (i, step) in plan.steps.iter().enumerate() {
        let marker = if step.is_source() {
            " (source)".dimmed().to_string()
        } else {
            String::new()
        };
        println!("  {:>width$}. {}{}", i + 1, step, marker, width = width);

        if verbose {
            if let Some(entry) = dag.get(step) {
                for file in &entry.defined_in {
                    println!("  {:>width$}  {}", "", file.display().to_string().dimmed(), width = width);
                }
            }
        }
    }

    Ok(())
}
