// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Deps command - show what a step needs, or what needs it

use colored::Colorize;
use miette::Result;

use super::{load_dag, DagArgs};
use crate::config::ProjectConfig;
use crate::dag::{StepGraph, StepUri, VersionTracker};
use crate::errors::EtlDagError;

/// Run the deps command
pub async fn run(
    args: DagArgs,
    step: String,
    reverse: bool,
    direct: bool,
    config: &ProjectConfig,
    verbose: bool,
) -> Result<()> {
    let dag = load_dag(config, &args)?;
    let graph = StepGraph::build(&dag);

    let uri = StepUri::parse(&step)?;
    if !graph.contains(&uri) {
        return Err(EtlDagError::unknown_step(&step, graph.steps().into_iter().map(StepUri::as_str)).into());
    }

    let related = match (reverse, direct) {
        (false, true) => graph.dependencies(&uri)?,
        (false, false) => graph.upstream(&uri)?,
        (true, true) => graph.dependents(&uri)?,
        (true, false) => graph.downstream(&uri)?,
    };

    let title = match (reverse, direct) {
        (false, true) => "Direct dependencies",
        (false, false) => "All dependencies",
        (true, true) => "Direct dependents",
        (true, false) => "All dependents",
    };

    println!("{} of {}", title.bold(), uri.to_string().cyan());
    if verbose {
        if let Some(entry) = dag.get(&uri) {
            for file in &entry.defined_in {
                println!("  defined in {}", file.display().to_string().dimmed());
            }
        }
    }
    println!();

    if related.is_empty() {
        println!("  {}", "(none)".dimmed());
        return Ok(());
    }

    let versions = VersionTracker::new(&dag);
    for dep in &related {
        let mut notes = Vec::new();
        if !dag.contains(dep) {
            notes.push(if dep.is_source() { "source" } else { "undefined" });
        } else if dag.get(dep).is_some_and(|e| e.archived) {
            notes.push("archived");
        }
        if versions.is_outdated(dep) {
            notes.push("outdated");
        }

        if notes.is_empty() {
            println!("  • {}", dep);
        } else {
            println!("  • {} {}", dep, format!("({})", notes.join(", ")).dimmed());
        }
    }

    println!();
    println!("{} step(s)", related.len());

    Ok(())
}
