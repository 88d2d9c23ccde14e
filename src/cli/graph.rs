// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Graph command - render the DAG as a graph

use miette::Result;

use super::{load_dag, DagArgs, GraphFormat};
use crate::config::ProjectConfig;
use crate::dag::{StepGraph, StepSelector};

/// Run the graph command
pub async fn run(
    args: DagArgs,
    patterns: Vec<String>,
    format: GraphFormat,
    config: &ProjectConfig,
    _verbose: bool,
) -> Result<()> {
    let dag = load_dag(config, &args)?;
    let graph = StepGraph::build(&dag);

    // Restrict to the matched steps and their dependencies
    let plan = if patterns.is_empty() {
        None
    } else {
        let selector = StepSelector::new(&patterns, &[])?.private(true);
        Some(selector.select(&dag, &graph)?)
    };
    let subset = plan.as_ref().map(|p| p.as_set());

    let output = match format {
        GraphFormat::Text => graph.to_text(subset.as_ref())?,
        GraphFormat::Dot => graph.to_dot(subset.as_ref()),
        GraphFormat::Mermaid => graph.to_mermaid(subset.as_ref()),
        GraphFormat::Json => graph.to_json(subset.as_ref())?,
    };

    println!("{}", output);

    Ok(())
}
