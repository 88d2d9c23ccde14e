// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Stats command - summarise the DAG

use colored::Colorize;
use miette::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use super::{load_dag, DagArgs, OutputFormat};
use crate::config::ProjectConfig;
use crate::dag::{MergedDag, StepGraph, VersionTracker};
use crate::errors::EtlDagResult;
use crate::utils::{print_header, print_section, print_warning};

/// Summary numbers for a merged DAG
#[derive(Debug, Serialize)]
pub struct DagStats {
    pub files: usize,
    pub archived_files: usize,
    pub steps: usize,
    pub archived_steps: usize,
    pub dependencies: usize,
    pub undefined_references: usize,
    pub by_scheme: BTreeMap<String, usize>,
    pub by_channel: BTreeMap<String, usize>,
    pub by_namespace: BTreeMap<String, usize>,
    pub datasets: usize,
    pub roots: usize,
    pub leaves: usize,
    /// Longest dependency chain; absent when the DAG has a cycle
    pub depth: Option<usize>,
    pub unused_steps: Vec<String>,
}

impl DagStats {
    pub fn compute(dag: &MergedDag) -> EtlDagResult<Self> {
        let graph = StepGraph::build(dag);
        let versions = VersionTracker::new(dag);

        let mut by_scheme = BTreeMap::new();
        let mut by_channel = BTreeMap::new();
        let mut by_namespace = BTreeMap::new();

        for step in dag.steps().keys() {
            *by_scheme.entry(step.scheme().to_string()).or_insert(0) += 1;
            if let Some(channel) = step.channel() {
                *by_channel.entry(channel.to_string()).or_insert(0) += 1;
            }
            if let Some(namespace) = step.namespace() {
                *by_namespace.entry(namespace.to_string()).or_insert(0) += 1;
            }
        }

        let depth = if graph.cycles().is_empty() {
            Some(graph.depth()?)
        } else {
            None
        };

        Ok(Self {
            files: dag.files().len(),
            archived_files: dag.files().iter().filter(|f| f.archived).count(),
            steps: dag.len(),
            archived_steps: dag.steps().values().filter(|e| e.archived).count(),
            dependencies: dag.steps().values().map(|e| e.dependencies.len()).sum(),
            undefined_references: dag.undefined_references().len(),
            by_scheme,
            by_channel,
            by_namespace,
            datasets: versions.latest_versions().len(),
            roots: graph.roots().len(),
            leaves: graph.leaves().len(),
            depth,
            unused_steps: versions
                .unused_steps()
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }
}

/// Run the stats command
pub async fn run(
    args: DagArgs,
    format: OutputFormat,
    config: &ProjectConfig,
    verbose: bool,
) -> Result<()> {
    let dag = load_dag(config, &args)?;
    let stats = DagStats::compute(&dag)?;

    if format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&stats)
            .map_err(|e| miette::miette!("Failed to serialize stats: {}", e))?;
        println!("{}", json);
        return Ok(());
    }

    print_header("DAG summary");
    println!(
        "  Files:        {} ({} archived)",
        stats.files, stats.archived_files
    );
    println!(
        "  Steps:        {} ({} archived)",
        stats.steps, stats.archived_steps
    );
    println!("  Dependencies: {}", stats.dependencies);
    println!("  External:     {}", stats.undefined_references);
    println!("  Datasets:     {}", stats.datasets);
    println!("  Roots:        {}", stats.roots);
    println!("  Leaves:       {}", stats.leaves);
    match stats.depth {
        Some(depth) => println!("  Depth:        {}", depth),
        None => println!("  Depth:        {}", "n/a (cycle)".red()),
    }

    print_counts("By scheme", &stats.by_scheme, usize::MAX);
    print_counts("By channel", &stats.by_channel, usize::MAX);
    print_counts("By namespace", &stats.by_namespace, if verbose { usize::MAX } else { 10 });

    if !stats.unused_steps.is_empty() {
        print_section("Old versions nothing depends on");
        for step in &stats.unused_steps {
            print_warning(step);
        }
    }

    Ok(())
}

/// Print counts, largest first, capped at `limit` rows
fn print_counts(title: &str, counts: &BTreeMap<String, usize>, limit: usize) {
    if counts.is_empty() {
        return;
    }

    let mut rows: Vec<(&String, &usize)> = counts.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    print_section(title);
    for (name, count) in rows.iter().take(limit) {
        println!("  {:>6}  {}", count, name);
    }
    if rows.len() > limit {
        println!("  {:>6}  {}", "…", format!("{} more", rows.len() - limit).dimmed());
    }
}
