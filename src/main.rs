// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! etldag - ETL step DAG inspector
//!
//! Validate, query and render YAML ETL step DAGs and their metadata.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use etldag::cli::{self, plan::PlanOptions, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let default_filter = if cli.verbose { "etldag=debug" } else { "etldag=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let config = cli::load_config(cli.config.as_ref())?;
    let verbose = cli.verbose;

    // Dispatch to command handlers
    match cli.command {
        Commands::Validate {
            dag,
            strict,
            no_outdated,
            format,
        } => cli::validate::run(dag, strict, no_outdated, format, &config, verbose).await,
        Commands::Graph {
            dag,
            patterns,
            format,
        } => cli::graph::run(dag, patterns, format, &config, verbose).await,
        Commands::Plan {
            dag,
            patterns,
            exclude,
            only,
            downstream,
            private,
            format,
        } => {
            let options = PlanOptions {
                patterns,
                exclude,
                only,
                downstream,
                private,
            };
            cli::plan::run(dag, options, format, &config, verbose).await
        }
        Commands::Deps {
            dag,
            step,
            reverse,
            direct,
        } => cli::deps::run(dag, step, reverse, direct, &config, verbose).await,
        Commands::Metadata {
            patterns,
            strict,
            format,
        } => cli::metadata::run(patterns, strict, format, &config, verbose).await,
        Commands::Stats { dag, format } => cli::stats::run(dag, format, &config, verbose).await,
        Commands::Watch { dag, debounce } => {
            cli::watch::run(dag, debounce, &config, verbose).await
        }
    }
}
