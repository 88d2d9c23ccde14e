// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for etldag.

pub mod deps;
pub mod graph;
pub mod metadata;
pub mod plan;
pub mod stats;
pub mod validate;
pub mod watch;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use crate::config::ProjectConfig;
use crate::dag::{DagLoader, DuplicatePolicy, LoadOptions, MergedDag};
use crate::errors::{EtlDagError, RecoverySuggestion};
use crate::utils::create_spinner;

/// ETL step DAG inspector
///
/// Load, validate and query the YAML DAG files and metadata of an ETL corpus.
#[derive(Parser, Debug)]
#[clap(
    name = "etldag",
    version,
    about = "Validate and inspect YAML ETL step DAGs and dataset metadata",
    long_about = None,
    after_help = "Examples:\n\
        etldag validate                       Check the DAG for undefined steps and cycles\n\
        etldag plan garden/who                Steps needed to build matching steps\n\
        etldag deps data://garden/who/2024/gho --reverse\n\
        etldag graph --format mermaid         Render the DAG\n\
        etldag metadata 'steps/**/*.meta.yml' Validate metadata files\n\n\
        See 'etldag <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Configuration file (default: .etldag.yaml, then the user config)
    #[clap(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Options shared by every command that loads the DAG
#[derive(Args, Debug, Clone, Default)]
pub struct DagArgs {
    /// Root DAG file
    #[clap(short, long, env = "ETLDAG_DAG", value_name = "FILE")]
    pub dag: Option<PathBuf>,

    /// Also load archived DAG files
    #[clap(long)]
    pub archive: bool,

    /// What to do when a step is defined in more than one file
    #[clap(long, value_enum, value_name = "POLICY")]
    pub duplicates: Option<DuplicatePolicy>,
}

impl DagArgs {
    /// Root DAG path and loader options, flags taking precedence over config
    pub fn resolve(&self, config: &ProjectConfig) -> (PathBuf, LoadOptions) {
        let path = self.dag.clone().unwrap_or_else(|| config.dag.clone());

        let mut options = config.load_options();
        options.load_archive |= self.archive;
        if let Some(policy) = self.duplicates {
            options.duplicates = policy;
        }

        (path, options)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the DAG: undefined dependencies, cycles and conventions
    Validate {
        #[clap(flatten)]
        dag: DagArgs,

        /// Treat warnings as errors
        #[clap(long)]
        strict: bool,

        /// Do not warn about dependencies on old dataset versions
        #[clap(long)]
        no_outdated: bool,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the DAG as a graph
    Graph {
        #[clap(flatten)]
        dag: DagArgs,

        /// Only show steps matching these patterns and what they need
        patterns: Vec<String>,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: GraphFormat,
    },

    /// List the steps an ETL run would execute, in order
    Plan {
        #[clap(flatten)]
        dag: DagArgs,

        /// Regex patterns selecting steps (default: all)
        patterns: Vec<String>,

        /// Drop steps matching these patterns
        #[clap(short, long, value_name = "PATTERN")]
        exclude: Vec<String>,

        /// Do not include dependencies of matched steps
        #[clap(long)]
        only: bool,

        /// Also include steps depending on matched steps
        #[clap(long)]
        downstream: bool,

        /// Allow private steps to be matched
        #[clap(long)]
        private: bool,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show what a step depends on, or what depends on it
    Deps {
        #[clap(flatten)]
        dag: DagArgs,

        /// Step URI
        step: String,

        /// Show dependents instead of dependencies
        #[clap(short, long)]
        reverse: bool,

        /// Only direct neighbours
        #[clap(long)]
        direct: bool,
    },

    /// Validate metadata files
    Metadata {
        /// Glob patterns of metadata files (default: from config)
        patterns: Vec<String>,

        /// Treat warnings as errors
        #[clap(long)]
        strict: bool,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Summarise the DAG
    Stats {
        #[clap(flatten)]
        dag: DagArgs,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Watch mode - re-validate on DAG file changes
    Watch {
        #[clap(flatten)]
        dag: DagArgs,

        /// Debounce delay in milliseconds
        #[clap(long, default_value = "500")]
        debounce: u64,
    },
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
    Json,
}

/// Resolve the project configuration for this invocation
pub fn load_config(explicit: Option<&PathBuf>) -> miette::Result<ProjectConfig> {
    let config = match explicit {
        Some(path) => ProjectConfig::load(path)?,
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
            ProjectConfig::discover(&cwd)?
        }
    };
    Ok(config)
}

/// Load and merge the DAG, with a spinner while files are read
pub fn load_dag(config: &ProjectConfig, args: &DagArgs) -> miette::Result<MergedDag> {
    let (path, options) = args.resolve(config);

    let spinner = create_spinner(&format!("Loading {}", path.display()));
    let result = DagLoader::load(&path, &options);
    spinner.finish_and_clear();

    match result {
        Ok(dag) => {
            info!(
                "Loaded {} steps from {} files",
                dag.len(),
                dag.files().len()
            );
            Ok(dag)
        }
        Err(e) => {
            print_suggestion(&e);
            Err(e.into())
        }
    }
}

/// Print a recovery suggestion for an error, if there is one
pub fn print_suggestion(error: &EtlDagError) {
    if let Some(suggestion) = RecoverySuggestion::for_error(error) {
        eprintln!("{}", suggestion);
    }
}
