// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! # etldag - ETL step DAG inspector
//!
//! `etldag` reads the declarative side of a step-based ETL corpus: YAML DAG
//! files listing each step URI with its dependencies, and the metadata
//! files describing the variables those steps produce.
//!
//! ## Features
//!
//! - **Include merging** - follow `include:` lists into one DAG
//! - **Validation** - undefined dependencies, cycles, naming conventions
//! - **Queries** - execution plans, upstream/downstream, dataset versions
//! - **Rendering** - text, DOT, Mermaid and JSON graphs
//! - **Metadata checks** - variable records validated against their schema
//!
//! ## Quick Start
//!
//! ```bash
//! # Validate the DAG rooted at dag/main.yml
//! etldag validate
//!
//! # What would building the WHO garden steps run?
//! etldag plan garden/who
//!
//! # Check every metadata file
//! etldag metadata 'steps/**/*.meta.yml'
//! ```

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod metadata;
pub mod utils;

// Re-export commonly used types
pub use config::ProjectConfig;
pub use dag::{DagLoader, DagValidator, MergedDag, StepGraph, StepUri};
pub use errors::{EtlDagError, EtlDagResult};
pub use metadata::{MetadataFile, MetadataValidator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
