// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Step DAGs
//!
//! Parsing of step URIs and DAG files, include merging, the dependency graph
//! built on top, and the checks and queries run against it.

mod definition;
mod graph;
mod loader;
mod selection;
mod uri;
mod validation;
mod versions;

pub use definition::{DagFile, Dependencies};
pub use graph::StepGraph;
pub use loader::{DagLoader, DuplicatePolicy, LoadOptions, LoadedFile, MergedDag, StepEntry};
pub use selection::{Plan, StepSelector};
pub use uri::{Scheme, StepParts, StepUri, Version};
pub use validation::{DagValidator, ValidationOptions, ValidationResult};
pub use versions::{OutdatedDependency, StepIdentity, VersionTracker};
