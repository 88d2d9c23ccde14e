// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Dataset version tracking
//!
//! Steps that only differ by version belong to the same dataset. Tracking
//! them tells which dependencies point at an old version and which old
//! versions nobody uses any more.

use std::collections::{BTreeMap, BTreeSet};

use crate::dag::{MergedDag, Scheme, StepUri, Version};

/// A step with its version stripped
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepIdentity {
    pub scheme: Scheme,
    pub channel: Option<String>,
    pub namespace: String,
    pub short_name: String,
}

impl StepIdentity {
    pub fn of(step: &StepUri) -> Option<Self> {
        let parts = step.parts()?;
        Some(Self {
            scheme: step.scheme(),
            channel: parts.channel.clone(),
            namespace: parts.namespace.clone(),
            short_name: parts.short_name.clone(),
        })
    }
}

impl std::fmt::Display for StepIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.channel {
            Some(channel) => write!(
                f,
                "{}://{}/{}/*/{}",
                self.scheme, channel, self.namespace, self.short_name
            ),
            None => write!(f, "{}://{}/*/{}", self.scheme, self.namespace, self.short_name),
        }
    }
}

/// A dependency on a version older than one the DAG defines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutdatedDependency {
    pub step: StepUri,
    pub dependency: StepUri,
    pub newest: StepUri,
}

/// Versions of every dataset defined in a merged DAG
pub struct VersionTracker<'a> {
    dag: &'a MergedDag,
    versions: BTreeMap<StepIdentity, BTreeMap<Version, &'a StepUri>>,
}

impl<'a> VersionTracker<'a> {
    pub fn new(dag: &'a MergedDag) -> Self {
        let mut versions: BTreeMap<StepIdentity, BTreeMap<Version, &'a StepUri>> = BTreeMap::new();

        for step in dag.steps().keys() {
            let (Some(identity), Some(version)) = (StepIdentity::of(step), step.version()) else {
                continue;
            };
            versions
                .entry(identity)
                .or_default()
                .insert(version.clone(), step);
        }

        Self { dag, versions }
    }

    /// Newest defined version of every dataset
    pub fn latest_versions(&self) -> BTreeMap<&StepIdentity, &'a StepUri> {
        self.versions
            .iter()
            .filter_map(|(identity, versions)| {
                versions.values().next_back().map(|step| (identity, *step))
            })
            .collect()
    }

    /// Newest defined version of the dataset `step` belongs to
    pub fn latest_of(&self, step: &StepUri) -> Option<&'a StepUri> {
        let identity = StepIdentity::of(step)?;
        self.versions
            .get(&identity)?
            .values()
            .next_back()
            .copied()
    }

    /// Whether a newer version of this step is defined
    pub fn is_outdated(&self, step: &StepUri) -> bool {
        self.latest_of(step).is_some_and(|latest| {
            match (latest.version(), step.version()) {
                (Some(newest), Some(current)) => newest > current,
                _ => false,
            }
        })
    }

    /// Active steps depending on an older version of a dataset
    ///
    /// Archived steps are skipped; they are expected to point at old data.
    pub fn outdated_dependencies(&self) -> Vec<OutdatedDependency> {
        let mut outdated = Vec::new();

        for (step, entry) in self.dag.steps() {
            if entry.archived {
                continue;
            }
            for dep in &entry.dependencies {
                if !self.is_outdated(dep) {
                    continue;
                }
                if let Some(newest) = self.latest_of(dep) {
                    outdated.push(OutdatedDependency {
                        step: step.clone(),
                        dependency: dep.clone(),
                        newest: newest.clone(),
                    });
                }
            }
        }

        outdated
    }

    /// Non-latest versions that no other step depends on
    pub fn unused_steps(&self) -> Vec<&'a StepUri> {
        let used: BTreeSet<&StepUri> = self
            .dag
            .steps()
            .values()
            .flat_map(|entry| entry.dependencies.iter())
            .collect();

        self.dag
            .steps()
            .keys()
            .filter(|step| self.is_outdated(step) && !used.contains(step))
            .collect()
    }
}
