// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Step selection
//!
//! Picks a subgraph of the DAG from regex patterns, the way an ETL run is
//! usually scoped: match some steps, pull in what they need, optionally
//! what needs them, and drop explicit exclusions.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

use crate::dag::{MergedDag, StepGraph, StepUri};
use crate::errors::{EtlDagError, EtlDagResult};

/// Regex-based step selector
#[derive(Debug, Clone, Default)]
pub struct StepSelector {
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
    only: bool,
    downstream: bool,
    private: bool,
}

impl StepSelector {
    /// Create a selector; no include patterns selects every defined step
    pub fn new(includes: &[String], excludes: &[String]) -> EtlDagResult<Self> {
        Ok(Self {
            includes: compile(includes)?,
            excludes: compile(excludes)?,
            ..Default::default()
        })
    }

    /// Do not pull in dependencies of matched steps
    pub fn only(mut self, only: bool) -> Self {
        self.only = only;
        self
    }

    /// Also select everything depending on matched steps
    pub fn downstream(mut self, downstream: bool) -> Self {
        self.downstream = downstream;
        self
    }

    /// Allow private steps to be matched
    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    fn matches(&self, step: &StepUri) -> bool {
        self.includes.is_empty() || self.includes.iter().any(|re| re.is_match(step.as_str()))
    }

    /// Archived steps are never selected directly, private ones only on request
    fn eligible(&self, dag: &MergedDag, step: &StepUri) -> bool {
        dag.get(step).is_some_and(|entry| !entry.archived)
            && (self.private || !step.is_private())
    }

    fn excluded(&self, step: &StepUri) -> bool {
        self.excludes.iter().any(|re| re.is_match(step.as_str()))
    }

    /// Select steps and return them in dependency order
    pub fn select(&self, dag: &MergedDag, graph: &StepGraph) -> EtlDagResult<Plan> {
        let matched: Vec<&StepUri> = dag
            .steps()
            .keys()
            .filter(|step| self.eligible(dag, step))
            .filter(|step| self.matches(step))
            .collect();

        let mut selected: HashSet<&StepUri> = matched.iter().copied().collect();

        if self.downstream {
            let below = graph.downstream_of_all(matched.iter().copied());
            selected.extend(below.into_iter().filter(|step| self.eligible(dag, step)));
        }

        if !self.only {
            let above = graph.upstream_of_all(selected.clone());
            selected.extend(above);
        }

        selected.retain(|step| !self.excluded(step));

        let steps: Vec<StepUri> = graph
            .topological_order()?
            .into_iter()
            .filter(|step| selected.contains(step))
            .cloned()
            .collect();

        Ok(Plan {
            matched: matched.len(),
            steps,
        })
    }
}

fn compile(patterns: &[String]) -> EtlDagResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| EtlDagError::invalid_pattern(p, e)))
        .collect()
}

/// Ordered selection of steps
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// How many steps the include patterns matched directly
    pub matched: usize,
    /// Selected steps, dependencies first
    pub steps: Vec<StepUri>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn contains(&self, step: &str) -> bool {
        self.steps.iter().any(|s| s.as_str() == step)
    }

    /// Selected steps as a set, for subgraph rendering
    pub fn as_set(&self) -> HashSet<&StepUri> {
        self.steps.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::DuplicatePolicy;
    use std::path::Path;

    fn uri(s: &str) -> StepUri {
        StepUri::parse(s).unwrap()
    }

    const SNAP: &str = "snapshot://who/2024/gho.zip";
    const MEADOW: &str = "data://meadow/who/2024/gho";
    const GARDEN: &str = "data://garden/who/2024/gho";
    const GRAPHER: &str = "grapher://grapher/who/2024/gho";
    const PRIVATE: &str = "data-private://garden/who/2024/internal";
    const OTHER: &str = "data://garden/un/2024/population";

    fn fixture() -> MergedDag {
        let mut dag = MergedDag::new();
        for (step, deps) in [
            (MEADOW, vec![SNAP]),
            (GARDEN, vec![MEADOW]),
            (GRAPHER, vec![GARDEN]),
            (PRIVATE, vec![GARDEN]),
            (OTHER, vec![]),
        ] {
            dag.insert(
                uri(step),
                deps.into_iter().map(uri).collect(),
                Path::new("main.yml"),
                false,
                DuplicatePolicy::Error,
            )
            .unwrap();
        }
        dag
    }

    fn select(selector: StepSelector) -> Vec<String> {
        let dag = fixture();
        let graph = StepGraph::build(&dag);
        selector
            .select(&dag, &graph)
            .unwrap()
            .steps
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_select_pulls_dependencies() {
        let steps = select(StepSelector::new(&["garden/who".into()], &[]).unwrap());
        assert_eq!(steps, vec![SNAP, MEADOW, GARDEN]);
    }

    #[test]
    fn test_select_only() {
        let steps = select(StepSelector::new(&["garden/who".into()], &[]).unwrap().only(true));
        assert_eq!(steps, vec![GARDEN]);
    }

    #[test]
    fn test_select_downstream() {
        let steps = select(
            StepSelector::new(&["meadow/who".into()], &[])
                .unwrap()
                .downstream(true)
                .only(true),
        );
        assert_eq!(steps.len(), 3);
        assert_eq!(&steps[..2], &[MEADOW, GARDEN]);
        assert!(steps.contains(&GRAPHER.to_string()));
        assert!(!steps.contains(&PRIVATE.to_string()));

        let steps = select(
            StepSelector::new(&["meadow/who".into()], &[])
                .unwrap()
                .downstream(true)
                .only(true)
                .private(true),
        );
        assert_eq!(steps.len(), 4);
        assert!(steps.contains(&PRIVATE.to_string()));
    }

    #[test]
    fn test_downstream_skips_archived_dependents() {
        let mut dag = fixture();
        dag.insert(
            uri("grapher://grapher/who/2020/gho"),
            vec![uri(GARDEN)],
            Path::new("archive/old.yml"),
            true,
            DuplicatePolicy::Error,
        )
        .unwrap();
        let graph = StepGraph::build(&dag);

        let plan = StepSelector::new(&["garden/who".into()], &[])
            .unwrap()
            .downstream(true)
            .only(true)
            .select(&dag, &graph)
            .unwrap();

        assert!(plan.contains(GRAPHER));
        assert!(!plan.contains("grapher://grapher/who/2020/gho"));
        assert!(!plan.contains(PRIVATE));
    }

    #[test]
    fn test_private_filtered_from_matches() {
        let steps = select(StepSelector::new(&["internal".into()], &[]).unwrap());
        assert!(steps.is_empty());

        let steps = select(
            StepSelector::new(&["internal".into()], &[])
                .unwrap()
                .private(true)
                .only(true),
        );
        assert_eq!(steps, vec![PRIVATE]);
    }

    #[test]
    fn test_excludes_apply_last() {
        let steps = select(StepSelector::new(&["grapher".into()], &["^snapshot://".into()]).unwrap());
        assert_eq!(steps, vec![MEADOW, GARDEN, GRAPHER]);
    }

    #[test]
    fn test_no_patterns_selects_everything_public() {
        let dag = fixture();
        let graph = StepGraph::build(&dag);
        let plan = StepSelector::new(&[], &[]).unwrap().select(&dag, &graph).unwrap();

        assert_eq!(plan.matched, 4);
        assert_eq!(plan.len(), 5);
        assert!(plan.contains(SNAP));
        assert!(!plan.contains(PRIVATE));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = StepSelector::new(&["(unclosed".into()], &[]).unwrap_err();
        assert!(matches!(err, EtlDagError::InvalidPattern { .. }));
    }
}
