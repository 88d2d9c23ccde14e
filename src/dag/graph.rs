// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Step dependency graph
//!
//! Builds a petgraph graph over a merged DAG, with edges pointing from a
//! dependency to the step that needs it, so a topological order lists
//! dependencies first.

use petgraph::algo::{has_path_connecting, tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::dag::{MergedDag, StepUri};
use crate::errors::{EtlDagError, EtlDagResult};

/// Dependency graph of all defined and referenced steps
pub struct StepGraph {
    graph: DiGraph<StepUri, ()>,
    index: HashMap<StepUri, NodeIndex>,
}

impl StepGraph {
    /// Build the graph for a merged DAG
    ///
    /// Referenced-but-undefined steps become nodes too. Self-dependencies are
    /// left out; validation reports them.
    pub fn build(dag: &MergedDag) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        let referenced: BTreeSet<&StepUri> = dag
            .steps()
            .iter()
            .flat_map(|(step, entry)| std::iter::once(step).chain(entry.dependencies.iter()))
            .collect();

        for step in referenced {
            let node = graph.add_node(step.clone());
            index.insert(step.clone(), node);
        }

        for (step, entry) in dag.steps() {
            let to = index[step];
            for dep in &entry.dependencies {
                if dep == step {
                    continue;
                }
                graph.add_edge(index[dep], to, ());
            }
        }

        Self { graph, index }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, step: &StepUri) -> bool {
        self.index.contains_key(step)
    }

    /// All steps, sorted
    pub fn steps(&self) -> Vec<&StepUri> {
        let mut steps: Vec<&StepUri> = self.graph.node_weights().collect();
        steps.sort();
        steps
    }

    /// Every set of steps that depend on each other in a loop, each sorted
    pub fn cycles(&self) -> Vec<Vec<StepUri>> {
        let mut cycles: Vec<Vec<StepUri>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut steps: Vec<StepUri> =
                    component.into_iter().map(|n| self.graph[n].clone()).collect();
                steps.sort();
                steps
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Steps in dependency order (dependencies before dependents)
    pub fn topological_order(&self) -> EtlDagResult<Vec<&StepUri>> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| &self.graph[n]).collect())
            .map_err(|_| self.cycle_error())
    }

    fn cycle_error(&self) -> EtlDagError {
        let steps = self
            .cycles()
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        EtlDagError::CircularDependency { steps }
    }

    fn node(&self, step: &StepUri) -> EtlDagResult<NodeIndex> {
        self.index.get(step).copied().ok_or_else(|| {
            EtlDagError::unknown_step(step.as_str(), self.index.keys().map(StepUri::as_str))
        })
    }

    fn neighbors(&self, step: &StepUri, direction: Direction) -> EtlDagResult<Vec<&StepUri>> {
        let node = self.node(step)?;
        let mut steps: Vec<&StepUri> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| &self.graph[n])
            .collect();
        steps.sort();
        steps.dedup();
        Ok(steps)
    }

    /// Direct dependencies of a step
    pub fn dependencies(&self, step: &StepUri) -> EtlDagResult<Vec<&StepUri>> {
        self.neighbors(step, Direction::Incoming)
    }

    /// Steps that directly depend on a step
    pub fn dependents(&self, step: &StepUri) -> EtlDagResult<Vec<&StepUri>> {
        self.neighbors(step, Direction::Outgoing)
    }

    fn reachable(&self, starts: &[NodeIndex], direction: Direction) -> Vec<&StepUri> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = starts.iter().copied().collect();

        while let Some(current) = queue.pop_front() {
            for next in self.graph.neighbors_directed(current, direction) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        let mut steps: Vec<&StepUri> = visited
            .into_iter()
            .filter(|n| !starts.contains(n))
            .map(|n| &self.graph[n])
            .collect();
        steps.sort();
        steps
    }

    /// Everything a step needs, transitively
    pub fn upstream(&self, step: &StepUri) -> EtlDagResult<Vec<&StepUri>> {
        Ok(self.reachable(&[self.node(step)?], Direction::Incoming))
    }

    /// Everything that needs a step, transitively
    pub fn downstream(&self, step: &StepUri) -> EtlDagResult<Vec<&StepUri>> {
        Ok(self.reachable(&[self.node(step)?], Direction::Outgoing))
    }

    /// Upstream closure of several steps at once (starts excluded)
    pub fn upstream_of_all<'a>(&self, steps: impl IntoIterator<Item = &'a StepUri>) -> Vec<&StepUri> {
        let starts: Vec<NodeIndex> = steps.into_iter().filter_map(|s| self.index.get(s).copied()).collect();
        self.reachable(&starts, Direction::Incoming)
    }

    /// Downstream closure of several steps at once (starts excluded)
    pub fn downstream_of_all<'a>(
        &self,
        steps: impl IntoIterator<Item = &'a StepUri>,
    ) -> Vec<&StepUri> {
        let starts: Vec<NodeIndex> = steps.into_iter().filter_map(|s| self.index.get(s).copied()).collect();
        self.reachable(&starts, Direction::Outgoing)
    }

    /// Check if step A depends (directly or transitively) on step B
    pub fn depends_on(&self, a: &StepUri, b: &StepUri) -> bool {
        let (Some(node_a), Some(node_b)) = (self.index.get(a), self.index.get(b)) else {
            return false;
        };
        node_a != node_b && has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    /// Steps without dependencies
    pub fn roots(&self) -> Vec<&StepUri> {
        self.filtered(|n| {
            self.graph
                .neighbors_directed(n, Direction::Incoming)
                .next()
                .is_none()
        })
    }

    /// Steps nothing depends on
    pub fn leaves(&self) -> Vec<&StepUri> {
        self.filtered(|n| {
            self.graph
                .neighbors_directed(n, Direction::Outgoing)
                .next()
                .is_none()
        })
    }

    fn filtered(&self, keep: impl Fn(NodeIndex) -> bool) -> Vec<&StepUri> {
        let mut steps: Vec<&StepUri> = self
            .graph
            .node_indices()
            .filter(|n| keep(*n))
            .map(|n| &self.graph[n])
            .collect();
        steps.sort();
        steps
    }

    /// Longest dependency chain, counted in steps
    pub fn depth(&self) -> EtlDagResult<usize> {
        let order = toposort(&self.graph, None).map_err(|_| self.cycle_error())?;
        let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
        let mut deepest = 0;

        for node in order {
            let d = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .filter_map(|n| depth.get(&n))
                .max()
                .map_or(1, |d| d + 1);
            deepest = deepest.max(d);
            depth.insert(node, d);
        }

        Ok(deepest)
    }

    /// Sorted `(dependency, dependent)` pairs, optionally limited to a subset
    fn edges(&self, subset: Option<&HashSet<&StepUri>>) -> Vec<(&StepUri, &StepUri)> {
        let mut edges: Vec<(&StepUri, &StepUri)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(from, to)| (&self.graph[from], &self.graph[to]))
            .filter(|(from, to)| subset.map_or(true, |s| s.contains(from) && s.contains(to)))
            .collect();
        edges.sort();
        edges.dedup();
        edges
    }

    fn nodes_in(&self, subset: Option<&HashSet<&StepUri>>) -> Vec<&StepUri> {
        self.steps()
            .into_iter()
            .filter(|s| subset.map_or(true, |set| set.contains(s)))
            .collect()
    }

    /// Generate Mermaid diagram of the graph
    pub fn to_mermaid(&self, subset: Option<&HashSet<&StepUri>>) -> String {
        let nodes = self.nodes_in(subset);
        let ids: HashMap<&StepUri, usize> = nodes.iter().enumerate().map(|(i, s)| (*s, i)).collect();

        let mut out = String::from("graph LR\n");
        for (i, step) in nodes.iter().enumerate() {
            out.push_str(&format!("    s{}[\"{}\"]\n", i, step));
        }
        for (from, to) in self.edges(subset) {
            out.push_str(&format!("    s{} --> s{}\n", ids[from], ids[to]));
        }
        out
    }

    /// Generate DOT diagram of the graph
    pub fn to_dot(&self, subset: Option<&HashSet<&StepUri>>) -> String {
        let mut out = String::from("digraph etl {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for step in self.nodes_in(subset) {
            if step.is_source() {
                out.push_str(&format!("    \"{}\" [style=\"rounded,dashed\"];\n", step));
            } else {
                out.push_str(&format!("    \"{}\";\n", step));
            }
        }
        out.push('\n');

        for (from, to) in self.edges(subset) {
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to));
        }

        out.push_str("}\n");
        out
    }

    /// Generate a numbered text listing in dependency order
    pub fn to_text(&self, subset: Option<&HashSet<&StepUri>>) -> EtlDagResult<String> {
        let mut out = String::new();
        let order = self.topological_order()?;
        let listed = order
            .into_iter()
            .filter(|s| subset.map_or(true, |set| set.contains(s)));

        for (i, step) in listed.enumerate() {
            let deps: Vec<String> = self
                .dependencies(step)?
                .into_iter()
                .filter(|d| subset.map_or(true, |set| set.contains(d)))
                .map(|d| d.to_string())
                .collect();

            out.push_str(&format!("{}. {}", i + 1, step));
            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }
            out.push('\n');
        }

        Ok(out)
    }

    /// Generate a JSON adjacency document: `{ "steps": { step: [deps] } }`
    pub fn to_json(&self, subset: Option<&HashSet<&StepUri>>) -> EtlDagResult<String> {
        let mut steps = serde_json::Map::new();
        for step in self.nodes_in(subset) {
            let deps: Vec<serde_json::Value> = self
                .dependencies(step)?
                .into_iter()
                .filter(|d| subset.map_or(true, |set| set.contains(d)))
                .map(|d| serde_json::Value::String(d.to_string()))
                .collect();
            steps.insert(step.to_string(), serde_json::Value::Array(deps));
        }

        let doc = serde_json::json!({ "steps": steps });
        serde_json::to_string_pretty(&doc).map_err(Into::into)
    }
}
