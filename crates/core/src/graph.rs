// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency graph construction and validation.
//!
//! Steps live in a flat, config-ordered map; the graph carries dependency
//! edges by key. The ALL step's virtual edge to every other step is never
//! materialized; the scheduler computes it on demand.

use crate::error::ConfigError;
use crate::step::Step;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};

/// Validated dependency structure of one job.
#[derive(Debug, Clone)]
pub struct StepGraph {
    /// Declared predecessors per step (empty for the ALL step)
    predecessors: HashMap<String, Vec<String>>,
    /// Inverse edges: steps that declare a dependency on the key
    dependents: HashMap<String, Vec<String>>,
    all_step: Option<String>,
}

impl StepGraph {
    /// Build and validate the graph.
    ///
    /// Enforced, in order: every dependency names an existing step; at most
    /// one step declares the ALL sentinel; nothing depends on the ALL step
    /// (its virtual edges would close a cycle); the remaining graph is
    /// acyclic under Kahn reduction.
    pub fn build(steps: &IndexMap<String, Step>) -> Result<Self, ConfigError> {
        let mut predecessors: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

        let all_steps: Vec<&str> = steps
            .values()
            .filter(|s| s.is_all())
            .map(|s| s.key.as_str())
            .collect();
        if all_steps.len() > 1 {
            let mut names: Vec<&str> = all_steps.clone();
            names.sort_unstable();
            return Err(ConfigError::MultipleAllSteps(names.join(", ")));
        }
        let all_step = all_steps.first().map(|s| s.to_string());

        for step in steps.values() {
            let mut preds = Vec::new();
            for dep in step.dependencies.keys() {
                if !steps.contains_key(dep) {
                    return Err(ConfigError::DanglingDependency {
                        step: step.key.clone(),
                        dependency: dep.clone(),
                    });
                }
                if Some(dep.as_str()) == all_step.as_deref() {
                    return Err(ConfigError::CycleDetected(format!(
                        "{} -> {} (the ALL step depends on every other step)",
                        step.key, dep
                    )));
                }
                preds.push(dep.clone());
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(step.key.clone());
            }
            predecessors.insert(step.key.clone(), preds);
        }

        let graph = Self {
            predecessors,
            dependents,
            all_step,
        };
        graph.check_acyclic(steps)?;
        Ok(graph)
    }

    /// Kahn-style reduction over the non-ALL steps. Any step left with
    /// unsatisfied in-degree sits on a cycle.
    fn check_acyclic(&self, steps: &IndexMap<String, Step>) -> Result<(), ConfigError> {
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        for step in steps.values().filter(|s| !s.is_all()) {
            indegree.insert(
                step.key.as_str(),
                self.predecessors(&step.key).len(),
            );
        }

        // Sorted frontier keeps reduction order deterministic.
        let mut frontier: BTreeSet<&str> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(k, _)| *k)
            .collect();

        while let Some(key) = frontier.pop_first() {
            indegree.remove(key);
            for dependent in self.dependents(key) {
                if let Some(d) = indegree.get_mut(dependent.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        frontier.insert(dependent.as_str());
                    }
                }
            }
        }

        if indegree.is_empty() {
            Ok(())
        } else {
            let mut remaining: Vec<&str> = indegree.keys().copied().collect();
            remaining.sort_unstable();
            Err(ConfigError::CycleDetected(remaining.join(", ")))
        }
    }

    /// Declared predecessors of a step (empty for the ALL step).
    pub fn predecessors(&self, key: &str) -> &[String] {
        self.predecessors.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Steps that declare a dependency on `key`.
    pub fn dependents(&self, key: &str) -> &[String] {
        self.dependents.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Key of the ALL step, if the job has one.
    pub fn all_step(&self) -> Option<&str> {
        self.all_step.as_deref()
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
