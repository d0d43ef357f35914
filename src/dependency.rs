//! Dependency ordering for components that declare what they depend on.

use std::collections::{BTreeMap, BTreeSet};

/// Outcome of [`topological_sort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologicalSort<T> {
    /// Every resolvable node, each after all of its dependencies.
    pub sorted: Vec<T>,
    /// Unresolvable nodes with their declared dependencies: nodes in a cycle,
    /// nodes referring to an unknown node, and nodes depending on either.
    pub error_set: BTreeMap<T, BTreeSet<T>>,
}

impl<T> TopologicalSort<T> {
    pub fn is_complete(&self) -> bool {
        self.error_set.is_empty()
    }
}

/// Orders the keys of `graph` so that every node follows its dependencies.
///
/// Nodes without pending dependencies are emitted in ascending order, which
/// makes the result deterministic.
pub fn topological_sort<T: Ord + Clone>(graph: &BTreeMap<T, BTreeSet<T>>) -> TopologicalSort<T> {
    let mut pending: BTreeMap<&T, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&T, Vec<&T>> = BTreeMap::new();
    for (node, dependencies) in graph {
        pending.insert(node, dependencies.len());
        for dependency in dependencies {
            dependents.entry(dependency).or_default().push(node);
        }
    }

    let mut ready: BTreeSet<&T> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| *node)
        .collect();

    let mut sorted = Vec::with_capacity(graph.len());
    while let Some(node) = ready.pop_first() {
        sorted.push(node.clone());
        for dependent in dependents.get(node).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
        pending.remove(node);
    }

    let error_set = pending
        .into_keys()
        .map(|node| (node.clone(), graph[node].clone()))
        .collect();

    TopologicalSort { sorted, error_set }
}

/// A dependency graph with reverse lookups.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph<T: Ord> {
    dependencies: BTreeMap<T, BTreeSet<T>>,
    dependents: BTreeMap<T, BTreeSet<T>>,
}

impl<T: Ord + Clone> DependencyGraph<T> {
    pub fn new(dependencies: BTreeMap<T, BTreeSet<T>>) -> Self {
        let mut dependents: BTreeMap<T, BTreeSet<T>> = BTreeMap::new();
        for (node, deps) in &dependencies {
            for dependency in deps {
                dependents
                    .entry(dependency.clone())
                    .or_default()
                    .insert(node.clone());
            }
        }
        Self {
            dependencies,
            dependents,
        }
    }

    pub fn contains(&self, node: &T) -> bool {
        self.dependencies.contains_key(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.dependencies.keys()
    }

    pub fn sort(&self) -> TopologicalSort<T> {
        topological_sort(&self.dependencies)
    }

    pub fn dependencies(&self, node: &T) -> BTreeSet<T> {
        self.dependencies.get(node).cloned().unwrap_or_default()
    }

    pub fn dependents(&self, node: &T) -> BTreeSet<T> {
        self.dependents.get(node).cloned().unwrap_or_default()
    }

    /// Everything `node` depends on, directly or not. Excludes `node` itself
    /// unless it is part of a cycle.
    pub fn transitive_dependencies(&self, node: &T) -> BTreeSet<T> {
        closure(&self.dependencies, node)
    }

    /// Everything depending on `node`, directly or not.
    pub fn transitive_dependents(&self, node: &T) -> BTreeSet<T> {
        closure(&self.dependents, node)
    }
}

fn closure<T: Ord + Clone>(edges: &BTreeMap<T, BTreeSet<T>>, start: &T) -> BTreeSet<T> {
    let mut visited = BTreeSet::new();
    let mut stack: Vec<&T> = edges.get(start).into_iter().flatten().collect();
    while let Some(node) = stack.pop() {
        if visited.insert(node.clone()) {
            stack.extend(edges.get(node).into_iter().flatten());
        }
    }
    visited
}
