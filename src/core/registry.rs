//! The set of targets declared by a project.

use std::collections::HashMap;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::core::errors::ResolveError;
use crate::core::target::Target;

/// Name-keyed arena of targets that remembers declaration order.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: Vec<Target>,
    index: HashMap<String, usize>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from targets, rejecting duplicate names.
    pub fn from_targets(targets: impl IntoIterator<Item = Target>) -> Result<Self, ResolveError> {
        let mut registry = Self::new();
        for target in targets {
            registry.insert(target)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, target: Target) -> Result<(), ResolveError> {
        if self.index.contains_key(&target.name) {
            return Err(ResolveError::DuplicateTarget { name: target.name });
        }
        self.index.insert(target.name.clone(), self.targets.len());
        self.targets.push(target);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.index.get(name).map(|&i| &self.targets[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Targets in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Targets ordered so every dependency precedes its dependents.
    pub fn build_order(&self) -> Result<Vec<&Target>, ResolveError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..self.targets.len()).map(|i| graph.add_node(i)).collect();

        for (i, target) in self.targets.iter().enumerate() {
            for (dep, _) in target.dependencies() {
                let Some(&j) = self.index.get(dep) else {
                    return Err(ResolveError::UnknownDependency {
                        target: target.name.clone(),
                        dependency: dep.to_string(),
                    });
                };
                graph.update_edge(nodes[j], nodes[i], ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|n| &self.targets[graph[n]]).collect()),
            Err(cycle) => Err(ResolveError::Cycle {
                path: self.cycle_through(&graph, cycle.node_id()),
            }),
        }
    }

    /// Name the cycle containing `start` as `a -> b -> a`.
    fn cycle_through(&self, graph: &DiGraph<usize, ()>, start: NodeIndex) -> Vec<String> {
        let component = tarjan_scc(graph)
            .into_iter()
            .find(|scc| scc.contains(&start))
            .unwrap_or_else(|| vec![start]);

        // Walk dependency edges inside the component from `start` until it
        // closes. Edges point dependency -> dependent, so follow them in
        // reverse to read "depends on".
        let mut path = vec![start];
        let mut current = start;
        loop {
            let next = graph
                .neighbors_directed(current, petgraph::Direction::Incoming)
                .filter(|n| component.contains(n))
                .min_by_key(|n| graph[*n]);
            match next {
                Some(n) if n == start => {
                    path.push(n);
                    break;
                }
                Some(n) if !path.contains(&n) => {
                    path.push(n);
                    current = n;
                }
                _ => break,
            }
        }

        path.into_iter()
            .map(|n| self.targets[graph[n]].name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut registry = TargetRegistry::new();
        registry.insert(Target::binary("app")).unwrap();
        let err = registry.insert(Target::static_library("app")).unwrap_err();
        assert_eq!(err, ResolveError::DuplicateTarget { name: "app".into() });
    }

    #[test]
    fn test_build_order_puts_dependencies_first() {
        let registry = TargetRegistry::from_targets([
            Target::binary("app").private_dep("core"),
            Target::static_library("core").public_dep("base"),
            Target::header_only("base"),
        ])
        .unwrap();

        let order: Vec<_> = registry
            .build_order()
            .unwrap()
            .into_iter()
            .map(|t| t.name.as_str())
            .collect();
        let pos = |n: &str| order.iter().position(|x| *x == n).unwrap();
        assert!(pos("base") < pos("core"));
        assert!(pos("core") < pos("app"));
    }

    #[test]
    fn test_build_order_reports_cycle() {
        let registry = TargetRegistry::from_targets([
            Target::static_library("a").private_dep("b"),
            Target::static_library("b").private_dep("a"),
        ])
        .unwrap();

        match registry.build_order() {
            Err(ResolveError::Cycle { path }) => {
                assert_eq!(path.len(), 3);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_build_order_reports_unknown_dependency() {
        let registry =
            TargetRegistry::from_targets([Target::binary("app").private_dep("ghost")]).unwrap();
        assert_eq!(
            registry.build_order().unwrap_err(),
            ResolveError::UnknownDependency {
                target: "app".into(),
                dependency: "ghost".into()
            }
        );
    }
}
