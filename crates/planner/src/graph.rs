//! Property dependency graph and Kahn topological sort.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use contracts::PropertyDescriptor;

use crate::PlanError;

/// Dependency graph over one set of derived properties.
///
/// Edge `dep -> prop` for every dependency between two members of the set.
/// Dependencies outside the set (built-ins, already computed properties) add
/// no edge. A property depending on its own past value is recorded as
/// self-dependent and contributes no edge.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Node names, in tie-break priority order
    nodes: Vec<String>,
    /// Dependents per node index
    dependents: Vec<BTreeSet<usize>>,
    in_degree: Vec<usize>,
    self_dependent: BTreeSet<String>,
}

impl DependencyGraph {
    /// Build from descriptors given in tie-break (declaration) order
    pub fn build(descriptors: &[&PropertyDescriptor]) -> Self {
        let nodes: Vec<String> = descriptors.iter().map(|d| d.name().to_string()).collect();
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();

        let mut dependents = vec![BTreeSet::new(); nodes.len()];
        let mut in_degree = vec![0; nodes.len()];
        let mut self_dependent = BTreeSet::new();

        for (prop, descriptor) in descriptors.iter().enumerate() {
            for (dep, _) in descriptor.dependencies() {
                if dep == descriptor.name() {
                    self_dependent.insert(dep.clone());
                    continue;
                }
                if let Some(&dep_idx) = index.get(dep.as_str()) {
                    if dependents[dep_idx].insert(prop) {
                        in_degree[prop] += 1;
                    }
                }
            }
        }

        Self {
            nodes,
            dependents,
            in_degree,
            self_dependent,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Properties reading their own past values
    pub fn self_dependent(&self) -> &BTreeSet<String> {
        &self.self_dependent
    }

    /// Kahn's algorithm; among ready nodes the earliest declared goes first.
    ///
    /// # Errors
    /// `PlanError::Cycle` listing every node left with non-zero in-degree.
    pub fn topological_order(&self) -> Result<Vec<String>, PlanError> {
        let mut in_degree = self.in_degree.clone();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(self.nodes[node].clone());
            for &next in &self.dependents[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < self.nodes.len() {
            let remaining = in_degree
                .iter()
                .enumerate()
                .filter(|(_, d)| **d > 0)
                .map(|(i, _)| self.nodes[i].clone())
                .collect();
            return Err(PlanError::Cycle { remaining });
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Value;

    fn prop(name: &str, deps: &[(&str, usize)]) -> PropertyDescriptor {
        deps.iter()
            .fold(PropertyDescriptor::builder(name), |b, (d, w)| {
                b.depends_on(*d, *w)
            })
            .compute(|_| Value::Null)
    }

    fn order_of(props: &[PropertyDescriptor]) -> Result<Vec<String>, PlanError> {
        let refs: Vec<&PropertyDescriptor> = props.iter().collect();
        DependencyGraph::build(&refs).topological_order()
    }

    #[test]
    fn test_dependencies_come_first() {
        let props = vec![
            prop("speed", &[("center", 1), ("fps", 0)]),
            prop("center", &[("tlbr", 0)]),
            prop("fast", &[("speed", 0)]),
        ];
        assert_eq!(order_of(&props).unwrap(), vec!["center", "speed", "fast"]);
    }

    #[test]
    fn test_ties_follow_declaration_order() {
        let props = vec![
            prop("c", &[]),
            prop("a", &[]),
            prop("b", &[("c", 0)]),
        ];
        assert_eq!(order_of(&props).unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_self_dependency_is_not_a_cycle() {
        let props = vec![prop("count", &[("count", 1), ("tlbr", 0)])];
        let refs: Vec<&PropertyDescriptor> = props.iter().collect();
        let graph = DependencyGraph::build(&refs);
        assert!(graph.self_dependent().contains("count"));
        assert_eq!(graph.topological_order().unwrap(), vec!["count"]);
    }

    #[test]
    fn test_cycle_detected() {
        let props = vec![
            prop("a", &[("b", 0)]),
            prop("b", &[("c", 1)]),
            prop("c", &[("a", 0)]),
            prop("d", &[]),
        ];
        let err = order_of(&props).unwrap_err();
        match err {
            PlanError::Cycle { remaining } => {
                assert_eq!(remaining, vec!["a", "b", "c"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
