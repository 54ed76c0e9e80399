//! Dependency graph over build targets.
//!
//! Edges run from prerequisite to dependent. The graph is validated once,
//! at construction: every `depends_on` entry must name a declared target and
//! the graph must be acyclic. After that every query is infallible except
//! for lookups of unknown names.

use std::collections::{BTreeSet, HashMap};

use imprint_core::TargetDescriptor;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

pub struct DependencyGraph {
    /// Node weights are target names; node index order is declaration order.
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build and validate the graph.
    ///
    /// # Errors
    ///
    /// - [`GraphError::UnknownDependency`] if a target depends on an undeclared name
    /// - [`GraphError::CycleDetected`] if prerequisites form a cycle (including self-loops)
    pub fn new(targets: &[TargetDescriptor]) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for target in targets {
            let idx = graph.add_node(target.name.clone());
            nodes.insert(target.name.clone(), idx);
        }

        for target in targets {
            let dependent = nodes[&target.name];
            for dependency in &target.depends_on {
                let Some(&prerequisite) = nodes.get(dependency) else {
                    return Err(GraphError::UnknownDependency {
                        target: target.name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                graph.update_edge(prerequisite, dependent, ());
            }
        }

        toposort(&graph, None).map_err(|cycle| GraphError::CycleDetected {
            target: graph[cycle.node_id()].clone(),
        })?;

        tracing::debug!(
            targets = graph.node_count(),
            edges = graph.edge_count(),
            "dependency graph built"
        );
        Ok(Self { graph, nodes })
    }

    /// Every target, each after all of its prerequisites.
    ///
    /// Among targets that are ready at the same time, declaration order wins,
    /// so the order is reproducible.
    pub fn build_order(&self) -> Vec<&str> {
        self.order_within(|_| true)
    }

    /// Groups of targets with no path between any two members of a group.
    /// Every group depends only on earlier groups, so a group may be built
    /// concurrently.
    pub fn waves(&self) -> Vec<Vec<&str>> {
        let mut level: HashMap<NodeIndex, usize> = HashMap::new();
        let mut waves: Vec<Vec<&str>> = Vec::new();

        for name in self.build_order() {
            let idx = self.nodes[name];
            let depth = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .map(|p| level[&p] + 1)
                .fold(0, usize::max);
            level.insert(idx, depth);
            if waves.len() <= depth {
                waves.resize_with(depth + 1, Vec::new);
            }
            waves[depth].push(name);
        }
        waves
    }

    /// Direct prerequisites of `name`, in declaration order.
    pub fn prerequisites(&self, name: &str) -> Result<Vec<&str>, GraphError> {
        let idx = self.index(name)?;
        let mut prerequisites: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        prerequisites.sort();
        Ok(prerequisites
            .into_iter()
            .map(|p| self.graph[p].as_str())
            .collect())
    }

    /// `names` plus all their transitive prerequisites, in build order.
    pub fn closure(&self, names: &[impl AsRef<str>]) -> Result<Vec<&str>, GraphError> {
        let mut included = BTreeSet::new();
        let mut stack = names
            .iter()
            .map(|n| self.index(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        while let Some(idx) = stack.pop() {
            if included.insert(idx) {
                stack.extend(self.graph.neighbors_directed(idx, Direction::Incoming));
            }
        }

        Ok(self.order_within(|idx| included.contains(&idx)))
    }

    fn index(&self, name: &str) -> Result<NodeIndex, GraphError> {
        self.nodes
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownTarget(name.to_owned()))
    }

    /// Kahn's algorithm restricted to `keep`, always taking the earliest
    /// declared ready node.
    fn order_within(&self, keep: impl Fn(NodeIndex) -> bool) -> Vec<&str> {
        let mut pending: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .filter(|&idx| keep(idx))
            .map(|idx| {
                let unmet = self
                    .graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .filter(|&p| keep(p))
                    .count();
                (idx, unmet)
            })
            .collect();

        let mut ready: BTreeSet<NodeIndex> = pending
            .iter()
            .filter(|&(_, &unmet)| unmet == 0)
            .map(|(&idx, _)| idx)
            .collect();
        let mut order = Vec::with_capacity(pending.len());

        while let Some(idx) = ready.pop_first() {
            order.push(self.graph[idx].as_str());
            for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if let Some(unmet) = pending.get_mut(&dependent) {
                    *unmet -= 1;
                    if *unmet == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
        order
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("target '{target}' depends on undeclared target '{dependency}'")]
    UnknownDependency { target: String, dependency: String },

    #[error("dependency cycle detected involving target '{target}'")]
    CycleDetected { target: String },

    #[error("unknown target '{0}'")]
    UnknownTarget(String),
}
