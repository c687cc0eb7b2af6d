//! Action graph builder
//!
//! Builds a directed acyclic graph from a flat collection of action configs,
//! resolving declared dependency references to graph edges and computing the
//! dependents back-references needed for upward expansion.
//!
//! Nodes live in a flat arena and edges are index lists, so the graph owns
//! every node exactly once and cycles in the data model are impossible by
//! construction (a cycle in the declared dependencies is rejected at build
//! time instead).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

use tracing::debug;

use crate::action::{ActionConfig, ActionRef};
use crate::engine::version::Version;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Duplicate action: {0}")]
    DuplicateAction(String),

    #[error("Action '{action}' depends on unknown action '{dependency}'")]
    UnknownDependency { action: String, dependency: String },

    #[error("Cyclic dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
}

/// Index of a node within its graph's arena
pub type NodeId = usize;

/// One action inside a specific graph
#[derive(Debug)]
pub struct ActionNode {
    pub(crate) config: ActionConfig,
    pub(crate) dependencies: Vec<NodeId>,
    pub(crate) dependents: Vec<NodeId>,
    /// Memoized resolved version, written at most once per graph build
    pub(crate) version: OnceLock<Version>,
}

impl ActionNode {
    pub fn config(&self) -> &ActionConfig {
        &self.config
    }

    pub fn key(&self) -> String {
        self.config.key()
    }

    pub fn reference(&self) -> ActionRef {
        self.config.reference()
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    pub fn dependents(&self) -> &[NodeId] {
        &self.dependents
    }

    pub fn is_disabled(&self) -> bool {
        self.config.disabled
    }
}

/// The dependency graph for one engine invocation
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<ActionNode>,
    index: HashMap<ActionRef, NodeId>,
}

impl Graph {
    /// Build a graph from a flat config collection
    ///
    /// Fails if two configs share a `(kind, name)` key, if a declared
    /// dependency is absent from the input set, or if the dependency relation
    /// contains a cycle.
    pub fn build(configs: Vec<ActionConfig>) -> Result<Self, GraphError> {
        let mut nodes = Vec::with_capacity(configs.len());
        let mut index = HashMap::with_capacity(configs.len());

        for config in configs {
            let reference = config.reference();
            if index.contains_key(&reference) {
                return Err(GraphError::DuplicateAction(reference.key()));
            }
            index.insert(reference, nodes.len());
            nodes.push(ActionNode {
                config,
                dependencies: Vec::new(),
                dependents: Vec::new(),
                version: OnceLock::new(),
            });
        }

        for id in 0..nodes.len() {
            let mut dependencies = Vec::with_capacity(nodes[id].config.dependencies.len());
            for dep_ref in &nodes[id].config.dependencies {
                let dep_id =
                    *index
                        .get(dep_ref)
                        .ok_or_else(|| GraphError::UnknownDependency {
                            action: nodes[id].key(),
                            dependency: dep_ref.key(),
                        })?;
                dependencies.push(dep_id);
            }
            for &dep_id in &dependencies {
                nodes[dep_id].dependents.push(id);
            }
            nodes[id].dependencies = dependencies;
        }

        let graph = Self { nodes, index };
        graph.check_acyclic()?;

        debug!("Built action graph with {} nodes", graph.len());
        Ok(graph)
    }

    /// Depth-first cycle check, reporting one representative cycle path
    fn check_acyclic(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        fn visit(
            graph: &Graph,
            id: NodeId,
            marks: &mut Vec<Mark>,
            path: &mut Vec<NodeId>,
        ) -> Result<(), GraphError> {
            match marks[id] {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    let start = path.iter().position(|&p| p == id).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|&p| graph.nodes[p].key()).collect();
                    cycle.push(graph.nodes[id].key());
                    return Err(GraphError::CyclicDependency(cycle));
                }
                Mark::Unvisited => {}
            }

            marks[id] = Mark::InProgress;
            path.push(id);
            for &dep in &graph.nodes[id].dependencies {
                visit(graph, dep, marks, path)?;
            }
            path.pop();
            marks[id] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut path = Vec::new();
        for id in 0..self.nodes.len() {
            visit(self, id, &mut marks, &mut path)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &ActionNode {
        &self.nodes[id]
    }

    pub fn node_id(&self, reference: &ActionRef) -> Option<NodeId> {
        self.index.get(reference).copied()
    }

    pub fn get(&self, reference: &ActionRef) -> Option<&ActionNode> {
        self.node_id(reference).map(|id| &self.nodes[id])
    }

    /// All node ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ActionNode> {
        self.nodes.iter()
    }

    /// Every node reachable from `roots` by following dependency edges,
    /// excluding the roots themselves
    pub fn dependency_closure(&self, roots: impl IntoIterator<Item = NodeId>) -> HashSet<NodeId> {
        self.closure(roots, |node| &node.dependencies)
    }

    /// Every node reachable from `roots` by following dependent edges,
    /// excluding the roots themselves
    pub fn dependent_closure(&self, roots: impl IntoIterator<Item = NodeId>) -> HashSet<NodeId> {
        self.closure(roots, |node| &node.dependents)
    }

    fn closure(
        &self,
        roots: impl IntoIterator<Item = NodeId>,
        edges: impl Fn(&ActionNode) -> &Vec<NodeId>,
    ) -> HashSet<NodeId> {
        let roots: HashSet<NodeId> = roots.into_iter().collect();
        let mut seen = roots.clone();
        let mut queue: VecDeque<NodeId> = roots.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            for &next in edges(&self.nodes[id]) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        &seen - &roots
    }
}
