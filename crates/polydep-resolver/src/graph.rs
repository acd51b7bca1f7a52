//! Dependency graph construction and traversal.
//!
//! [`GraphBuilder`] accepts projects in sequence order and is consumed by
//! [`GraphBuilder::freeze`]; resolution only ever sees a [`DependencyGraph`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use polydep_core::dependency::{
    DeclaredDependency, DependencyKey, DependencyKind, Environment, Provenance, SourceLocation,
};
use polydep_core::manifest::Resolution;
use polydep_core::project::{DialectKind, Project, ProjectId};
use polydep_core::version::VersionConstraint;
use polydep_util::errors::PolydepError;

/// One project's request recorded on a dependency node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedConstraint {
    pub project: ProjectId,
    pub constraint: VersionConstraint,
    pub provenance: Provenance,
    pub condition: Option<Environment>,
    pub location: SourceLocation,
}

/// A distinct `(kind, case-insensitive name)` required by some project.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub key: DependencyKey,
    /// Spelling of the first request.
    pub name: String,
    pub kind: DependencyKind,
    pub requests: Vec<RequestedConstraint>,
    resolution: Option<Resolution>,
}

impl DependencyNode {
    /// Key used in the manifest's `packages` map.
    pub fn manifest_key(&self) -> String {
        DependencyKey::manifest_key(self.kind, &self.name)
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn unconditional(&self) -> impl Iterator<Item = &RequestedConstraint> {
        self.requests.iter().filter(|r| r.condition.is_none())
    }

    pub fn is_conditional_only(&self) -> bool {
        self.requests.iter().all(|r| r.condition.is_some())
    }
}

impl fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.manifest_key())?;
        if let Some(resolution) = &self.resolution {
            write!(f, " = {resolution}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectVertex {
    pub id: ProjectId,
    pub seq: usize,
    pub dialect: DialectKind,
}

impl fmt::Display for ProjectVertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.dialect)
    }
}

#[derive(Debug, Clone)]
pub enum GraphNode {
    Project(ProjectVertex),
    Dependency(DependencyNode),
}

/// Edge label: Project -> DependencyNode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub constraint: VersionConstraint,
    pub provenance: Provenance,
    pub condition: Option<Environment>,
    pub location: SourceLocation,
}

impl DependencyEdge {
    fn label(&self) -> String {
        let mut label = format!("[{}]", self.constraint);
        if self.provenance == Provenance::Inferred {
            label.push_str(" (inferred)");
        }
        if let Some(env) = &self.condition {
            label.push_str(&format!(" (when {env})"));
        }
        label
    }
}

/// Mutable graph under construction.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: DiGraph<GraphNode, DependencyEdge>,
    projects: HashMap<ProjectId, NodeIndex>,
    dependencies: HashMap<DependencyKey, NodeIndex>,
    last_seq: Option<usize>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project and an edge for every entry of `project.declared`, in order.
    ///
    /// Projects must arrive in strictly increasing `seq` order.
    pub fn add_project(&mut self, project: &Project) -> miette::Result<()> {
        if self.last_seq.is_some_and(|last| project.seq <= last) {
            return Err(PolydepError::Resolution {
                message: format!(
                    "project {} (seq {}) added out of discovery order",
                    project.id, project.seq
                ),
            }
            .into());
        }
        self.last_seq = Some(project.seq);

        let from = self.graph.add_node(GraphNode::Project(ProjectVertex {
            id: project.id.clone(),
            seq: project.seq,
            dialect: project.dialect,
        }));
        self.projects.insert(project.id.clone(), from);

        for dep in &project.declared {
            self.add_dependency(from, &project.id, dep);
        }
        tracing::trace!(
            "graph: {} with {} dependencies",
            project.id,
            project.declared.len()
        );
        Ok(())
    }

    /// Dependency nodes are only created here, together with their first edge.
    fn add_dependency(&mut self, from: NodeIndex, project: &ProjectId, dep: &DeclaredDependency) {
        let key = dep.key();
        let to = match self.dependencies.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.graph.add_node(GraphNode::Dependency(DependencyNode {
                    key: key.clone(),
                    name: dep.name.clone(),
                    kind: dep.kind,
                    requests: Vec::new(),
                    resolution: None,
                }));
                self.dependencies.insert(key, idx);
                idx
            }
        };

        if let GraphNode::Dependency(node) = &mut self.graph[to] {
            node.requests.push(RequestedConstraint {
                project: project.clone(),
                constraint: dep.constraint.clone(),
                provenance: dep.provenance,
                condition: dep.condition.clone(),
                location: dep.location.clone(),
            });
        }
        self.graph.add_edge(
            from,
            to,
            DependencyEdge {
                constraint: dep.constraint.clone(),
                provenance: dep.provenance,
                condition: dep.condition.clone(),
                location: dep.location.clone(),
            },
        );
    }

    /// Consume the builder. No further projects or edges can be added.
    pub fn freeze(self) -> DependencyGraph {
        DependencyGraph {
            graph: self.graph,
            projects: self.projects,
            dependencies: self.dependencies,
        }
    }
}

/// Frozen dependency graph backed by petgraph.
///
/// Structure is immutable; only node resolutions can be recorded, once each.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, DependencyEdge>,
    projects: HashMap<ProjectId, NodeIndex>,
    dependencies: HashMap<DependencyKey, NodeIndex>,
}

impl DependencyGraph {
    /// Project vertices in sequence order.
    pub fn projects(&self) -> Vec<&ProjectVertex> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                GraphNode::Project(p) => Some(p),
                GraphNode::Dependency(_) => None,
            })
            .collect()
    }

    /// Dependency node indices in first-request order.
    pub fn dependency_indices(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| matches!(self.graph[idx], GraphNode::Dependency(_)))
            .collect()
    }

    /// Dependency node at `idx`, if `idx` is a dependency vertex.
    pub fn dependency(&self, idx: NodeIndex) -> Option<&DependencyNode> {
        match self.graph.node_weight(idx)? {
            GraphNode::Dependency(node) => Some(node),
            GraphNode::Project(_) => None,
        }
    }

    pub fn find(&self, key: &DependencyKey) -> Option<&DependencyNode> {
        self.dependencies
            .get(key)
            .and_then(|&idx| self.dependency(idx))
    }

    /// Record the resolution of a dependency node. A second call for the same
    /// node is an error.
    pub fn set_resolution(&mut self, idx: NodeIndex, resolution: Resolution) -> miette::Result<()> {
        match self.graph.node_weight_mut(idx) {
            Some(GraphNode::Dependency(node)) => {
                if node.resolution.is_some() {
                    return Err(PolydepError::Resolution {
                        message: format!("{} already resolved", node.manifest_key()),
                    }
                    .into());
                }
                node.resolution = Some(resolution);
                Ok(())
            }
            _ => Err(PolydepError::Resolution {
                message: format!("node {} is not a dependency", idx.index()),
            }
            .into()),
        }
    }

    /// Outgoing edges of a project, in declaration order.
    pub fn dependencies_of(&self, project: &ProjectId) -> Vec<(&DependencyNode, &DependencyEdge)> {
        let Some(&idx) = self.projects.get(project) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .filter_map(|e| Some((self.dependency(e.target())?, e.weight())))
            .collect()
    }

    /// Projects requiring a dependency, in request order.
    pub fn dependents_of(&self, key: &DependencyKey) -> Vec<(&ProjectVertex, &DependencyEdge)> {
        let Some(&idx) = self.dependencies.get(key) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .filter_map(|e| match &self.graph[e.source()] {
                GraphNode::Project(p) => Some((p, e.weight())),
                GraphNode::Dependency(_) => None,
            })
            .collect()
    }

    /// Print every project with its dependencies. Project references expand
    /// into the referenced project's own dependencies.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = String::new();
        for project in self.projects() {
            output.push_str(&format!("{project}\n"));
            let mut visited = HashSet::new();
            visited.insert(project.id.clone());
            let deps = self.dependencies_of(&project.id);
            let count = deps.len();
            for (i, (node, edge)) in deps.into_iter().enumerate() {
                self.print_subtree(
                    &mut output,
                    node,
                    edge,
                    "",
                    i + 1 == count,
                    1,
                    max_depth,
                    &mut visited,
                );
            }
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        node: &DependencyNode,
        edge: &DependencyEdge,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<ProjectId>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{prefix}{connector}{node} {}\n", edge.label()));

        if node.kind != DependencyKind::Project {
            return;
        }
        if max_depth.is_some_and(|max| depth >= max) {
            return;
        }
        let target = ProjectId::new(node.name.as_str());
        if !self.projects.contains_key(&target) || !visited.insert(target.clone()) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let deps = self.dependencies_of(&target);
        let count = deps.len();
        for (i, (child, child_edge)) in deps.into_iter().enumerate() {
            self.print_subtree(
                output,
                child,
                child_edge,
                &child_prefix,
                i + 1 == count,
                depth + 1,
                max_depth,
                visited,
            );
        }
        visited.remove(&target);
    }

    /// Inverted view for one dependency: the node, then every project that
    /// requires it with the requested constraint.
    ///
    /// `target` is matched against manifest keys first, then bare names.
    pub fn print_dependents(&self, target: &str) -> String {
        let mut output = String::new();
        let Some(node) = self.lookup_target(target) else {
            return output;
        };
        output.push_str(&format!("{node}\n"));
        let dependents = self.dependents_of(&node.key);
        let count = dependents.len();
        for (i, (project, edge)) in dependents.into_iter().enumerate() {
            let connector = if i + 1 == count { "└── " } else { "├── " };
            output.push_str(&format!("{connector}{project} {}\n", edge.label()));
        }
        output
    }

    fn lookup_target(&self, target: &str) -> Option<&DependencyNode> {
        let nodes: Vec<&DependencyNode> = self
            .dependency_indices()
            .into_iter()
            .filter_map(|idx| self.dependency(idx))
            .collect();
        nodes
            .iter()
            .find(|n| n.manifest_key().eq_ignore_ascii_case(target))
            .or_else(|| nodes.iter().find(|n| n.name.eq_ignore_ascii_case(target)))
            .copied()
    }

    /// Number of dependency nodes.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}
