//! Blocking-graph analysis over relation edges
//!
//! Uses petgraph for cycle detection and ready-work analysis across the
//! blocked-by edges of a set of issues.

use std::collections::{HashMap, HashSet};

use petgraph::algo::{is_cyclic_directed, kosaraju_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::model::Issue;

/// Directed graph of blocked-by edges: an edge runs from an issue to each
/// issue blocking it.
pub struct RelationGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl RelationGraph {
    /// Build a graph from a set of issues. Edges to issues outside the set
    /// are not represented; `unblocked` still accounts for them.
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for issue in issues {
            let idx = graph.add_node(issue.id.clone());
            node_map.insert(issue.id.clone(), idx);
        }

        for issue in issues {
            if let Some(&from_idx) = node_map.get(&issue.id) {
                for blocker in &issue.blocked_by {
                    if let Some(&to_idx) = node_map.get(&blocker.id) {
                        graph.add_edge(from_idx, to_idx, ());
                    }
                }
            }
        }

        Self { graph, node_map }
    }

    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// All cycles, as issue-id groups.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.has_self_loop(scc[0]))
            .map(|scc| scc.into_iter().map(|idx| self.graph[idx].clone()).collect())
            .collect()
    }

    fn has_self_loop(&self, node: NodeIndex) -> bool {
        self.graph.edges(node).any(|e| e.target() == node)
    }

    /// Issues blocking the given issue, within the graph.
    pub fn blockers_of(&self, issue_id: &str) -> Vec<String> {
        self.neighbors(issue_id, petgraph::Direction::Outgoing)
    }

    /// Issues the given issue blocks, within the graph.
    pub fn dependents_of(&self, issue_id: &str) -> Vec<String> {
        self.neighbors(issue_id, petgraph::Direction::Incoming)
    }

    fn neighbors(&self, issue_id: &str, direction: petgraph::Direction) -> Vec<String> {
        match self.node_map.get(issue_id) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, direction)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Issues that are open and whose blockers are all closed.
    ///
    /// `closed_status_ids` is the union of done/canceled status ids for the
    /// involved projects. A blocker that is not present in `issues` no
    /// longer resolves and does not block.
    pub fn unblocked<'a>(
        &self,
        issues: &'a [Issue],
        closed_status_ids: &HashSet<String>,
    ) -> Vec<&'a Issue> {
        let by_id: HashMap<&str, &Issue> =
            issues.iter().map(|i| (i.id.as_str(), i)).collect();
        let closed = |issue: &Issue| closed_status_ids.contains(&issue.status);

        issues
            .iter()
            .filter(|issue| {
                !closed(issue)
                    && issue.blocked_by.iter().all(|blocker| {
                        by_id
                            .get(blocker.id.as_str())
                            .map(|b| closed(b))
                            .unwrap_or(true)
                    })
            })
            .collect()
    }
}
