//! The dependency graph: an arena of package nodes.
//!
//! Resolution may create the same package twice when two threads miss the
//! store at the same moment. Every allocation is logged, and
//! [`Graph::deduplicate`] folds the duplicates afterwards so each canonical
//! name owns exactly one node.

pub mod builder;

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::bundle::BundleStore;
use crate::error::{Error, Result};

pub use builder::GraphBuilder;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RebuildPolicy {
    #[default]
    Default,
    /// Rebuild this package even if installed or cached.
    ForcePackage,
    /// Rebuild every source package of the subtree.
    ForceTree,
}

impl RebuildPolicy {
    pub fn forces(self) -> bool {
        self != RebuildPolicy::Default
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackageNode {
    pub name: String,
    pub installed: bool,
    pub installed_version: Option<String>,
    pub in_repos: bool,
    pub in_source_index: bool,
    pub latest_version: Option<String>,
    pub out_of_date: bool,
    pub dependencies: Vec<NodeId>,
    pub build_dependencies: Vec<NodeId>,
    pub optional_dependencies: Vec<String>,
    pub parents: BTreeSet<NodeId>,
    pub rebuild: RebuildPolicy,
    /// Package base of the bundle this node builds from.
    pub source_bundle: Option<String>,
    pub built_artifacts: Vec<PathBuf>,
}

impl PackageNode {
    /// Installed at exactly the version the index offers.
    pub fn is_up_to_date(&self) -> bool {
        match (&self.installed_version, &self.latest_version) {
            (Some(installed), Some(latest)) => installed == latest,
            _ => false,
        }
    }
}

// ─── Graph ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<PackageNode>,
    /// `(canonical name, node)` in allocation order.
    log: Vec<(String, NodeId)>,
}

impl Graph {
    pub fn new(nodes: Vec<PackageNode>, log: Vec<(String, NodeId)>) -> Self {
        Graph { nodes, log }
    }

    pub fn node(&self, id: NodeId) -> &PackageNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut PackageNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn log(&self) -> &[(String, NodeId)] {
        &self.log
    }

    /// First node with this name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    /// Fold duplicate nodes into the first-logged node of each name and
    /// compact the arena. Returns the old-id → new-id map.
    ///
    /// Running it again on a deduplicated graph changes nothing.
    pub fn deduplicate(&mut self) -> Vec<NodeId> {
        // old id → canonical old id
        let mut first_seen: HashMap<&str, NodeId> = HashMap::new();
        let mut canonical: Vec<NodeId> = (0..self.nodes.len()).map(NodeId).collect();
        for (name, id) in &self.log {
            let first = *first_seen.entry(name.as_str()).or_insert(*id);
            canonical[id.0] = first;
        }
        let duplicates = canonical
            .iter()
            .enumerate()
            .filter(|(old, c)| c.0 != *old)
            .count();
        if duplicates > 0 {
            tracing::debug!("folding {} duplicate node(s)", duplicates);
        }

        // merge parent sets of duplicates into their canonical node
        for old in 0..self.nodes.len() {
            let target = canonical[old];
            if target.0 != old {
                let parents = std::mem::take(&mut self.nodes[old].parents);
                self.nodes[target.0].parents.extend(parents);
            }
        }

        // compact: survivors keep their relative order
        let mut new_index = vec![None; self.nodes.len()];
        let mut survivors = Vec::new();
        for (old, node) in std::mem::take(&mut self.nodes).into_iter().enumerate() {
            if canonical[old].0 == old {
                new_index[old] = Some(NodeId(survivors.len()));
                survivors.push(node);
            }
        }
        let remap: Vec<NodeId> = canonical
            .iter()
            .map(|c| new_index[c.0].unwrap_or(*c))
            .collect();

        // every edge and parent reference now points at a survivor
        for node in &mut survivors {
            node.dependencies = remap_unique(&node.dependencies, &remap);
            node.build_dependencies = remap_unique(&node.build_dependencies, &remap);
            node.parents = node.parents.iter().map(|p| remap[p.0]).collect();
        }

        self.log = survivors
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.clone(), NodeId(i)))
            .collect();
        self.nodes = survivors;
        remap
    }

    /// Fail on any cycle through runtime or build edges; no build order
    /// exists for one.
    pub fn check_acyclic(&self) -> Result<()> {
        let mut g: DiGraph<NodeId, ()> = DiGraph::new();
        let indices: Vec<NodeIndex> = self.ids().map(|id| g.add_node(id)).collect();
        for id in self.ids() {
            let node = self.node(id);
            for dep in node.dependencies.iter().chain(&node.build_dependencies) {
                g.add_edge(indices[id.0], indices[dep.0], ());
            }
        }

        for scc in tarjan_scc(&g) {
            let self_loop = scc.len() == 1 && g.contains_edge(scc[0], scc[0]);
            if scc.len() > 1 || self_loop {
                let members: BTreeSet<NodeId> = scc.iter().map(|ix| g[*ix]).collect();
                return Err(Error::DependencyCycle {
                    cycle: self.cycle_path(&members),
                });
            }
        }
        Ok(())
    }

    /// A readable closed walk through `members`, starting at the smallest
    /// name: `a -> b -> a`.
    fn cycle_path(&self, members: &BTreeSet<NodeId>) -> Vec<String> {
        let start = match members.iter().min_by_key(|id| &self.node(**id).name) {
            Some(start) => *start,
            None => return Vec::new(),
        };
        let mut path = vec![start];
        let mut visited = BTreeSet::from([start]);
        let mut current = start;
        loop {
            let node = self.node(current);
            let mut next_hops = node
                .dependencies
                .iter()
                .chain(&node.build_dependencies)
                .filter(|d| members.contains(*d));
            let next = match next_hops.clone().find(|d| **d == start) {
                Some(back) => Some(*back),
                None => next_hops.find(|d| !visited.contains(*d)).copied(),
            };
            match next {
                Some(next) if next == start => {
                    path.push(start);
                    break;
                }
                Some(next) => {
                    visited.insert(next);
                    path.push(next);
                    current = next;
                }
                // dead end inside the component, report what we have
                None => break,
            }
        }
        path.iter().map(|id| self.node(*id).name.clone()).collect()
    }
}

fn remap_unique(ids: &[NodeId], remap: &[NodeId]) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = Vec::with_capacity(ids.len());
    for id in ids {
        let mapped = remap[id.0];
        if !out.contains(&mapped) {
            out.push(mapped);
        }
    }
    out
}

// ─── Resolution ────────────────────────────────────────────────────

/// A resolved, deduplicated, acyclic graph and the bundles it builds from.
#[derive(Debug)]
pub struct Resolution {
    pub graph: Graph,
    pub bundles: BundleStore,
    /// Nodes of the top-level requests, in request order.
    pub roots: Vec<NodeId>,
}

impl Resolution {
    /// Deduplicate the graph, fix up the roots and reject cycles.
    pub fn finish(mut graph: Graph, bundles: BundleStore, roots: Vec<NodeId>) -> Result<Self> {
        let remap = graph.deduplicate();
        let mut unique_roots = Vec::with_capacity(roots.len());
        for root in roots {
            let mapped = remap[root.0];
            if !unique_roots.contains(&mapped) {
                unique_roots.push(mapped);
            }
        }
        graph.check_acyclic()?;
        Ok(Resolution {
            graph,
            bundles,
            roots: unique_roots,
        })
    }
}
