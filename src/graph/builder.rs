//! Concurrent dependency resolution.
//!
//! Each source-indexed package fans its dependency names out over a bounded
//! rayon pool. The store lookup and the store insert are two separate steps,
//! so two threads can both create a node for the same name. That is
//! accepted: the allocation log keeps every node and
//! [`Graph::deduplicate`](super::Graph::deduplicate) merges them afterwards.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use dashmap::DashMap;
use rayon::prelude::*;

use super::{Graph, NodeId, PackageNode, RebuildPolicy, Resolution};
use crate::alpm::PackageDatabase;
use crate::aur::depends::{split_dependencies, strip_version};
use crate::aur::{PackageInfo, SourceIndex};
use crate::bundle::{BundleStore, SourceBundle};
use crate::error::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared state of one resolution run.
pub struct ResolveContext<'a> {
    db: &'a dyn PackageDatabase,
    index: &'a dyn SourceIndex,
    policy: RebuildPolicy,
    top_level: BTreeSet<String>,
    arena: Mutex<Vec<PackageNode>>,
    store: DashMap<String, NodeId>,
    log: Mutex<Vec<(String, NodeId)>>,
    bundles: DashMap<String, SourceBundle>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        db: &'a dyn PackageDatabase,
        index: &'a dyn SourceIndex,
        policy: RebuildPolicy,
        requested: &[String],
    ) -> Self {
        let mut ctx = ResolveContext {
            db,
            index,
            policy,
            top_level: BTreeSet::new(),
            arena: Mutex::new(Vec::new()),
            store: DashMap::new(),
            log: Mutex::new(Vec::new()),
            bundles: DashMap::new(),
        };
        ctx.top_level = requested
            .iter()
            .map(|name| ctx.canonicalize(strip_version(name)))
            .collect();
        ctx
    }

    /// Installed or repository package that answers to `name`, so that a
    /// virtual name (`java-runtime`) lands on the node of its provider.
    fn canonicalize(&self, name: &str) -> String {
        if let Some(local) = self.db.find_local_satisfier(name) {
            return local.name;
        }
        if let Some(sync) = self.db.find_sync_satisfier(name) {
            return sync.name;
        }
        name.to_string()
    }

    fn policy_for(&self, name: &str) -> RebuildPolicy {
        match self.policy {
            RebuildPolicy::ForceTree => RebuildPolicy::ForceTree,
            RebuildPolicy::ForcePackage if self.top_level.contains(name) => {
                RebuildPolicy::ForcePackage
            }
            _ => RebuildPolicy::Default,
        }
    }

    fn query_index(&self, name: &str, chain: &[String]) -> Result<Option<PackageInfo>> {
        match self.index.info_one(name) {
            Ok(info) => Ok(info),
            Err(Error::Index(cause)) => Err(Error::UnsatisfiableDependency {
                name: name.to_string(),
                chain: chain.to_vec(),
                cause: Some(cause),
            }),
            Err(e) => Err(e),
        }
    }

    /// Resolve one dependency name and return its node. `chain` lists the
    /// requesting packages, top-level first.
    pub fn resolve(&self, raw: &str, parent: Option<NodeId>, chain: &[String]) -> Result<NodeId> {
        let name = self.canonicalize(strip_version(raw));

        let existing = self.store.get(&name).map(|entry| *entry.value());
        if let Some(id) = existing {
            if let Some(parent) = parent {
                lock(&self.arena)[id.0].parents.insert(parent);
            }
            return Ok(id);
        }

        let local = self.db.find_local_satisfier(&name);
        let in_repos = self.db.find_sync_satisfier(&name).is_some();
        let info = if in_repos {
            None
        } else {
            self.query_index(&name, chain)?
        };

        if local.is_none() && !in_repos && info.is_none() {
            return Err(Error::UnsatisfiableDependency {
                name,
                chain: chain.to_vec(),
                cause: None,
            });
        }

        let installed = local.is_some();
        let mut node = PackageNode {
            name: name.clone(),
            installed,
            installed_version: local.map(|l| l.version),
            in_repos,
            rebuild: self.policy_for(&name),
            parents: parent.into_iter().collect(),
            ..PackageNode::default()
        };
        if let Some(info) = &info {
            node.in_source_index = true;
            node.latest_version = Some(info.version.clone());
            node.out_of_date = info.out_of_date.is_some();
            node.optional_dependencies = info.opt_depends.clone();
            node.source_bundle = Some(bundle_id(info).to_string());
            if node.out_of_date {
                crate::ui::warn(format!("{} is flagged out of date", name));
            }
        }

        let id = {
            let mut arena = lock(&self.arena);
            arena.push(node);
            NodeId(arena.len() - 1)
        };
        self.store.insert(name.clone(), id);
        lock(&self.log).push((name.clone(), id));
        tracing::debug!(
            "node {} for {} (installed: {}, repos: {}, index: {})",
            id.0,
            name,
            installed,
            in_repos,
            info.is_some()
        );

        let info = match info {
            Some(info) => info,
            None => return Ok(id),
        };

        let (runtime, build) =
            split_dependencies(&info.depends, &info.make_depends, &info.check_depends);
        self.bundles
            .entry(bundle_id(&info).to_string())
            .or_insert_with(|| SourceBundle::new(bundle_id(&info), &info.version, &info.url_path));

        let mut child_chain = chain.to_vec();
        child_chain.push(name);
        let wanted: Vec<(&str, bool)> = runtime
            .iter()
            .map(|n| (n.as_str(), false))
            .chain(build.iter().map(|n| (n.as_str(), true)))
            .collect();
        let resolved: Vec<(NodeId, bool)> = wanted
            .par_iter()
            .map(|(dep, is_build)| {
                self.resolve(dep, Some(id), &child_chain)
                    .map(|child| (child, *is_build))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut arena = lock(&self.arena);
        let node = &mut arena[id.0];
        for (child, is_build) in resolved {
            let edges = if is_build {
                &mut node.build_dependencies
            } else {
                &mut node.dependencies
            };
            if !edges.contains(&child) {
                edges.push(child);
            }
        }
        Ok(id)
    }

    /// Hand the collected state over as a graph and bundle store.
    pub fn into_parts(self) -> (Graph, BundleStore) {
        let nodes = self
            .arena
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let log = self
            .log
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut bundles = BundleStore::default();
        for (_, bundle) in self.bundles {
            bundles.insert(bundle);
        }
        (Graph::new(nodes, log), bundles)
    }
}

fn bundle_id(info: &PackageInfo) -> &str {
    if info.package_base.is_empty() {
        &info.name
    } else {
        &info.package_base
    }
}

// ─── Builder ───────────────────────────────────────────────────────

/// Entry point: resolve top-level names into a finished [`Resolution`].
pub struct GraphBuilder<'a> {
    db: &'a dyn PackageDatabase,
    index: &'a dyn SourceIndex,
    jobs: usize,
    policy: RebuildPolicy,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(db: &'a dyn PackageDatabase, index: &'a dyn SourceIndex, jobs: usize) -> Self {
        GraphBuilder {
            db,
            index,
            jobs: jobs.max(1),
            policy: RebuildPolicy::Default,
        }
    }

    pub fn with_policy(mut self, policy: RebuildPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn resolve(&self, names: &[String]) -> Result<Resolution> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("resolve-{}", i))
            .build()
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        let ctx = ResolveContext::new(self.db, self.index, self.policy, names);

        let roots = pool.install(|| {
            names
                .par_iter()
                .map(|name| ctx.resolve(name, None, &[]))
                .collect::<Result<Vec<NodeId>>>()
        })?;

        let (graph, bundles) = ctx.into_parts();
        tracing::info!(
            "resolved {} name(s) into {} node(s), {} bundle(s)",
            names.len(),
            graph.len(),
            bundles.len()
        );
        Resolution::finish(graph, bundles, roots)
    }
}
