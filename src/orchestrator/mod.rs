//! Install pipeline: resolve, review, build, install, clean up.
//!
//! Failure handling is per subtree. A rejected review or a failed build
//! drops the affected top-level request and everything that needs it,
//! while unrelated requests continue. Only resolution errors and failed
//! package manager transactions abort the whole run.

pub mod upgrade;

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::alpm::PackageDatabase;
use crate::aur::SourceIndex;
use crate::bundle::build::BuildOutcome;
use crate::bundle::{locate_artifacts, ArtifactCache, BuildTool, ReviewStore, ReviewTerminal};
use crate::config::Config;
use crate::display::render_optional;
use crate::error::Result;
use crate::graph::{GraphBuilder, NodeId, PackageNode, RebuildPolicy, Resolution};
use crate::ui;

pub use upgrade::{find_upgrades, UpgradePlan};

/// Lines of the build's stderr shown after a failure.
const STDERR_TAIL: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildState {
    Unbuilt,
    /// Nothing to do: in a repository, installed, or up to date.
    Satisfied,
    Building,
    /// Artifacts ready for installation.
    Built,
    Failed,
}

/// What a node needs before anything is built.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Shortcut {
    Satisfied,
    Cached(PathBuf),
    Build,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Top-level requests installed by this run.
    pub installed: Vec<String>,
    pub review_failed: Vec<String>,
    pub build_failed: Vec<String>,
}

impl InstallReport {
    pub fn all_succeeded(&self) -> bool {
        self.review_failed.is_empty() && self.build_failed.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct InstallOptions {
    /// Install the top-level requests as dependencies.
    pub as_dependency: bool,
    pub rebuild: RebuildPolicy,
    pub force_review: bool,
}

pub struct Orchestrator<'a> {
    db: &'a dyn PackageDatabase,
    index: &'a dyn SourceIndex,
    tool: &'a dyn BuildTool,
    config: &'a Config,
    options: InstallOptions,
    reviews: ReviewStore,
    cache: ArtifactCache,
}

/// Per-run bookkeeping next to the resolved graph.
struct Run {
    res: Resolution,
    shortcuts: Vec<Shortcut>,
    reviewed: Vec<Option<bool>>,
    states: Vec<BuildState>,
    /// Installed during this run by the build-dependency transaction.
    installed_early: BTreeSet<NodeId>,
}

impl Run {
    fn node(&self, id: NodeId) -> &PackageNode {
        self.res.graph.node(id)
    }

    fn is_root(&self, id: NodeId) -> bool {
        self.res.roots.contains(&id)
    }

    fn name(&self, id: NodeId) -> String {
        self.node(id).name.clone()
    }

    /// Edges that matter for this run: none below satisfied nodes, runtime
    /// only below cached ones.
    fn edges(&self, id: NodeId, with_build: bool) -> Vec<NodeId> {
        let node = self.node(id);
        match self.shortcuts[id.0] {
            Shortcut::Satisfied => Vec::new(),
            Shortcut::Cached(_) => node.dependencies.clone(),
            Shortcut::Build if with_build => node
                .dependencies
                .iter()
                .chain(&node.build_dependencies)
                .copied()
                .collect(),
            Shortcut::Build => node.dependencies.clone(),
        }
    }

    /// Everything reachable from `from`, the start nodes included.
    fn closure(&self, from: &[NodeId], with_build: bool) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<NodeId> = from.to_vec();
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                stack.extend(self.edges(id, with_build));
            }
        }
        seen
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        db: &'a dyn PackageDatabase,
        index: &'a dyn SourceIndex,
        tool: &'a dyn BuildTool,
        config: &'a Config,
        options: InstallOptions,
    ) -> Self {
        Orchestrator {
            db,
            index,
            tool,
            config,
            options,
            reviews: ReviewStore::new(&config.dirs.reviewed),
            cache: ArtifactCache::new(&config.dirs.pkg),
        }
    }

    pub fn install(
        &self,
        requested: &[String],
        terminal: &mut dyn ReviewTerminal,
    ) -> Result<InstallReport> {
        self.config.dirs.create_all()?;

        ui::msg("resolving dependencies...");
        let res = GraphBuilder::new(self.db, self.index, self.config.jobs)
            .with_policy(self.options.rebuild)
            .resolve(requested)?;
        let mut run = self.plan(res);
        let mut report = InstallReport::default();

        // review gate, dependencies first
        let mut passing = Vec::new();
        for root in run.res.roots.clone() {
            if self.review_node(&mut run, root, terminal) {
                passing.push(root);
            } else {
                ui::err(format!("{} did not pass review, skipping it", run.name(root)));
                report.review_failed.push(run.name(root));
            }
        }

        let needed = run.closure(&passing, true);
        let runtime = run.closure(&passing, false);
        let build_only: BTreeSet<NodeId> = needed.difference(&runtime).copied().collect();

        // repository packages, one transaction
        let repo_deps: Vec<String> = needed
            .iter()
            .filter(|id| !run.is_root(**id))
            .map(|id| run.node(*id))
            .filter(|n| n.in_repos && !n.installed)
            .map(|n| n.name.clone())
            .collect();
        if !repo_deps.is_empty() {
            ui::msg(format!("installing repository dependencies: {}", repo_deps.join(", ")));
            self.db.install_from_repos(&repo_deps, true)?;
        }
        let repo_roots: Vec<NodeId> = passing
            .iter()
            .copied()
            .filter(|id| run.node(*id).in_repos)
            .collect();
        let repo_root_names: Vec<String> = repo_roots.iter().map(|id| run.name(*id)).collect();
        if !repo_root_names.is_empty() {
            self.db
                .install_from_repos(&repo_root_names, self.options.as_dependency)?;
        }

        // source packages needed at build time go in before their dependents
        self.install_build_dependencies(&mut run, &needed)?;

        // top-level builds, runtime dependencies first
        let mut built_roots = Vec::new();
        for root in passing.iter().copied().filter(|id| !repo_roots.contains(id)) {
            match self.build_node(&mut run, root) {
                BuildState::Built => built_roots.push(root),
                BuildState::Satisfied => {
                    ui::msg(format!("{} is up to date, nothing to do", run.name(root)));
                }
                _ => report.build_failed.push(run.name(root)),
            }
        }

        // deps of successful roots, then the roots themselves
        let dep_ids: Vec<NodeId> = run
            .closure(&built_roots, false)
            .into_iter()
            .filter(|id| !run.is_root(*id) && !run.installed_early.contains(id))
            .filter(|id| run.states[id.0] == BuildState::Built)
            .collect();
        let dep_files = artifacts_of(&run, &dep_ids);
        if !dep_files.is_empty() {
            ui::msg("installing dependencies...");
            self.db.install_from_files(&dep_files, true)?;
        }
        let root_files = artifacts_of(&run, &built_roots);
        if !root_files.is_empty() {
            ui::msg(format!(
                "installing {}...",
                built_roots.iter().map(|id| run.name(*id)).collect::<Vec<_>>().join(", ")
            ));
            self.db
                .install_from_files(&root_files, self.options.as_dependency)?;
        }

        report.installed = repo_root_names;
        report
            .installed
            .extend(built_roots.iter().map(|id| run.name(*id)));

        self.clean_up(&mut run, &build_only);
        show_optional_dependencies(&run, &built_roots);
        Ok(report)
    }

    fn plan(&self, res: Resolution) -> Run {
        let len = res.graph.len();
        let mut run = Run {
            res,
            shortcuts: Vec::with_capacity(len),
            reviewed: vec![None; len],
            states: vec![BuildState::Unbuilt; len],
            installed_early: BTreeSet::new(),
        };
        run.shortcuts = run
            .res
            .graph
            .ids()
            .map(|id| self.shortcut(run.node(id), run.is_root(id)))
            .collect();
        run
    }

    fn shortcut(&self, node: &PackageNode, is_root: bool) -> Shortcut {
        if node.in_repos || (node.installed && !node.in_source_index) {
            return Shortcut::Satisfied;
        }
        if node.rebuild.forces() {
            return Shortcut::Build;
        }
        if node.is_up_to_date() || (node.installed && !is_root) {
            return Shortcut::Satisfied;
        }
        if let Some(version) = &node.latest_version {
            if let Some(cached) = self.cache.cached(&node.name, version).into_iter().next() {
                tracing::info!("{} found in the package cache", node.name);
                return Shortcut::Cached(cached);
            }
        }
        Shortcut::Build
    }

    // ─── Review ────────────────────────────────────────────────────

    fn review_node(&self, run: &mut Run, id: NodeId, terminal: &mut dyn ReviewTerminal) -> bool {
        if let Some(verdict) = run.reviewed[id.0] {
            return verdict;
        }
        let verdict = self.review_uncached(run, id, terminal);
        run.reviewed[id.0] = Some(verdict);
        verdict
    }

    fn review_uncached(&self, run: &mut Run, id: NodeId, terminal: &mut dyn ReviewTerminal) -> bool {
        for dep in run.edges(id, true) {
            if !self.review_node(run, dep, terminal) {
                tracing::info!("{} fails review through {}", run.name(id), run.name(dep));
                return false;
            }
        }
        if run.shortcuts[id.0] != Shortcut::Build {
            return true;
        }

        let bundle_id = match &run.node(id).source_bundle {
            Some(bundle_id) => bundle_id.clone(),
            None => return false,
        };
        let bundle = match run.res.bundles.get_mut(&bundle_id) {
            Some(bundle) => bundle,
            None => return false,
        };
        bundle.fetch(self.index, &self.config.dirs.build);
        bundle.review(&self.reviews, terminal, self.options.force_review)
    }

    // ─── Build ─────────────────────────────────────────────────────

    /// Build `id` after its runtime dependencies. Memoized per node.
    fn build_node(&self, run: &mut Run, id: NodeId) -> BuildState {
        match run.states[id.0] {
            BuildState::Unbuilt => {}
            // a cycle would land here, resolution rejects those
            BuildState::Building => return BuildState::Failed,
            done => return done,
        }
        run.states[id.0] = BuildState::Building;
        let state = self.build_uncached(run, id);
        run.states[id.0] = state;
        state
    }

    fn build_uncached(&self, run: &mut Run, id: NodeId) -> BuildState {
        let name = run.name(id);
        let shortcut = run.shortcuts[id.0].clone();
        if shortcut == Shortcut::Satisfied {
            return BuildState::Satisfied;
        }

        for dep in run.node(id).dependencies.clone() {
            if !matches!(self.build_node(run, dep), BuildState::Built | BuildState::Satisfied) {
                ui::err(format!(
                    "dependency {} of {} failed, aborting this subtree",
                    run.name(dep),
                    name
                ));
                return BuildState::Failed;
            }
        }

        if let Shortcut::Cached(path) = shortcut {
            run.res.graph.node_mut(id).built_artifacts = vec![path];
            return BuildState::Built;
        }

        for dep in run.node(id).build_dependencies.clone() {
            if !matches!(run.states[dep.0], BuildState::Built | BuildState::Satisfied)
                && !matches!(run.shortcuts[dep.0], Shortcut::Satisfied)
            {
                ui::err(format!(
                    "build dependency {} of {} is not available, aborting this subtree",
                    run.name(dep),
                    name
                ));
                return BuildState::Failed;
            }
        }

        self.build_from_source(run, id)
    }

    fn build_from_source(&self, run: &mut Run, id: NodeId) -> BuildState {
        let node = run.node(id);
        let name = node.name.clone();
        let version = node.latest_version.clone().unwrap_or_default();
        let bundle_id = match &node.source_bundle {
            Some(bundle_id) => bundle_id.clone(),
            None => return BuildState::Failed,
        };
        let bundle = match run.res.bundles.get_mut(&bundle_id) {
            Some(bundle) => bundle,
            None => return BuildState::Failed,
        };

        bundle.fetch(self.index, &self.config.dirs.build);
        let outcome = bundle.build(self.tool, &self.config.makepkg_flags, &self.config.dirs.logs);
        if let BuildOutcome::Failed(failure) = outcome {
            ui::err(format!("building {} failed: {}, aborting this subtree", name, failure));
            if let Some(logs) = &bundle.logs {
                for line in logs.stderr_tail(STDERR_TAIL) {
                    ui::detail(line);
                }
                ui::detail(format!("full log: {}", logs.stderr.display()));
            }
            return BuildState::Failed;
        }

        let dir = match &bundle.source_dir {
            Some(dir) => dir.clone(),
            None => return BuildState::Failed,
        };
        let found = locate_artifacts(&dir, &name, &version, &self.config.arch, &self.config.pkgext);
        if found.is_empty() {
            let failure = bundle.fail_without_artifact(&name);
            ui::err(format!(
                "building {} failed: {} in {}, aborting this subtree",
                name,
                failure,
                dir.display()
            ));
            return BuildState::Failed;
        }

        let mut artifacts = Vec::with_capacity(found.len());
        for file in found {
            match self.cache.store(&file) {
                Ok(stored) => artifacts.push(stored),
                Err(e) => {
                    ui::err(format!("cannot move {} into the cache: {}", file.display(), e));
                    return BuildState::Failed;
                }
            }
        }
        run.res.graph.node_mut(id).built_artifacts = artifacts;
        BuildState::Built
    }

    /// Build and install source packages other packages need at build
    /// time. A build dependency that itself needs one at build time waits
    /// for a later round, so each round is one file transaction.
    fn install_build_dependencies(&self, run: &mut Run, needed: &BTreeSet<NodeId>) -> Result<()> {
        let mut remaining = self.source_build_dependencies(run, needed);
        while !remaining.is_empty() {
            let ready: Vec<NodeId> = remaining
                .iter()
                .copied()
                .filter(|target| {
                    run.closure(&[*target], true)
                        .iter()
                        .all(|id| id == target || !remaining.contains(id))
                })
                .collect();
            if ready.is_empty() {
                break;
            }
            for id in &ready {
                self.build_node(run, *id);
            }

            let early: Vec<NodeId> = run
                .closure(&ready, false)
                .into_iter()
                .filter(|id| run.states[id.0] == BuildState::Built && !run.installed_early.contains(id))
                .collect();
            let files = artifacts_of(run, &early);
            if !files.is_empty() {
                ui::msg("installing build dependencies...");
                self.db.install_from_files(&files, true)?;
            }
            run.installed_early.extend(early);
            remaining.retain(|id| !ready.contains(id));
        }
        Ok(())
    }

    /// Source packages that some node of this run needs at build time.
    fn source_build_dependencies(&self, run: &Run, needed: &BTreeSet<NodeId>) -> Vec<NodeId> {
        let mut targets = Vec::new();
        for id in needed {
            if run.shortcuts[id.0] != Shortcut::Build {
                continue;
            }
            for dep in &run.node(*id).build_dependencies {
                let node = run.node(*dep);
                if node.in_source_index
                    && run.shortcuts[dep.0] != Shortcut::Satisfied
                    && !targets.contains(dep)
                {
                    targets.push(*dep);
                }
            }
        }
        targets
    }

    // ─── Cleanup ───────────────────────────────────────────────────

    /// Remove build-only packages this run pulled in, then the sources.
    /// Failures only warn.
    fn clean_up(&self, run: &mut Run, build_only: &BTreeSet<NodeId>) {
        let pulled_in: Vec<String> = build_only
            .iter()
            .filter(|id| !run.node(**id).installed)
            .filter(|id| run.node(**id).in_repos || run.installed_early.contains(id))
            .map(|id| run.name(*id))
            .collect();
        if !pulled_in.is_empty() {
            ui::msg(format!("removing build dependencies: {}", pulled_in.join(", ")));
            if let Err(e) = self.db.remove(&pulled_in) {
                ui::warn(format!("could not remove build dependencies: {}", e));
            }
        }
        run.res.bundles.cleanup();
    }
}

fn artifacts_of(run: &Run, ids: &[NodeId]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    for id in ids {
        for file in &run.node(*id).built_artifacts {
            if !files.contains(file) {
                files.push(file.clone());
            }
        }
    }
    files
}

fn show_optional_dependencies(run: &Run, roots: &[NodeId]) {
    let lines: Vec<String> = run
        .closure(roots, false)
        .into_iter()
        .filter(|id| run.states[id.0] == BuildState::Built)
        .flat_map(|id| render_optional(&run.node(id).name, &run.node(id).optional_dependencies))
        .collect();
    if lines.is_empty() {
        return;
    }
    ui::msg("optional dependencies:");
    for line in lines {
        ui::detail(line);
    }
}
