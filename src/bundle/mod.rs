//! Source bundles: one per package base.
//!
//! A package base may produce several packages (split packages), so the
//! download, review and build of the shared sources happen once per bundle
//! no matter how many graph nodes point at it.
//!
//! Lifecycle flags are monotonic within one run:
//! - `downloaded` guards [`SourceBundle::fetch`]
//! - `review` memoizes [`SourceBundle::review`]
//! - `built` / `build_succeeded` memoize [`SourceBundle::build`]

pub mod artifacts;
pub mod build;
pub mod review;

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::aur::SourceIndex;

pub use artifacts::{locate_artifacts, ArtifactCache};
pub use build::{BuildFailure, BuildOutcome, BuildTool, Makepkg};
pub use review::{ConsoleTerminal, ReviewStore, ReviewTerminal};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewState {
    Unreviewed,
    Passed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildLogs {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

#[derive(Clone, Debug)]
pub struct SourceBundle {
    /// Package base.
    pub id: String,
    pub version: String,
    /// Snapshot path relative to the index URL.
    pub fetch_location: String,
    pub downloaded: bool,
    pub built: bool,
    pub build_succeeded: bool,
    pub review: ReviewState,
    pub source_dir: Option<PathBuf>,
    pub logs: Option<BuildLogs>,
    pub last_failure: Option<BuildFailure>,
}

impl SourceBundle {
    pub fn new(id: &str, version: &str, fetch_location: &str) -> Self {
        SourceBundle {
            id: id.to_string(),
            version: version.to_string(),
            fetch_location: fetch_location.to_string(),
            downloaded: false,
            built: false,
            build_succeeded: false,
            review: ReviewState::Unreviewed,
            source_dir: None,
            logs: None,
            last_failure: None,
        }
    }

    /// Download and extract into `build_dir/<id>`, at most once per run.
    ///
    /// Failures are logged, not returned: a bundle without a source
    /// directory fails review and build later with a clear message.
    pub fn fetch(&mut self, index: &dyn SourceIndex, build_dir: &Path) {
        if self.downloaded {
            return;
        }
        self.downloaded = true;

        let bytes = match index.download(&self.fetch_location) {
            Ok(bytes) => bytes,
            Err(e) => {
                crate::ui::err(format!("cannot download sources of {}: {}", self.id, e));
                return;
            }
        };

        let target = build_dir.join(&self.id);
        if target.exists() {
            if let Err(e) = remove_tree(&target) {
                tracing::warn!("cannot clear stale '{}': {}", target.display(), e);
            }
        }

        if let Err(e) = extract(&bytes, build_dir) {
            crate::ui::err(format!("extracting sources of {} failed: {}", self.id, e));
        }

        if target.is_dir() {
            self.source_dir = Some(target);
        } else {
            tracing::warn!("no directory '{}' after extraction", target.display());
        }
    }

    /// Remove the extracted sources. Best effort.
    pub fn cleanup(&mut self) {
        if let Some(dir) = self.source_dir.take() {
            if let Err(e) = remove_tree(&dir) {
                crate::ui::err(format!("cannot remove {}: {}", dir.display(), e));
            }
        }
    }
}

/// Unpack a gzip'd tarball below `dest`.
pub fn extract(bytes: &[u8], dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
    archive.unpack(dest)
}

/// `remove_dir_all` that first makes read-only entries writable, since
/// build tools like to leave those behind.
pub fn remove_tree(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            make_writable(path)?;
            std::fs::remove_dir_all(path)
        }
        Err(e) => Err(e),
    }
}

fn make_writable(path: &Path) -> std::io::Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    let mut perms = meta.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    std::fs::set_permissions(path, perms)?;
    if meta.is_dir() {
        for entry in std::fs::read_dir(path)? {
            make_writable(&entry?.path())?;
        }
    }
    Ok(())
}

// ─── Bundle Store ──────────────────────────────────────────────────

/// All bundles of one run, keyed by package base.
#[derive(Debug, Default)]
pub struct BundleStore {
    bundles: BTreeMap<String, SourceBundle>,
}

impl BundleStore {
    /// Idempotent: the first bundle of a package base wins.
    pub fn insert(&mut self, bundle: SourceBundle) {
        self.bundles.entry(bundle.id.clone()).or_insert(bundle);
    }

    pub fn get(&self, id: &str) -> Option<&SourceBundle> {
        self.bundles.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SourceBundle> {
        self.bundles.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceBundle> {
        self.bundles.values()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Remove every extracted source directory.
    pub fn cleanup(&mut self) {
        for bundle in self.bundles.values_mut() {
            bundle.cleanup();
        }
    }
}
