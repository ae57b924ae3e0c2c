//! Built package files: locating fresh build output and the reusable cache.

use std::io;
use std::path::{Path, PathBuf};

/// `{name}-{version}-{arch}{pkgext}`
pub fn artifact_file_name(name: &str, version: &str, arch: &str, pkgext: &str) -> String {
    format!("{}-{}-{}{}", name, version, arch, pkgext)
}

/// Find the package file(s) a build of `name` produced in `dir`.
///
/// Tries the host architecture, then `any`, then any file with the expected
/// `{name}-{version}-` prefix and `pkgext` suffix. Empty when nothing
/// matches.
pub fn locate_artifacts(
    dir: &Path,
    name: &str,
    version: &str,
    arch: &str,
    pkgext: &str,
) -> Vec<PathBuf> {
    for candidate_arch in [arch, "any"] {
        let path = dir.join(artifact_file_name(name, version, candidate_arch, pkgext));
        if path.is_file() {
            return vec![path];
        }
    }

    let prefix = format!("{}-{}-", name, version);
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| {
                    n.starts_with(&prefix)
                        && n.ends_with(pkgext)
                        && is_version_boundary(&n[prefix.len()..])
                })
        })
        .collect();
    found.sort();
    found
}

// ─── Artifact Cache ────────────────────────────────────────────────

/// Package files kept across runs, so an unchanged package is not rebuilt.
#[derive(Clone, Debug)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: &Path) -> Self {
        ArtifactCache {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached package files of exactly `name` at `version`. Signatures are
    /// ignored.
    pub fn cached(&self, name: &str, version: &str) -> Vec<PathBuf> {
        let prefix = format!("{}-{}-", name, version);
        let mut found: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| {
                        n.starts_with(&prefix)
                            && n.contains(".pkg.")
                            && !n.ends_with(".sig")
                            && is_version_boundary(&n[prefix.len()..])
                    })
            })
            .collect();
        found.sort();
        found
    }

    /// Move a freshly built file into the cache and return its new path.
    /// An existing cache entry of the same name is replaced.
    pub fn store(&self, artifact: &Path) -> io::Result<PathBuf> {
        let file_name = artifact
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "artifact has no file name"))?;
        std::fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(file_name);
        if target.exists() && !target.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("'{}' exists and is not a file", target.display()),
            ));
        }
        if std::fs::rename(artifact, &target).is_err() {
            // rename fails across filesystems
            std::fs::copy(artifact, &target)?;
            std::fs::remove_file(artifact)?;
        }
        Ok(target)
    }
}

/// The rest after `{name}-{version}-` must be a bare architecture followed
/// by the extension, so `foo-1-` does not claim `foo-1-2.0-1-x86_64`.
fn is_version_boundary(rest: &str) -> bool {
    match rest.find(".pkg.") {
        Some(idx) => !rest[..idx].contains('-'),
        None => false,
    }
}
