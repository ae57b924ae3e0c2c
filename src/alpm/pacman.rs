use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::RwLock;

use super::db::{repo_order, Snapshot};
use super::{LocalPackage, PackageDatabase, SyncPackage};
use crate::error::{Error, Result};

/// pacman: queries read the on-disk databases, transactions shell out to
/// `pacman` behind `sudo` (or `su -c` when sudo is missing).
pub struct Pacman {
    dbpath: PathBuf,
    repos: Vec<String>,
    snapshot: RwLock<Snapshot>,
}

impl Pacman {
    /// Open the databases under `dbpath`, with repositories in the order
    /// `/etc/pacman.conf` declares them.
    pub fn open(dbpath: &Path) -> Result<Self> {
        let repos = match std::fs::read_to_string("/etc/pacman.conf") {
            Ok(conf) => repo_order(&conf),
            Err(_) => sync_dir_repos(dbpath),
        };
        Self::open_with_repos(dbpath, repos)
    }

    pub fn open_with_repos(dbpath: &Path, repos: Vec<String>) -> Result<Self> {
        let snapshot = Snapshot::load(dbpath, &repos)
            .map_err(|e| Error::Database(format!("cannot read '{}': {}", dbpath.display(), e)))?;
        Ok(Pacman {
            dbpath: dbpath.to_path_buf(),
            repos,
            snapshot: RwLock::new(snapshot),
        })
    }

    /// `pacman -Syu`, run before the source packages are looked at.
    pub fn system_upgrade(&self) -> Result<()> {
        let cmd = vec!["pacman".to_string(), "-Syu".to_string()];
        tracing::info!("running: {}", cmd.join(" "));
        let status = privileged(&cmd).status();
        self.refresh()?;
        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(Error::InstallTransactionFailed {
                operation: "upgrade",
                packages: vec!["(system)".to_string()],
            }),
        }
    }

    fn with_snapshot<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    fn transaction(&self, operation: &'static str, args: Vec<String>, packages: Vec<String>) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let mut cmd = vec!["pacman".to_string()];
        cmd.extend(args);
        cmd.extend(packages.iter().cloned());

        tracing::info!("running: {}", cmd.join(" "));
        let status = privileged(&cmd).status();
        self.refresh()?;

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => {
                tracing::warn!("pacman exited with {}", status);
                Err(Error::InstallTransactionFailed {
                    operation,
                    packages,
                })
            }
            Err(e) => {
                tracing::warn!("cannot spawn pacman: {}", e);
                Err(Error::InstallTransactionFailed {
                    operation,
                    packages,
                })
            }
        }
    }
}

impl PackageDatabase for Pacman {
    fn find_local_satisfier(&self, name: &str) -> Option<LocalPackage> {
        self.with_snapshot(|snap| {
            snap.local.satisfier(name).map(|entry| LocalPackage {
                name: entry.name.clone(),
                version: entry.version.clone(),
            })
        })
    }

    fn find_sync_satisfier(&self, name: &str) -> Option<SyncPackage> {
        self.with_snapshot(|snap| {
            snap.sync_satisfier(name).map(|(repo, entry)| SyncPackage {
                name: entry.name.clone(),
                repo: repo.to_string(),
            })
        })
    }

    fn install_from_repos(&self, names: &[String], as_dependency: bool) -> Result<()> {
        let mut args = vec!["-S".to_string(), "--needed".to_string()];
        if as_dependency {
            args.push("--asdeps".to_string());
        }
        self.transaction("repository install", args, names.to_vec())
    }

    fn install_from_files(&self, paths: &[PathBuf], as_dependency: bool) -> Result<()> {
        let mut args = vec!["-U".to_string()];
        if as_dependency {
            args.push("--asdeps".to_string());
        }
        let files = paths.iter().map(|p| p.display().to_string()).collect();
        self.transaction("file install", args, files)
    }

    fn remove(&self, names: &[String]) -> Result<()> {
        self.transaction("remove", vec!["-Rsn".to_string()], names.to_vec())
    }

    fn list_foreign(&self) -> BTreeMap<String, String> {
        self.with_snapshot(Snapshot::foreign)
    }

    fn refresh(&self) -> Result<()> {
        let fresh = Snapshot::load(&self.dbpath, &self.repos)
            .map_err(|e| Error::Database(format!("cannot reload databases: {}", e)))?;
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = fresh;
        Ok(())
    }
}

/// Wrap a command line in `sudo`, or `su -c` when sudo is not installed.
fn privileged(cmd: &[String]) -> Command {
    if which::which("sudo").is_ok() {
        let mut command = Command::new("sudo");
        command.args(cmd);
        command
    } else {
        let mut command = Command::new("su");
        command.arg("-c").arg(shell_words::join(cmd));
        command
    }
}

/// Fallback repo list when pacman.conf is unreadable: every `*.db` in `sync/`.
fn sync_dir_repos(dbpath: &Path) -> Vec<String> {
    let mut repos: Vec<String> = std::fs::read_dir(dbpath.join("sync"))
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "db") {
                path.file_stem().and_then(|s| s.to_str()).map(String::from)
            } else {
                None
            }
        })
        .collect();
    repos.sort();
    repos
}
