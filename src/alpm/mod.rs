//! The binary package manager, seen as an authority.
//!
//! Answers "is this installed / available in a sync repository" and runs
//! install and remove transactions. Queries are read-only and safe to issue
//! from many resolver threads at once; mutations are issued sequentially and
//! invalidate the read side, so implementations refresh after each one.

pub mod db;
pub mod pacman;
pub mod version;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Result;

pub use pacman::Pacman;
pub use version::vercmp;

/// An installed package that satisfies a dependency name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalPackage {
    pub name: String,
    pub version: String,
}

/// A repository package that satisfies a dependency name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncPackage {
    pub name: String,
    pub repo: String,
}

pub trait PackageDatabase: Send + Sync {
    /// Installed package named `name`, or one that provides it.
    fn find_local_satisfier(&self, name: &str) -> Option<LocalPackage>;

    /// Repository package named `name`, or one that provides it. Repositories
    /// are searched in configuration order.
    fn find_sync_satisfier(&self, name: &str) -> Option<SyncPackage>;

    fn install_from_repos(&self, names: &[String], as_dependency: bool) -> Result<()>;

    fn install_from_files(&self, paths: &[PathBuf], as_dependency: bool) -> Result<()>;

    /// Remove packages together with their now-unneeded dependencies.
    fn remove(&self, names: &[String]) -> Result<()>;

    /// Installed packages owned by no repository, name → version.
    fn list_foreign(&self) -> BTreeMap<String, String>;

    /// Reload the read side after a mutation.
    fn refresh(&self) -> Result<()>;
}
