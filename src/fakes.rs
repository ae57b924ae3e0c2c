//! In-memory authorities for unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::alpm::{LocalPackage, PackageDatabase, SyncPackage};
use crate::aur::{PackageInfo, SearchResult, SourceIndex};
use crate::error::{Error, IndexError, Result};

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ─── Package Database ──────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Entry {
    name: String,
    version: String,
    provides: Vec<String>,
}

impl Entry {
    fn answers(&self, name: &str) -> bool {
        self.name == name || self.provides.iter().any(|p| p == name)
    }
}

/// Every mutation is recorded as one line, e.g. `files --asdeps a.pkg`.
#[derive(Default)]
pub struct FakeDb {
    local: Mutex<Vec<Entry>>,
    sync: Vec<Entry>,
    failing: BTreeSet<&'static str>,
    pub transactions: Mutex<Vec<String>>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installed(self, name: &str, version: &str) -> Self {
        self.installed_providing(name, version, &[])
    }

    pub fn installed_providing(self, name: &str, version: &str, provides: &[&str]) -> Self {
        self.local
            .lock()
            .unwrap()
            .push(entry(name, version, provides));
        self
    }

    pub fn in_repo(self, name: &str) -> Self {
        self.in_repo_providing(name, &[])
    }

    pub fn in_repo_providing(mut self, name: &str, provides: &[&str]) -> Self {
        self.sync.push(entry(name, "1-1", provides));
        self
    }

    /// Make every `verb` transaction (`repos`, `files`, `remove`) fail.
    pub fn failing_on(mut self, verb: &'static str) -> Self {
        self.failing.insert(verb);
        self
    }

    pub fn transactions(&self) -> Vec<String> {
        self.transactions.lock().unwrap().clone()
    }

    fn record(&self, verb: &'static str, as_dependency: bool, items: Vec<String>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        if self.failing.contains(verb) {
            return Err(Error::InstallTransactionFailed {
                operation: verb,
                packages: items,
            });
        }
        let flag = if as_dependency { " --asdeps" } else { "" };
        self.transactions
            .lock()
            .unwrap()
            .push(format!("{}{} {}", verb, flag, items.join(" ")));
        Ok(())
    }
}

fn entry(name: &str, version: &str, provides: &[&str]) -> Entry {
    Entry {
        name: name.to_string(),
        version: version.to_string(),
        provides: strings(provides),
    }
}

impl PackageDatabase for FakeDb {
    fn find_local_satisfier(&self, name: &str) -> Option<LocalPackage> {
        let local = self.local.lock().unwrap();
        local
            .iter()
            .find(|e| e.name == name)
            .or_else(|| local.iter().find(|e| e.answers(name)))
            .map(|e| LocalPackage {
                name: e.name.clone(),
                version: e.version.clone(),
            })
    }

    fn find_sync_satisfier(&self, name: &str) -> Option<SyncPackage> {
        self.sync
            .iter()
            .find(|e| e.name == name)
            .or_else(|| self.sync.iter().find(|e| e.answers(name)))
            .map(|e| SyncPackage {
                name: e.name.clone(),
                repo: "extra".to_string(),
            })
    }

    fn install_from_repos(&self, names: &[String], as_dependency: bool) -> Result<()> {
        self.record("repos", as_dependency, names.to_vec())?;
        let mut local = self.local.lock().unwrap();
        for name in names {
            if !local.iter().any(|e| &e.name == name) {
                local.push(entry(name, "1-1", &[]));
            }
        }
        Ok(())
    }

    fn install_from_files(&self, paths: &[PathBuf], as_dependency: bool) -> Result<()> {
        let names = paths
            .iter()
            .map(|p| file_name(p))
            .collect();
        self.record("files", as_dependency, names)
    }

    fn remove(&self, names: &[String]) -> Result<()> {
        self.record("remove", false, names.to_vec())
    }

    fn list_foreign(&self) -> BTreeMap<String, String> {
        self.local
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !self.sync.iter().any(|s| s.name == e.name))
            .map(|e| (e.name.clone(), e.version.clone()))
            .collect()
    }

    fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ─── Source Index ──────────────────────────────────────────────────

pub fn aur(name: &str, version: &str, depends: &[&str], make_depends: &[&str]) -> PackageInfo {
    PackageInfo {
        name: name.to_string(),
        version: version.to_string(),
        package_base: name.to_string(),
        description: Some(format!("{} from the index", name)),
        url_path: format!("/cgit/aur.git/snapshot/{}.tar.gz", name),
        depends: strings(depends),
        make_depends: strings(make_depends),
        ..PackageInfo::default()
    }
}

/// Gzip'd tarball with the given `(path, content)` entries.
pub fn snapshot(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Holds callers of one name until `expected` of them arrived, or until a
/// timeout passes, so two resolver threads miss the store together.
struct Rendezvous {
    name: String,
    expected: usize,
    arrived: Mutex<usize>,
    all_here: Condvar,
}

#[derive(Default)]
pub struct FakeIndex {
    packages: BTreeMap<String, PackageInfo>,
    failing: BTreeMap<String, IndexError>,
    duplicated: BTreeSet<String>,
    rendezvous: Option<Rendezvous>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeIndex {
    pub fn new(packages: Vec<PackageInfo>) -> Self {
        FakeIndex {
            packages: packages.into_iter().map(|p| (p.name.clone(), p)).collect(),
            ..FakeIndex::default()
        }
    }

    pub fn failing_on(mut self, name: &str, error: IndexError) -> Self {
        self.failing.insert(name.to_string(), error);
        self
    }

    /// Answer `info` for `name` with two identical exact matches.
    pub fn duplicating(mut self, name: &str) -> Self {
        self.duplicated.insert(name.to_string());
        self
    }

    pub fn rendezvous_on(mut self, name: &str, expected: usize) -> Self {
        self.rendezvous = Some(Rendezvous {
            name: name.to_string(),
            expected,
            arrived: Mutex::new(0),
            all_here: Condvar::new(),
        });
        self
    }

    pub fn query_count(&self, name: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.as_str() == name)
            .count()
    }

    fn wait_at_rendezvous(&self, name: &str) {
        let rendezvous = match &self.rendezvous {
            Some(r) if r.name == name => r,
            _ => return,
        };
        let mut arrived = rendezvous.arrived.lock().unwrap();
        *arrived += 1;
        rendezvous.all_here.notify_all();
        let deadline = Duration::from_secs(2);
        let (_guard, _timeout) = rendezvous
            .all_here
            .wait_timeout_while(arrived, deadline, |n| *n < rendezvous.expected)
            .unwrap();
    }
}

impl SourceIndex for FakeIndex {
    fn info(&self, names: &[String]) -> std::result::Result<Vec<PackageInfo>, IndexError> {
        let mut out = Vec::new();
        for name in names {
            self.queries.lock().unwrap().push(name.clone());
            if let Some(error) = self.failing.get(name) {
                return Err(error.clone());
            }
            self.wait_at_rendezvous(name);
            out.extend(self.packages.get(name).cloned());
            if self.duplicated.contains(name) {
                out.extend(self.packages.get(name).cloned());
            }
        }
        Ok(out)
    }

    fn search(&self, query: &str) -> std::result::Result<Vec<SearchResult>, IndexError> {
        Ok(self
            .packages
            .values()
            .filter(|p| p.name.contains(query))
            .map(|p| SearchResult {
                name: p.name.clone(),
                version: p.version.clone(),
                description: p.description.clone(),
                out_of_date: p.out_of_date,
            })
            .collect())
    }

    fn download(&self, fetch_location: &str) -> std::result::Result<Vec<u8>, IndexError> {
        let info = self
            .packages
            .values()
            .find(|p| p.url_path == fetch_location)
            .ok_or(IndexError::Status(404))?;
        let pkgbuild = format!(
            "pkgbase={}\npkgname={}\npkgver={}\n",
            info.package_base, info.name, info.version
        );
        let path = format!("{}/PKGBUILD", info.package_base);
        Ok(snapshot(&[(path.as_str(), pkgbuild.as_str())]))
    }
}

/// Index that always fails, for error mapping tests.
pub struct DownIndex(pub IndexError);

impl SourceIndex for DownIndex {
    fn info(&self, _names: &[String]) -> std::result::Result<Vec<PackageInfo>, IndexError> {
        Err(self.0.clone())
    }

    fn search(&self, _query: &str) -> std::result::Result<Vec<SearchResult>, IndexError> {
        Err(self.0.clone())
    }

    fn download(&self, _fetch_location: &str) -> std::result::Result<Vec<u8>, IndexError> {
        Err(self.0.clone())
    }
}

pub fn unwrap_unsatisfiable(err: Error) -> (String, Vec<String>) {
    match err {
        Error::UnsatisfiableDependency { name, chain, .. } => (name, chain),
        other => panic!("expected an unsatisfiable dependency, got {other:?}"),
    }
}
