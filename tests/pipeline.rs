//! End-to-end runs of the install pipeline against in-memory authorities,
//! using only the public API.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use blinky::alpm::{LocalPackage, SyncPackage};
use blinky::bundle::{BuildTool, ReviewTerminal};
use blinky::config::makepkg::MakepkgConf;
use blinky::config::{FileConfig, Overrides};
use blinky::error::IndexError;
use blinky::{
    Config, Error, GraphBuilder, InstallOptions, Orchestrator, PackageDatabase, PackageInfo,
    SearchResult, SourceIndex,
};
use flate2::write::GzEncoder;
use flate2::Compression;

// ─── Authorities ───────────────────────────────────────────────────

#[derive(Default)]
struct Db {
    installed: Mutex<BTreeMap<String, String>>,
    repo: BTreeSet<String>,
    log: Mutex<Vec<String>>,
}

impl Db {
    fn with_repo(names: &[&str]) -> Self {
        Db {
            repo: names.iter().map(|s| s.to_string()).collect(),
            ..Db::default()
        }
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl PackageDatabase for Db {
    fn find_local_satisfier(&self, name: &str) -> Option<LocalPackage> {
        self.installed
            .lock()
            .unwrap()
            .get(name)
            .map(|version| LocalPackage {
                name: name.to_string(),
                version: version.clone(),
            })
    }

    fn find_sync_satisfier(&self, name: &str) -> Option<SyncPackage> {
        self.repo.get(name).map(|n| SyncPackage {
            name: n.clone(),
            repo: "core".to_string(),
        })
    }

    fn install_from_repos(&self, names: &[String], as_dependency: bool) -> blinky::Result<()> {
        let mut installed = self.installed.lock().unwrap();
        for name in names {
            installed.insert(name.clone(), "1-1".to_string());
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("-S{} {}", flag(as_dependency), names.join(" ")));
        Ok(())
    }

    fn install_from_files(&self, paths: &[PathBuf], as_dependency: bool) -> blinky::Result<()> {
        let files: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        self.log
            .lock()
            .unwrap()
            .push(format!("-U{} {}", flag(as_dependency), files.join(" ")));
        Ok(())
    }

    fn remove(&self, names: &[String]) -> blinky::Result<()> {
        let mut installed = self.installed.lock().unwrap();
        for name in names {
            installed.remove(name);
        }
        self.log.lock().unwrap().push(format!("-Rsn {}", names.join(" ")));
        Ok(())
    }

    fn list_foreign(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn refresh(&self) -> blinky::Result<()> {
        Ok(())
    }
}

fn flag(as_dependency: bool) -> &'static str {
    if as_dependency {
        " --asdeps"
    } else {
        ""
    }
}

struct Index {
    packages: Vec<PackageInfo>,
}

fn package(name: &str, version: &str, depends: &[&str], make_depends: &[&str]) -> PackageInfo {
    PackageInfo {
        name: name.to_string(),
        version: version.to_string(),
        package_base: name.to_string(),
        url_path: format!("/cgit/aur.git/snapshot/{}.tar.gz", name),
        depends: depends.iter().map(|s| s.to_string()).collect(),
        make_depends: make_depends.iter().map(|s| s.to_string()).collect(),
        ..PackageInfo::default()
    }
}

impl SourceIndex for Index {
    fn info(&self, names: &[String]) -> Result<Vec<PackageInfo>, IndexError> {
        Ok(self
            .packages
            .iter()
            .filter(|p| names.contains(&p.name))
            .cloned()
            .collect())
    }

    fn search(&self, _query: &str) -> Result<Vec<SearchResult>, IndexError> {
        Ok(Vec::new())
    }

    fn download(&self, fetch_location: &str) -> Result<Vec<u8>, IndexError> {
        let info = self
            .packages
            .iter()
            .find(|p| p.url_path == fetch_location)
            .ok_or(IndexError::Status(404))?;
        let pkgbuild = format!("pkgname={}\npkgver={}\n", info.name, info.version);

        let mut tar = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(pkgbuild.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(
            &mut header,
            format!("{}/PKGBUILD", info.package_base),
            pkgbuild.as_bytes(),
        )
        .unwrap();
        Ok(tar.into_inner().unwrap().finish().unwrap())
    }
}

// ─── Build tool and reviewer ───────────────────────────────────────

/// Builds `<pkgname>-<pkgver>-any.pkg.tar.zst` unless the name is broken.
struct Tool {
    broken: BTreeSet<String>,
}

impl Tool {
    fn working() -> Self {
        Tool {
            broken: BTreeSet::new(),
        }
    }

    fn breaking(name: &str) -> Self {
        Tool {
            broken: BTreeSet::from([name.to_string()]),
        }
    }
}

impl BuildTool for Tool {
    fn run(
        &self,
        dir: &Path,
        _flags: &[String],
        env: &[(String, String)],
        _stdout: File,
        mut stderr: File,
    ) -> io::Result<i32> {
        let pkgbuild = std::fs::read_to_string(dir.join("PKGBUILD"))?;
        let value = |key: &str| {
            pkgbuild
                .lines()
                .find_map(|l| l.strip_prefix(&format!("{}=", key)))
                .unwrap_or_default()
                .to_string()
        };
        let (name, version) = (value("pkgname"), value("pkgver"));
        if self.broken.contains(&name) {
            writeln!(stderr, "compilation terminated.")?;
            return Ok(1);
        }
        let pkgdest = env
            .iter()
            .find(|(k, _)| k == "PKGDEST")
            .map(|(_, v)| PathBuf::from(v))
            .unwrap();
        std::fs::write(pkgdest.join(format!("{}-{}-any.pkg.tar.zst", name, version)), b"pkg")?;
        Ok(0)
    }
}

/// Approves everything and counts how often an editor was opened.
#[derive(Default)]
struct Approver {
    edits: usize,
}

impl ReviewTerminal for Approver {
    fn edit(&mut self, _file: &Path) -> io::Result<()> {
        self.edits += 1;
        Ok(())
    }

    fn diff(&mut self, _previous: &Path, _current: &Path) -> io::Result<()> {
        Ok(())
    }

    fn read_key(&mut self, _prompt: &str) -> io::Result<char> {
        Ok('y')
    }
}

fn config(root: &Path) -> Config {
    let overrides = Overrides {
        local_dir: Some(root.to_path_buf()),
        jobs: Some(4),
    };
    Config::resolve(FileConfig::default(), MakepkgConf::default(), &|_| None, &overrides).unwrap()
}

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ─── Tests ─────────────────────────────────────────────────────────

#[test]
fn test_failed_build_then_retry_skips_review() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let db = Db::with_repo(&["glibc", "cmake"]);
    let index = Index {
        packages: vec![
            package("app", "2.0-1", &["libthing", "glibc"], &["cmake"]),
            package("libthing", "1.0-1", &["glibc>=2.38"], &[]),
        ],
    };

    let mut approver = Approver::default();
    let first = Orchestrator::new(&db, &index, &Tool::breaking("libthing"), &config, InstallOptions::default())
        .install(&names(&["app"]), &mut approver)
        .unwrap();
    assert_eq!(first.build_failed, vec!["app"]);
    assert!(first.installed.is_empty());
    assert_eq!(approver.edits, 2);
    assert!(db.log().iter().all(|line| !line.starts_with("-U")));

    let mut approver = Approver::default();
    let second = Orchestrator::new(&db, &index, &Tool::working(), &config, InstallOptions::default())
        .install(&names(&["app"]), &mut approver)
        .unwrap();
    assert!(second.all_succeeded());
    assert_eq!(second.installed, vec!["app"]);
    // build files did not change since they were approved
    assert_eq!(approver.edits, 0);

    let log = db.log();
    let deps = log
        .iter()
        .position(|l| l == "-U --asdeps libthing-1.0-1-any.pkg.tar.zst")
        .unwrap();
    let root = log
        .iter()
        .position(|l| l == "-U app-2.0-1-any.pkg.tar.zst")
        .unwrap();
    assert!(deps < root, "{:?}", log);
}

#[test]
fn test_resolution_reports_missing_dependency_chain() {
    let db = Db::with_repo(&["glibc"]);
    let index = Index {
        packages: vec![package("app", "1-1", &["ghost"], &[])],
    };
    let err = GraphBuilder::new(&db, &index, 2)
        .resolve(&names(&["app"]))
        .unwrap_err();
    match err {
        Error::UnsatisfiableDependency { name, chain, .. } => {
            assert_eq!(name, "ghost");
            assert_eq!(chain, vec!["app"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_requested_repo_package_needs_no_build() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let db = Db::with_repo(&["ripgrep"]);
    let index = Index { packages: vec![] };

    let mut approver = Approver::default();
    let report = Orchestrator::new(&db, &index, &Tool::working(), &config, InstallOptions::default())
        .install(&names(&["ripgrep"]), &mut approver)
        .unwrap();
    assert_eq!(report.installed, vec!["ripgrep"]);
    assert_eq!(approver.edits, 0);
    assert_eq!(db.log(), vec!["-S ripgrep"]);
}
