//! Read-only view of the pacman databases.
//!
//! Layout under the database root (`/var/lib/pacman`):
//! ```text
//! local/
//!   <name>-<version>/desc     one directory per installed package
//! sync/
//!   <repo>.db                 gzip'd tar of <name>-<version>/desc entries
//! ```
//!
//! A [`Snapshot`] is loaded once and never mutated; after a transaction the
//! owner swaps in a fresh one.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::aur::depends::strip_version;

/// The fields of a `desc` entry the resolver cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbEntry {
    pub name: String,
    pub version: String,
    /// Bare names, version decoration stripped.
    pub provides: Vec<String>,
}

/// Packages of one database with a provides index.
#[derive(Clone, Debug, Default)]
pub struct PackageSet {
    packages: BTreeMap<String, DbEntry>,
    provides: HashMap<String, Vec<String>>,
}

impl PackageSet {
    pub fn insert(&mut self, entry: DbEntry) {
        for provided in &entry.provides {
            self.provides
                .entry(provided.clone())
                .or_default()
                .push(entry.name.clone());
        }
        self.packages.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&DbEntry> {
        self.packages.get(name)
    }

    /// Exact name first, then the first provider in name order.
    pub fn satisfier(&self, name: &str) -> Option<&DbEntry> {
        if let Some(entry) = self.packages.get(name) {
            return Some(entry);
        }
        self.provides
            .get(name)
            .and_then(|providers| providers.iter().min())
            .and_then(|provider| self.packages.get(provider))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DbEntry> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub local: PackageSet,
    /// Repositories in configuration order.
    pub sync: Vec<(String, PackageSet)>,
}

impl Snapshot {
    pub fn load(dbpath: &Path, repos: &[String]) -> std::io::Result<Snapshot> {
        let local = read_local(&dbpath.join("local"))?;
        let mut sync = Vec::new();
        for repo in repos {
            let path = dbpath.join("sync").join(format!("{}.db", repo));
            match std::fs::File::open(&path) {
                Ok(file) => match read_sync(file) {
                    Ok(set) => sync.push((repo.clone(), set)),
                    Err(e) => tracing::warn!("skipping sync db '{}': {}", path.display(), e),
                },
                Err(e) => tracing::warn!("cannot open sync db '{}': {}", path.display(), e),
            }
        }
        tracing::debug!(
            "loaded pacman db: {} local, {} repos",
            local.len(),
            sync.len()
        );
        Ok(Snapshot { local, sync })
    }

    pub fn sync_satisfier(&self, name: &str) -> Option<(&str, &DbEntry)> {
        self.sync
            .iter()
            .find_map(|(repo, set)| set.satisfier(name).map(|entry| (repo.as_str(), entry)))
    }

    /// Installed packages absent from every sync repository.
    pub fn foreign(&self) -> BTreeMap<String, String> {
        self.local
            .iter()
            .filter(|entry| self.sync.iter().all(|(_, set)| set.get(&entry.name).is_none()))
            .map(|entry| (entry.name.clone(), entry.version.clone()))
            .collect()
    }
}

// ─── Parsing ───────────────────────────────────────────────────────

/// Parse a `desc` file: `%SECTION%` headers followed by one value per line,
/// sections separated by blank lines.
pub fn parse_desc(text: &str) -> Option<DbEntry> {
    let mut name = None;
    let mut version = None;
    let mut provides = Vec::new();
    let mut section = "";

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            section = "";
            continue;
        }
        if line.len() > 2 && line.starts_with('%') && line.ends_with('%') {
            section = &line[1..line.len() - 1];
            continue;
        }
        match section {
            "NAME" => name = Some(line.to_string()),
            "VERSION" => version = Some(line.to_string()),
            "PROVIDES" => provides.push(strip_version(line).to_string()),
            _ => {}
        }
    }

    Some(DbEntry {
        name: name?,
        version: version?,
        provides,
    })
}

pub fn read_local(dir: &Path) -> std::io::Result<PackageSet> {
    let mut set = PackageSet::default();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(set),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let desc = entry.path().join("desc");
        let Ok(text) = std::fs::read_to_string(&desc) else {
            continue;
        };
        if let Some(parsed) = parse_desc(&text) {
            set.insert(parsed);
        }
    }
    Ok(set)
}

/// Read a gzip-compressed sync database archive.
pub fn read_sync(reader: impl Read) -> std::io::Result<PackageSet> {
    let mut set = PackageSet::default();
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let is_desc = entry
            .path()?
            .file_name()
            .is_some_and(|name| name == "desc");
        if !is_desc {
            continue;
        }
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        if let Some(parsed) = parse_desc(&text) {
            set.insert(parsed);
        }
    }
    Ok(set)
}

/// Repository names from `pacman.conf`, in declaration order.
pub fn repo_order(pacman_conf: &str) -> Vec<String> {
    pacman_conf
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('[') && line.ends_with(']'))
        .map(|line| line[1..line.len() - 1].trim().to_string())
        .filter(|section| section != "options")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    const DESC: &str = "%NAME%\nopenssl\n\n%VERSION%\n3.2.1-1\n\n%PROVIDES%\nlibssl.so=3-64\nlibcrypto.so=3-64\n\n%DEPENDS%\nglibc\n";

    fn entry(name: &str, version: &str, provides: &[&str]) -> DbEntry {
        DbEntry {
            name: name.to_string(),
            version: version.to_string(),
            provides: provides.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_desc() {
        let parsed = parse_desc(DESC).unwrap();
        assert_eq!(parsed.name, "openssl");
        assert_eq!(parsed.version, "3.2.1-1");
        assert_eq!(parsed.provides, vec!["libssl.so", "libcrypto.so"]);
    }

    #[test]
    fn test_parse_desc_requires_name_and_version() {
        assert!(parse_desc("%NAME%\nfoo\n").is_none());
    }

    #[test]
    fn test_satisfier_prefers_exact_name() {
        let mut set = PackageSet::default();
        set.insert(entry("java-runtime", "1", &[]));
        set.insert(entry("jre-openjdk", "21", &["java-runtime"]));
        assert_eq!(set.satisfier("java-runtime").unwrap().name, "java-runtime");

        let mut set = PackageSet::default();
        set.insert(entry("jre-openjdk", "21", &["java-runtime"]));
        assert_eq!(set.satisfier("java-runtime").unwrap().name, "jre-openjdk");
        assert!(set.satisfier("python").is_none());
    }

    #[test]
    fn test_read_local_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg_dir = tmp.path().join("openssl-3.2.1-1");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(pkg_dir.join("desc"), DESC).unwrap();
        std::fs::write(tmp.path().join("ALPM_DB_VERSION"), "9\n").unwrap();

        let set = read_local(tmp.path()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.satisfier("libssl.so").unwrap().name, "openssl");
    }

    #[test]
    fn test_read_sync_archive() {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(DESC.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "openssl-3.2.1-1/desc", DESC.as_bytes())
            .unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let set = read_sync(bytes.as_slice()).unwrap();
        assert_eq!(set.get("openssl").unwrap().version, "3.2.1-1");
    }

    #[test]
    fn test_foreign_packages() {
        let mut local = PackageSet::default();
        local.insert(entry("glibc", "2.39-1", &[]));
        local.insert(entry("yay", "12.0-1", &[]));
        let mut core = PackageSet::default();
        core.insert(entry("glibc", "2.39-1", &[]));
        let snapshot = Snapshot {
            local,
            sync: vec![("core".to_string(), core)],
        };
        let foreign = snapshot.foreign();
        assert_eq!(foreign.len(), 1);
        assert_eq!(foreign.get("yay").map(String::as_str), Some("12.0-1"));
    }

    #[test]
    fn test_repo_order() {
        let conf = "[options]\nHoldPkg = pacman\n\n[core]\nInclude = /etc/pacman.d/mirrorlist\n[extra]\n#[testing]\n";
        assert_eq!(repo_order(conf), vec!["core", "extra"]);
    }
}
