//! The source-package index (AUR RPC interface, version 5).

pub mod client;
pub mod depends;

use serde::Deserialize;

use crate::error::{Error, IndexError};

pub use client::AurClient;

/// One `info` result.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub package_base: String,
    pub description: Option<String>,
    #[serde(rename = "URL")]
    pub url: Option<String>,
    /// Snapshot tarball path, relative to the index base URL.
    #[serde(rename = "URLPath")]
    pub url_path: String,
    pub depends: Vec<String>,
    pub make_depends: Vec<String>,
    pub check_depends: Vec<String>,
    pub opt_depends: Vec<String>,
    pub provides: Vec<String>,
    pub conflicts: Vec<String>,
    pub replaces: Vec<String>,
    pub groups: Vec<String>,
    pub license: Vec<String>,
    pub keywords: Vec<String>,
    pub maintainer: Option<String>,
    pub num_votes: u64,
    pub popularity: f64,
    pub first_submitted: i64,
    pub last_modified: i64,
    /// Unix timestamp of the out-of-date flag, if flagged.
    pub out_of_date: Option<i64>,
}

/// One `search` result.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct SearchResult {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub out_of_date: Option<i64>,
}

pub trait SourceIndex: Send + Sync {
    fn info(&self, names: &[String]) -> Result<Vec<PackageInfo>, IndexError>;

    fn search(&self, query: &str) -> Result<Vec<SearchResult>, IndexError>;

    /// Fetch the snapshot tarball at `fetch_location` (an `URLPath`).
    fn download(&self, fetch_location: &str) -> Result<Vec<u8>, IndexError>;

    /// Exact single-name lookup. More than one hit is a defect on the
    /// index side and reported as such.
    fn info_one(&self, name: &str) -> Result<Option<PackageInfo>, Error> {
        let mut results = self.info(&[name.to_string()])?;
        results.retain(|info| info.name == name);
        match results.len() {
            0 => Ok(None),
            1 => Ok(results.pop()),
            count => Err(Error::AmbiguousResult {
                name: name.to_string(),
                count,
            }),
        }
    }
}
