//! Error taxonomy.
//!
//! Only resolution-phase failures and failed install/remove transactions are
//! errors. A rejected review or a failed build is an ordinary outcome that
//! prunes a subtree, see [`crate::bundle::ReviewState`] and
//! [`crate::bundle::BuildOutcome`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Nothing installed, nothing in a repository and nothing in the source
    /// index answers to `name` (or the index query itself failed).
    #[error("unsatisfiable dependency '{name}' (required by {})", display_chain(.chain))]
    UnsatisfiableDependency {
        name: String,
        /// Requesting parents, top-level request first.
        chain: Vec<String>,
        #[source]
        cause: Option<IndexError>,
    },

    #[error("package name '{name}' is ambiguous ({count} exact matches), please consider a bug report")]
    AmbiguousResult { name: String, count: usize },

    #[error("dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("{operation} transaction failed for: {}", .packages.join(", "))]
    InstallTransactionFailed {
        operation: &'static str,
        packages: Vec<String>,
    },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("package database: {0}")]
    Database(String),

    #[error("configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the source-package index.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("rate limit of the AUR API hit")]
    RateLimited,

    #[error("AUR API currently not available")]
    Unavailable,

    #[error("AUR API answered with HTTP {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("malformed AUR response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IndexError::Parse(err.to_string())
        } else {
            IndexError::Http(err.to_string())
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

fn display_chain(chain: &[String]) -> String {
    if chain.is_empty() {
        "command line".to_string()
    } else {
        chain.join(" -> ")
    }
}
