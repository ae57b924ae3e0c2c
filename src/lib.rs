pub mod alpm;
pub mod aur;
pub mod bundle;
pub mod config;
pub mod display;
pub mod error;
pub mod graph;
pub mod hash;
pub mod orchestrator;
pub mod ui;

#[cfg(test)]
mod fakes;

// Re-exports, so the binary and integration tests can say `blinky::X`
pub use alpm::{PackageDatabase, Pacman};
pub use aur::{AurClient, PackageInfo, SearchResult, SourceIndex};
pub use config::Config;
pub use error::{Error, IndexError, Result};
pub use graph::{GraphBuilder, RebuildPolicy, Resolution};
pub use orchestrator::{InstallOptions, InstallReport, Orchestrator};

/// Process exit code for a fatal error.
///
/// Index outages get their own codes so wrappers can retry: 5 for rate
/// limiting, 6 for an unavailable API. Everything else exits with 1.
pub fn exit_code(err: &Error) -> i32 {
    let index = match err {
        Error::Index(e) => Some(e),
        Error::UnsatisfiableDependency { cause, .. } => cause.as_ref(),
        _ => None,
    };
    match index {
        Some(IndexError::RateLimited) => 5,
        Some(IndexError::Unavailable) => 6,
        _ => 1,
    }
}
