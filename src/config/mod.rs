//! Runtime configuration.
//!
//! Layering, lowest to highest priority:
//! 1. built-in defaults
//! 2. `$XDG_CONFIG_HOME/blinky/config.toml` (or `$BLINKY_CONFIG`)
//! 3. environment (`BLINKY_CACHE_DIR`, `BLINKY_DATA_DIR`, `BLINKY_AUR_URL`,
//!    `VISUAL`/`EDITOR`, `DIFFPROG`, `PKGEXT`, `CARCH`)
//! 4. command line overrides (`--local-dir`, `--jobs`)
//!
//! Directory layout:
//! ```text
//! <cache>/            ($BLINKY_CACHE_DIR, else $XDG_CACHE_HOME/blinky)
//! ├── build/          extracted source bundles
//! ├── logs/           <base>-<version>.{stdout,stderr}.log
//! └── pkg/            built artifacts, reused across runs
//! <data>/             ($BLINKY_DATA_DIR, else $XDG_DATA_HOME/blinky)
//! └── reviewed/       last approved build files per bundle
//! ```

pub mod makepkg;

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_AUR_URL: &str = "https://aur.archlinux.org";

/// Concurrency ceiling for metadata resolution.
pub const DEFAULT_JOBS: usize = 10;

// ─── Directories ───────────────────────────────────────────────────

/// Working directories of one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dirs {
    pub build: PathBuf,
    pub logs: PathBuf,
    pub pkg: PathBuf,
    pub reviewed: PathBuf,
}

impl Dirs {
    /// Everything under a single root, used by `--local-dir` and tests.
    pub fn under(root: &Path) -> Self {
        Self::split(root, root)
    }

    fn split(cache: &Path, data: &Path) -> Self {
        Dirs {
            build: cache.join("build"),
            logs: cache.join("logs"),
            pkg: cache.join("pkg"),
            reviewed: data.join("reviewed"),
        }
    }

    pub fn create_all(&self) -> std::io::Result<()> {
        for dir in [&self.build, &self.logs, &self.pkg, &self.reviewed] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

// ─── Config ────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Config {
    pub dirs: Dirs,
    pub aur_url: String,
    pub jobs: usize,
    pub editor: String,
    pub diff_tool: String,
    pub makepkg_flags: Vec<String>,
    /// Artifact suffix including the leading dot, e.g. `.pkg.tar.zst`.
    pub pkgext: String,
    pub arch: String,
    /// pacman database root (`/var/lib/pacman`).
    pub dbpath: PathBuf,
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub aur_url: Option<String>,
    pub jobs: Option<usize>,
    pub editor: Option<String>,
    pub diff_tool: Option<String>,
    pub makepkg_flags: Option<Vec<String>>,
    pub dbpath: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Command line overrides, applied last.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub local_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
}

impl Config {
    /// Load from the real environment and config file.
    pub fn load(overrides: &Overrides) -> Result<Config> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let file = match config_path(&env) {
            Some(path) if path.is_file() => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("cannot read '{}': {}", path.display(), e))
                })?;
                FileConfig::parse(&text)?
            }
            _ => FileConfig::default(),
        };

        let makepkg = makepkg::MakepkgConf::load();
        Config::resolve(file, makepkg, &env, overrides)
    }

    /// Combine all layers. `env` is injected so tests do not touch the
    /// process environment.
    pub fn resolve(
        file: FileConfig,
        makepkg: makepkg::MakepkgConf,
        env: &dyn Fn(&str) -> Option<String>,
        overrides: &Overrides,
    ) -> Result<Config> {
        let dirs = match &overrides.local_dir {
            Some(root) => Dirs::under(root),
            None => {
                let cache = env("BLINKY_CACHE_DIR")
                    .map(PathBuf::from)
                    .or(file.cache_dir)
                    .or_else(|| xdg_dir(env, "XDG_CACHE_HOME", ".cache"))
                    .ok_or_else(|| Error::Config("cannot determine cache directory (no $HOME)".into()))?;
                let data = env("BLINKY_DATA_DIR")
                    .map(PathBuf::from)
                    .or(file.data_dir)
                    .or_else(|| xdg_dir(env, "XDG_DATA_HOME", ".local/share"))
                    .ok_or_else(|| Error::Config("cannot determine data directory (no $HOME)".into()))?;
                Dirs::split(&cache, &data)
            }
        };

        let jobs = overrides.jobs.or(file.jobs).unwrap_or(DEFAULT_JOBS);
        if jobs == 0 {
            return Err(Error::Config("jobs must be at least 1".into()));
        }

        let aur_url = env("BLINKY_AUR_URL")
            .or(file.aur_url)
            .unwrap_or_else(|| DEFAULT_AUR_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let editor = env("VISUAL")
            .or_else(|| env("EDITOR"))
            .or(file.editor)
            .unwrap_or_else(|| "nano".to_string());

        let diff_tool = env("DIFFPROG")
            .or(file.diff_tool)
            .unwrap_or_else(|| "diff -u".to_string());

        let pkgext = env("PKGEXT")
            .or(makepkg.pkgext)
            .unwrap_or_else(|| makepkg::DEFAULT_PKGEXT.to_string());

        let arch = env("CARCH")
            .or(makepkg.carch)
            .unwrap_or_else(|| std::env::consts::ARCH.to_string());

        Ok(Config {
            dirs,
            aur_url,
            jobs,
            editor,
            diff_tool,
            makepkg_flags: file
                .makepkg_flags
                .unwrap_or_else(|| vec!["-C".into(), "-d".into(), "-f".into()]),
            pkgext,
            arch,
            dbpath: file.dbpath.unwrap_or_else(|| PathBuf::from("/var/lib/pacman")),
        })
    }
}

fn config_path(env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(path) = env("BLINKY_CONFIG") {
        return Some(PathBuf::from(path));
    }
    xdg_dir(env, "XDG_CONFIG_HOME", ".config").map(|dir| dir.join("config.toml"))
}

/// `$<var>/blinky`, falling back to `$HOME/<fallback>/blinky`.
fn xdg_dir(env: &dyn Fn(&str) -> Option<String>, var: &str, fallback: &str) -> Option<PathBuf> {
    env(var)
        .map(PathBuf::from)
        .or_else(|| env("HOME").map(|home| PathBuf::from(home).join(fallback)))
        .map(|base| base.join("blinky"))
}
