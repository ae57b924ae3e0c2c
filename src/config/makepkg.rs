//! The two makepkg settings that decide artifact filenames.

use std::path::Path;

pub const DEFAULT_PKGEXT: &str = ".pkg.tar.zst";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MakepkgConf {
    pub pkgext: Option<String>,
    pub carch: Option<String>,
}

impl MakepkgConf {
    /// System config first, user config on top.
    pub fn load() -> Self {
        let mut conf = MakepkgConf::default();
        let mut sources = vec![Path::new("/etc/makepkg.conf").to_path_buf()];
        if let Some(home) = std::env::var_os("HOME") {
            sources.push(Path::new(&home).join(".makepkg.conf"));
        }
        for path in sources {
            if let Ok(text) = std::fs::read_to_string(&path) {
                conf.merge(MakepkgConf::parse(&text));
            }
        }
        conf
    }

    /// Pick `PKGEXT=` and `CARCH=` assignments out of a shell config.
    /// Later assignments win, like sourcing the file would.
    pub fn parse(text: &str) -> Self {
        let mut conf = MakepkgConf::default();
        for line in text.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value
                .split('#')
                .next()
                .unwrap_or("")
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string();
            if value.is_empty() || value.contains('$') {
                continue;
            }
            match key.trim() {
                "PKGEXT" => conf.pkgext = Some(value),
                "CARCH" => conf.carch = Some(value),
                _ => {}
            }
        }
        conf
    }

    fn merge(&mut self, other: MakepkgConf) {
        if other.pkgext.is_some() {
            self.pkgext = other.pkgext;
        }
        if other.carch.is_some() {
            self.carch = other.carch;
        }
    }
}
