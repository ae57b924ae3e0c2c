pub mod info;
pub mod install;
pub mod search;
pub mod upgrade;

use std::error::Error as _;

use blinky::config::{Config, Overrides};
use blinky::{ui, AurClient, Error, Pacman};

/// Print `err` with its causes and exit with the matching code.
pub fn fail(err: Error) -> ! {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let line = cause.to_string();
        if !text.ends_with(&line) {
            text.push_str(&format!(": {}", line));
        }
        source = cause.source();
    }
    ui::fatal(blinky::exit_code(&err), text)
}

pub fn load_config(overrides: &Overrides) -> Config {
    Config::load(overrides).unwrap_or_else(|e| fail(e))
}

pub fn open_database(config: &Config) -> Pacman {
    Pacman::open(&config.dbpath).unwrap_or_else(|e| fail(e))
}

pub fn open_index(config: &Config) -> AurClient {
    AurClient::new(&config.aur_url).unwrap_or_else(|e| fail(Error::Index(e)))
}
