use blinky::config::Overrides;
use blinky::display::render_info;
use blinky::{ui, Error, SourceIndex};

use super::{fail, load_config, open_index};

pub fn cmd_info(packages: &[String], overrides: &Overrides) {
    let config = load_config(overrides);
    let index = open_index(&config);
    let infos = index
        .info(packages)
        .unwrap_or_else(|e| fail(Error::Index(e)));

    let mut blocks = Vec::new();
    for name in packages {
        match infos.iter().find(|info| &info.name == name) {
            Some(info) => blocks.push(render_info(info, &config.aur_url)),
            None => ui::err(format!("package '{}' was not found in the AUR", name)),
        }
    }
    if !blocks.is_empty() {
        println!("{}\n", blocks.join("\n\n"));
    }
}
