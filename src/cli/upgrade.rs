use blinky::config::Overrides;
use blinky::orchestrator::find_upgrades;
use blinky::{ui, InstallOptions};

use super::install::install;
use super::{fail, load_config, open_database, open_index};

pub fn cmd_upgrade(options: InstallOptions, overrides: &Overrides) {
    let config = load_config(overrides);
    let db = open_database(&config);
    let index = open_index(&config);

    ui::msg("upgrading repository packages...");
    db.system_upgrade().unwrap_or_else(|e| fail(e));

    ui::msg("checking AUR packages for updates...");
    let plan = find_upgrades(&db, &index).unwrap_or_else(|e| fail(e));
    for name in &plan.unknown {
        ui::warn(format!("{} is not in the AUR, skipping it", name));
    }
    if plan.outdated.is_empty() {
        ui::msg("all AUR packages are up to date");
        return;
    }
    for (name, installed, latest) in &plan.outdated {
        ui::detail(format!("{} {} -> {}", name, installed, latest));
    }

    // upgrades keep whatever install reason the package had
    let options = InstallOptions {
        as_dependency: false,
        ..options
    };
    let report = install(&db, &index, &config, &plan.names(), options);
    if !report.all_succeeded() {
        ui::warn("some packages were not upgraded, see above");
    }
}
