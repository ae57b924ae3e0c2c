use blinky::bundle::{ConsoleTerminal, Makepkg};
use blinky::config::{Config, Overrides};
use blinky::{ui, InstallOptions, InstallReport, Orchestrator, PackageDatabase, SourceIndex};

use super::{fail, load_config, open_database, open_index};

pub fn cmd_install(packages: &[String], options: InstallOptions, overrides: &Overrides) {
    let config = load_config(overrides);
    let db = open_database(&config);
    let index = open_index(&config);
    let report = install(&db, &index, &config, packages, options);
    print_report(&report);
}

/// Shared by `-S` and `-Syu`.
pub fn install(
    db: &dyn PackageDatabase,
    index: &dyn SourceIndex,
    config: &Config,
    packages: &[String],
    options: InstallOptions,
) -> InstallReport {
    let mut terminal = ConsoleTerminal::new(&config.editor, &config.diff_tool);
    Orchestrator::new(db, index, &Makepkg, config, options)
        .install(packages, &mut terminal)
        .unwrap_or_else(|e| fail(e))
}

fn print_report(report: &InstallReport) {
    if !report.installed.is_empty() {
        ui::msg(format!("installed: {}", report.installed.join(", ")));
    }
    if !report.review_failed.is_empty() {
        ui::warn(format!(
            "not installed, review failed: {}",
            report.review_failed.join(", ")
        ));
    }
    if !report.build_failed.is_empty() {
        ui::warn(format!(
            "not installed, build failed: {}",
            report.build_failed.join(", ")
        ));
    }
}
