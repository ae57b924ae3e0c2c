use clap::Parser;
use std::path::PathBuf;

use blinky::config::Overrides;
use blinky::{InstallOptions, RebuildPolicy};

mod cli;

/// Short flags combine the way pacman's do: `-Ss` is `-S -s`, `-Syu` is
/// `-S -y -u`.
#[derive(Parser)]
#[command(
    name = "blinky",
    version,
    about = "AUR helper with minimal hassle: resolve, review, build and install"
)]
struct Cli {
    /// Install package(s) from the AUR (the default)
    // only here so `-Ss`, `-Si` and `-Syu` parse; install is the fallback mode
    #[arg(short = 'S', long = "sync")]
    #[allow(dead_code)]
    sync: bool,
    /// Search the AUR
    #[arg(short = 's', long, conflicts_with_all = ["info", "sysupgrade"])]
    search: bool,
    /// Show detailed information on AUR packages
    #[arg(short = 'i', long, conflicts_with = "sysupgrade")]
    info: bool,
    /// Refresh the repository databases (implied by -u)
    #[arg(short = 'y', long)]
    refresh: bool,
    /// Upgrade the system, then all out-of-date AUR packages
    #[arg(short = 'u', long)]
    sysupgrade: bool,
    /// Install the requested packages as dependencies
    #[arg(long)]
    asdeps: bool,
    /// Rebuild the requested packages even if they are up to date
    #[arg(long)]
    force_rebuild: bool,
    /// Rebuild the requested packages and every AUR dependency
    #[arg(long, conflicts_with = "force_rebuild")]
    force_rebuild_tree: bool,
    /// Review build files even if they match the last approved version
    #[arg(long)]
    force_review: bool,
    /// Keep builds, logs, packages and reviews under DIR
    #[arg(long, value_name = "DIR")]
    local_dir: Option<PathBuf>,
    /// Parallel AUR queries during resolution
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,
    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Package names
    #[arg(value_name = "PKGNAME", required_unless_present = "sysupgrade")]
    pkgs: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        local_dir: cli.local_dir,
        jobs: cli.jobs,
    };
    let rebuild = if cli.force_rebuild_tree {
        RebuildPolicy::ForceTree
    } else if cli.force_rebuild {
        RebuildPolicy::ForcePackage
    } else {
        RebuildPolicy::Default
    };
    let options = InstallOptions {
        as_dependency: cli.asdeps,
        rebuild,
        force_review: cli.force_review,
    };

    if cli.search {
        cli::search::cmd_search(&cli.pkgs, &overrides);
    } else if cli.info {
        cli::info::cmd_info(&cli.pkgs, &overrides);
    } else if cli.sysupgrade {
        cli::upgrade::cmd_upgrade(options, &overrides);
    } else {
        if cli.refresh {
            tracing::warn!("-y without -u refreshes nothing, ignoring it");
        }
        cli::install::cmd_install(&cli.pkgs, options, &overrides);
    }
}
