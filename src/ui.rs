//! User-facing status lines.
//!
//! ` :: ` prefixes progress, ` !> ` prefixes problems. Everything that is
//! only interesting while debugging goes through `tracing` instead.

use console::style;

/// Bold progress line on stdout.
pub fn msg(text: impl std::fmt::Display) {
    println!("{}", style(format!(" :: {}", text)).bold());
}

/// Plain, indented detail line on stdout.
pub fn detail(text: impl std::fmt::Display) {
    println!("    {}", text);
}

/// Red problem line on stderr.
pub fn err(text: impl std::fmt::Display) {
    eprintln!("{}", style(format!(" !> {}", text)).red());
}

/// Yellow warning line on stderr.
pub fn warn(text: impl std::fmt::Display) {
    eprintln!("{}", style(format!(" !> {}", text)).yellow());
}

/// Report a fatal problem and terminate with `code`.
pub fn fatal(code: i32, text: impl std::fmt::Display) -> ! {
    err(text);
    eprintln!("{}", style(" --> Fatal, exiting").red().bold());
    std::process::exit(code);
}
