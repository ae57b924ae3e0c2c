//! Interactive review of build files with a persisted approval reference.
//!
//! Approved files are kept under `reviewed/<bundle>/<file>` together with a
//! `<file>.blake3` sidecar. When the current file hashes to the stored value
//! the review passes without asking.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use console::Term;

use super::{ReviewState, SourceBundle};
use crate::hash::ContentHash;

// ─── Review Store ──────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ReviewStore {
    root: PathBuf,
}

/// Last approved version of one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewedReference {
    pub path: PathBuf,
    pub hash: ContentHash,
}

impl ReviewStore {
    pub fn new(root: &Path) -> Self {
        ReviewStore {
            root: root.to_path_buf(),
        }
    }

    fn content_path(&self, bundle: &str, file: &str) -> PathBuf {
        self.root.join(bundle).join(file)
    }

    fn hash_path(&self, bundle: &str, file: &str) -> PathBuf {
        self.root.join(bundle).join(format!("{}.blake3", file))
    }

    /// The stored reference, if both content and a well-formed hash exist.
    pub fn reference(&self, bundle: &str, file: &str) -> Option<ReviewedReference> {
        let path = self.content_path(bundle, file);
        if !path.is_file() {
            return None;
        }
        let hex = std::fs::read_to_string(self.hash_path(bundle, file)).ok()?;
        let hash = ContentHash::from_hex(hex.trim())?;
        Some(ReviewedReference { path, hash })
    }

    /// Persist approved content. Content is written before the hash, so an
    /// interrupted write never leaves a hash without its file.
    pub fn record(&self, bundle: &str, file: &str, content: &[u8]) -> io::Result<()> {
        std::fs::create_dir_all(self.root.join(bundle))?;
        std::fs::write(self.content_path(bundle, file), content)?;
        std::fs::write(
            self.hash_path(bundle, file),
            ContentHash::of(content).to_hex(),
        )
    }
}

// ─── Terminal ──────────────────────────────────────────────────────

/// The interactive side of a review.
pub trait ReviewTerminal {
    fn edit(&mut self, file: &Path) -> io::Result<()>;

    fn diff(&mut self, previous: &Path, current: &Path) -> io::Result<()>;

    /// Show `prompt` and wait for a single key.
    fn read_key(&mut self, prompt: &str) -> io::Result<char>;
}

/// Spawns the configured editor and diff tool; keys come from the tty.
pub struct ConsoleTerminal {
    editor: String,
    diff_tool: String,
    term: Term,
}

impl ConsoleTerminal {
    pub fn new(editor: &str, diff_tool: &str) -> Self {
        ConsoleTerminal {
            editor: editor.to_string(),
            diff_tool: diff_tool.to_string(),
            term: Term::stdout(),
        }
    }
}

/// Build a configured command line (`"diff -u"`, `'"/opt/My Editor/ed" -w'`)
/// with extra path arguments. Quoting follows the shell.
fn tool_command(command_line: &str, paths: &[&Path]) -> io::Result<Command> {
    let words = shell_words::split(command_line)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let (program, args) = words
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
    let mut command = Command::new(program);
    command.args(args).args(paths);
    Ok(command)
}

fn spawn_tool(command_line: &str, paths: &[&Path]) -> io::Result<()> {
    let status = tool_command(command_line, paths)?.status()?;
    tracing::debug!("{} exited with {}", command_line, status);
    Ok(())
}

impl ReviewTerminal for ConsoleTerminal {
    fn edit(&mut self, file: &Path) -> io::Result<()> {
        spawn_tool(&self.editor, &[file])
    }

    fn diff(&mut self, previous: &Path, current: &Path) -> io::Result<()> {
        // diff(1) exits 1 on differences, which is the expected case
        spawn_tool(&self.diff_tool, &[previous, current])
    }

    fn read_key(&mut self, prompt: &str) -> io::Result<char> {
        self.term.write_str(prompt)?;
        let key = self.term.read_char()?;
        self.term.write_line("")?;
        Ok(key)
    }
}

// ─── State Machine ─────────────────────────────────────────────────

const PROMPT: &str = "    [y]es, [n]o, [e]dit, [d]iff, [s]kip? ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Editing,
    Diffing,
    NeedsDecision,
    Decided(bool),
}

fn decide(key: char) -> Option<Step> {
    match key.to_ascii_lowercase() {
        'y' => Some(Step::Decided(true)),
        'n' | 's' => Some(Step::Decided(false)),
        'e' => Some(Step::Editing),
        'd' => Some(Step::Diffing),
        _ => None,
    }
}

/// Review one file of a bundle. Returns the verdict.
pub fn review_file(
    bundle: &str,
    dir: &Path,
    file: &str,
    store: &ReviewStore,
    terminal: &mut dyn ReviewTerminal,
    force: bool,
) -> io::Result<bool> {
    let path = dir.join(file);
    let current = ContentHash::of_file(&path)?;
    let reference = store.reference(bundle, file);

    if !force {
        if let Some(reference) = &reference {
            if reference.hash == current {
                tracing::info!("{}/{} unchanged since last review ({})", bundle, file, current);
                return Ok(true);
            }
        }
    }

    crate::ui::msg(format!("reviewing {} of {}", file, bundle));
    let mut step = Step::Editing;
    let mut first_pass = true;
    let passed = loop {
        step = match step {
            Step::Editing => {
                terminal.edit(&path)?;
                let next = if first_pass && reference.is_some() {
                    Step::Diffing
                } else {
                    Step::NeedsDecision
                };
                first_pass = false;
                next
            }
            Step::Diffing => {
                match &reference {
                    Some(reference) => terminal.diff(&reference.path, &path)?,
                    None => crate::ui::detail(format!("no earlier review of {}", file)),
                }
                first_pass = false;
                Step::NeedsDecision
            }
            Step::NeedsDecision => {
                let key = terminal.read_key(PROMPT)?;
                decide(key).unwrap_or(Step::NeedsDecision)
            }
            Step::Decided(verdict) => break verdict,
        };
    };

    if passed {
        // the user may have edited the file, persist what gets built
        let content = std::fs::read(&path)?;
        store.record(bundle, file, &content)?;
    }
    Ok(passed)
}

/// `PKGBUILD` first, then every `*.install` file in name order.
pub fn reviewable_files(dir: &Path) -> io::Result<Vec<String>> {
    let mut installs: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".install"))
        .collect();
    installs.sort();

    let mut files = vec!["PKGBUILD".to_string()];
    files.extend(installs);
    Ok(files)
}

impl SourceBundle {
    /// Review every build file, at most once per run. The first rejected
    /// file decides the verdict.
    pub fn review(
        &mut self,
        store: &ReviewStore,
        terminal: &mut dyn ReviewTerminal,
        force: bool,
    ) -> bool {
        match self.review {
            ReviewState::Passed => return true,
            ReviewState::Failed => return false,
            ReviewState::Unreviewed => {}
        }

        let verdict = match self.run_review(store, terminal, force) {
            Ok(verdict) => verdict,
            Err(e) => {
                crate::ui::err(format!("review of {} failed: {}", self.id, e));
                false
            }
        };
        self.review = if verdict {
            ReviewState::Passed
        } else {
            ReviewState::Failed
        };
        verdict
    }

    fn run_review(
        &self,
        store: &ReviewStore,
        terminal: &mut dyn ReviewTerminal,
        force: bool,
    ) -> io::Result<bool> {
        let dir = match &self.source_dir {
            Some(dir) => dir,
            None => {
                crate::ui::err(format!("sources of {} are missing", self.id));
                return Ok(false);
            }
        };
        if !dir.join("PKGBUILD").is_file() {
            crate::ui::err(format!("{} has no PKGBUILD", self.id));
            return Ok(false);
        }
        for file in reviewable_files(dir)? {
            if !review_file(&self.id, dir, &file, store, terminal, force)? {
                crate::ui::warn(format!("{} of {} rejected", file, self.id));
                return Ok(false);
            }
        }
        Ok(true)
    }
}
