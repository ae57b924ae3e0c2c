//! Running the build tool inside an extracted bundle.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use thiserror::Error;

use super::{BuildLogs, SourceBundle};

/// How one bundle build ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded,
    Failed(BuildFailure),
}

impl BuildOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, BuildOutcome::Succeeded)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BuildFailure {
    #[error("sources are missing")]
    MissingSources,

    #[error("build exited with code {0}")]
    ExitCode(i32),

    #[error("no package file named {0} was produced")]
    NoArtifact(String),

    #[error("cannot run the build: {0}")]
    Io(String),
}

/// Something that turns a source directory into package files.
pub trait BuildTool: Send + Sync {
    /// Run in `dir` and return the exit code. A signal-terminated process
    /// reports `-1`.
    fn run(
        &self,
        dir: &Path,
        flags: &[String],
        env: &[(String, String)],
        stdout: File,
        stderr: File,
    ) -> io::Result<i32>;
}

/// `makepkg` from pacman.
pub struct Makepkg;

impl BuildTool for Makepkg {
    fn run(
        &self,
        dir: &Path,
        flags: &[String],
        env: &[(String, String)],
        stdout: File,
        stderr: File,
    ) -> io::Result<i32> {
        let status = Command::new("makepkg")
            .args(flags)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(dir)
            .stdin(Stdio::inherit())
            .stdout(stdout)
            .stderr(stderr)
            .status()?;
        Ok(status.code().unwrap_or(-1))
    }
}

impl BuildLogs {
    pub fn in_dir(log_dir: &Path, id: &str, version: &str) -> Self {
        BuildLogs {
            stdout: log_dir.join(format!("{}-{}.stdout.log", id, version)),
            stderr: log_dir.join(format!("{}-{}.stderr.log", id, version)),
        }
    }

    /// Last `n` lines of the stderr log, empty when unreadable.
    pub fn stderr_tail(&self, n: usize) -> Vec<String> {
        let text = std::fs::read_to_string(&self.stderr).unwrap_or_default();
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].iter().map(|l| l.to_string()).collect()
    }
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    writeln!(file, "{}", line)
}

impl SourceBundle {
    /// Build the bundle, at most once per run. Later calls return the
    /// first outcome.
    pub fn build(&mut self, tool: &dyn BuildTool, flags: &[String], log_dir: &Path) -> BuildOutcome {
        if self.built {
            return match &self.last_failure {
                None if self.build_succeeded => BuildOutcome::Succeeded,
                Some(failure) => BuildOutcome::Failed(failure.clone()),
                None => BuildOutcome::Failed(BuildFailure::MissingSources),
            };
        }
        self.built = true;

        let outcome = self.run_build(tool, flags, log_dir);
        match &outcome {
            Ok(()) => {
                self.build_succeeded = true;
                BuildOutcome::Succeeded
            }
            Err(failure) => {
                self.last_failure = Some(failure.clone());
                BuildOutcome::Failed(failure.clone())
            }
        }
    }

    /// The tool exited cleanly but left no package file for `package`.
    /// Turns a successful build into a failed one, for every later caller.
    pub fn fail_without_artifact(&mut self, package: &str) -> BuildFailure {
        let failure = BuildFailure::NoArtifact(package.to_string());
        self.build_succeeded = false;
        self.last_failure = Some(failure.clone());
        failure
    }

    fn run_build(&mut self, tool: &dyn BuildTool, flags: &[String], log_dir: &Path) -> Result<(), BuildFailure> {
        let dir = match &self.source_dir {
            Some(dir) if dir.is_dir() => dir.clone(),
            _ => return Err(BuildFailure::MissingSources),
        };

        let io_failure = |e: io::Error| BuildFailure::Io(e.to_string());
        std::fs::create_dir_all(log_dir).map_err(io_failure)?;
        let logs = BuildLogs::in_dir(log_dir, &self.id, &self.version);
        let stdout = File::create(&logs.stdout).map_err(io_failure)?;
        let stderr = File::create(&logs.stderr).map_err(io_failure)?;
        self.logs = Some(logs.clone());

        crate::ui::msg(format!("building {} {}", self.id, self.version));
        let env = vec![("PKGDEST".to_string(), dir.display().to_string())];
        let code = tool.run(&dir, flags, &env, stdout, stderr).map_err(io_failure)?;

        if code != 0 {
            let trailer = format!("exit code: {}", code);
            for log in [&logs.stdout, &logs.stderr] {
                if let Err(e) = append_line(log, &trailer) {
                    tracing::warn!("cannot append to '{}': {}", log.display(), e);
                }
            }
            return Err(BuildFailure::ExitCode(code));
        }
        tracing::info!("built {} {}", self.id, self.version);
        Ok(())
    }
}
