//! External actions: generators and commands the pipeline shells out to.
//!
//! The engine only observes the exit status. Whatever files an action
//! produces are opaque; steps that rely on them must be ordered after it.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{BaselineError, Result};

/// Captured result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub exit_code: i32,
    pub stdout: String,
}

impl ActionOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capability to run an external command. The sequencer only talks to
/// actions through this trait so tests can substitute a double.
pub trait ActionRunner {
    /// Run `command` with `args` in `dir`, blocking until it exits.
    /// Errors only when the command cannot be started at all.
    fn invoke(&self, command: &str, args: &[String], dir: &Path) -> Result<ActionOutcome>;
}

/// A command plus its arguments, as declared by a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalAction {
    pub command: String,
    pub args: Vec<String>,
}

impl ExternalAction {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Run through `runner`, turning a non-zero exit into `ExternalActionFailed`.
    pub fn run(&self, runner: &dyn ActionRunner, dir: &Path) -> Result<ActionOutcome> {
        let outcome = runner.invoke(&self.command, &self.args, dir)?;
        if !outcome.success() {
            return Err(BaselineError::ExternalActionFailed {
                command: self.to_string(),
                exit_code: outcome.exit_code,
                output: outcome.stdout,
            });
        }
        Ok(outcome)
    }
}

impl fmt::Display for ExternalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs actions as real child processes.
///
/// Stdout is captured for diagnostics; stderr flows through to the
/// terminal. No timeout is applied.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    extra_path: Vec<PathBuf>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories searched for commands before the inherited `PATH`.
    pub fn with_path_prefix(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.extra_path.extend(dirs);
        self
    }

    fn search_path(&self) -> Option<OsString> {
        if self.extra_path.is_empty() {
            return None;
        }
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .extra_path
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited));
        std::env::join_paths(dirs).ok()
    }
}

impl ActionRunner for SystemRunner {
    fn invoke(&self, command: &str, args: &[String], dir: &Path) -> Result<ActionOutcome> {
        let search_path = self.search_path();
        let program = match &search_path {
            Some(paths) => which::which_in(command, Some(paths), dir),
            None => which::which(command),
        }
        .map_err(|e| BaselineError::ActionSpawnFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

        let mut cmd = Command::new(&program);
        cmd.args(args).current_dir(dir);
        if let Some(paths) = &search_path {
            cmd.env("PATH", paths);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());

        tracing::debug!(program = %program.display(), ?args, dir = %dir.display(), "invoking external action");
        let output = cmd.output().map_err(|e| BaselineError::ActionSpawnFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

        Ok(ActionOutcome {
            // terminated by signal
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct FixedRunner {
        exit_code: i32,
        calls: RefCell<Vec<String>>,
    }

    impl ActionRunner for FixedRunner {
        fn invoke(&self, command: &str, args: &[String], _dir: &Path) -> Result<ActionOutcome> {
            self.calls.borrow_mut().push(format!("{command} {}", args.join(" ")));
            Ok(ActionOutcome {
                exit_code: self.exit_code,
                stdout: "generator output".into(),
            })
        }
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let runner = FixedRunner {
            exit_code: 2,
            calls: RefCell::new(Vec::new()),
        };
        let action = ExternalAction::new("bundle", ["exec", "rails", "generate", "rspec:install"]);
        let err = action.run(&runner, Path::new(".")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalActionFailed);
        match err {
            BaselineError::ExternalActionFailed { exit_code, output, command } => {
                assert_eq!(exit_code, 2);
                assert_eq!(output, "generator output");
                assert_eq!(command, "bundle exec rails generate rspec:install");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn zero_exit_passes_output_through() {
        let runner = FixedRunner {
            exit_code: 0,
            calls: RefCell::new(Vec::new()),
        };
        let outcome = ExternalAction::new("git", ["init"]).run(&runner, Path::new(".")).unwrap();
        assert!(outcome.success());
        assert_eq!(runner.calls.borrow().as_slice(), ["git init"]);
    }

    #[test]
    fn unknown_program_cannot_spawn() {
        let dir = TempDir::new().unwrap();
        let err = SystemRunner::new()
            .invoke("baseline-no-such-program-xyz", &[], dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ActionSpawnFailed);
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_stdout_and_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        let bin = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let script = bin.path().join("fake-generator");
        std::fs::write(&script, "#!/bin/sh\necho \"ran $1 in $(pwd)\"\nexit 7\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = SystemRunner::new().with_path_prefix([bin.path().to_path_buf()]);
        let outcome = runner
            .invoke("fake-generator", &["devise:install".to_string()], work.path())
            .unwrap();
        assert_eq!(outcome.exit_code, 7);
        assert!(outcome.stdout.starts_with("ran devise:install in "));
    }
}
