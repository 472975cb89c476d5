//! Run one command line in a working directory.
//!
//! Command lines are split on whitespace into a program and its arguments.
//! There is no shell: quotes, pipes and globs are passed through literally.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use taskpool_core::{CommandTask, StatusBus, StatusEvent};

use crate::error::CommandError;

/// A parsed command ready for an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// `None` inherits the current process's working directory.
    pub working_dir: Option<PathBuf>,
}

impl CommandInvocation {
    /// Split `command_line` on whitespace. Returns `None` for a blank line.
    pub fn parse(command_line: &str, working_dir: &Path) -> Option<Self> {
        let mut tokens = command_line.split_whitespace().map(str::to_owned);
        let program = tokens.next()?;
        Some(Self {
            program,
            args: tokens.collect(),
            working_dir: if working_dir.as_os_str().is_empty() {
                None
            } else {
                Some(working_dir.to_path_buf())
            },
        })
    }
}

/// Exit status plus combined stdout/stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub output: String,
}

/// Strategy for actually starting a process.
pub trait CommandExecutor: Send + Sync {
    /// `Err` only when the program could not be started; a non-zero exit is
    /// an `Ok` output with `success == false`.
    fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput, CommandError>;
}

/// Executes commands with [`std::process::Command`], inheriting the
/// environment and never opening a console window.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl CommandExecutor for ProcessExecutor {
    fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput, CommandError> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }
        hide_console_window(&mut cmd);

        let output = cmd.output().map_err(|source| CommandError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            output: combined,
        })
    }
}

#[cfg(windows)]
fn hide_console_window(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_cmd: &mut Command) {}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Blank command line; nothing ran and nothing was reported.
    Skipped,
    Succeeded { output: String },
}

/// Parses command lines, reports the start on the status bus, and maps exit
/// codes to [`CommandError`].
#[derive(Clone)]
pub struct CommandRunner {
    executor: Arc<dyn CommandExecutor>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(Arc::new(ProcessExecutor))
    }
}

impl CommandRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Run `command_line` in `working_dir` (empty = current directory).
    pub fn run(
        &self,
        command_line: &str,
        working_dir: &Path,
        bus: &StatusBus,
    ) -> Result<CommandOutcome, CommandError> {
        self.run_named(command_line.trim(), command_line, working_dir, bus)
    }

    /// Run a command task, labelling its events with the task's display name.
    pub fn run_task(
        &self,
        task: &CommandTask,
        bus: &StatusBus,
    ) -> Result<CommandOutcome, CommandError> {
        self.run_named(task.display_name(), &task.command_line, &task.working_dir, bus)
    }

    fn run_named(
        &self,
        name: &str,
        command_line: &str,
        working_dir: &Path,
        bus: &StatusBus,
    ) -> Result<CommandOutcome, CommandError> {
        let Some(invocation) = CommandInvocation::parse(command_line, working_dir) else {
            return Ok(CommandOutcome::Skipped);
        };

        bus.emit(StatusEvent::CommandStarted {
            name: name.to_string(),
        });
        let output = self.executor.execute(&invocation)?;
        tracing::debug!(
            program = %invocation.program,
            code = ?output.code,
            "command output:\n{}",
            output.output
        );

        if output.success {
            Ok(CommandOutcome::Succeeded {
                output: output.output,
            })
        } else {
            Err(CommandError::NonZeroExit {
                program: invocation.program,
                code: output.code,
                output: output.output,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<CommandInvocation>>,
        fail: bool,
    }

    impl CommandExecutor for Recorder {
        fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput, CommandError> {
            self.seen.lock().unwrap().push(invocation.clone());
            Ok(CommandOutput {
                success: !self.fail,
                code: Some(if self.fail { 3 } else { 0 }),
                output: "out".to_string(),
            })
        }
    }

    #[test]
    fn parse_splits_on_whitespace_without_quoting() {
        let inv = CommandInvocation::parse("  hugo  --minify \"a b\" ", Path::new("/site")).unwrap();
        assert_eq!(inv.program, "hugo");
        assert_eq!(inv.args, vec!["--minify", "\"a", "b\""]);
        assert_eq!(inv.working_dir, Some(PathBuf::from("/site")));
    }

    #[test]
    fn parse_blank_is_none_and_empty_dir_inherits() {
        assert!(CommandInvocation::parse(" \t ", Path::new("/x")).is_none());
        let inv = CommandInvocation::parse("ls", Path::new("")).unwrap();
        assert_eq!(inv.working_dir, None);
    }

    #[test]
    fn blank_command_is_skipped_silently() {
        let recorder = Arc::new(Recorder::default());
        let runner = CommandRunner::new(recorder.clone());
        let (bus, mut rx) = StatusBus::channel();

        let outcome = runner.run("", Path::new(""), &bus).unwrap();
        assert_eq!(outcome, CommandOutcome::Skipped);
        assert!(rx.drain().is_empty());
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn task_label_names_the_event() {
        let runner = CommandRunner::new(Arc::new(Recorder::default()));
        let (bus, mut rx) = StatusBus::channel();
        let task = CommandTask::new(1, "", "make deploy").with_label("deploy site");

        runner.run_task(&task, &bus).unwrap();
        assert_eq!(
            rx.drain(),
            vec![StatusEvent::CommandStarted {
                name: "deploy site".to_string()
            }]
        );
    }

    #[test]
    fn non_zero_exit_maps_to_error() {
        let runner = CommandRunner::new(Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        }));
        let err = runner
            .run("make", Path::new(""), &StatusBus::detached())
            .unwrap_err();
        match err {
            CommandError::NonZeroExit { program, code, .. } => {
                assert_eq!(program, "make");
                assert_eq!(code, Some(3));
            }
            other => panic!("expected non-zero exit, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn process_executor_runs_in_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = CommandRunner::default();
        let outcome = runner
            .run("pwd", dir.path(), &StatusBus::detached())
            .unwrap();
        let CommandOutcome::Succeeded { output } = outcome else {
            panic!("expected success");
        };
        let reported = std::fs::canonicalize(output.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn process_executor_captures_stderr_and_exit_code() {
        let runner = CommandRunner::default();
        let err = runner
            .run("ls /definitely/not/here", Path::new(""), &StatusBus::detached())
            .unwrap_err();
        match err {
            CommandError::NonZeroExit { code, output, .. } => {
                assert_ne!(code, Some(0));
                assert!(!output.is_empty(), "stderr should be captured");
            }
            other => panic!("expected non-zero exit, got {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let runner = CommandRunner::default();
        let err = runner
            .run(
                "taskpool-no-such-program-xyz --flag",
                Path::new(""),
                &StatusBus::detached(),
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }), "got {err:?}");
        assert!(err.to_string().contains("taskpool-no-such-program-xyz"));
    }
}
