//! External command execution
//!
//! All child processes of the bootstrapper (environment creation, package
//! installs, the build tool, the re-invoked binary, the file manager) go
//! through the [`CommandRunner`] trait so the state machine can be driven by
//! a fake in tests. Execution is synchronous: the caller blocks until the
//! child exits.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, error, info};

/// A program with its arguments, plus optional working directory and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the child, on top of the inherited ones
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the child was killed by a signal or never ran
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Output for a child that could not be spawned at all
    pub fn spawn_failure(err: &io::Error) -> Self {
        Self {
            code: None,
            stdout: String::new(),
            stderr: err.to_string(),
        }
    }
}

/// Capability to run external programs
pub trait CommandRunner {
    /// Run to completion with stdout and stderr captured
    fn capture(&self, invocation: &Invocation) -> io::Result<CommandOutput>;

    /// Run to completion with the child attached to this process's terminal.
    /// Returns the exit code (`None` if terminated by a signal).
    fn attach(&self, invocation: &Invocation) -> io::Result<Option<i32>>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn capture(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        (**self).capture(invocation)
    }

    fn attach(&self, invocation: &Invocation) -> io::Result<Option<i32>> {
        (**self).attach(invocation)
    }
}

/// Runs commands with `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(invocation.env.iter().map(|(k, v)| (k, v)));
        cmd
    }
}

impl CommandRunner for SystemRunner {
    fn capture(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        debug!("Running command: {invocation} (cwd: {:?})", invocation.cwd);

        let output = Self::command(invocation)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .inspect_err(|e| error!("Failed to execute {}: {e}", invocation.program.display()))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn attach(&self, invocation: &Invocation) -> io::Result<Option<i32>> {
        debug!("Spawning attached: {invocation} (cwd: {:?})", invocation.cwd);
        let status = Self::command(invocation).status()?;
        Ok(status.code())
    }
}

/// Run and capture, folding a spawn error into a failed [`CommandOutput`]
///
/// Callers that apply a continue/abort policy only care whether the command
/// succeeded and what it printed, not why it could not start.
pub fn capture_lossy<R: CommandRunner + ?Sized>(runner: &R, invocation: &Invocation) -> CommandOutput {
    match runner.capture(invocation) {
        Ok(output) => output,
        Err(e) => CommandOutput::spawn_failure(&e),
    }
}

/// Log both captured streams of a finished command
pub fn log_output(label: &str, output: &CommandOutput) {
    info!("{label} output: {}", output.stdout.trim_end());
    info!("{label} error: {}", output.stderr.trim_end());
}

/// Path helper used when a path has to travel as a plain argument
pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
