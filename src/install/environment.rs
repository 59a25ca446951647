//! Build environment provisioning
//!
//! Ensures an isolated interpreter environment exists under the project and
//! that the build tool is installed inside it. Creating the environment is
//! fatal on failure; the tool install is best effort, since a missing tool
//! surfaces as a build failure later anyway.

use std::path::{Path, PathBuf};

use log::{info, warn};

use super::InstallerError;
use super::process::{CommandRunner, Invocation, capture_lossy, log_output, path_arg};

/// An isolated interpreter environment rooted at one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    root: PathBuf,
}

impl BuildEnvironment {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    /// Interpreter inside the environment
    pub fn python(&self) -> PathBuf {
        self.bin_dir().join("python")
    }

    /// An executable installed into the environment (e.g. the build tool)
    pub fn tool(&self, name: &str) -> PathBuf {
        self.bin_dir().join(name)
    }

    /// `python -m pip <args...>` inside the environment
    pub fn pip<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(self.python()).args(["-m", "pip"]).args(args)
    }

    fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }
}

/// Host interpreter used to create environments
///
/// An explicit setting wins; otherwise `python3`, then `python`, on `PATH`.
pub fn resolve_interpreter(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    which::which("python3")
        .or_else(|_| which::which("python"))
        .unwrap_or_else(|_| PathBuf::from("python3"))
}

/// Create the environment if absent, then install the bootstrap packages
pub fn provision<R: CommandRunner + ?Sized>(
    runner: &R,
    env: &BuildEnvironment,
    interpreter: &Path,
    bootstrap_packages: &[String],
) -> Result<(), InstallerError> {
    if !env.exists() {
        info!("Virtual environment is missing. Creating at {}", env.root().display());
        let create = Invocation::new(interpreter)
            .args(["-m", "venv"])
            .arg(path_arg(env.root()));
        let output = capture_lossy(runner, &create);
        log_output("venv", &output);

        if !output.success() {
            return Err(InstallerError::Environment {
                path: env.root().to_path_buf(),
                reason: failure_reason(&output.stderr, output.code),
            });
        }
        info!("Virtual environment created.");
    }

    if bootstrap_packages.is_empty() {
        return Ok(());
    }

    info!("Installing build tooling: {}", bootstrap_packages.join(" "));
    let install = env.pip(["install".to_string()].into_iter().chain(bootstrap_packages.iter().cloned()));
    let output = capture_lossy(runner, &install);
    log_output("pip", &output);

    if output.success() {
        info!("Build tooling installed.");
    } else {
        warn!(
            "Installing build tooling failed ({}); continuing, the build will report it",
            failure_reason(&output.stderr, output.code)
        );
    }
    Ok(())
}

fn failure_reason(stderr: &str, code: Option<i32>) -> String {
    let last = stderr.lines().rev().find(|l| !l.trim().is_empty());
    match (last, code) {
        (Some(line), _) => line.trim().to_string(),
        (None, Some(code)) => format!("exit code {code}"),
        (None, None) => "terminated by signal".to_string(),
    }
}
