//! Process handoffs: launching the installed application, re-invoking a
//! freshly built binary, and opening the install directory.

use std::path::{self, Path, PathBuf};

use log::{info, warn};

use crate::config::{CONFIG_ENV, LaunchSettings};

use super::InstallLayout;
use super::InstallerError;
use super::process::{CommandRunner, Invocation, capture_lossy, log_output, path_arg};

/// Application entry point that Launch mode hands control to
pub trait AppEntry {
    fn launch(&self, layout: &InstallLayout) -> Result<(), InstallerError>;
}

impl<F> AppEntry for F
where
    F: Fn(&InstallLayout) -> Result<(), InstallerError>,
{
    fn launch(&self, layout: &InstallLayout) -> Result<(), InstallerError> {
        self(layout)
    }
}

/// Replaces the current process image with the configured program
///
/// A relative program is resolved against the install directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecLaunch {
    program: PathBuf,
    args: Vec<String>,
}

impl ExecLaunch {
    pub fn new(settings: &LaunchSettings) -> Self {
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
        }
    }

    fn resolve(&self, layout: &InstallLayout) -> PathBuf {
        if self.program.is_absolute() {
            return self.program.clone();
        }
        let installed = layout.install_dir.join(&self.program);
        // a bare name not shipped in the install dir is looked up on PATH by exec
        let bare = self.program.components().count() == 1;
        if bare && !installed.exists() {
            self.program.clone()
        } else {
            installed
        }
    }
}

impl AppEntry for ExecLaunch {
    fn launch(&self, layout: &InstallLayout) -> Result<(), InstallerError> {
        let program = self.resolve(layout);
        info!("Launching {}", program.display());

        // exec only returns on failure
        let err = exec::Command::new(&program)
            .args(&self.args)
            .exec();
        Err(InstallerError::Launch(format!("{}: {err}", program.display())))
    }
}

/// Entry used when no `[launch]` table is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct Unconfigured;

impl AppEntry for Unconfigured {
    fn launch(&self, layout: &InstallLayout) -> Result<(), InstallerError> {
        Err(InstallerError::Config(format!(
            "{} is installed but no [launch] program is configured",
            layout.display_name
        )))
    }
}

/// Run the freshly built binary so it installs itself
///
/// Spawn-and-wait with the terminal attached; `noopen` is forwarded. The
/// settings file this run used is passed on through `BIN_INSTALLER_CONFIG`,
/// as an absolute path since the child runs in `cwd`. A start failure or
/// non-zero exit is fatal.
pub fn handoff<R: CommandRunner + ?Sized>(
    runner: &R,
    artifact: &Path,
    forwarded: &[String],
    settings_file: Option<&Path>,
    cwd: &Path,
) -> Result<(), InstallerError> {
    let mut invocation = Invocation::new(artifact)
        .args(forwarded.iter().cloned())
        .current_dir(cwd);
    if let Some(file) = settings_file {
        let file = path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
        invocation = invocation.env(CONFIG_ENV, path_arg(&file));
    }
    info!("Handing off to {invocation}");

    match runner.attach(&invocation) {
        Ok(Some(0)) => Ok(()),
        Ok(Some(code)) => Err(InstallerError::Handoff(format!(
            "{} exited with status {code}",
            artifact.display()
        ))),
        Ok(None) => Err(InstallerError::Handoff(format!(
            "{} was terminated by a signal",
            artifact.display()
        ))),
        Err(e) => Err(InstallerError::Handoff(format!(
            "could not start {}: {e}",
            artifact.display()
        ))),
    }
}

/// Open `dir` in the desktop file manager; best effort, never fails
pub fn open_install_dir<R: CommandRunner + ?Sized>(runner: &R, opener: &str, dir: &Path) -> bool {
    let invocation = Invocation::new(opener).arg(path_arg(dir));
    let output = capture_lossy(runner, &invocation);
    log_output(opener, &output);
    if !output.success() {
        warn!("Could not open {} with {opener}", dir.display());
    }
    output.success()
}
