//! Self-installing application bootstrapper
//!
//! One executable that, depending on its own runtime state, builds itself
//! into a standalone binary, installs that binary into the user's desktop
//! environment, or launches the installed application. See [`Bootstrapper`]
//! for the state machine that ties the components together.

mod binary_staging;
mod compile;
mod desktop;
mod detection;
mod environment;
mod error;
mod file_ops;
mod launch;
mod layout;
mod process;
mod reconcile;
mod requirements;
mod runners;
mod tokens;
mod wizard;

#[cfg(test)]
mod testing;

pub use binary_staging::{StageReport, StageSources, stage_installation};
pub use compile::{BuildArtifact, BuildExecutor, BuildPolicy};
pub use desktop::{render_descriptor, render_install_script, render_uninstall_script};
pub use detection::{FROZEN_ENV, RuntimeIdentity, is_frozen};
pub use environment::{BuildEnvironment, provision, resolve_interpreter};
pub use error::{InstallerError, ManifestError};
pub use launch::{AppEntry, ExecLaunch, Unconfigured, handoff, open_install_dir};
pub use layout::{INSTALL_SCRIPT, InstallLayout, UNINSTALL_SCRIPT};
pub use process::{CommandOutput, CommandRunner, Invocation, SystemRunner};
pub use reconcile::{Action, ReconcileReport, decide, installed_version, reconcile};
pub use requirements::{DependencySpec, Requirement};
pub use runners::{Bootstrapper, ModeOutcome, check_required_inputs};
pub use tokens::Tokens;
pub use wizard::{Prompt, PromptAnswer, StdinPrompt};

/// Terminal output helpers shared with the binary
pub mod ui {
    pub use super::wizard::{failure, show_status, step, success, warning};
}
