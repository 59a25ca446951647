//! Error types for the bootstrapper
//!
//! Every fatal condition of the install state machine maps to one
//! `InstallerError` variant. Recoverable conditions (a single dependency
//! failing to install, the file manager not opening) never become errors;
//! they are logged where they happen and execution continues.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal bootstrapper errors
#[derive(Debug, Error)]
pub enum InstallerError {
    /// Required build inputs are missing from the project directory
    #[error("The following files are missing: {}", join_paths(.0))]
    MissingInputs(Vec<PathBuf>),

    /// The isolated build environment could not be created
    #[error("Failed to create build environment at {path}: {reason}")]
    Environment { path: PathBuf, reason: String },

    /// Every build attempt failed
    #[error("Could not compile after {attempts} attempts")]
    BuildExhausted { attempts: u32 },

    /// The build tool reported success but left no artifact behind
    #[error("Build finished but no artifact was produced at {0}")]
    ArtifactMissing(PathBuf),

    /// The compile prompt was answered with anything but "y", or timed out
    #[error("Compilation declined{}", declined_suffix(.timed_out))]
    Declined { timed_out: bool },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The freshly built binary could not be started or exited non-zero
    #[error("Installer handoff failed: {0}")]
    Handoff(String),

    #[error("Failed to launch application: {0}")]
    Launch(String),
}

impl InstallerError {
    /// Wrap an I/O error with a human readable context line
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for the user-declined path, which is expected rather than a crash
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Declined { .. })
    }
}

/// Dependency manifest parse errors (line numbers are 1-based)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("line {line}: missing package name")]
    EmptyName { line: usize },

    #[error("line {line}: missing version after '=='")]
    EmptyVersion { line: usize },

    #[error("line {line}: unsupported requirement '{text}' (use 'name' or 'name==version')")]
    UnsupportedSpecifier { line: usize, text: String },
}

fn declined_suffix(timed_out: &bool) -> &'static str {
    if *timed_out { " (prompt timed out)" } else { "" }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
