//! Runtime identity detection
//!
//! Decides which of the three modes a process runs in, from two facts:
//! - whether the process is the standalone binary (its executable file is
//!   named like the build artifact, or `BIN_INSTALLER_FROZEN` says so)
//! - whether the install marker exists
//!
//! Recomputed on every start; nothing here is persisted.

use std::env;
use std::path::Path;

use super::InstallLayout;

/// Environment override for standalone-binary detection (`1` or `0`)
pub const FROZEN_ENV: &str = "BIN_INSTALLER_FROZEN";

/// What this process is, relative to the installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeIdentity {
    /// Running from the source tree; Build mode after confirmation
    Source,
    /// Standalone binary with no install marker; Install mode
    CompiledUninstalled,
    /// Standalone binary and the marker exists; Launch mode
    CompiledInstalled,
}

impl RuntimeIdentity {
    /// Combine the two detection inputs
    pub fn from_state(frozen: bool, marker_present: bool) -> Self {
        match (frozen, marker_present) {
            (false, _) => Self::Source,
            (true, true) => Self::CompiledInstalled,
            (true, false) => Self::CompiledUninstalled,
        }
    }

    /// Detect identity for the running executable against a layout
    pub fn detect(current_exe: &Path, layout: &InstallLayout) -> Self {
        Self::from_state(is_frozen(current_exe, &layout.bin_name), layout.is_marked_installed())
    }
}

/// True when the executable is the standalone build artifact
///
/// The environment override wins; otherwise the executable file name must
/// match the artifact name.
pub fn is_frozen(current_exe: &Path, bin_name: &str) -> bool {
    match env::var(FROZEN_ENV).ok().as_deref() {
        Some("1") | Some("true") => return true,
        Some("0") | Some("false") => return false,
        _ => {}
    }
    current_exe
        .file_name()
        .is_some_and(|name| name == bin_name)
}
