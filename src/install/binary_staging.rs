//! Installation staging
//!
//! Copies the running binary and its resources into the per-user install
//! directory, writes both desktop descriptors and the helper scripts, and
//! writes the install marker last. Every step overwrites rather than
//! appends, so re-running converges on the same tree. A crash before the
//! marker is written leaves the next run in Install mode.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::InstallLayout;
use super::InstallerError;
use super::desktop::{render_descriptor, render_install_script, render_uninstall_script};
use super::file_ops::{replace_file, set_mode, write_file_atomic};

/// Files the stager copies from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSources {
    /// The executable image to install (normally the running binary)
    pub executable: PathBuf,
    pub icon: PathBuf,
    /// Settings file the current run was configured with, if any
    pub settings: Option<PathBuf>,
}

impl StageSources {
    /// Sources for a binary whose resources sit beside it
    pub fn beside(executable: &Path, icon_name: &str, settings: Option<&Path>) -> Self {
        let dir = executable.parent().unwrap_or_else(|| Path::new("."));
        Self {
            executable: executable.to_path_buf(),
            icon: dir.join(icon_name),
            settings: settings.map(Path::to_path_buf),
        }
    }
}

/// What staging actually did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// False when the running binary already was the installed binary
    pub binary_copied: bool,
    pub settings_copied: bool,
}

/// Stage a complete installation; idempotent and safe to re-run
pub fn stage_installation(layout: &InstallLayout, sources: &StageSources) -> Result<StageReport, InstallerError> {
    let mut report = StageReport::default();

    fs::create_dir_all(&layout.install_dir).map_err(|e| {
        InstallerError::io(
            format!("Failed to create installation directory {}", layout.install_dir.display()),
            e,
        )
    })?;
    info!("Created installation directory: {}", layout.install_dir.display());

    copy_unless_same(&sources.icon, &layout.icon_path)?;

    report.binary_copied = copy_unless_same(&sources.executable, &layout.bin_path)?;
    set_mode(&layout.bin_path, 0o755)?;

    if let Some(settings) = &sources.settings {
        report.settings_copied = copy_unless_same(settings, &layout.settings_path)?;
    }
    info!("Copied files to installation directory.");

    write_descriptors(layout)?;
    write_helper_scripts(layout)?;

    // Marker goes last: its presence is the only "installed" signal.
    write_file_atomic(&layout.marker_path, "")?;
    debug!("Wrote install marker {}", layout.marker_path.display());

    Ok(report)
}

/// Write the canonical and menu descriptors with identical content
pub fn write_descriptors(layout: &InstallLayout) -> Result<(), InstallerError> {
    let content = render_descriptor(layout);
    for path in [&layout.desktop_file, &layout.menu_desktop_file] {
        write_file_atomic(path, &content)?;
        set_mode(path, 0o755)?;
    }
    info!("Created desktop file: {}", layout.desktop_file.display());
    Ok(())
}

/// Write install.sh and uninstall.sh, both executable
pub fn write_helper_scripts(layout: &InstallLayout) -> Result<(), InstallerError> {
    write_file_atomic(&layout.install_script, &render_install_script(layout))?;
    set_mode(&layout.install_script, 0o755)?;
    write_file_atomic(&layout.uninstall_script, &render_uninstall_script(layout))?;
    set_mode(&layout.uninstall_script, 0o755)?;
    Ok(())
}

/// Replace `dest` with `src`, skipping when both already are the same file.
/// Returns whether a copy happened.
fn copy_unless_same(src: &Path, dest: &Path) -> Result<bool, InstallerError> {
    if is_same_file(src, dest) {
        debug!("{} is already in place, not copying", dest.display());
        return Ok(false);
    }
    replace_file(src, dest)?;
    Ok(true)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
