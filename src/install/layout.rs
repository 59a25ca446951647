//! Filesystem layout of an installation
//!
//! Every path is a deterministic function of the application identifiers in
//! [`Settings`], so a second install of the same application overwrites the
//! first instead of coexisting with it.

use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE_NAME, Settings};

use super::InstallerError;

/// Install script name inside the install directory
pub const INSTALL_SCRIPT: &str = "install.sh";

/// Uninstall script name inside the install directory
pub const UNINSTALL_SCRIPT: &str = "uninstall.sh";

/// Resolved per-user installation paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub app_name: String,
    pub bin_name: String,
    pub display_name: String,
    pub install_dir: PathBuf,
    pub bin_path: PathBuf,
    pub icon_path: PathBuf,
    /// Zero-content sentinel; its existence alone means "installed"
    pub marker_path: PathBuf,
    /// Descriptor kept beside the binary
    pub desktop_file: PathBuf,
    /// Descriptor in the applications menu directory
    pub menu_desktop_file: PathBuf,
    pub install_script: PathBuf,
    pub uninstall_script: PathBuf,
    /// Staged copy of the settings file the installer ran with
    pub settings_path: PathBuf,
}

impl InstallLayout {
    /// Layout rooted at the user's data directory (`$XDG_DATA_HOME` or `~/.local/share`)
    pub fn for_user(settings: &Settings) -> Result<Self, InstallerError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| InstallerError::Config("Could not determine user data directory".to_string()))?;
        Ok(Self::with_roots(settings, &data_dir, &data_dir.join("applications")))
    }

    /// Layout with explicit data and applications-menu roots
    pub fn with_roots(settings: &Settings, data_root: &Path, applications_dir: &Path) -> Self {
        let app_name = settings.app_name.clone();
        let bin_name = settings.bin_name().to_string();
        let install_dir = data_root.join(&app_name);
        let desktop_name = format!("{app_name}.desktop");

        Self {
            bin_path: install_dir.join(&bin_name),
            icon_path: install_dir.join(&settings.icon),
            marker_path: install_dir.join(format!("Installed-{bin_name}")),
            desktop_file: install_dir.join(&desktop_name),
            menu_desktop_file: applications_dir.join(&desktop_name),
            install_script: install_dir.join(INSTALL_SCRIPT),
            uninstall_script: install_dir.join(UNINSTALL_SCRIPT),
            settings_path: install_dir.join(CONFIG_FILE_NAME),
            display_name: settings.display_name().to_string(),
            app_name,
            bin_name,
            install_dir,
        }
    }

    pub fn is_marked_installed(&self) -> bool {
        self.marker_path.is_file()
    }
}
