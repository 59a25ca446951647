use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::install::InstallerError;

/// File name looked up beside the executable and in the working directory
pub const CONFIG_FILE_NAME: &str = "bin-installer.toml";

/// Environment variable naming an explicit settings file
pub const CONFIG_ENV: &str = "BIN_INSTALLER_CONFIG";

/// Top-level bootstrapper settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app_name: String,
    /// File name of the standalone binary; defaults to `app_name`
    pub bin_name: Option<String>,
    /// Human readable name used in the menu entry; defaults to `app_name`
    pub display_name: Option<String>,
    pub icon: String,
    /// Source tree the build runs in; defaults to the working directory
    pub project_dir: Option<PathBuf>,
    /// Build inputs beyond the entry point, icon and manifest
    pub required_files: Vec<PathBuf>,
    pub manifest: PathBuf,
    pub prompt_timeout_secs: u64,
    pub error_delay_secs: u64,
    /// Program used to open the install directory after a fresh install
    pub opener: String,
    pub launch: Option<LaunchSettings>,
    pub build: BuildSettings,
}

/// Build environment and compiler tool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub env_dir: PathBuf,
    /// Host interpreter used to create the environment; located with `which` if unset
    pub interpreter: Option<PathBuf>,
    pub bootstrap_packages: Vec<String>,
    pub tool: String,
    pub entry_point: PathBuf,
    pub dist_dir: PathBuf,
    pub attempts: u32,
    pub onefile: bool,
    pub strip: bool,
    pub optimize: u8,
    pub clean: bool,
    pub exclude_modules: Vec<String>,
}

/// Application entry point handed control in Launch mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSettings {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "App".to_string(),
            bin_name: None,
            display_name: None,
            icon: "icon.jpg".to_string(),
            project_dir: None,
            required_files: vec![PathBuf::from("main.py")],
            manifest: PathBuf::from("requirements.txt"),
            prompt_timeout_secs: 10,
            error_delay_secs: 4,
            opener: "xdg-open".to_string(),
            launch: None,
            build: BuildSettings::default(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            env_dir: PathBuf::from("venv"),
            interpreter: None,
            bootstrap_packages: ["pip", "setuptools", "wheel", "pyinstaller"]
                .into_iter()
                .map(String::from)
                .collect(),
            tool: "pyinstaller".to_string(),
            entry_point: PathBuf::from("bin-installer.py"),
            dist_dir: PathBuf::from("dist"),
            attempts: 3,
            onefile: true,
            strip: true,
            optimize: 2,
            clean: true,
            exclude_modules: vec!["tkinter".to_string()],
        }
    }
}

impl Settings {
    pub fn bin_name(&self) -> &str {
        self.bin_name.as_deref().unwrap_or(&self.app_name)
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.app_name)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_secs(self.error_delay_secs)
    }

    /// Resolve the project directory against the working directory
    pub fn project_dir(&self) -> Result<PathBuf, InstallerError> {
        let cwd = env::current_dir()
            .map_err(|e| InstallerError::io("Could not determine working directory", e))?;
        Ok(match &self.project_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd,
        })
    }

    /// Every file a build needs, relative to the project directory
    pub fn required_inputs(&self) -> Vec<PathBuf> {
        let mut inputs = vec![
            self.build.entry_point.clone(),
            PathBuf::from(&self.icon),
            self.manifest.clone(),
        ];
        for extra in &self.required_files {
            if !inputs.contains(extra) {
                inputs.push(extra.clone());
            }
        }
        inputs
    }

    pub fn from_toml_str(content: &str) -> Result<Self, InstallerError> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| InstallerError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, InstallerError> {
        let content = fs::read_to_string(path).map_err(|e| {
            InstallerError::io(format!("Failed to read settings file {}", path.display()), e)
        })?;
        Self::from_toml_str(&content)
    }

    /// Check the invariants every layout path depends on
    pub fn validate(&self) -> Result<(), InstallerError> {
        for (key, value) in [("app_name", self.app_name.as_str()), ("bin_name", self.bin_name())] {
            if value.trim().is_empty() {
                return Err(InstallerError::Config(format!("{key} must not be empty")));
            }
            if value.contains('/') || value.contains('\\') {
                return Err(InstallerError::Config(format!(
                    "{key} must not contain path separators: {value}"
                )));
            }
        }
        if self.icon.trim().is_empty() {
            return Err(InstallerError::Config("icon must not be empty".to_string()));
        }
        // staged by bare file name beside the binary and in the install dir
        if self.icon.contains('/') || self.icon.contains('\\') {
            return Err(InstallerError::Config(format!(
                "icon must be a file name without path separators: {}",
                self.icon
            )));
        }
        if self.build.attempts == 0 {
            return Err(InstallerError::Config(
                "build.attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the settings file for this run
///
/// Order: explicit path (flag), `BIN_INSTALLER_CONFIG`, beside the running
/// executable, in the working directory. An explicitly named file must exist.
pub fn discover(explicit: Option<&Path>, exe_dir: Option<&Path>) -> Result<Option<PathBuf>, InstallerError> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(InstallerError::Config(format!(
                "settings file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    let mut candidates = Vec::new();
    if let Some(dir) = exe_dir {
        candidates.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd.join(CONFIG_FILE_NAME));
    }

    Ok(candidates.into_iter().find(|p| p.is_file()))
}

/// Load settings from the discovered file, or fall back to defaults
pub fn load(explicit: Option<&Path>, exe_dir: Option<&Path>) -> Result<(Settings, Option<PathBuf>), InstallerError> {
    match discover(explicit, exe_dir)? {
        Some(path) => {
            log::info!("Using settings from: {}", path.display());
            Ok((Settings::from_file(&path)?, Some(path)))
        }
        None => {
            log::info!("No {CONFIG_FILE_NAME} found, using built-in defaults");
            let settings = Settings::default();
            settings.validate()?;
            Ok((settings, None))
        }
    }
}
