//! Build executor
//!
//! Runs the external compiler tool against the project's entry point with a
//! fixed policy (single file, excluded GUI toolkit modules, stripped symbols,
//! maximum optimisation, clean intermediates) and a bounded retry loop. A
//! successful build is relocated from the tool's output directory into the
//! project directory; an exhausted retry budget is fatal and relocates
//! nothing.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::Settings;

use super::InstallerError;
use super::environment::BuildEnvironment;
use super::process::{CommandRunner, Invocation, capture_lossy, log_output, path_arg};

/// Flags handed to the compiler tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPolicy {
    pub name: String,
    pub entry_point: PathBuf,
    /// Resource files bundled next to the binary (`source:dest` pairs)
    pub data: Vec<(PathBuf, String)>,
    pub onefile: bool,
    pub exclude_modules: Vec<String>,
    pub strip: bool,
    pub optimize: u8,
    pub clean: bool,
}

impl BuildPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        let build = &settings.build;
        Self {
            name: settings.bin_name().to_string(),
            entry_point: build.entry_point.clone(),
            data: vec![(PathBuf::from(&settings.icon), ".".to_string())],
            onefile: build.onefile,
            exclude_modules: build.exclude_modules.clone(),
            strip: build.strip,
            optimize: build.optimize,
            clean: build.clean,
        }
    }

    /// Command-line arguments in the tool's flag syntax
    pub fn arguments(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(12);
        if self.onefile {
            args.push("--onefile".to_string());
        }
        args.push("--noconfirm".to_string());
        for (source, dest) in &self.data {
            args.push(format!("--add-data={}:{dest}", source.display()));
        }
        for module in &self.exclude_modules {
            args.push(format!("--exclude-module={module}"));
        }
        if self.strip {
            args.push("--strip".to_string());
        }
        if self.optimize > 0 {
            args.push(format!("--optimize={}", self.optimize));
        }
        if self.clean {
            args.push("--clean".to_string());
        }
        args.push("--name".to_string());
        args.push(self.name.clone());
        args.push(path_arg(&self.entry_point));
        args
    }
}

/// A relocated, ready-to-run build output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub path: PathBuf,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// Runs the compiler tool with retries and relocates its output
pub struct BuildExecutor<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    tool: PathBuf,
    project_dir: PathBuf,
    dist_dir: PathBuf,
    policy: BuildPolicy,
    max_attempts: u32,
}

impl<'a, R: CommandRunner + ?Sized> BuildExecutor<'a, R> {
    pub fn new(runner: &'a R, settings: &Settings, env: &BuildEnvironment, project_dir: &Path) -> Self {
        Self {
            runner,
            tool: env.tool(&settings.build.tool),
            project_dir: project_dir.to_path_buf(),
            dist_dir: project_dir.join(&settings.build.dist_dir),
            policy: BuildPolicy::from_settings(settings),
            max_attempts: settings.build.attempts.max(1),
        }
    }

    pub fn invocation(&self) -> Invocation {
        Invocation::new(&self.tool)
            .args(self.policy.arguments())
            .current_dir(&self.project_dir)
    }

    /// Where the tool leaves the artifact
    pub fn produced_path(&self) -> PathBuf {
        self.dist_dir.join(&self.policy.name)
    }

    /// Where the artifact is moved after a successful build
    pub fn artifact_path(&self) -> PathBuf {
        self.project_dir.join(&self.policy.name)
    }

    pub fn build(&self) -> Result<BuildArtifact, InstallerError> {
        let invocation = self.invocation();
        info!("Compiling the application using {}...", self.tool.display());

        let mut attempt = 0;
        loop {
            attempt += 1;
            info!("Running (attempt {attempt}/{}): {invocation}", self.max_attempts);
            let output = capture_lossy(self.runner, &invocation);
            log_output("build", &output);

            if output.success() {
                info!("Compilation was finished");
                break;
            }

            if attempt >= self.max_attempts {
                warn!("Could not compile after {attempt} attempts");
                return Err(InstallerError::BuildExhausted { attempts: attempt });
            }
            warn!(
                "Compile error, retrying ({} attempts left)",
                self.max_attempts - attempt
            );
        }

        let produced = self.produced_path();
        if !produced.is_file() {
            return Err(InstallerError::ArtifactMissing(produced));
        }

        let dest = self.artifact_path();
        relocate(&produced, &dest)?;
        info!("Compilation complete. Artifact at {}", dest.display());

        Ok(BuildArtifact {
            path: dest,
            attempts: attempt,
        })
    }
}

/// Move `src` to `dest`, replacing a stale `dest`
fn relocate(src: &Path, dest: &Path) -> Result<(), InstallerError> {
    if dest.is_file() {
        fs::remove_file(dest).map_err(|e| {
            InstallerError::io(format!("Failed to remove stale artifact {}", dest.display()), e)
        })?;
    }

    if fs::rename(src, dest).is_err() {
        // rename fails across filesystems; copy and drop the source instead
        fs::copy(src, dest).map_err(|e| {
            InstallerError::io(
                format!("Failed to move {} to {}", src.display(), dest.display()),
                e,
            )
        })?;
        fs::remove_file(src)
            .map_err(|e| InstallerError::io(format!("Failed to remove {}", src.display()), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::testing::{FakeRunner, failed, ok};
    use tempfile::TempDir;

    fn settings() -> Settings {
        Settings {
            app_name: "NordVPN".to_string(),
            bin_name: Some("NordVPN-GUI".to_string()),
            ..Settings::default()
        }
    }

    /// Runner that drops an artifact into dist/ whenever the build succeeds
    fn producing_runner(project: &Path, outcomes: Vec<bool>) -> FakeRunner {
        let dist = project.join("dist");
        let outcomes = std::cell::RefCell::new(outcomes.into_iter());
        FakeRunner::new().respond(move |_| {
            let success = outcomes.borrow_mut().next().unwrap_or(false);
            if success {
                fs::create_dir_all(&dist).unwrap();
                fs::write(dist.join("NordVPN-GUI"), b"\x7fELF").unwrap();
                Some(ok("Building EXE completed successfully."))
            } else {
                Some(failed("ERROR: compile failed"))
            }
        })
    }

    #[test]
    fn policy_arguments_follow_fixed_flags() {
        let args = BuildPolicy::from_settings(&settings()).arguments();
        assert_eq!(
            args,
            vec![
                "--onefile",
                "--noconfirm",
                "--add-data=icon.jpg:.",
                "--exclude-module=tkinter",
                "--strip",
                "--optimize=2",
                "--clean",
                "--name",
                "NordVPN-GUI",
                "bin-installer.py",
            ]
        );
    }

    #[test]
    fn success_on_third_attempt_stops_there() {
        let tmp = TempDir::new().unwrap();
        let runner = producing_runner(tmp.path(), vec![false, false, true, true]);
        let env = BuildEnvironment::new(tmp.path().join("venv"));
        let executor = BuildExecutor::new(&runner, &settings(), &env, tmp.path());

        let artifact = executor.build().unwrap();

        assert_eq!(artifact.attempts, 3);
        assert_eq!(runner.calls.borrow().len(), 3);
        assert_eq!(artifact.path, tmp.path().join("NordVPN-GUI"));
        assert!(artifact.path.is_file());
        assert!(!tmp.path().join("dist/NordVPN-GUI").exists());
    }

    #[test]
    fn exhausted_attempts_relocate_nothing() {
        let tmp = TempDir::new().unwrap();
        let runner = producing_runner(tmp.path(), vec![false, false, false, true]);
        let env = BuildEnvironment::new(tmp.path().join("venv"));
        let executor = BuildExecutor::new(&runner, &settings(), &env, tmp.path());

        let err = executor.build().unwrap_err();

        assert!(matches!(err, InstallerError::BuildExhausted { attempts: 3 }));
        assert_eq!(runner.calls.borrow().len(), 3);
        assert!(!tmp.path().join("NordVPN-GUI").exists());
    }

    #[test]
    fn stale_artifact_is_replaced() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("NordVPN-GUI"), b"stale").unwrap();
        let runner = producing_runner(tmp.path(), vec![true]);
        let env = BuildEnvironment::new(tmp.path().join("venv"));
        let executor = BuildExecutor::new(&runner, &settings(), &env, tmp.path());

        let artifact = executor.build().unwrap();

        assert_eq!(fs::read(artifact.path).unwrap(), b"\x7fELF");
    }

    #[test]
    fn success_without_output_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let runner = FakeRunner::new();
        let env = BuildEnvironment::new(tmp.path().join("venv"));
        let executor = BuildExecutor::new(&runner, &settings(), &env, tmp.path());

        let err = executor.build().unwrap_err();

        assert!(matches!(err, InstallerError::ArtifactMissing(_)));
    }

    #[test]
    fn build_runs_in_project_dir_with_env_tool() {
        let tmp = TempDir::new().unwrap();
        let runner = FakeRunner::new();
        let env = BuildEnvironment::new(tmp.path().join("venv"));
        let executor = BuildExecutor::new(&runner, &settings(), &env, tmp.path());

        let inv = executor.invocation();

        assert_eq!(inv.program, tmp.path().join("venv/bin/pyinstaller"));
        assert_eq!(inv.cwd.as_deref(), Some(tmp.path()));
    }
}
