//! Mode controller
//!
//! Computes the runtime identity once, then makes a single pass through the
//! matching mode:
//! - Source: confirm, provision, reconcile, build, drop the marker, hand off
//!   to the new binary
//! - CompiledUninstalled: stage the installation, then finalize
//! - CompiledInstalled: hand control to the application entry point

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::Settings;

use super::binary_staging::{StageSources, stage_installation};
use super::compile::{BuildArtifact, BuildExecutor};
use super::detection::{RuntimeIdentity, is_frozen};
use super::environment::{BuildEnvironment, provision, resolve_interpreter};
use super::launch::{AppEntry, handoff, open_install_dir};
use super::process::CommandRunner;
use super::reconcile::reconcile;
use super::requirements::DependencySpec;
use super::tokens::Tokens;
use super::wizard::{self, Activity, Prompt, PromptAnswer};
use super::{InstallLayout, InstallerError};

const COMPILE_QUESTION: &str = "This installer must be run from a compiled binary. Compile now?";

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeOutcome {
    /// Build mode finished and the new binary completed its install pass
    Built { artifact: BuildArtifact },
    Installed,
    /// The application entry point returned
    Launched,
    /// `status` token: nothing was changed
    Status(RuntimeIdentity),
}

/// The install state machine, with every collaborator injected
pub struct Bootstrapper<R: CommandRunner, P: Prompt> {
    settings: Settings,
    layout: InstallLayout,
    runner: R,
    prompt: P,
    tokens: Tokens,
    project_dir: PathBuf,
    current_exe: PathBuf,
    settings_file: Option<PathBuf>,
    frozen: Option<bool>,
}

impl<R: CommandRunner, P: Prompt> Bootstrapper<R, P> {
    pub fn new(settings: Settings, layout: InstallLayout, runner: R, prompt: P) -> Result<Self, InstallerError> {
        let project_dir = settings.project_dir()?;
        let current_exe = env::current_exe()
            .map_err(|e| InstallerError::io("Could not determine the running executable", e))?;
        Ok(Self {
            settings,
            layout,
            runner,
            prompt,
            tokens: Tokens::default(),
            project_dir,
            current_exe,
            settings_file: None,
            frozen: None,
        })
    }

    pub fn with_tokens(mut self, tokens: Tokens) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    /// Executable image staged by Install mode
    pub fn with_current_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.current_exe = exe.into();
        self
    }

    /// Settings file this run was configured from, staged beside the binary
    pub fn with_settings_file(mut self, path: Option<PathBuf>) -> Self {
        self.settings_file = path;
        self
    }

    /// Force standalone-binary detection instead of inspecting the executable
    pub fn with_frozen(mut self, frozen: bool) -> Self {
        self.frozen = Some(frozen);
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn identity(&self) -> RuntimeIdentity {
        let frozen = self
            .frozen
            .unwrap_or_else(|| is_frozen(&self.current_exe, &self.layout.bin_name));
        RuntimeIdentity::from_state(frozen, self.layout.is_marked_installed())
    }

    /// Run the mode selected by the current identity
    pub fn run(&self, entry: &dyn AppEntry) -> Result<ModeOutcome, InstallerError> {
        let identity = self.identity();
        info!("Runtime identity: {identity:?}");

        if self.tokens.status {
            wizard::show_status(identity, &self.layout);
            return Ok(ModeOutcome::Status(identity));
        }

        match identity {
            RuntimeIdentity::Source => {
                wizard::show_banner(&self.layout.display_name, identity);
                self.confirm_compile()?;
                let artifact = self.build_mode()?;
                Ok(ModeOutcome::Built { artifact })
            }
            RuntimeIdentity::CompiledInstalled => {
                info!("App was installed. Starting...");
                entry.launch(&self.layout)?;
                Ok(ModeOutcome::Launched)
            }
            RuntimeIdentity::CompiledUninstalled => {
                wizard::show_banner(&self.layout.display_name, identity);
                self.install_mode()?;
                Ok(ModeOutcome::Installed)
            }
        }
    }

    fn confirm_compile(&self) -> Result<(), InstallerError> {
        if self.tokens.compile {
            info!("The keyword 'compile' was added as argument. Compiling now!");
            return Ok(());
        }

        let answer = self.prompt.ask(COMPILE_QUESTION, self.settings.prompt_timeout());
        debug!("Compile prompt answer: {answer:?}");
        if answer.is_affirmative() {
            Ok(())
        } else {
            Err(InstallerError::Declined {
                timed_out: answer == PromptAnswer::TimedOut,
            })
        }
    }

    fn build_mode(&self) -> Result<BuildArtifact, InstallerError> {
        check_required_inputs(&self.project_dir, &self.settings.required_inputs())?;

        let build = &self.settings.build;
        let env = BuildEnvironment::new(self.project_dir.join(&build.env_dir));
        let interpreter = resolve_interpreter(build.interpreter.as_deref());

        let activity = Activity::start("Preparing build environment");
        provision(&self.runner, &env, &interpreter, &build.bootstrap_packages)?;
        activity.finish("Build environment ready");

        let spec = DependencySpec::load(&self.project_dir.join(&self.settings.manifest))?;
        let activity = Activity::start(format!("Reconciling {} dependencies", spec.len()));
        let report = reconcile(&self.runner, &env, &spec);
        if report.is_clean() {
            activity.finish("Dependencies reconciled");
        } else {
            activity.abandon("Some dependencies could not be installed");
        }
        wizard::show_report(&report);

        let executor = BuildExecutor::new(&self.runner, &self.settings, &env, &self.project_dir);
        let activity = Activity::start("Compiling");
        let artifact = executor.build()?;
        activity.finish(&format!(
            "Compiled {} in {} attempt(s)",
            artifact.path.display(),
            artifact.attempts
        ));

        // A fresh build always goes through Install mode once more.
        self.clear_marker()?;

        handoff(
            &self.runner,
            &artifact.path,
            &self.tokens.forwarded(),
            self.settings_file.as_deref(),
            &self.project_dir,
        )?;
        Ok(artifact)
    }

    fn clear_marker(&self) -> Result<(), InstallerError> {
        let marker = &self.layout.marker_path;
        if marker.is_file() {
            fs::remove_file(marker).map_err(|e| {
                InstallerError::io(format!("Failed to remove install marker {}", marker.display()), e)
            })?;
            info!("Removed install marker {}", marker.display());
        }
        Ok(())
    }

    fn install_mode(&self) -> Result<(), InstallerError> {
        wizard::step("Staging installation");
        let sources = StageSources::beside(
            &self.current_exe,
            &self.settings.icon,
            self.settings_file.as_deref(),
        );
        let report = stage_installation(&self.layout, &sources)?;
        if !report.binary_copied {
            info!("Running from the install directory; binary left in place");
        }
        wizard::success("Installation staged");

        self.finalize();
        Ok(())
    }

    fn finalize(&self) {
        wizard::show_completion(&self.layout);
        if self.tokens.noopen {
            info!("The keyword 'noopen' was in the argument list, skipping opening of install dir");
            return;
        }
        open_install_dir(&self.runner, &self.settings.opener, &self.layout.install_dir);
    }
}

/// Fail with every missing build input listed, relative to `project_dir`
pub fn check_required_inputs(project_dir: &Path, inputs: &[PathBuf]) -> Result<(), InstallerError> {
    let missing: Vec<PathBuf> = inputs
        .iter()
        .filter(|input| !project_dir.join(input).exists())
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(InstallerError::MissingInputs(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::testing::{FakeRunner, failed, ok};
    use std::cell::Cell;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Project {
        tmp: TempDir,
        settings: Settings,
        layout: InstallLayout,
    }

    impl Project {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let project = tmp.path().join("src");
            fs::create_dir_all(&project).unwrap();
            for file in ["bin-installer.py", "main.py", "icon.jpg"] {
                fs::write(project.join(file), b"x").unwrap();
            }
            fs::write(project.join("requirements.txt"), "requests==2.31.0\n").unwrap();
            // skip environment creation
            fs::create_dir_all(project.join("venv")).unwrap();

            let settings = Settings {
                app_name: "Demo".to_string(),
                project_dir: Some(project),
                ..Settings::default()
            };
            let data = tmp.path().join("share");
            let layout = InstallLayout::with_roots(&settings, &data, &data.join("applications"));
            Self { tmp, settings, layout }
        }

        fn project_dir(&self) -> PathBuf {
            self.tmp.path().join("src")
        }

        fn bootstrapper<'a, P: Prompt>(&self, runner: &'a FakeRunner, prompt: P) -> Bootstrapper<&'a FakeRunner, P> {
            Bootstrapper::new(self.settings.clone(), self.layout.clone(), runner, prompt)
                .unwrap()
                .with_project_dir(self.project_dir())
                .with_current_exe(self.project_dir().join("Demo"))
        }
    }

    fn never_asked(_: &str, _: Duration) -> PromptAnswer {
        panic!("prompt should not be shown")
    }

    fn no_launch(_: &InstallLayout) -> Result<(), InstallerError> {
        panic!("launch should not be reached")
    }

    /// Runner that produces an artifact whenever the build tool runs
    fn building_runner(project: &Path) -> FakeRunner {
        let dist = project.join("dist");
        FakeRunner::new().respond(move |inv| {
            if inv.program.ends_with("pyinstaller") {
                fs::create_dir_all(&dist).unwrap();
                fs::write(dist.join("Demo"), b"built").unwrap();
                return Some(ok(""));
            }
            if inv.args.get(2).map(String::as_str) == Some("show") {
                return Some(failed("not found"));
            }
            None
        })
    }

    #[test]
    fn declined_prompt_stops_before_any_command() {
        let project = Project::new();
        let runner = FakeRunner::new();
        let boot = project
            .bootstrapper(&runner, |_: &str, _: Duration| PromptAnswer::Answered("n".into()))
            .with_frozen(false);

        let err = boot.run(&no_launch).unwrap_err();

        assert!(matches!(err, InstallerError::Declined { timed_out: false }));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn timed_out_prompt_declines() {
        let project = Project::new();
        let runner = FakeRunner::new();
        let boot = project
            .bootstrapper(&runner, |_: &str, _: Duration| PromptAnswer::TimedOut)
            .with_frozen(false);

        let err = boot.run(&no_launch).unwrap_err();

        assert!(matches!(err, InstallerError::Declined { timed_out: true }));
    }

    #[test]
    fn prompt_receives_configured_timeout() {
        let project = Project::new();
        let runner = FakeRunner::new();
        let seen = Cell::new(None);
        let prompt = |_: &str, timeout: Duration| {
            seen.set(Some(timeout));
            PromptAnswer::TimedOut
        };
        let boot = project.bootstrapper(&runner, prompt).with_frozen(false);

        let _ = boot.run(&no_launch);

        assert_eq!(seen.get(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn missing_inputs_are_all_listed() {
        let project = Project::new();
        fs::remove_file(project.project_dir().join("main.py")).unwrap();
        fs::remove_file(project.project_dir().join("icon.jpg")).unwrap();
        let runner = FakeRunner::new();
        let boot = project
            .bootstrapper(&runner, never_asked)
            .with_tokens(Tokens::parse(["compile"]))
            .with_frozen(false);

        let err = boot.run(&no_launch).unwrap_err();

        match err {
            InstallerError::MissingInputs(missing) => {
                assert_eq!(missing, vec![PathBuf::from("icon.jpg"), PathBuf::from("main.py")]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn build_removes_marker_and_hands_off_with_noopen() {
        let project = Project::new();
        fs::create_dir_all(&project.layout.install_dir).unwrap();
        fs::write(&project.layout.marker_path, "").unwrap();
        let runner = building_runner(&project.project_dir());
        let boot = project
            .bootstrapper(&runner, never_asked)
            .with_tokens(Tokens::parse(["compile", "noopen"]))
            .with_frozen(false);

        let outcome = boot.run(&no_launch).unwrap();

        let artifact = project.project_dir().join("Demo");
        assert!(matches!(outcome, ModeOutcome::Built { ref artifact } if artifact.attempts == 1));
        assert!(!project.layout.marker_path.exists());
        let handoffs: Vec<_> = runner
            .calls
            .borrow()
            .iter()
            .filter(|inv| inv.program == artifact)
            .cloned()
            .collect();
        assert_eq!(handoffs.len(), 1);
        assert_eq!(handoffs[0].args, vec!["noopen"]);
    }

    #[test]
    fn handoff_carries_settings_file_to_child() {
        let project = Project::new();
        let elsewhere = project.tmp.path().join("elsewhere.toml");
        fs::write(&elsewhere, "app_name = \"Demo\"\n").unwrap();
        let runner = building_runner(&project.project_dir());
        let boot = project
            .bootstrapper(&runner, never_asked)
            .with_tokens(Tokens::parse(["compile"]))
            .with_settings_file(Some(elsewhere.clone()))
            .with_frozen(false);

        boot.run(&no_launch).unwrap();

        let artifact = project.project_dir().join("Demo");
        let calls = runner.calls.borrow();
        let child = calls.iter().find(|inv| inv.program == artifact).unwrap();
        assert_eq!(
            child.env,
            vec![(
                crate::config::CONFIG_ENV.to_string(),
                elsewhere.to_string_lossy().into_owned()
            )]
        );
    }

    #[test]
    fn exhausted_build_skips_handoff() {
        let project = Project::new();
        let runner = FakeRunner::new().respond(|inv| {
            if inv.program.ends_with("pyinstaller") {
                Some(failed("compile error"))
            } else {
                None
            }
        });
        let boot = project
            .bootstrapper(&runner, never_asked)
            .with_tokens(Tokens::parse(["compile"]))
            .with_frozen(false);

        let err = boot.run(&no_launch).unwrap_err();

        assert!(matches!(err, InstallerError::BuildExhausted { attempts: 3 }));
        assert_eq!(runner.calls_matching("pyinstaller --onefile").len(), 3);
        assert!(!project.project_dir().join("Demo").exists());
    }

    #[test]
    fn install_opens_directory_once() {
        let project = Project::new();
        fs::write(project.project_dir().join("Demo"), b"built").unwrap();
        let runner = FakeRunner::new();
        let boot = project.bootstrapper(&runner, never_asked).with_frozen(true);

        assert_eq!(boot.run(&no_launch).unwrap(), ModeOutcome::Installed);

        assert!(project.layout.is_marked_installed());
        assert_eq!(runner.calls_matching("xdg-open").len(), 1);
    }

    #[test]
    fn install_with_noopen_opens_nothing() {
        let project = Project::new();
        fs::write(project.project_dir().join("Demo"), b"built").unwrap();
        let runner = FakeRunner::new();
        let boot = project
            .bootstrapper(&runner, never_asked)
            .with_tokens(Tokens::parse(["noopen"]))
            .with_frozen(true);

        boot.run(&no_launch).unwrap();

        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn installed_binary_launches_entry() {
        let project = Project::new();
        fs::create_dir_all(&project.layout.install_dir).unwrap();
        fs::write(&project.layout.marker_path, "").unwrap();
        let runner = FakeRunner::new();
        let launched = Cell::new(false);
        let entry = |_: &InstallLayout| {
            launched.set(true);
            Ok::<(), InstallerError>(())
        };
        let boot = project.bootstrapper(&runner, never_asked).with_frozen(true);

        assert_eq!(boot.run(&entry).unwrap(), ModeOutcome::Launched);
        assert!(launched.get());
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn status_changes_nothing() {
        let project = Project::new();
        let runner = FakeRunner::new();
        let boot = project
            .bootstrapper(&runner, never_asked)
            .with_tokens(Tokens::parse(["status"]))
            .with_frozen(true);

        let outcome = boot.run(&no_launch).unwrap();

        assert_eq!(outcome, ModeOutcome::Status(RuntimeIdentity::CompiledUninstalled));
        assert!(!project.layout.install_dir.exists());
    }
}
