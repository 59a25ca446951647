//! Dependency reconciliation
//!
//! Aligns the build environment with the manifest, one requirement at a time
//! and in manifest order. Installs run strictly sequentially; the package
//! tool takes locks on the environment and concurrent installs contend.
//!
//! | installed | pinned | action                     |
//! |-----------|--------|----------------------------|
//! | no        | any    | install declared spec      |
//! | yes       | no     | skip                       |
//! | yes, =pin | yes    | skip                       |
//! | yes, ≠pin | yes    | reinstall at pinned version|
//!
//! A failed pinned install falls back once to the unpinned package. If that
//! fails too the dependency is given up on and reconciliation continues.

use log::{info, warn};

use super::environment::BuildEnvironment;
use super::process::{CommandRunner, capture_lossy, log_output};
use super::requirements::{DependencySpec, Requirement};

/// What to do about one requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Install,
    Reinstall { installed: String },
    Skip { installed: String },
}

/// How one requirement ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Satisfied,
    Installed,
    /// Pinned install failed, latest version installed instead
    FellBack,
    Failed,
}

/// Per-run summary, in manifest order within each list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub satisfied: Vec<String>,
    pub installed: Vec<String>,
    pub fell_back: Vec<String>,
    pub failed: Vec<String>,
}

impl ReconcileReport {
    fn record(&mut self, name: &str, outcome: Outcome) {
        let bucket = match outcome {
            Outcome::Satisfied => &mut self.satisfied,
            Outcome::Installed => &mut self.installed,
            Outcome::FellBack => &mut self.fell_back,
            Outcome::Failed => &mut self.failed,
        };
        bucket.push(name.to_string());
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Decision table for one requirement
pub fn decide(requirement: &Requirement, installed: Option<&str>) -> Action {
    match (installed, requirement.version.as_deref()) {
        (None, _) => Action::Install,
        (Some(current), None) => Action::Skip {
            installed: current.to_string(),
        },
        (Some(current), Some(pinned)) if current == pinned => Action::Skip {
            installed: current.to_string(),
        },
        (Some(current), Some(_)) => Action::Reinstall {
            installed: current.to_string(),
        },
    }
}

/// Currently installed version of `name`, queried live from the environment
///
/// `None` when the package is absent, or present without a readable version.
pub fn installed_version<R: CommandRunner + ?Sized>(
    runner: &R,
    env: &BuildEnvironment,
    name: &str,
) -> Option<String> {
    let output = capture_lossy(runner, &env.pip(["show", name]));
    if !output.success() {
        return None;
    }
    output
        .stdout
        .lines()
        .find_map(|line| line.strip_prefix("Version:"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reconcile every requirement in `spec` against the environment
pub fn reconcile<R: CommandRunner + ?Sized>(
    runner: &R,
    env: &BuildEnvironment,
    spec: &DependencySpec,
) -> ReconcileReport {
    info!("Installing dependencies one by one ({} declared)...", spec.len());

    let mut report = ReconcileReport::default();
    for requirement in spec.iter() {
        let outcome = reconcile_one(runner, env, requirement);
        report.record(&requirement.name, outcome);
    }

    info!(
        "All dependencies processed: {} satisfied, {} installed, {} fell back, {} failed",
        report.satisfied.len(),
        report.installed.len(),
        report.fell_back.len(),
        report.failed.len()
    );
    report
}

fn reconcile_one<R: CommandRunner + ?Sized>(
    runner: &R,
    env: &BuildEnvironment,
    requirement: &Requirement,
) -> Outcome {
    let name = requirement.name.as_str();
    let installed = installed_version(runner, env, name);

    match decide(requirement, installed.as_deref()) {
        Action::Skip { installed } => {
            info!("{name} {installed} is already installed. Skipping.");
            return Outcome::Satisfied;
        }
        Action::Reinstall { installed } => {
            info!(
                "{name} installed version ({installed}) differs from {}. Reinstalling.",
                requirement.version.as_deref().unwrap_or_default()
            );
        }
        Action::Install => info!("{name} is not installed. Installing."),
    }

    let spec = requirement.install_spec();
    info!("Installing {spec}...");
    let output = capture_lossy(runner, &env.pip(["install", spec.as_str()]));
    log_output(&spec, &output);

    if output.success() {
        info!("Successfully installed {spec}.");
        return Outcome::Installed;
    }

    if !requirement.is_pinned() {
        warn!("Failed to install {spec}. Continuing with the next dependency...");
        return Outcome::Failed;
    }

    warn!("Failed to install {spec}. Attempting to install the latest version.");
    let fallback = capture_lossy(runner, &env.pip(["install", name]));
    log_output(&format!("{name} (latest)"), &fallback);

    if fallback.success() {
        info!("Successfully installed the latest version of {name}.");
        Outcome::FellBack
    } else {
        warn!("Failed to install the latest version of {name}. Continuing with the next dependency...");
        Outcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::process::Invocation;
    use crate::install::testing::{FakeRunner, failed, ok};
    use std::collections::HashMap;

    fn env() -> BuildEnvironment {
        BuildEnvironment::new("/proj/venv")
    }

    /// Runner whose `pip show` answers from a fixed package table
    fn with_installed(packages: &[(&str, &str)]) -> FakeRunner {
        let table: HashMap<String, String> = packages
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        FakeRunner::new().respond(move |inv: &Invocation| {
            if inv.args.get(2).map(String::as_str) != Some("show") {
                return None;
            }
            let name = inv.args.get(3)?;
            Some(match table.get(name) {
                Some(version) => ok(&format!("Name: {name}\nVersion: {version}\nSummary: x\n")),
                None => failed("WARNING: Package(s) not found"),
            })
        })
    }

    fn installs(runner: &FakeRunner) -> Vec<String> {
        runner
            .calls_matching("pip install")
            .into_iter()
            .map(|inv| inv.args[3..].join(" "))
            .collect()
    }

    #[test]
    fn decision_table() {
        let pinned = Requirement::new("requests", Some("2.31.0"));
        let loose = Requirement::new("requests", None);

        assert_eq!(decide(&pinned, None), Action::Install);
        assert_eq!(decide(&loose, None), Action::Install);
        assert_eq!(
            decide(&loose, Some("2.0.0")),
            Action::Skip { installed: "2.0.0".into() }
        );
        assert_eq!(
            decide(&pinned, Some("2.31.0")),
            Action::Skip { installed: "2.31.0".into() }
        );
        assert_eq!(
            decide(&pinned, Some("2.28.0")),
            Action::Reinstall { installed: "2.28.0".into() }
        );
    }

    #[test]
    fn satisfied_environment_installs_nothing() {
        let spec = DependencySpec::parse("requests==2.31.0\nPyQt5\nurllib3==2.0.7\n").unwrap();
        let runner = with_installed(&[("requests", "2.31.0"), ("PyQt5", "5.15.10"), ("urllib3", "2.0.7")]);

        let report = reconcile(&runner, &env(), &spec);

        assert!(installs(&runner).is_empty());
        assert_eq!(report.satisfied.len(), 3);
        assert!(report.is_clean());
    }

    #[test]
    fn missing_pinned_package_is_installed_once() {
        let spec = DependencySpec::parse("requests==2.31.0\n").unwrap();
        let runner = with_installed(&[]);

        let report = reconcile(&runner, &env(), &spec);

        assert_eq!(installs(&runner), vec!["requests==2.31.0"]);
        assert_eq!(report.installed, vec!["requests"]);
        assert!(report.fell_back.is_empty());
    }

    #[test]
    fn version_mismatch_reinstalls_once() {
        let spec = DependencySpec::parse("requests==2.31.0\n").unwrap();
        let runner = with_installed(&[("requests", "2.28.0")]);

        reconcile(&runner, &env(), &spec);

        assert_eq!(installs(&runner), vec!["requests==2.31.0"]);
    }

    #[test]
    fn failed_reinstall_falls_back_to_latest_once() {
        let spec = DependencySpec::parse("requests==2.31.0\n").unwrap();
        let runner = with_installed(&[("requests", "2.28.0")])
            .script("pip install requests==2.31.0", [failed("No matching distribution")]);

        let report = reconcile(&runner, &env(), &spec);

        assert_eq!(installs(&runner), vec!["requests==2.31.0", "requests"]);
        assert_eq!(report.fell_back, vec!["requests"]);
    }

    #[test]
    fn double_failure_continues_with_next_dependency() {
        let spec = DependencySpec::parse("broken==1.0\nrequests\n").unwrap();
        let runner = with_installed(&[])
            .script("pip install broken", [failed("nope"), failed("still nope")]);

        let report = reconcile(&runner, &env(), &spec);

        assert_eq!(installs(&runner), vec!["broken==1.0", "broken", "requests"]);
        assert_eq!(report.failed, vec!["broken"]);
        assert_eq!(report.installed, vec!["requests"]);
    }

    #[test]
    fn unpinned_failure_has_no_fallback() {
        let spec = DependencySpec::parse("requests\n").unwrap();
        let runner = with_installed(&[]).script("pip install requests", [failed("offline")]);

        let report = reconcile(&runner, &env(), &spec);

        assert_eq!(installs(&runner), vec!["requests"]);
        assert_eq!(report.failed, vec!["requests"]);
    }

    #[test]
    fn show_without_version_line_counts_as_absent() {
        let runner = FakeRunner::new().script("pip show", [ok("Name: odd\n")]);
        assert_eq!(installed_version(&runner, &env(), "odd"), None);
    }
}
