//! Compile confirmation prompt and terminal output for the bootstrapper

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use super::InstallLayout;
use super::detection::RuntimeIdentity;
use super::reconcile::ReconcileReport;

/// Result of a prompt with a deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAnswer {
    Answered(String),
    TimedOut,
}

impl PromptAnswer {
    /// Only an explicit "y" accepts; anything else, including a timeout, declines
    pub fn is_affirmative(&self) -> bool {
        match self {
            Self::Answered(text) => text.trim().eq_ignore_ascii_case("y"),
            Self::TimedOut => false,
        }
    }
}

/// A yes/no question that gives up after `timeout`
pub trait Prompt {
    fn ask(&self, question: &str, timeout: Duration) -> PromptAnswer;
}

impl<F> Prompt for F
where
    F: Fn(&str, Duration) -> PromptAnswer,
{
    fn ask(&self, question: &str, timeout: Duration) -> PromptAnswer {
        self(question, timeout)
    }
}

/// Reads the answer from standard input
///
/// The read happens on a helper thread raced against `recv_timeout`. On
/// timeout the thread is left blocked in `read_line`; the process is about to
/// exit on that path anyway.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&self, question: &str, timeout: Duration) -> PromptAnswer {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{question} (y/n) [default: n]: ");
        let _ = stdout.flush();

        let answer = read_answer(|| io::stdin().lock(), timeout);
        if answer == PromptAnswer::TimedOut {
            let _ = writeln!(stdout, "\nTimed out.");
        }
        answer
    }
}

/// Read one line from the reader `open` yields, on its own thread
///
/// End of input counts as an empty answer. A read error or a missed deadline
/// is a timeout.
fn read_answer<R, F>(open: F, timeout: Duration) -> PromptAnswer
where
    R: BufRead,
    F: FnOnce() -> R + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        if open().read_line(&mut line).is_ok() {
            let _ = tx.send(line);
        }
    });

    match rx.recv_timeout(timeout) {
        Ok(line) => PromptAnswer::Answered(line.trim().to_string()),
        Err(_) => PromptAnswer::TimedOut,
    }
}

fn stdout() -> StandardStream {
    StandardStream::stdout(ColorChoice::Auto)
}

fn rule(stdout: &mut StandardStream) {
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
    let _ = writeln!(
        stdout,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    );
    let _ = stdout.reset();
}

/// Display the header for the mode about to run
pub fn show_banner(display_name: &str, identity: RuntimeIdentity) {
    let mut stdout = stdout();
    let _ = writeln!(stdout);
    rule(&mut stdout);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
    let _ = writeln!(stdout, "  {display_name}");
    let _ = stdout.reset();
    let mode = match identity {
        RuntimeIdentity::Source => "Build a standalone binary from source",
        RuntimeIdentity::CompiledUninstalled => "Install into the desktop environment",
        RuntimeIdentity::CompiledInstalled => "Launch",
    };
    let _ = writeln!(stdout, "  {mode}");
    rule(&mut stdout);
    let _ = writeln!(stdout);
}

/// A step header (cyan)
pub fn step(message: &str) {
    let mut stdout = stdout();
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
    let _ = writeln!(stdout, "→ {message}");
    let _ = stdout.reset();
}

pub fn success(message: &str) {
    let mut stdout = stdout();
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
    let _ = writeln!(stdout, "✓ {message}");
    let _ = stdout.reset();
}

pub fn warning(message: &str) {
    let mut stdout = stdout();
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
    let _ = writeln!(stdout, "⚠ {message}");
    let _ = stdout.reset();
}

/// Fatal diagnostic, written to stderr
pub fn failure(message: &str) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = writeln!(stderr, "✗ {message}");
    let _ = stderr.reset();
}

/// Per-run dependency summary
pub fn show_report(report: &ReconcileReport) {
    let mut stdout = stdout();
    let _ = writeln!(stdout, "\nDependencies:");
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
    let _ = writeln!(stdout, "  ✓ {} already satisfied", report.satisfied.len());
    let _ = writeln!(stdout, "  ✓ {} installed", report.installed.len());
    let _ = stdout.reset();

    if !report.fell_back.is_empty() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
        let _ = writeln!(
            stdout,
            "  ⚠ {} installed at latest instead of pinned: {}",
            report.fell_back.len(),
            report.fell_back.join(", ")
        );
        let _ = stdout.reset();
    }
    if !report.failed.is_empty() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
        let _ = writeln!(
            stdout,
            "  ✗ {} failed: {}",
            report.failed.len(),
            report.failed.join(", ")
        );
        let _ = stdout.reset();
    }
    let _ = writeln!(stdout);
}

/// Display installation completion summary
pub fn show_completion(layout: &InstallLayout) {
    let mut stdout = stdout();
    let _ = writeln!(stdout);
    rule(&mut stdout);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = writeln!(stdout, "\n                    ✓ INSTALLATION COMPLETE\n");
    let _ = stdout.reset();
    rule(&mut stdout);

    let _ = writeln!(stdout, "\nInstalled to: {}", layout.install_dir.display());
    let _ = writeln!(
        stdout,
        "Menu entry:   {} ({})",
        layout.display_name,
        layout.menu_desktop_file.display()
    );
    let _ = writeln!(stdout, "Uninstall:    {}", layout.uninstall_script.display());

    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
    let _ = writeln!(
        stdout,
        "\nIf the desktop icon shows as untrusted, right-click {} and choose \"Allow Launching\".",
        layout.desktop_file.display()
    );
    let _ = stdout.reset();
    let _ = writeln!(stdout);
}

/// Report detected state for the `status` token
pub fn show_status(identity: RuntimeIdentity, layout: &InstallLayout) {
    let mut stdout = stdout();
    let (color, label) = match identity {
        RuntimeIdentity::Source => (Color::Yellow, "source (not compiled)"),
        RuntimeIdentity::CompiledUninstalled => (Color::Yellow, "compiled, not installed"),
        RuntimeIdentity::CompiledInstalled => (Color::Green, "installed"),
    };
    let _ = write!(stdout, "State:         ");
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = writeln!(stdout, "{label}");
    let _ = stdout.reset();
    let _ = writeln!(stdout, "Install dir:   {}", layout.install_dir.display());
    let _ = writeln!(stdout, "Binary:        {}", layout.bin_path.display());
    let _ = writeln!(
        stdout,
        "Marker:        {} ({})",
        layout.marker_path.display(),
        if layout.is_marked_installed() { "present" } else { "absent" }
    );
    let _ = writeln!(stdout, "Menu entry:    {}", layout.menu_desktop_file.display());
}

/// Spinner shown on stderr while a long external step runs
///
/// Hidden when stderr is not a terminal so redirected logs stay clean.
pub struct Activity {
    bar: Option<ProgressBar>,
}

impl Activity {
    pub fn start(message: impl Into<String>) -> Self {
        let message = message.into();
        if !io::stderr().is_terminal() {
            step(&message);
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar: Some(bar) }
    }

    pub fn finish(self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        success(message);
    }

    pub fn abandon(self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        warning(message);
    }
}

impl Drop for Activity {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
    }
}
