mod cli;

use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use bin_installer::config::{self, Settings};
use bin_installer::install::{
    AppEntry, Bootstrapper, ExecLaunch, InstallLayout, InstallerError, ModeOutcome,
    RuntimeIdentity, StdinPrompt, SystemRunner, Tokens, Unconfigured, ui,
};

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = cli::Args::parse();
    let tokens = Tokens::parse(&args.tokens);

    let (settings, settings_file) = match load_settings(&args) {
        Ok(loaded) => loaded,
        Err(e) => escalate(&e, Settings::default().error_delay()),
    };
    let delay = settings.error_delay();

    match run(settings, settings_file, tokens) {
        Ok(ModeOutcome::Status(identity)) => {
            process::exit(if identity == RuntimeIdentity::CompiledInstalled { 0 } else { 1 })
        }
        Ok(outcome) => info!("Finished: {outcome:?}"),
        Err(e) => escalate(&e, delay),
    }
}

fn load_settings(args: &cli::Args) -> Result<(Settings, Option<PathBuf>)> {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let loaded = config::load(args.config.as_deref(), exe_dir.as_deref())
        .context("Failed to load settings")?;
    Ok(loaded)
}

fn run(settings: Settings, settings_file: Option<PathBuf>, tokens: Tokens) -> Result<ModeOutcome> {
    let layout = InstallLayout::for_user(&settings)?;
    let entry: Box<dyn AppEntry> = match &settings.launch {
        Some(launch) => Box::new(ExecLaunch::new(launch)),
        None => Box::new(Unconfigured),
    };

    let bootstrapper = Bootstrapper::new(settings, layout, SystemRunner, StdinPrompt)?
        .with_tokens(tokens)
        .with_settings_file(settings_file);

    Ok(bootstrapper.run(entry.as_ref())?)
}

/// Print the diagnostic, give the user time to read it, and exit with failure
fn escalate(err: &anyhow::Error, delay: Duration) -> ! {
    let declined = err
        .downcast_ref::<InstallerError>()
        .is_some_and(InstallerError::is_declined);

    if declined {
        ui::warning(&format!("{err}"));
        ui::warning("Exiting. Please compile the script to run the installer.");
    } else {
        error!("{err:#}");
        ui::failure(&format!("{err:#}"));
    }

    thread::sleep(delay);
    process::exit(1);
}
