use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Self-installing application bootstrapper")]
pub struct Args {
    /// Path to a bin-installer.toml settings file
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Bare tokens: `compile` skips the prompt, `noopen` skips opening the
    /// install directory, `status` reports state without changing it
    #[arg(value_name = "TOKEN", trailing_var_arg = true, allow_hyphen_values = true)]
    pub tokens: Vec<String>,
}
