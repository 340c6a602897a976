//! Command dispatch logic for settle

use super::{DirArgs, InitArgs, SimulateArgs, ValidateArgs, init_config, process_dir, simulate, validate_config};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "settle", author, version, long_about = None)]
#[command(about = "Wait for an externally driven count to settle, with live progress")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: SettleSubcommand,
}

#[derive(Subcommand, Debug)]
enum SettleSubcommand {
    /// Wait for new entries to appear in a directory
    Dir(Box<DirArgs>),
    /// Watch a simulated container filled by a background writer
    Simulate(Box<SimulateArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        SettleSubcommand::Dir(dir_args) => process_dir(host, dir_args).await,
        SettleSubcommand::Simulate(simulate_args) => simulate(host, simulate_args).await,
        SettleSubcommand::Init(init_args) => init_config(host, init_args),
        SettleSubcommand::Validate(validate_args) => validate_config(host, validate_args),
    }
}
