//! CLI module for otactl
//!
//! Provides the command-line interface for device update operations.

mod commands;
mod output;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;

/// otactl - over-the-air update client for embedded devices
#[derive(Parser, Debug)]
#[command(name = "otactl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Device address, e.g. "http://192.168.7.2" (overrides the configured one)
    #[arg(long, global = true)]
    pub device: Option<String>,

    /// Output format
    #[command(flatten)]
    pub output: OutputOptions,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output formatting options
#[derive(Parser, Debug, Clone)]
pub struct OutputOptions {
    /// Output in JSON format (for machine parsing)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl OutputOptions {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Push, monitor and cancel device updates
    Update {
        #[command(subcommand)]
        command: commands::update::UpdateCommands,
    },

    /// Device maintenance
    Device {
        #[command(subcommand)]
        command: commands::device::DeviceCommands,
    },

    /// Authentication and stored credentials
    Auth {
        #[command(subcommand)]
        command: commands::auth::AuthCommands,
    },
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.output.format();
    let quiet = cli.output.quiet;
    let device = cli.device;

    match cli.command {
        Commands::Update { command } => commands::update::run(command, device, format, quiet).await,
        Commands::Device { command } => commands::device::run(command, device, format, quiet).await,
        Commands::Auth { command } => commands::auth::run(command, device, format, quiet).await,
    }
}
