//! Device maintenance commands

use anyhow::Result;
use clap::Subcommand;
use inquire::Confirm;

use crate::cli::output::{print_formatted, print_success, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum DeviceCommands {
    /// Show the device's version and build information
    Version,

    /// Reboot the device
    Reboot,

    /// Restore the device to factory settings
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

pub async fn run(
    command: DeviceCommands,
    device: Option<String>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    match command {
        DeviceCommands::Version => version(device, format).await,
        DeviceCommands::Reboot => reboot(device, quiet).await,
        DeviceCommands::Reset { yes } => reset(device, yes, quiet).await,
    }
}

async fn version(device: Option<String>, format: OutputFormat) -> Result<()> {
    let client = super::connect(device)?;
    let version = client.system_version().await?;

    print_formatted(&version, format, |v| {
        format!(
            "Version:      {}\nKernel:       {}\nBuilt:        {}\nArchitecture: {}\nCPU:          {}",
            v.version, v.linux_version, v.build_time, v.arch, v.cpu_info
        )
    });

    Ok(())
}

async fn reboot(device: Option<String>, quiet: bool) -> Result<()> {
    let client = super::connect(device)?;
    client.reboot().await?;

    print_success("Reboot requested.", quiet);
    Ok(())
}

async fn reset(device: Option<String>, yes: bool, quiet: bool) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new("Erase all settings and data on the device?")
            .with_default(false)
            .prompt()?;
        if !confirmed {
            print_success("Reset aborted.", quiet);
            return Ok(());
        }
    }

    let client = super::connect(device)?;
    client.factory_reset().await?;

    print_success("Factory reset requested. The device will reboot.", quiet);
    Ok(())
}
