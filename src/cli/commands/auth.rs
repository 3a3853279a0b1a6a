//! Authentication commands

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use crate::cli::output::{print_formatted, print_success, OutputFormat};
use crate::client::DeviceClient;
use crate::config::Config;

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Log in to the device and store the session token
    Login {
        /// Username (prompted for when omitted)
        #[arg(long)]
        username: Option<String>,

        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,
}

#[derive(Serialize)]
struct LoginResult {
    device: String,
}

pub async fn run(
    command: AuthCommands,
    device: Option<String>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    match command {
        AuthCommands::Login { username, password } => {
            login(username, password, device, format).await
        }
        AuthCommands::Logout => logout(quiet).await,
    }
}

async fn login(
    username: Option<String>,
    password: Option<String>,
    device: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut config = Config::load()?;
    let address = device
        .or_else(|| config.device.address.clone())
        .context("No device address configured. Pass --device <URL>")?;

    let username = match username {
        Some(username) => username,
        None => inquire::Text::new("Username:").prompt()?,
    };
    let password = match password {
        Some(password) => password,
        None => inquire::Password::new("Password:")
            .without_confirmation()
            .prompt()?,
    };

    let client = DeviceClient::new(&address, None)?;
    let token = client
        .login(&username, &password)
        .await
        .context("Login failed")?;

    // Remember both the token and the address it belongs to.
    config.device.address = Some(address.clone());
    config.auth.token = Some(token);
    config.save()?;

    let result = LoginResult { device: address };
    print_formatted(&result, format, |r| format!("Logged in to {}.", r.device));

    Ok(())
}

async fn logout(quiet: bool) -> Result<()> {
    let mut config = Config::load()?;
    config.auth.token = None;
    config.save()?;

    print_success("Logged out.", quiet);
    Ok(())
}
