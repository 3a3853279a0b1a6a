//! CLI command implementations

pub mod auth;
pub mod device;
pub mod update;

use anyhow::{Context, Result};

use crate::client::DeviceClient;
use crate::config::Config;

/// Build a device client from the stored configuration and an optional
/// address override
pub(crate) fn connect(device_override: Option<String>) -> Result<DeviceClient> {
    let config = Config::load()?;
    let address = device_override
        .or(config.device.address)
        .context("No device address configured. Pass --device <URL> or run 'otactl auth login'")?;

    let client = DeviceClient::new(&address, config.auth.token)?;
    tracing::debug!("Using device at {}", client.base_url());
    Ok(client)
}
