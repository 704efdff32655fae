// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use wings_daemon::DaemonConfig;

const DEFAULT_CONFIG_PATH: &str = "/etc/pterodactyl/wings.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("WINGS_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = DaemonConfig::load(&config_path)?;

    let _guard = wings_daemon::logging::init(&config)?;

    wings_daemon::boot(config).await?;
    Ok(())
}
