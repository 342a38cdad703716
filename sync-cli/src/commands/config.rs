//! Print the effective client configuration.

use anyhow::Result;
use std::path::Path;
use tasksync_client::SyncConfig;

/// Address shown when no config file is given.
const DEFAULT_ADDRESS: &str = "127.0.0.1:7000";

/// Run the config command.
pub async fn run(path: Option<&Path>) -> Result<()> {
    print!("{}", render(path)?);
    Ok(())
}

fn render(path: Option<&Path>) -> Result<String> {
    let config = match path {
        Some(path) => SyncConfig::from_file(path)?,
        None => SyncConfig::new(DEFAULT_ADDRESS),
    };
    Ok(config.to_toml_string()?)
}
