//! Configuration commands.

use std::path::Path;

use crate::config::AppConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout, client secret masked.
pub fn dump(config: &AppConfig, path: &Path) -> ClientResult<()> {
    println!("{}", render_dump(config, path)?);
    Ok(())
}

fn render_dump(config: &AppConfig, path: &Path) -> ClientResult<String> {
    let body = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ClientError::config(format!("failed to serialize config: {}", e)))?;
    Ok(format!("# {}\n{}", path.display(), body))
}

/// Validate the configuration, secret references included.
pub fn validate(config: &AppConfig) -> ClientResult<()> {
    config.validate()?;
    let oauth = config.oauth_config()?;
    println!("Configuration is valid.");
    println!("Register this redirect URI with the application: {}", oauth.redirect_uri());
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    let marker = if path.exists() { "" } else { " (not found)" };
    println!("config: {}{}", path.display(), marker);
    Ok(())
}
