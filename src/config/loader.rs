use crate::config::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const DEFAULT_PATH: &str = "veribot.toml";

/// Load configuration from the given TOML file, falling back to
/// `veribot.toml` in the working directory and then to defaults when no
/// file exists.
pub fn load(config_path: Option<&Path>) -> Result<Config> {
    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_PATH));
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config from {}", path.display()))?;
    Ok(config)
}
