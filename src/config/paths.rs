use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Directory holding the config file: `$HOME/.config/infinidesk`.
pub fn config_dir() -> Result<PathBuf> {
    let home = env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("infinidesk"))
}

pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("infinidesk.toml"))
}
