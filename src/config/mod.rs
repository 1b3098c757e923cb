mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Default config locations, searched in order.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./animencode.toml",
    "./config.toml",
    "~/.config/animencode/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    for (name, path) in [
        ("ffmpeg_path", &config.tools.ffmpeg_path),
        ("ffprobe_path", &config.tools.ffprobe_path),
    ] {
        if let Some(path) = path {
            if path.as_os_str().is_empty() {
                anyhow::bail!("tools.{} cannot be empty", name);
            }
        }
    }

    if let Some(dir) = &config.encode.output_dir {
        if dir.exists() && !dir.is_dir() {
            anyhow::bail!("encode.output_dir is not a directory: {:?}", dir);
        }
    }

    if let Some(dir) = &config.encode.preset_dir {
        if !dir.is_dir() {
            tracing::warn!("Preset directory does not exist: {:?}", dir);
        }
    }

    if !config.parser.square_brackets && !config.parser.round_brackets {
        anyhow::bail!("parser: at least one of square_brackets or round_brackets must be enabled");
    }

    if let Some(tag) = config
        .parser
        .known_omittable_tags
        .iter()
        .find(|tag| tag.trim().is_empty())
    {
        anyhow::bail!("parser.known_omittable_tags contains an empty tag: {:?}", tag);
    }

    Ok(())
}
