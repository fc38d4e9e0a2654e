mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    expand_paths(&mut config);

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./transcoder.toml",
        "./config.toml",
        "~/.config/transcoder/config.toml",
        "/etc/transcoder/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    let mut config = Config::default();
    expand_paths(&mut config);
    Ok(config)
}

fn expand_paths(config: &mut Config) {
    config.output.dir = expand_tilde(&config.output.dir);
    if let Some(ref p) = config.tools.ffmpeg_path {
        config.tools.ffmpeg_path = Some(expand_tilde(p));
    }
    if let Some(ref p) = config.tools.ffprobe_path {
        config.tools.ffprobe_path = Some(expand_tilde(p));
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.output.dir.as_os_str().is_empty() {
        anyhow::bail!("Output directory cannot be empty");
    }

    let extension = config.output.extension.trim_start_matches('.');
    if extension.is_empty() || extension.contains(['/', '\\']) {
        anyhow::bail!("Invalid output extension: {:?}", config.output.extension);
    }

    if config.output.prefix.contains(['/', '\\']) {
        anyhow::bail!(
            "Output prefix must not contain path separators: {:?}",
            config.output.prefix
        );
    }

    // A configured default bit rate must survive the same parsing submit applies
    if let Some(ref bitrate) = config.encoding.default_bitrate {
        crate::format::parse_bitrate(bitrate)
            .with_context(|| "Invalid encoding.default_bitrate")?;
    }

    for (name, path) in [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
    ] {
        if let Some(p) = path {
            if !expand_tilde(p).exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, p);
            }
        }
    }

    Ok(())
}
