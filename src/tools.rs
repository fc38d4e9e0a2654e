//! External tool detection.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use transcoder_common::{Error, Result};

use crate::config::ToolsConfig;

/// Information about an external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// First line of the version output, if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Run `program -version` and report whether it works.
pub fn check_tool(name: &str, program: &Path) -> ToolInfo {
    let result = Command::new(program).arg("-version").output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            let path = if program.components().count() > 1 {
                Some(program.to_path_buf())
            } else {
                which::which(program).ok()
            };

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path,
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check ffmpeg and ffprobe, honouring configured paths.
pub fn check_tools(config: &ToolsConfig) -> Vec<ToolInfo> {
    [
        ("ffmpeg", config.ffmpeg_path.as_deref()),
        ("ffprobe", config.ffprobe_path.as_deref()),
    ]
    .into_iter()
    .map(|(name, configured)| {
        let program = configured
            .filter(|p| p.exists())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(name));
        check_tool(name, &program)
    })
    .collect()
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
///
/// # Errors
///
/// Returns [`Error::Tool`] if the tool cannot be found.
pub fn resolve_tool(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            "Configured {} path {:?} does not exist, searching PATH",
            name,
            path
        );
    }

    which::which(name).map_err(|_| Error::tool(name, "not found in PATH"))
}
