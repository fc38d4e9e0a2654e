use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::format::FormatPreset;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub encoding: EncodingConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Where generated output files are placed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Output directory (supports `~`)
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// File name prefix for allocated outputs
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// File extension for allocated outputs (without the dot)
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./outputs")
}

fn default_prefix() -> String {
    "transcode_".to_string()
}

fn default_extension() -> String {
    "mp4".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            prefix: default_prefix(),
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncodingConfig {
    /// Bit rate used when `--bitrate` is not given on the command line.
    /// Empty or absent selects the preset.
    #[serde(default)]
    pub default_bitrate: Option<String>,

    /// Preset used when no bit rate is requested (default: export_960x540)
    #[serde(default)]
    pub preset: FormatPreset,

    /// Keyframe interval for bit-rate driven outputs, passed to the engine as-is
    #[serde(default = "default_key_frame_interval")]
    pub key_frame_interval: i32,
}

fn default_key_frame_interval() -> i32 {
    -1000
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            default_bitrate: None,
            preset: FormatPreset::default(),
            key_frame_interval: default_key_frame_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}
