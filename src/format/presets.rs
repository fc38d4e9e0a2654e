//! Named output presets.
//!
//! A preset is a fixed configuration: it does not look at the input at all,
//! so every input transcoded with the same preset gets identical encoder
//! settings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use transcoder_common::{AudioFormat, ColorFormat, OutputConfig, VideoCodec, VideoFormat};

/// Built-in output presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatPreset {
    /// 960x540 H.264 at 5.5 Mbit/s, 30 fps, one keyframe per second, no audio.
    #[default]
    #[serde(rename = "export_960x540")]
    Export960x540,
    /// 1280x720 H.264 at 8 Mbit/s, 30 fps, keyframe every 3 seconds, AAC stereo.
    #[serde(rename = "android_720p")]
    Android720p,
}

impl FormatPreset {
    /// All known presets.
    pub const ALL: [FormatPreset; 2] = [FormatPreset::Export960x540, FormatPreset::Android720p];

    /// The fixed configuration for this preset.
    pub fn config(&self) -> OutputConfig {
        match self {
            Self::Export960x540 => OutputConfig {
                video: VideoFormat {
                    codec: VideoCodec::Avc,
                    width: 960,
                    height: 540,
                    bit_rate: 5_500_000,
                    frame_rate: 30.0,
                    key_frame_interval: 1,
                    color_format: ColorFormat::Surface,
                },
                audio: None,
            },
            Self::Android720p => OutputConfig {
                video: VideoFormat {
                    codec: VideoCodec::Avc,
                    width: 1280,
                    height: 720,
                    bit_rate: 8_000_000,
                    frame_rate: 30.0,
                    key_frame_interval: 3,
                    color_format: ColorFormat::Surface,
                },
                audio: Some(AudioFormat {
                    codec: "aac".to_string(),
                    bit_rate: 128_000,
                    channels: 2,
                }),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Export960x540 => "export_960x540",
            Self::Android720p => "android_720p",
        }
    }
}

impl fmt::Display for FormatPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormatPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                format!("unknown preset '{}' (known: {})", s, known.join(", "))
            })
    }
}
