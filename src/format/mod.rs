//! Output format selection.
//!
//! Turns the caller's optional parameters into an [`OutputConfig`]. There are
//! exactly two strategies:
//!
//! - **Bitrate**: the caller asked for a bit rate. Dimensions and frame rate
//!   are taken from the input's own metadata, the color format is fixed to
//!   [`ColorFormat::Surface`], the keyframe interval comes from the configured
//!   policy and the audio track is dropped.
//! - **Preset**: no bit rate was given. A fixed named preset is returned
//!   untouched, whatever the input looks like.
//!
//! Resolution is pure: the same input metadata and parameters always produce
//! the same configuration.

mod presets;

pub use presets::FormatPreset;

use serde::{Deserialize, Serialize};
use transcoder_common::{
    ColorFormat, Error, InputMetadata, OutputConfig, Result, VideoCodec, VideoFormat,
};

use crate::config::EncodingConfig;

/// User-supplied transcode parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeParams {
    /// Target video bit rate in bits per second, as typed by the user.
    #[serde(default)]
    pub bitrate: Option<String>,
}

impl TranscodeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = Some(bitrate.into());
        self
    }
}

/// Settings the selector applies that do not come from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatPolicy {
    /// Preset used when no bit rate is requested.
    pub preset: FormatPreset,
    /// Keyframe interval for bit-rate driven outputs.
    pub key_frame_interval: i32,
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self {
            preset: FormatPreset::default(),
            key_frame_interval: -1000,
        }
    }
}

impl From<&EncodingConfig> for FormatPolicy {
    fn from(config: &EncodingConfig) -> Self {
        Self {
            preset: config.preset,
            key_frame_interval: config.key_frame_interval,
        }
    }
}

/// The two ways an output configuration can be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStrategy {
    /// Keep the input geometry and frame rate, re-encode at `bit_rate`.
    Bitrate { bit_rate: u32, key_frame_interval: i32 },
    /// Use a fixed preset.
    Preset(FormatPreset),
}

impl FormatStrategy {
    /// Pick the strategy for `params`.
    ///
    /// Fails with [`Error::InvalidParameter`] when a bit rate is present but
    /// is not a positive integer.
    pub fn from_params(params: &TranscodeParams, policy: &FormatPolicy) -> Result<Self> {
        match params.bitrate.as_deref().map(parse_bitrate).transpose()?.flatten() {
            Some(bit_rate) => Ok(Self::Bitrate {
                bit_rate,
                key_frame_interval: policy.key_frame_interval,
            }),
            None => Ok(Self::Preset(policy.preset)),
        }
    }

    /// Produce the output configuration for an input.
    pub fn resolve(&self, input: &InputMetadata) -> Result<OutputConfig> {
        match *self {
            Self::Bitrate {
                bit_rate,
                key_frame_interval,
            } => {
                let video = input.video.as_ref().ok_or_else(|| {
                    Error::unsupported_input(
                        "input has no video track to derive dimensions and frame rate from",
                    )
                })?;
                let frame_rate = video.frame_rate.ok_or_else(|| {
                    Error::unsupported_input("input video track reports no usable frame rate")
                })?;

                Ok(OutputConfig {
                    video: VideoFormat {
                        codec: VideoCodec::Avc,
                        width: video.width,
                        height: video.height,
                        bit_rate,
                        frame_rate,
                        key_frame_interval,
                        color_format: ColorFormat::Surface,
                    },
                    audio: None,
                })
            }
            Self::Preset(preset) => Ok(preset.config()),
        }
    }
}

/// Resolve the output configuration for `input` under `params`.
pub fn resolve(
    input: &InputMetadata,
    params: &TranscodeParams,
    policy: &FormatPolicy,
) -> Result<OutputConfig> {
    FormatStrategy::from_params(params, policy)?.resolve(input)
}

/// Parse a user-typed bit rate.
///
/// Only the empty string counts as "no bit rate". Anything else, including
/// whitespace, must be a positive integer that fits in 32 bits.
pub fn parse_bitrate(raw: &str) -> Result<Option<u32>> {
    if raw.is_empty() {
        return Ok(None);
    }

    match raw.parse::<u32>() {
        Ok(0) => Err(Error::invalid_parameter("bitrate must be greater than zero")),
        Ok(bit_rate) => Ok(Some(bit_rate)),
        Err(e) => Err(Error::invalid_parameter(format!(
            "bitrate {:?} is not a positive integer: {}",
            raw, e
        ))),
    }
}
