//! Core type definitions for inputs, output configurations and job outcomes.
//!
//! Enums are serialized in lowercase so snapshots and reports read naturally
//! when printed as JSON by the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Video properties of an input, as reported by its own metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Frames per second. `None` when the stream reports no usable rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    /// Container duration in seconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

/// Everything the controller knows about an opened input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputMetadata {
    /// Size of the input in bytes.
    pub byte_len: u64,
    /// First video track, if the input has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoMetadata>,
}

/// Output video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// H.264 / AVC (`video/avc`).
    Avc,
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Avc => write!(f, "video/avc"),
        }
    }
}

/// Encoder input color format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFormat {
    /// Frames are fed to the encoder through a surface; the engine picks the
    /// concrete pixel layout.
    Surface,
}

/// Resolved video encoding parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    /// Target bit rate in bits per second.
    pub bit_rate: u32,
    pub frame_rate: f64,
    /// Seconds between keyframes. Engine-specific; non-positive values are
    /// passed through untouched.
    pub key_frame_interval: i32,
    pub color_format: ColorFormat,
}

/// Resolved audio encoding parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Encoder name understood by the engine, e.g. `aac`.
    pub codec: String,
    pub bit_rate: u32,
    pub channels: u32,
}

/// Full output configuration handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub video: VideoFormat,
    /// `None` means the output carries no audio track.
    pub audio: Option<AudioFormat>,
}

/// Progress of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Progress {
    /// No fraction is known yet.
    Indeterminate,
    /// Fraction complete in `[0.0, 1.0]`.
    Fraction(f64),
}

impl Progress {
    /// Interpret a raw engine value.
    ///
    /// Negative values mean "unknown" and map to [`Progress::Indeterminate`];
    /// everything else is clamped into `[0.0, 1.0]`. NaN carries no
    /// information and yields `None`.
    pub fn from_raw(raw: f64) -> Option<Self> {
        if raw.is_nan() {
            None
        } else if raw < 0.0 {
            Some(Self::Indeterminate)
        } else {
            Some(Self::Fraction(raw.min(1.0)))
        }
    }

    /// The fraction, if known.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Self::Indeterminate => None,
            Self::Fraction(f) => Some(*f),
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indeterminate => write!(f, "--.-%"),
            Self::Fraction(v) => write!(f, "{:.1}%", v * 100.0),
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Canceled,
    Failed,
}

impl JobState {
    /// Whether this is one of the three terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Canceled => write!(f, "canceled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal outcome delivered to the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Canceled,
    Failed { reason: String },
}

impl Outcome {
    /// The job state this outcome leaves the job in.
    pub fn state(&self) -> JobState {
        match self {
            Self::Success => JobState::Completed,
            Self::Canceled => JobState::Canceled,
            Self::Failed { .. } => JobState::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Canceled => write!(f, "canceled"),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_from_raw() {
        assert_eq!(Progress::from_raw(0.25), Some(Progress::Fraction(0.25)));
        assert_eq!(Progress::from_raw(1.7), Some(Progress::Fraction(1.0)));
        assert_eq!(Progress::from_raw(0.0), Some(Progress::Fraction(0.0)));
        assert_eq!(Progress::from_raw(-1.0), Some(Progress::Indeterminate));
        assert_eq!(Progress::from_raw(-0.0001), Some(Progress::Indeterminate));
        assert_eq!(Progress::from_raw(f64::NAN), None);
    }

    #[test]
    fn test_progress_display() {
        assert_eq!(Progress::Fraction(0.425).to_string(), "42.5%");
        assert_eq!(Progress::Indeterminate.to_string(), "--.-%");
    }

    #[test]
    fn test_progress_serialization() {
        let json = serde_json::to_string(&Progress::Fraction(0.5)).unwrap();
        assert_eq!(json, r#"{"kind":"fraction","value":0.5}"#);
        let json = serde_json::to_string(&Progress::Indeterminate).unwrap();
        assert_eq!(json, r#"{"kind":"indeterminate"}"#);
    }

    #[test]
    fn test_outcome_state() {
        assert_eq!(Outcome::Success.state(), JobState::Completed);
        assert_eq!(Outcome::Canceled.state(), JobState::Canceled);
        let failed = Outcome::Failed {
            reason: "boom".to_string(),
        };
        assert_eq!(failed.state(), JobState::Failed);
        assert_eq!(failed.to_string(), "failed: boom");
    }

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Idle.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Canceled.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn test_input_metadata_serialization_skips_missing_video() {
        let meta = InputMetadata {
            byte_len: 42,
            video: None,
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"byte_len":42}"#);
    }
}
