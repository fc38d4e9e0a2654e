//! FFprobe-based media probing.
//!
//! Only what the controller needs is extracted: container, duration, size and
//! the geometry and frame rate of the first video stream.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use transcoder_common::{Error, Result, VideoMetadata};

/// Probe result for a single media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub file_path: PathBuf,
    pub container: String,
    pub duration_secs: Option<f64>,
    pub size: Option<u64>,
    pub video: Option<VideoMetadata>,
    pub audio_streams: u32,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a media file using ffprobe at `ffprobe`.
pub fn probe_file(ffprobe: &Path, path: &Path) -> Result<MediaProbe> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool("ffprobe", "not found")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool(
            "ffprobe",
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    let json_str = String::from_utf8(output.stdout)
        .map_err(|e| Error::tool("ffprobe", format!("Invalid UTF-8: {}", e)))?;

    parse_ffprobe_output(path, &json_str)
}

/// Parse ffprobe's `-print_format json` output.
pub fn parse_ffprobe_output(path: &Path, json: &str) -> Result<MediaProbe> {
    let output: FfprobeOutput = serde_json::from_str(json)?;

    let duration_secs = output
        .format
        .duration
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let mut probe = MediaProbe {
        file_path: path.to_path_buf(),
        container: output.format.format_name,
        duration_secs,
        size: output.format.size.and_then(|s| s.parse().ok()),
        video: None,
        audio_streams: 0,
    };

    for stream in output.streams {
        match stream.codec_type.as_str() {
            "video" if probe.video.is_none() => {
                let (Some(width), Some(height)) = (stream.width, stream.height) else {
                    continue;
                };
                // r_frame_rate is 0/0 for some variable frame rate streams
                let frame_rate = stream
                    .r_frame_rate
                    .as_deref()
                    .and_then(parse_frame_rate)
                    .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_frame_rate));
                probe.video = Some(VideoMetadata {
                    width,
                    height,
                    frame_rate,
                    duration_secs,
                });
            }
            "audio" => probe.audio_streams += 1,
            _ => {}
        }
    }

    Ok(probe)
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let rate = match rate_str.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate_str.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
