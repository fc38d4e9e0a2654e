//! Parser for ffmpeg's `-progress` key/value stream.
//!
//! ffmpeg writes blocks of `key=value` lines, each terminated by
//! `progress=continue` or, for the last block, `progress=end`.

/// Turns `-progress` lines into completion fractions.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    duration_secs: Option<f64>,
    out_time_us: Option<i64>,
}

impl ProgressParser {
    /// `duration_secs` is the input duration; without it no fraction can be
    /// computed until the final block.
    pub fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_secs: duration_secs.filter(|d| d.is_finite() && *d > 0.0),
            out_time_us: None,
        }
    }

    /// Feed one line. Returns a fraction in `[0.0, 1.0]` at the end of each
    /// block for which one can be computed.
    pub fn feed(&mut self, line: &str) -> Option<f64> {
        let line = line.trim();

        if let Some(val) = line.strip_prefix("out_time_us=") {
            self.out_time_us = val.trim().parse::<i64>().ok();
            return None;
        }

        let status = line.strip_prefix("progress=")?;
        if status.trim() == "end" {
            return Some(1.0);
        }

        let out_us = self.out_time_us?;
        let dur = self.duration_secs?;
        let elapsed_secs = out_us.max(0) as f64 / 1_000_000.0;
        Some((elapsed_secs / dur).clamp(0.0, 1.0))
    }
}

/// Whether `line` looks like part of the `-progress` stream rather than a log
/// message.
pub(crate) fn is_progress_line(line: &str) -> bool {
    line.split_once('=').is_some_and(|(key, _)| {
        !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}
