//! Engine backed by the ffmpeg CLI.
//!
//! Each job is one `ffmpeg` child process running on the tokio runtime.
//! Progress comes from `-progress pipe:2`; cancellation kills the child.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use transcoder_common::{ColorFormat, Error, OutputConfig, Result, VideoCodec};

use super::progress::{is_progress_line, ProgressParser};
use super::{CancelHandle, Engine, EngineListener};
use crate::input::InputHandle;

/// Number of ffmpeg log lines kept for failure messages.
const STDERR_TAIL_LINES: usize = 20;

/// Runs transcodes with an ffmpeg executable.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    runtime: Handle,
}

impl FfmpegEngine {
    /// Create an engine using the ffmpeg at `ffmpeg`, spawning jobs on
    /// `runtime`.
    pub fn new(ffmpeg: impl Into<PathBuf>, runtime: Handle) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            runtime,
        }
    }

    /// Build the ffmpeg argument list for one job.
    pub fn build_args(input: &Path, output: &Path, config: &OutputConfig) -> Vec<String> {
        let video = &config.video;
        let mut args: Vec<String> = ["-y", "-v", "error", "-nostats", "-progress", "pipe:2", "-i"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(input.to_string_lossy().to_string());

        args.extend(["-map".to_string(), "0:v:0".to_string()]);
        if config.audio.is_some() {
            // Optional mapping: inputs without audio still transcode
            args.extend(["-map".to_string(), "0:a:0?".to_string()]);
        }

        let encoder = match video.codec {
            VideoCodec::Avc => "libx264",
        };
        args.extend(["-c:v".to_string(), encoder.to_string()]);
        args.extend(["-b:v".to_string(), video.bit_rate.to_string()]);
        args.extend(["-r".to_string(), video.frame_rate.to_string()]);
        args.extend([
            "-vf".to_string(),
            format!("scale={}:{}", video.width, video.height),
        ]);

        let pix_fmt = match video.color_format {
            ColorFormat::Surface => "yuv420p",
        };
        args.extend(["-pix_fmt".to_string(), pix_fmt.to_string()]);

        // Non-positive intervals leave GOP sizing to the encoder
        if video.key_frame_interval > 0 {
            let gop = (video.frame_rate * f64::from(video.key_frame_interval))
                .round()
                .max(1.0) as u64;
            args.extend(["-g".to_string(), gop.to_string()]);
        }

        match &config.audio {
            Some(audio) => {
                args.extend(["-c:a".to_string(), audio.codec.clone()]);
                args.extend(["-b:a".to_string(), audio.bit_rate.to_string()]);
                args.extend(["-ac".to_string(), audio.channels.to_string()]);
            }
            None => args.push("-an".to_string()),
        }

        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        args.push(output.to_string_lossy().to_string());
        args
    }
}

impl Engine for FfmpegEngine {
    fn start_transcode(
        &self,
        input: &dyn InputHandle,
        output_path: &Path,
        config: &OutputConfig,
        listener: Arc<dyn EngineListener>,
    ) -> Result<Arc<dyn CancelHandle>> {
        let location = input
            .location()
            .ok_or_else(|| Error::engine("ffmpeg engine requires an input with a filesystem path"))?;

        let args = Self::build_args(location, output_path, config);
        debug!("FFmpeg args: {:?}", args);

        let mut std_cmd = std::process::Command::new(&self.ffmpeg);
        // Own process group: a terminal Ctrl-C reaches us, not ffmpeg, and
        // cancellation goes through the token.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut std_cmd, 0);

        let mut cmd = Command::from(std_cmd);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Child processes must be registered with the runtime's reactor
        let child = {
            let _guard = self.runtime.enter();
            cmd.spawn()
                .map_err(|e| Error::tool("ffmpeg", format!("failed to spawn: {e}")))?
        };

        info!("transcoding into {:?}", output_path);

        let duration = input.metadata().video.as_ref().and_then(|v| v.duration_secs);
        let token = CancellationToken::new();
        self.runtime
            .spawn(supervise(child, duration, listener, token.clone()));

        Ok(Arc::new(token))
    }
}

/// Drive one ffmpeg child to completion, reporting through `listener`.
async fn supervise(
    mut child: Child,
    duration_secs: Option<f64>,
    listener: Arc<dyn EngineListener>,
    cancel: CancellationToken,
) {
    listener.on_progress(-1.0);

    let mut parser = ProgressParser::new(duration_secs);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

    if let Some(stderr) = child.stderr.take() {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    kill(&mut child).await;
                    listener.on_canceled();
                    return;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(fraction) = parser.feed(&line) {
                            listener.on_progress(fraction);
                        } else if !is_progress_line(&line) && !line.trim().is_empty() {
                            if tail.len() == STDERR_TAIL_LINES {
                                tail.pop_front();
                            }
                            tail.push_back(line);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read ffmpeg output: {}", e);
                        break;
                    }
                },
            }
        }
    }

    let status = tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            kill(&mut child).await;
            listener.on_canceled();
            return;
        }
        status = child.wait() => status,
    };

    match status {
        Ok(status) if status.success() => listener.on_completed(),
        Ok(status) => {
            let detail = tail.into_iter().collect::<Vec<_>>().join("\n");
            listener.on_failed(Error::tool(
                "ffmpeg",
                format!("exited with status {}: {}", status, detail.trim()),
            ));
        }
        Err(e) => listener.on_failed(Error::Io(e)),
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill ffmpeg: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatPreset;
    use transcoder_common::VideoFormat;

    #[cfg(unix)]
    mod supervised {
        use super::*;
        use crate::input::FileInput;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;
        use tempfile::TempDir;
        use tokio::sync::mpsc;
        use transcoder_common::{InputMetadata, VideoMetadata};

        #[derive(Debug, Clone, PartialEq)]
        enum Seen {
            Progress(f64),
            Completed,
            Canceled,
            Failed(String),
        }

        struct ChannelListener(mpsc::UnboundedSender<Seen>);

        impl EngineListener for ChannelListener {
            fn on_progress(&self, fraction: f64) {
                let _ = self.0.send(Seen::Progress(fraction));
            }

            fn on_completed(&self) {
                let _ = self.0.send(Seen::Completed);
            }

            fn on_canceled(&self) {
                let _ = self.0.send(Seen::Canceled);
            }

            fn on_failed(&self, error: Error) {
                let _ = self.0.send(Seen::Failed(error.to_string()));
            }
        }

        struct Job {
            _dir: TempDir,
            cancel: Arc<dyn CancelHandle>,
            events: mpsc::UnboundedReceiver<Seen>,
        }

        impl Job {
            async fn next(&mut self) -> Seen {
                tokio::time::timeout(Duration::from_secs(10), self.events.recv())
                    .await
                    .expect("engine went quiet")
                    .expect("listener dropped without a terminal event")
            }

            /// Everything up to and including the terminal event.
            async fn run_to_end(&mut self) -> Vec<Seen> {
                let mut seen = Vec::new();
                loop {
                    let event = self.next().await;
                    let terminal = !matches!(event, Seen::Progress(_));
                    seen.push(event);
                    if terminal {
                        return seen;
                    }
                }
            }
        }

        /// Start a job whose "ffmpeg" is the shell script `body`.
        fn start_with_script(body: &str) -> Job {
            let dir = tempfile::tempdir().unwrap();
            let script = dir.path().join("ffmpeg");
            std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

            let source = dir.path().join("clip.mp4");
            std::fs::write(&source, b"not really video").unwrap();
            let input = FileInput::open(&source).unwrap().with_metadata(InputMetadata {
                byte_len: 16,
                video: Some(VideoMetadata {
                    width: 1920,
                    height: 1080,
                    frame_rate: Some(30.0),
                    duration_secs: Some(10.0),
                }),
            });

            let (tx, events) = mpsc::unbounded_channel();
            let engine = FfmpegEngine::new(&script, Handle::current());
            let cancel = engine
                .start_transcode(
                    &input,
                    &dir.path().join("out.mp4"),
                    &bitrate_config(-1000),
                    Arc::new(ChannelListener(tx)),
                )
                .unwrap();

            Job {
                _dir: dir,
                cancel,
                events,
            }
        }

        #[tokio::test]
        async fn test_progress_then_clean_exit_completes() {
            let mut job = start_with_script(
                "echo out_time_us=2500000 >&2\n\
                 echo progress=continue >&2\n\
                 echo out_time_us=5000000 >&2\n\
                 echo progress=continue >&2\n\
                 echo progress=end >&2\n\
                 exit 0",
            );

            assert_eq!(
                job.run_to_end().await,
                vec![
                    Seen::Progress(-1.0),
                    Seen::Progress(0.25),
                    Seen::Progress(0.5),
                    Seen::Progress(1.0),
                    Seen::Completed,
                ]
            );
        }

        #[tokio::test]
        async fn test_nonzero_exit_fails_with_log_tail() {
            let mut job = start_with_script(
                "echo frame=1 >&2\n\
                 echo \"boom: invalid data found when processing input\" >&2\n\
                 exit 1",
            );

            let seen = job.run_to_end().await;
            assert_eq!(seen.first(), Some(&Seen::Progress(-1.0)));
            match seen.last() {
                Some(Seen::Failed(reason)) => {
                    assert!(reason.contains("boom: invalid data"), "{reason}");
                    assert!(!reason.contains("frame=1"), "{reason}");
                }
                other => panic!("expected failure, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_cancel_kills_running_child() {
            let mut job = start_with_script(
                "echo out_time_us=1000000 >&2\n\
                 echo progress=continue >&2\n\
                 exec sleep 30",
            );

            assert_eq!(job.next().await, Seen::Progress(-1.0));
            assert_eq!(job.next().await, Seen::Progress(0.1));

            job.cancel.cancel();
            assert_eq!(job.next().await, Seen::Canceled);
        }

        #[cfg(target_os = "linux")]
        #[tokio::test]
        async fn test_child_leads_its_own_process_group() {
            // Field 5 of /proc/<pid>/stat is the process group id
            let mut job = start_with_script(
                "set -- $(cat /proc/$$/stat)\n\
                 [ \"$5\" = \"$$\" ] || exit 1\n\
                 echo progress=end >&2\n\
                 exit 0",
            );

            assert_eq!(
                job.run_to_end().await,
                vec![Seen::Progress(-1.0), Seen::Progress(1.0), Seen::Completed]
            );
        }
    }

    fn bitrate_config(key_frame_interval: i32) -> OutputConfig {
        OutputConfig {
            video: VideoFormat {
                codec: VideoCodec::Avc,
                width: 1920,
                height: 1080,
                bit_rate: 4_000_000,
                frame_rate: 29.97,
                key_frame_interval,
                color_format: ColorFormat::Surface,
            },
            audio: None,
        }
    }

    fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_build_args_bitrate_config() {
        let args = FfmpegEngine::build_args(
            Path::new("/in/clip.mp4"),
            Path::new("/out/transcode_1.mp4"),
            &bitrate_config(-1000),
        );

        assert_eq!(arg_after(&args, "-i"), Some("/in/clip.mp4"));
        assert_eq!(arg_after(&args, "-progress"), Some("pipe:2"));
        assert_eq!(arg_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(arg_after(&args, "-b:v"), Some("4000000"));
        assert_eq!(arg_after(&args, "-r"), Some("29.97"));
        assert_eq!(arg_after(&args, "-vf"), Some("scale=1920:1080"));
        assert_eq!(arg_after(&args, "-pix_fmt"), Some("yuv420p"));
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-g".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/out/transcode_1.mp4"));
    }

    #[test]
    fn test_build_args_positive_keyframe_interval() {
        let args = FfmpegEngine::build_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &bitrate_config(2),
        );
        assert_eq!(arg_after(&args, "-g"), Some("60"));
    }

    #[test]
    fn test_build_args_preset_with_audio() {
        let args = FfmpegEngine::build_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &FormatPreset::Android720p.config(),
        );
        assert_eq!(arg_after(&args, "-vf"), Some("scale=1280:720"));
        assert_eq!(arg_after(&args, "-r"), Some("30"));
        assert_eq!(arg_after(&args, "-g"), Some("90"));
        assert_eq!(arg_after(&args, "-c:a"), Some("aac"));
        assert_eq!(arg_after(&args, "-b:a"), Some("128000"));
        assert_eq!(arg_after(&args, "-ac"), Some("2"));
        assert!(args.contains(&"0:a:0?".to_string()));
        assert!(!args.contains(&"-an".to_string()));
    }
}
