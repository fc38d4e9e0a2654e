mod cli;

use transcoder::{
    config,
    controller::{JobController, JobObserver, JobReport},
    engine::FfmpegEngine,
    format::{FormatPolicy, TranscodeParams},
    input::FileInputResolver,
    probe, tools,
};
use transcoder_common::{JobId, Outcome, Progress};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "transcoder=trace,transcoder_common=debug".to_string()
        } else {
            "transcoder=info,transcoder_common=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Transcode {
            input,
            bitrate,
            output,
            json,
        } => transcode(&input, bitrate, output, json, cli.config.as_deref()),
        Commands::Probe { file, json } => probe_file(&file, json, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("transcoder {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Prints progress on a single terminal line.
struct ConsoleObserver {
    show_progress: bool,
    printed: bool,
}

impl JobObserver for ConsoleObserver {
    fn on_progress(&mut self, _job_id: JobId, progress: Progress) {
        if !self.show_progress {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\rProgress: {:>6}", progress.to_string());
        let _ = stderr.flush();
        self.printed = true;
    }

    fn on_finished(&mut self, _job_id: JobId, _report: &JobReport) {
        if self.printed {
            eprintln!();
        }
    }
}

fn transcode(
    input: &Path,
    bitrate: Option<String>,
    output_dir: Option<PathBuf>,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }

    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let params = TranscodeParams {
        bitrate: bitrate.or_else(|| config.encoding.default_bitrate.clone()),
    };

    let ffmpeg = tools::resolve_tool("ffmpeg", config.tools.ffmpeg_path.as_deref())?;
    let ffprobe = match tools::resolve_tool("ffprobe", config.tools.ffprobe_path.as_deref()) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!("{}; input metadata will not be available", e);
            None
        }
    };

    let resolver = FileInputResolver::from_config(&config, ffprobe);
    let policy = FormatPolicy::from(&config.encoding);

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let engine = FfmpegEngine::new(ffmpeg, tokio::runtime::Handle::current());
        let (controller, mut events) = JobController::new(engine, policy);

        let handle = controller.submit_with(&resolver, input, &params)?;

        let canceller = controller.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling transcode");
                canceller.cancel(&handle);
            }
        });

        let mut observer = ConsoleObserver {
            show_progress: !json,
            printed: false,
        };
        let report = events
            .follow(handle.id(), &mut observer)
            .await
            .context("Controller stopped before the job finished")?;

        ctrl_c.abort();
        Ok::<_, anyhow::Error>(report)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    match report.outcome {
        Outcome::Success => Ok(()),
        Outcome::Canceled => anyhow::bail!("Transcode canceled"),
        Outcome::Failed { reason } => anyhow::bail!("Transcode failed: {}", reason),
    }
}

fn print_report(report: &JobReport) {
    let secs = report.elapsed_ms as f64 / 1000.0;
    match report.outcome {
        Outcome::Success => {
            println!("Transcoded file placed on {}", report.output_path.display());
            if let Some(size) = report.output_size {
                println!("Size: {} bytes", size);
            }
            println!("Elapsed: {:.1}s", secs);
        }
        Outcome::Canceled => println!("Transcode canceled after {:.1}s", secs),
        Outcome::Failed { .. } => println!("Transcode failed after {:.1}s", secs),
    }
}

fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let ffprobe = tools::resolve_tool("ffprobe", config.tools.ffprobe_path.as_deref())?;
    let media_info = probe::probe_file(&ffprobe, file)?;

    if json {
        let json_str = serde_json::to_string_pretty(&media_info)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("File: {}", media_info.file_path.display());
    println!("Container: {}", media_info.container);
    if let Some(size) = media_info.size {
        println!("Size: {} bytes", size);
    }
    if let Some(duration) = media_info.duration_secs {
        let secs = duration as u64;
        println!(
            "Duration: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
    }

    match media_info.video {
        Some(ref video) => match video.frame_rate {
            Some(fps) => println!("Video: {}x{} @ {:.3} fps", video.width, video.height, fps),
            None => println!("Video: {}x{} @ unknown fps", video.width, video.height),
        },
        None => println!("Video: none"),
    }
    println!("Audio Tracks: {}", media_info.audio_streams);

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = tools::check_tools(&config.tools);
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable transcoding.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Output dir: {}", config.output.dir.display());
    println!(
        "  Output names: {}*.{}",
        config.output.prefix, config.output.extension
    );
    println!("  Preset: {}", config.encoding.preset);
    match config.encoding.default_bitrate {
        Some(ref bitrate) => println!("  Default bitrate: {}", bitrate),
        None => println!("  Default bitrate: (preset)"),
    }
    println!("  Keyframe interval: {}", config.encoding.key_frame_interval);

    Ok(())
}
