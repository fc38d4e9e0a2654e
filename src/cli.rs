use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "transcoder")]
#[command(author, version, about = "Single-job video transcoder")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcode a video file
    Transcode {
        /// Input file to transcode
        #[arg(required = true)]
        input: PathBuf,

        /// Target video bit rate in bits per second (uses the preset if omitted)
        #[arg(short, long)]
        bitrate: Option<String>,

        /// Directory to place the output in (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
