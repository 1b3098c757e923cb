use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "animencode")]
#[command(author, version, about = "Batch anime encoder with filename-aware renaming")]
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
    /// Encode an episode or every video file in a directory
    Encode {
        /// Episode file or directory of episodes
        #[arg(required = true)]
        input: PathBuf,

        /// Save encoded files to this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Encode preset directory
        #[arg(short, long)]
        preset: Option<PathBuf>,

        /// Only keep these stream indexes (comma separated)
        #[arg(long, value_delimiter = ',')]
        streams: Option<Vec<u32>>,

        /// ffmpeg executable location
        #[arg(long)]
        ffmpeg: Option<PathBuf>,

        /// ffprobe executable location
        #[arg(long)]
        ffprobe: Option<PathBuf>,

        /// Do not verify source CRC checksum
        #[arg(long)]
        no_verify_source: bool,

        /// Display ffmpeg output
        #[arg(long)]
        ffmpeg_verbose: bool,

        /// Print the ffmpeg commands without encoding
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse release filenames and display extracted metadata
    Parse {
        /// File names to parse
        #[arg(required = true)]
        names: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe a media file and display its stream catalog
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load an encode preset directory and display it
    Preset {
        /// Preset directory
        #[arg(required = true)]
        dir: PathBuf,
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
