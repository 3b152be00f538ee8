use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline over one video and print the manifest as JSON
    Process {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Steps to run (comma-separated): enhance, remove_watermark,
        /// extract_audio, create_short, replace_audio
        #[arg(
            short,
            long,
            value_delimiter = ',',
            default_value = "enhance,remove_watermark,extract_audio,create_short"
        )]
        steps: Vec<String>,

        /// Replacement audio for replace_audio
        #[arg(long)]
        voice: Option<PathBuf>,

        /// Length of the short clip in seconds
        #[arg(long)]
        short_duration: Option<u32>,

        /// Codec family for the extracted audio (mp3, aac)
        #[arg(long)]
        audio_format: Option<String>,

        /// Skip the noise-reduction filter
        #[arg(long)]
        no_denoise: bool,

        /// Skip the sharpening filter
        #[arg(long)]
        no_sharpen: bool,

        /// Skip the color-balance filter
        #[arg(long)]
        no_color_correct: bool,
    },

    /// Delete files older than the retention age from the output and temp directories
    Clean {
        /// Age in seconds (default: storage.max_file_age_secs)
        #[arg(long)]
        max_age_secs: Option<u64>,
    },

    /// Verify that the transcoder can be executed
    Check,

    /// Print duration and stream layout of a media file
    Probe {
        /// Media file to inspect
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "vidpipe.toml")]
        output: PathBuf,
    },
}
