//! vidpipe - Job-oriented video transformation pipeline
//!
//! Command-line entry point: loads configuration, sets up logging and runs
//! one pipeline job or a maintenance command.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vidpipe::cli::{Args, Commands};
use vidpipe::config::Config;
use vidpipe::media::{FfmpegTranscoder, TranscoderFactory};
use vidpipe::pipeline::{AudioFormat, EnhanceOptions, JobRequest, PipelineRunner, StepParams};
use vidpipe::retention::sweep_expired;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("vidpipe.toml").exists() {
                Config::from_file("vidpipe.toml")?
            } else {
                Config::default()
            }
        }
    };

    setup_logging(&config.storage.log_dir, args.verbose)?;
    info!("Starting vidpipe");

    match args.command {
        Commands::Process {
            input,
            steps,
            voice,
            short_duration,
            audio_format,
            no_denoise,
            no_sharpen,
            no_color_correct,
        } => {
            let audio_format = audio_format
                .as_deref()
                .map(str::parse::<AudioFormat>)
                .transpose()?;

            let transcoder = TranscoderFactory::create_transcoder(config.media.clone());
            transcoder.check_availability().await?;

            let runner = PipelineRunner::new(config, transcoder);
            let request = JobRequest {
                input,
                steps,
                params: StepParams {
                    enhance: EnhanceOptions {
                        denoise: !no_denoise,
                        sharpen: !no_sharpen,
                        color_correct: !no_color_correct,
                    },
                    audio_format,
                    short_duration_secs: short_duration,
                    voice,
                },
            };

            let manifest = runner.run(&request).await?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        Commands::Clean { max_age_secs } => {
            let max_age =
                Duration::from_secs(max_age_secs.unwrap_or(config.storage.max_file_age_secs));
            let removed = sweep_expired(
                &[config.storage.output_dir.clone(), config.storage.temp_dir.clone()],
                max_age,
            );
            println!("Removed {} file(s) older than {}s", removed, max_age.as_secs());
        }
        Commands::Check => {
            let transcoder = TranscoderFactory::create_transcoder(config.media.clone());
            transcoder.check_availability().await?;
            println!("{}", transcoder.version_info().await?);
        }
        Commands::Probe { input } => {
            let info = FfmpegTranscoder::new(config.media.clone())
                .probe()
                .inspect(&input)
                .await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::InitConfig { output } => {
            config.save_to_file(&output)?;
            println!("Wrote configuration to {}", output.display());
        }
    }

    Ok(())
}

fn setup_logging(log_dir: &Path, verbose: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(log_dir, "vidpipe.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console goes to stderr so `process` output stays valid JSON on stdout
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("vidpipe.log").display()
    );

    Ok(())
}
