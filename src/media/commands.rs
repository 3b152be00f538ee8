use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::MediaConfig;
use crate::pipeline::{AudioFormat, EnhanceOptions};

/// Why one transcoder process did not produce its output
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("{description} exited with {status}: {stderr}")]
    Exit {
        description: String,
        status: String,
        stderr: String,
    },

    #[error("{description} timed out after {timeout:?}")]
    Timeout { description: String, timeout: Duration },
}

/// Abstract media processing command representation
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn map<S: Into<String>>(self, selector: S) -> Self {
        self.arg("-map").arg(selector)
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Keep only the first `secs` seconds of output
    pub fn duration(self, secs: u32) -> Self {
        self.arg("-t").arg(secs.to_string())
    }

    /// Stop at the end of the shortest input stream
    pub fn shortest(self) -> Self {
        self.arg("-shortest")
    }

    /// Run to completion, killing the child if it outlives `timeout`
    pub async fn execute(&self, timeout: Duration) -> Result<(), CommandError> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| CommandError::Spawn {
            binary: self.binary_path.clone(),
            source,
        })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| CommandError::Spawn {
                binary: self.binary_path.clone(),
                source,
            })?,
            Err(_) => {
                return Err(CommandError::Timeout {
                    description: self.description.clone(),
                    timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CommandError::Exit {
                description: self.description.clone(),
                status: output.status.to_string(),
                stderr: tail_lines(&stderr, 20),
            });
        }

        Ok(())
    }

    /// Run and capture stdout, for query commands such as `-version` or ffprobe
    pub async fn capture(&self, timeout: Duration) -> Result<String, CommandError> {
        debug!("Capturing media processing command: {} {:?}", self.binary_path, self.args);

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| CommandError::Spawn {
                binary: self.binary_path.clone(),
                source,
            })?,
            Err(_) => {
                return Err(CommandError::Timeout {
                    description: self.description.clone(),
                    timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(CommandError::Exit {
                description: self.description.clone(),
                status: output.status.to_string(),
                stderr: tail_lines(&String::from_utf8_lossy(&output.stderr), 20),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

// ffmpeg prints its banner and stream table before the actual error.
fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

/// Builder for the pipeline's transcoder invocations
pub struct MediaCommandBuilder {
    config: MediaConfig,
}

impl MediaCommandBuilder {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    fn base<S: Into<String>>(&self, description: S) -> MediaCommand {
        MediaCommand::new(&self.config.binary_path, description)
            .overwrite()
            .args(["-hide_banner", "-loglevel", "error"])
    }

    fn encode_video(&self, cmd: MediaCommand) -> MediaCommand {
        cmd.video_codec(&self.config.video_codec)
            .arg("-preset")
            .arg(&self.config.preset)
            .arg("-crf")
            .arg(self.config.crf.to_string())
    }

    /// Filter chain + full re-encode
    pub fn enhance<P: AsRef<Path>>(&self, input: P, output: P, options: &EnhanceOptions) -> MediaCommand {
        let mut cmd = self
            .base("Video enhancement")
            .input(input)
            .map("0:v:0")
            .map("0:a?");

        if let Some(chain) = options.filter_chain() {
            cmd = cmd.video_filter(chain);
        }

        self.encode_video(cmd)
            .audio_codec(&self.config.audio_codec)
            .audio_bitrate(&self.config.audio_bitrate)
            .output(output)
    }

    pub fn extract_audio<P: AsRef<Path>>(&self, input: P, output: P, format: AudioFormat) -> MediaCommand {
        self.base("Audio extraction")
            .input(input)
            .no_video()
            .audio_codec(format.encoder())
            .audio_bitrate(&self.config.audio_bitrate)
            .output(output)
    }

    /// First `duration_secs` seconds, re-encoded
    pub fn create_short<P: AsRef<Path>>(&self, input: P, output: P, duration_secs: u32) -> MediaCommand {
        let cmd = self
            .base(format!("Short clip ({}s)", duration_secs))
            .input(input)
            .duration(duration_secs)
            .map("0:v:0")
            .map("0:a?");

        self.encode_video(cmd)
            .audio_codec(&self.config.audio_codec)
            .audio_bitrate(&self.config.audio_bitrate)
            .output(output)
    }

    /// Video stream copied, audio stream taken from `audio` and re-encoded
    /// with an encoder the output container accepts
    pub fn replace_audio<P: AsRef<Path>>(&self, video: P, audio: P, output: P) -> MediaCommand {
        let audio_codec = self.muxed_audio_codec(output.as_ref());
        self.base("Audio replacement")
            .input(video)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .copy_video()
            .audio_codec(audio_codec)
            .audio_bitrate(&self.config.audio_bitrate)
            .shortest()
            .output(output)
    }

    // WebM and Ogg only carry Vorbis or Opus audio.
    fn muxed_audio_codec(&self, output: &Path) -> &str {
        let extension = output
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "webm" | "ogg" | "ogv" => "libopus",
            _ => &self.config.audio_codec,
        }
    }

    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.config.binary_path, "Version check").arg("-version")
    }

    /// ffprobe query returning format and stream details as JSON
    pub fn probe<P: AsRef<Path>>(&self, input: P) -> MediaCommand {
        MediaCommand::new(&self.config.probe_binary_path, "Media probe")
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(input.as_ref().to_string_lossy().to_string())
    }
}
