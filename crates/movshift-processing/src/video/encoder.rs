//! The encoder seam and its ffmpeg implementation.

use crate::video::progress::{ProgressObserver, ProgressUpdate};
use async_trait::async_trait;
use movshift_core::{Config, EncoderConfig};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

static DURATION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").ok());

/// Result of one encoder run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeOutcome {
    Succeeded { output: PathBuf },
    Failed { message: String },
}

impl EncodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EncodeOutcome::Succeeded { .. })
    }
}

/// Converts one source file into one output file.
///
/// Failures are reported as [`EncodeOutcome::Failed`], carrying the encoder's
/// own message.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        progress: &dyn ProgressObserver,
    ) -> EncodeOutcome;
}

/// Encoder backed by the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.encoder().clone())
    }

    /// Full argument list for one conversion, progress reporting included.
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            self.config.video_codec.clone(),
            "-preset".to_string(),
            self.config.preset.clone(),
            "-crf".to_string(),
            self.config.crf.to_string(),
            "-c:a".to_string(),
            self.config.audio_codec.clone(),
            "-b:a".to_string(),
            self.config.audio_bitrate.clone(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    #[tracing::instrument(skip(self, progress), fields(input = %input.display(), output = %output.display()))]
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        progress: &dyn ProgressObserver,
    ) -> EncodeOutcome {
        let start = Instant::now();
        let args = self.build_args(input, output);

        let mut child = match Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return EncodeOutcome::Failed {
                    message: format!("Failed to start {}: {}", self.config.ffmpeg_path, e),
                }
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return EncodeOutcome::Failed {
                message: "ffmpeg output pipes unavailable".to_string(),
            };
        };

        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut parser = ProgressParser::default();
        let mut last_error_line: Option<String> = None;

        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        if let Some(update) = parser.feed_progress_line(&line) {
                            progress.on_progress(&update);
                        }
                    }
                    _ => stdout_open = false,
                },
                line = stderr.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => {
                        parser.feed_log_line(&line);
                        let trimmed = line.trim();
                        if !trimmed.is_empty() {
                            last_error_line = Some(trimmed.to_string());
                        }
                    }
                    _ => stderr_open = false,
                },
            }
        }

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                return EncodeOutcome::Failed {
                    message: format!("Failed to wait for ffmpeg: {}", e),
                }
            }
        };

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        if status.success() {
            tracing::debug!(duration_ms = duration_ms, "ffmpeg finished");
            EncodeOutcome::Succeeded {
                output: output.to_path_buf(),
            }
        } else {
            let message = last_error_line
                .unwrap_or_else(|| format!("ffmpeg exited with {}", status));
            tracing::debug!(
                duration_ms = duration_ms,
                status = %status,
                message = %message,
                "ffmpeg failed"
            );
            EncodeOutcome::Failed { message }
        }
    }
}

/// Incremental parser for ffmpeg's `-progress` key/value stream.
///
/// The total duration comes from the `Duration:` line ffmpeg logs on stderr;
/// without it samples carry no percentage.
#[derive(Debug, Default)]
struct ProgressParser {
    total: Option<Duration>,
    out_time: Duration,
}

impl ProgressParser {
    fn feed_log_line(&mut self, line: &str) {
        if self.total.is_none() {
            self.total = parse_duration_line(line);
        }
    }

    /// Consume one stdout line; a `progress=` line closes a sample.
    fn feed_progress_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // Despite the name, ffmpeg writes microseconds to both of these.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<u64>() {
                    self.out_time = Duration::from_micros(us);
                }
                None
            }
            "out_time" => {
                if let Some(t) = parse_timestamp(value) {
                    self.out_time = t;
                }
                None
            }
            "progress" => {
                let done = value == "end";
                let percent = self.total.filter(|t| !t.is_zero()).map(|total| {
                    let ratio = self.out_time.as_secs_f64() / total.as_secs_f64();
                    (ratio * 100.0).clamp(0.0, 100.0) as f32
                });
                Some(ProgressUpdate {
                    out_time: self.out_time,
                    percent: if done { Some(100.0) } else { percent },
                    done,
                })
            }
            _ => None,
        }
    }
}

fn parse_duration_line(line: &str) -> Option<Duration> {
    let caps = DURATION_RE.as_ref()?.captures(line)?;
    let hours: u64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: u64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(Duration::from_secs(hours * 3600 + minutes * 60) + Duration::from_secs_f64(seconds))
}

/// Parse `HH:MM:SS.ffffff`; ffmpeg prints `N/A` before the first frame.
fn parse_timestamp(value: &str) -> Option<Duration> {
    let mut parts = value.trim().splitn(3, ':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + minutes * 60) + Duration::from_secs_f64(seconds))
}
