//! ffmpeg-backed segmenter.

use super::output::{clear_clips, discover_clips, output_pattern};
use super::probe::{parse_probe_output, VideoInfo};
use super::{SegmentDuration, Segmenter};
use crate::config::ProcessingSettings;
use crate::error::{ClipperError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

/// Upper bound for a metadata query.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Splits videos with ffmpeg's segment muxer in stream-copy mode.
#[derive(Debug, Clone)]
pub struct FfmpegSegmenter {
    ffmpeg: String,
    ffprobe: String,
    timeout: Duration,
}

impl FfmpegSegmenter {
    /// Create a segmenter using the given executables.
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    /// Create a segmenter from processing settings.
    pub fn from_settings(settings: &ProcessingSettings) -> Self {
        Self::new(
            &settings.ffmpeg_path,
            &settings.ffprobe_path,
            Duration::from_secs(settings.split_timeout_seconds),
        )
    }

    /// Command-line arguments for one split run.
    pub(crate) fn split_args(input: &Path, output_dir: &Path, segment: SegmentDuration) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());
        for arg in [
            "-map", "0",
            "-c", "copy",
            "-f", "segment",
            "-segment_time", &segment.seconds().to_string(),
            "-reset_timestamps", "1",
            "-avoid_negative_ts", "make_zero",
        ] {
            args.push(OsString::from(arg));
        }
        args.push(output_pattern(output_dir).into_os_string());
        args
    }

    /// Runs an external tool with a deadline. The child is killed if the deadline passes.
    async fn run_tool(
        program: &str,
        args: &[OsString],
        timeout: Duration,
        operation: &'static str,
    ) -> Result<Output> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ClipperError::ToolNotFound(program.to_string()))
            }
            Ok(Err(e)) => Err(ClipperError::ToolFailed(format!("{} execution failed: {}", program, e))),
            Err(_) => Err(ClipperError::Timeout {
                operation,
                seconds: timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl Segmenter for FfmpegSegmenter {
    #[instrument(skip(self))]
    async fn split(
        &self,
        input: &Path,
        output_dir: &Path,
        segment: SegmentDuration,
    ) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(output_dir).await?;
        // Leftovers from an interrupted run must not be mistaken for new clips.
        clear_clips(output_dir).await?;

        // Best-effort: a source shorter than one segment would only be copied whole.
        match self.probe(input).await {
            Ok(info) if info.duration_seconds < segment.seconds() as f64 => {
                return Err(ClipperError::NoClips(format!(
                    "The video ({:.1}s) is shorter than the clip duration ({}).",
                    info.duration_seconds, segment
                )));
            }
            Ok(info) => debug!("Source duration {:.1}s", info.duration_seconds),
            Err(e) => warn!("Probe before split failed, continuing: {}", e),
        }

        let args = Self::split_args(input, output_dir, segment);
        info!("Splitting {:?} into {:?}", input, output_dir);
        debug!("ffmpeg args: {:?}", args);

        let output = Self::run_tool(&self.ffmpeg, &args, self.timeout, "Video splitting").await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = if stderr.trim().is_empty() {
                "Unknown FFmpeg error".to_string()
            } else {
                stderr.trim().to_string()
            };
            error!("ffmpeg failed with {}: {}", output.status, diagnostic);
            return Err(ClipperError::ToolFailed(diagnostic));
        }

        let clips = discover_clips(output_dir).await?;
        info!("Created {} clips", clips.len());

        if clips.is_empty() {
            return Err(ClipperError::NoClips(
                "The video might be shorter than the segment duration.".into(),
            ));
        }

        Ok(clips)
    }

    #[instrument(skip(self))]
    async fn probe(&self, input: &Path) -> Result<VideoInfo> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "quiet".into(),
            "-print_format".into(),
            "json".into(),
            "-show_format".into(),
            "-show_streams".into(),
            input.as_os_str().to_owned(),
        ];

        let output = Self::run_tool(&self.ffprobe, &args, PROBE_TIMEOUT, "Video probing").await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClipperError::ToolFailed(format!(
                "ffprobe failed on {}: {}",
                input.display(),
                stderr.trim()
            )));
        }

        let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!("Video info: {:?}", info);
        Ok(info)
    }
}
