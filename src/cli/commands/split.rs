//! Split command - run the segmenter on a local file.

use crate::cli::preflight::{self, Operation};
use crate::cli::{format_duration, Output};
use crate::config::Settings;
use crate::segmenter::{estimate_clip_count, FfmpegSegmenter, SegmentDuration, Segmenter};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Split `input` into clips of `duration` seconds.
pub async fn run_split(
    input: &Path,
    duration: &str,
    output: Option<PathBuf>,
    settings: Settings,
) -> Result<()> {
    let segment: SegmentDuration = settings
        .segment_bounds()
        .parse(duration)
        .with_context(|| format!("Invalid clip duration {:?}", duration))?;
    if !input.is_file() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    preflight::check(Operation::Split, &settings)?;

    let output_dir = output.unwrap_or_else(|| default_output_dir(&settings, input));
    let segmenter = FfmpegSegmenter::from_settings(&settings.processing);

    Output::header("Splitting video");
    Output::kv("Input", &input.display().to_string());
    Output::kv("Output", &output_dir.display().to_string());
    Output::kv("Clip length", &segment.to_string());

    if let Ok(info) = segmenter.probe(input).await {
        Output::kv(
            "Expected clips",
            &format!(
                "{} ({} source)",
                estimate_clip_count(info.duration_seconds, segment),
                format_duration(info.duration_seconds)
            ),
        );
    }
    println!();

    let spinner = Output::spinner("Running ffmpeg...");
    let result = segmenter.split(input, &output_dir, segment).await;
    spinner.finish_and_clear();
    let clips = result?;

    let total = clips.len();
    for (i, clip) in clips.iter().enumerate() {
        let size = std::fs::metadata(clip).map(|m| m.len()).unwrap_or(0);
        Output::clip(i + 1, total, clip, size);
    }
    println!();
    Output::success(&format!("Created {} clips in {}", total, output_dir.display()));

    Ok(())
}

/// `<clips_dir>/<input stem>`.
fn default_output_dir(settings: &Settings, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clips".to_string());
    settings.clips_dir().join(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_dir_uses_stem() {
        let settings = Settings::default();
        let dir = default_output_dir(&settings, Path::new("/videos/holiday.final.mp4"));
        assert_eq!(dir, settings.clips_dir().join("holiday.final"));
    }

    #[tokio::test]
    async fn test_rejects_bad_duration_before_touching_files() {
        let err = run_split(Path::new("missing.mp4"), "abc", None, Settings::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid clip duration"));
    }
}
