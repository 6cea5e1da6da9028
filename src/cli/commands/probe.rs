//! Probe command - show what a split would do.

use crate::cli::preflight::{self, Operation};
use crate::cli::{format_bytes, format_duration, Output};
use crate::config::Settings;
use crate::delivery::Surface;
use crate::segmenter::{estimate_clip_count, FfmpegSegmenter, Segmenter};
use anyhow::{Context, Result};
use std::path::Path;

pub async fn run_probe(input: &Path, duration: Option<&str>, settings: Settings) -> Result<()> {
    let segment = duration
        .map(|d| {
            settings
                .segment_bounds()
                .parse(d)
                .with_context(|| format!("Invalid clip duration {:?}", d))
        })
        .transpose()?;
    preflight::check(Operation::Probe, &settings)?;

    let segmenter = FfmpegSegmenter::from_settings(&settings.processing);
    let info = segmenter.probe(input).await?;

    Output::header(&input.display().to_string());
    Output::kv("Duration", &format_duration(info.duration_seconds));
    Output::kv("Resolution", &format!("{}x{}", info.width, info.height));
    Output::kv("Codec", &info.codec);
    if let Some(fps) = info.fps {
        Output::kv("Frame rate", &format!("{:.2} fps", fps));
    }
    if let Some(bit_rate) = info.bit_rate {
        Output::kv("Bit rate", &format!("{} kb/s", bit_rate / 1000));
    }

    let surface = settings.surface();
    if let Some(size) = info.size_bytes {
        Output::kv("Size", &format_bytes(size));
        report_fit(size, &surface);
    }

    if let Some(segment) = segment {
        Output::kv(
            "Clips",
            &format!(
                "{} of {}",
                estimate_clip_count(info.duration_seconds, segment),
                segment
            ),
        );
    }

    Ok(())
}

fn report_fit(size: u64, surface: &Surface) {
    if surface.accepts(size) {
        Output::success(&format!("Accepted on the {} surface", surface.kind()));
    } else {
        Output::warning(&format!(
            "Too large for the {} surface (limit {})",
            surface.kind(),
            format_bytes(surface.max_upload_bytes())
        ));
    }
}
