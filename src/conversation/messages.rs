//! User-facing message texts.

use super::pipeline::RunReport;
use crate::delivery::Surface;
use crate::segmenter::{DurationError, SegmentBounds, SegmentDuration};
use crate::session::PendingVideo;

/// Button that starts the clip flow.
pub const CLIP_BUTTON_ID: &str = "start_clip";
pub const ABOUT_BUTTON_ID: &str = "about";
pub const SETTINGS_BUTTON_ID: &str = "settings";

pub const CLIP_BUTTON_LABEL: &str = "🎬 Create Clips";
pub const ABOUT_BUTTON_LABEL: &str = "ℹ️ About";
pub const SETTINGS_BUTTON_LABEL: &str = "⚙️ Settings";

const PROCESSING_HEADER: &str = "🔄 Processing your video...";

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn limit_line(surface: &Surface) -> String {
    if surface.enforces_upload_limit() {
        format!("up to {:.0} MB", megabytes(surface.max_upload_bytes()))
    } else {
        "large files supported".to_string()
    }
}

pub fn welcome(surface: &Surface) -> String {
    format!(
        "🎬 Welcome to the Video Splitter Bot!\n\n\
         I split your videos into smaller clips. Here's how:\n\n\
         1. Send me a video file ({})\n\
         2. Tap \"{}\" or use /clip\n\
         3. Tell me how long each clip should be (in seconds)\n\
         4. I'll split the video and send you the clips\n\n\
         Clips keep the original quality: nothing is re-encoded.",
        limit_line(surface),
        CLIP_BUTTON_LABEL
    )
}

pub fn about(surface: &Surface) -> String {
    format!(
        "ℹ️ About\n\n\
         This bot cuts long videos into fixed-length clips without re-encoding, \
         so every clip keeps the original resolution and quality.\n\n\
         Uploads: {}\n\
         Version: {}",
        limit_line(surface),
        env!("CARGO_PKG_VERSION")
    )
}

pub fn settings(surface: &Surface, bounds: &SegmentBounds) -> String {
    format!(
        "⚙️ Settings\n\n\
         Surface: {}\n\
         Max file size: {}\n\
         Clip length: {} to {} seconds\n\
         Processing mode: fast (stream copy)\n\
         Auto-cleanup: enabled",
        surface.kind(),
        limit_line(surface),
        bounds.min(),
        bounds.max()
    )
}

pub fn video_received(video: &PendingVideo, replaced_request: bool) -> String {
    let mut text = String::new();
    if replaced_request {
        text.push_str("♻️ Your previous clip request was discarded in favour of this video.\n\n");
    }
    text.push_str(&format!(
        "📹 Video received!\n\n\
         📁 Size: {}\n\
         ⏱️ Duration: {:02}:{:02}\n\
         📱 Resolution: {}x{}\n\n\
         Ready to split your video! Tap the button below or use /clip to continue.",
        video
            .size_bytes
            .map(|b| format!("{:.1} MB", megabytes(b)))
            .unwrap_or_else(|| "unknown".to_string()),
        video.duration_seconds / 60,
        video.duration_seconds % 60,
        video.width,
        video.height
    ));
    text
}

pub fn too_large(size_bytes: u64, surface: &Surface) -> String {
    format!(
        "❌ File too large!\n\n\
         Your file: {:.1} MB\n\
         Maximum allowed: {:.0} MB\n\n\
         Please send a smaller file.",
        megabytes(size_bytes),
        megabytes(surface.max_upload_bytes())
    )
}

pub fn ask_duration() -> String {
    "⏱️ Clip duration\n\n\
     How long should each clip be? Send me the duration in seconds.\n\n\
     Examples:\n\
     • 30 - 30 second clips\n\
     • 60 - 1 minute clips\n\
     • 120 - 2 minute clips\n\
     • 300 - 5 minute clips"
        .to_string()
}

pub const SEND_VIDEO_FIRST: &str = "❌ Please send a video first!";

pub const NOT_UNDERSTOOD: &str = "❌ I don't understand. Please send a video or use /start!";

pub fn duration_error(err: DurationError, bounds: &SegmentBounds) -> String {
    match err {
        DurationError::NotANumber => "❌ Please enter a valid number for the duration!".to_string(),
        DurationError::NotPositive => "❌ Duration must be a positive number!".to_string(),
        DurationError::TooShort => format!(
            "❌ Duration too short! Minimum is {} seconds.",
            bounds.min()
        ),
        DurationError::TooLong => format!(
            "❌ Duration too long! Maximum is {} seconds.",
            bounds.max()
        ),
    }
}

pub fn status_downloading() -> String {
    format!("{}\n\n⏳ Downloading video...", PROCESSING_HEADER)
}

pub fn status_splitting() -> String {
    format!("{}\n\n✅ Download complete\n⏳ Splitting video...", PROCESSING_HEADER)
}

pub fn status_uploading(sent: usize, total: usize) -> String {
    let progress = if sent == 0 {
        "⏳ Uploading clips...".to_string()
    } else {
        format!("⏳ Uploading clips... ({}/{})", sent, total)
    };
    format!(
        "{}\n\n✅ Download complete\n✅ Video split complete\n{}",
        PROCESSING_HEADER, progress
    )
}

pub fn clip_caption(index: usize, total: usize, segment: SegmentDuration) -> String {
    format!("📹 Clip {}/{} ({}s each)", index, total, segment.seconds())
}

pub fn clip_failed(index: usize, reason: &str) -> String {
    format!("❌ Failed to upload clip {}: {}", index, reason)
}

pub fn complete(report: &RunReport) -> String {
    if report.failed == 0 {
        format!(
            "✅ Processing complete!\n\n📹 {} clips sent successfully!",
            report.delivered
        )
    } else {
        format!(
            "✅ Processing complete!\n\n📹 {} of {} clips sent, {} failed.",
            report.delivered, report.total, report.failed
        )
    }
}

pub fn failed(reason: &str) -> String {
    format!("❌ Processing failed!\n\nError: {}", reason)
}
