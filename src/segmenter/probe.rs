//! ffprobe metadata parsing.

use crate::error::{ClipperError, Result};
use serde::{Deserialize, Serialize};

/// Metadata of a video file as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Container duration in seconds.
    pub duration_seconds: f64,
    /// Container size in bytes.
    pub size_bytes: Option<u64>,
    /// Overall bit rate in bits per second.
    pub bit_rate: Option<u64>,
    pub width: u32,
    pub height: u32,
    /// Frames per second of the first video stream.
    pub fps: Option<f64>,
    /// Codec of the first video stream.
    pub codec: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// Parse the JSON printed by `ffprobe -print_format json -show_format -show_streams`.
pub fn parse_probe_output(json: &str) -> Result<VideoInfo> {
    let parsed: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| ClipperError::ToolFailed(format!("Invalid ffprobe output: {}", e)))?;

    let format = parsed
        .format
        .ok_or_else(|| ClipperError::ToolFailed("ffprobe reported no format section".into()))?;

    let duration_seconds = format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| ClipperError::ToolFailed("Could not determine video duration".into()))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ClipperError::InvalidInput("No video stream found".into()))?;

    Ok(VideoInfo {
        duration_seconds,
        size_bytes: format.size.as_deref().and_then(|s| s.parse().ok()),
        bit_rate: format.bit_rate.as_deref().and_then(|s| s.parse().ok()),
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        fps: video.r_frame_rate.as_deref().and_then(parse_frame_rate),
        codec: video.codec_name.clone().unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Evaluates rates like `30000/1001` or `25`.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => rate.trim().parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "aac", "codec_type": "audio", "r_frame_rate": "0/0"},
            {"index": 1, "codec_name": "h264", "codec_type": "video", "width": 1280, "height": 720, "r_frame_rate": "30000/1001"}
        ],
        "format": {"filename": "in.mp4", "duration": "130.040000", "size": "5242880", "bit_rate": "322560"}
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(SAMPLE).unwrap();
        assert!((info.duration_seconds - 130.04).abs() < 1e-9);
        assert_eq!(info.size_bytes, Some(5_242_880));
        assert_eq!(info.bit_rate, Some(322_560));
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.codec, "h264");
        assert!((info.fps.unwrap() - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_audio_only_is_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "mp3"}], "format": {"duration": "10.0"}}"#;
        assert!(matches!(parse_probe_output(json), Err(ClipperError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_duration_is_error() {
        let json = r#"{"streams": [{"codec_type": "video"}], "format": {}}"#;
        assert!(parse_probe_output(json).is_err());
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("n/a"), None);
    }
}
