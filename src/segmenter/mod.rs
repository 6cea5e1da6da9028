//! Video segmentation.
//!
//! Splits a video into fixed-length clips without re-encoding by driving
//! ffmpeg's segment muxer, then reconciles the files it left behind.

mod ffmpeg;
mod output;
mod probe;

pub use ffmpeg::FfmpegSegmenter;
pub use output::{clear_clips, discover_clips, remove_outputs, CLIP_EXTENSION, CLIP_PREFIX};
pub use probe::{parse_probe_output, VideoInfo};

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Shortest clip length a user may ask for.
pub const MIN_SEGMENT_SECONDS: i64 = 1;
/// Longest clip length a user may ask for (one hour).
pub const MAX_SEGMENT_SECONDS: i64 = 3600;

/// A validated clip length in whole seconds, always within
/// `MIN_SEGMENT_SECONDS..=MAX_SEGMENT_SECONDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentDuration(u32);

/// Why a clip length was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationError {
    /// The text is not an integer.
    NotANumber,
    /// Zero or negative.
    NotPositive,
    /// Positive but below the configured minimum.
    TooShort,
    /// Above the configured maximum.
    TooLong,
}

impl std::fmt::Display for DurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationError::NotANumber => write!(f, "duration is not a whole number"),
            DurationError::NotPositive => write!(f, "duration must be positive"),
            DurationError::TooShort => write!(f, "duration is below the minimum"),
            DurationError::TooLong => write!(f, "duration is above the maximum"),
        }
    }
}

impl std::error::Error for DurationError {}

impl SegmentDuration {
    /// Validate a number of seconds against the hard limits.
    pub fn new(seconds: i64) -> std::result::Result<Self, DurationError> {
        if seconds < MIN_SEGMENT_SECONDS {
            Err(DurationError::NotPositive)
        } else if seconds > MAX_SEGMENT_SECONDS {
            Err(DurationError::TooLong)
        } else {
            Ok(Self(seconds as u32))
        }
    }

    pub fn seconds(self) -> u32 {
        self.0
    }
}

/// The configured range of accepted clip lengths.
///
/// Always a non-empty range inside `MIN_SEGMENT_SECONDS..=MAX_SEGMENT_SECONDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentBounds {
    min: u32,
    max: u32,
}

impl SegmentBounds {
    /// Clamps both ends into the hard limits; an inverted range collapses to `min`.
    pub fn new(min: i64, max: i64) -> Self {
        let min = min.clamp(MIN_SEGMENT_SECONDS, MAX_SEGMENT_SECONDS);
        let max = max.clamp(min, MAX_SEGMENT_SECONDS);
        Self {
            min: min as u32,
            max: max as u32,
        }
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Parse user text (surrounding whitespace ignored) into a clip length in range.
    pub fn parse(&self, text: &str) -> std::result::Result<SegmentDuration, DurationError> {
        let trimmed = text.trim();
        let seconds = match trimmed.parse::<i64>() {
            Ok(n) => n,
            // Digit strings too large for i64 are still numbers, just long ones.
            Err(_) if is_integer_literal(trimmed) => {
                return Err(if trimmed.starts_with('-') {
                    DurationError::NotPositive
                } else {
                    DurationError::TooLong
                });
            }
            Err(_) => return Err(DurationError::NotANumber),
        };

        if seconds < MIN_SEGMENT_SECONDS {
            Err(DurationError::NotPositive)
        } else if seconds < self.min as i64 {
            Err(DurationError::TooShort)
        } else if seconds > self.max as i64 {
            Err(DurationError::TooLong)
        } else {
            Ok(SegmentDuration(seconds as u32))
        }
    }
}

impl Default for SegmentBounds {
    fn default() -> Self {
        Self::new(MIN_SEGMENT_SECONDS, MAX_SEGMENT_SECONDS)
    }
}

impl std::str::FromStr for SegmentDuration {
    type Err = DurationError;

    /// Parses against the hard limits.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SegmentBounds::default().parse(s)
    }
}

impl std::fmt::Display for SegmentDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Number of clips a video of `duration_seconds` yields; a partial tail counts as a clip.
pub fn estimate_clip_count(duration_seconds: f64, segment: SegmentDuration) -> u64 {
    if duration_seconds <= 0.0 {
        return 0;
    }
    (duration_seconds / segment.seconds() as f64).ceil() as u64
}

/// Trait for segmentation backends.
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Split `input` into clips of `segment` length inside `output_dir`.
    ///
    /// Returns the non-empty clip files in segment order. Ownership of the
    /// files passes to the caller.
    async fn split(
        &self,
        input: &Path,
        output_dir: &Path,
        segment: SegmentDuration,
    ) -> Result<Vec<PathBuf>>;

    /// Read container and stream metadata.
    async fn probe(&self, input: &Path) -> Result<VideoInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_valid_duration_parses() {
        for n in MIN_SEGMENT_SECONDS..=MAX_SEGMENT_SECONDS {
            let parsed: SegmentDuration = n.to_string().parse().unwrap();
            assert_eq!(parsed.seconds() as i64, n);
        }
    }

    #[test]
    fn test_rejections_are_distinct() {
        assert_eq!("0".parse::<SegmentDuration>(), Err(DurationError::NotPositive));
        assert_eq!("-5".parse::<SegmentDuration>(), Err(DurationError::NotPositive));
        assert_eq!("3601".parse::<SegmentDuration>(), Err(DurationError::TooLong));
        assert_eq!("99999999999999999999".parse::<SegmentDuration>(), Err(DurationError::TooLong));
        assert_eq!("-99999999999999999999".parse::<SegmentDuration>(), Err(DurationError::NotPositive));
        assert_eq!("abc".parse::<SegmentDuration>(), Err(DurationError::NotANumber));
        assert_eq!("1.5".parse::<SegmentDuration>(), Err(DurationError::NotANumber));
        assert_eq!("".parse::<SegmentDuration>(), Err(DurationError::NotANumber));
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert_eq!(" 60\n".parse::<SegmentDuration>().unwrap().seconds(), 60);
    }

    #[test]
    fn test_configured_bounds() {
        let bounds = SegmentBounds::new(10, 120);
        assert_eq!(bounds.parse("5"), Err(DurationError::TooShort));
        assert_eq!(bounds.parse("0"), Err(DurationError::NotPositive));
        assert_eq!(bounds.parse("121"), Err(DurationError::TooLong));
        assert_eq!(bounds.parse("10").unwrap().seconds(), 10);
        assert_eq!(bounds.parse("120").unwrap().seconds(), 120);
    }

    #[test]
    fn test_bounds_stay_inside_hard_limits() {
        let wide = SegmentBounds::new(-3, 99_999);
        assert_eq!((wide.min(), wide.max()), (1, 3600));
        assert_eq!(wide, SegmentBounds::default());

        let inverted = SegmentBounds::new(300, 60);
        assert_eq!((inverted.min(), inverted.max()), (300, 300));
    }

    #[test]
    fn test_estimate_clip_count() {
        let minute = SegmentDuration::new(60).unwrap();
        assert_eq!(estimate_clip_count(130.0, minute), 3);
        assert_eq!(estimate_clip_count(120.0, minute), 2);
        assert_eq!(estimate_clip_count(0.5, minute), 1);
        assert_eq!(estimate_clip_count(0.0, minute), 0);
    }
}
