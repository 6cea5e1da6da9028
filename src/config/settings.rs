//! Configuration settings for Clipbot.

use crate::delivery::Surface;
use crate::segmenter::{SegmentBounds, MAX_SEGMENT_SECONDS, MIN_SEGMENT_SECONDS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that overrides `telegram.bot_token`.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub telegram: TelegramSettings,
    pub surface: SurfaceSettings,
    pub processing: ProcessingSettings,
    pub sessions: SessionSettings,
    pub server: ServerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for downloaded input videos.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: "/tmp/clipbot".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Bot token. `TELEGRAM_BOT_TOKEN` takes precedence when set.
    pub bot_token: Option<String>,
    /// Bot API base URL. Point this at a self-hosted server for the large surface.
    pub api_base_url: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_seconds: u64,
    /// Timeout for ordinary API requests.
    pub request_timeout_seconds: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: "https://api.telegram.org".to_string(),
            poll_timeout_seconds: 30,
            request_timeout_seconds: 60,
        }
    }
}

/// Which delivery surface the bot runs as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    /// Public Bot API, small uploads only.
    #[default]
    Standard,
    /// Self-hosted Bot API server, large uploads.
    Large,
}

impl std::str::FromStr for SurfaceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "a" => Ok(SurfaceKind::Standard),
            "large" | "b" => Ok(SurfaceKind::Large),
            _ => Err(format!("Unknown surface: {}", s)),
        }
    }
}

impl std::fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceKind::Standard => write!(f, "standard"),
            SurfaceKind::Large => write!(f, "large"),
        }
    }
}

/// Delivery surface settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SurfaceSettings {
    /// Surface variant (standard, large).
    pub kind: SurfaceKind,
    /// Overrides the surface's default upload limit.
    pub max_upload_bytes: Option<u64>,
}

/// Video processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    /// ffmpeg executable.
    pub ffmpeg_path: String,
    /// ffprobe executable.
    pub ffprobe_path: String,
    /// Root directory for per-user clip output.
    pub clips_dir: String,
    /// Shortest clip length users may ask for, at least 1.
    pub min_segment_seconds: i64,
    /// Longest clip length users may ask for, at most 3600.
    pub max_segment_seconds: i64,
    /// Upper bound for a single ffmpeg run.
    pub split_timeout_seconds: u64,
    /// Upper bound for materializing an uploaded video.
    pub download_timeout_seconds: u64,
    /// Upper bound for sending a single clip.
    pub upload_timeout_seconds: u64,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            clips_dir: "/tmp/clipbot/clips".to_string(),
            min_segment_seconds: MIN_SEGMENT_SECONDS,
            max_segment_seconds: MAX_SEGMENT_SECONDS,
            split_timeout_seconds: 900,
            download_timeout_seconds: 600,
            upload_timeout_seconds: 300,
        }
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Sessions idle for longer than this are forgotten.
    pub idle_ttl_seconds: u64,
    /// How often expired sessions are swept.
    pub sweep_interval_seconds: u64,
    /// Hard cap on tracked sessions.
    pub max_sessions: usize,
    /// A user's worker task exits after this long without events.
    pub worker_idle_seconds: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_ttl_seconds: 6 * 3600,
            sweep_interval_seconds: 300,
            max_sessions: 10_000,
            worker_idle_seconds: 300,
        }
    }
}

/// Webhook server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Route that receives Telegram updates.
    pub webhook_path: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` header value.
    pub webhook_secret: Option<String>,
    /// Externally reachable base URL; when set, `serve` registers the webhook itself.
    pub public_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8443,
            webhook_path: "/telegram/webhook".to_string(),
            webhook_secret: None,
            public_url: None,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ClipperError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clipbot")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded clip output root.
    pub fn clips_dir(&self) -> PathBuf {
        Self::expand_path(&self.processing.clips_dir)
    }

    /// Resolve the bot token, preferring the environment.
    pub fn bot_token(&self) -> Option<String> {
        std::env::var(BOT_TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.telegram.bot_token.clone().filter(|t| !t.is_empty()))
    }

    /// The configured delivery surface with its upload limit.
    pub fn surface(&self) -> Surface {
        let surface = match self.surface.kind {
            SurfaceKind::Standard => Surface::standard(),
            SurfaceKind::Large => Surface::large(),
        };
        match self.surface.max_upload_bytes {
            Some(limit) => surface.with_max_upload_bytes(limit),
            None => surface,
        }
    }

    pub fn split_timeout(&self) -> Duration {
        Duration::from_secs(self.processing.split_timeout_seconds)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.processing.download_timeout_seconds)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.processing.upload_timeout_seconds)
    }

    /// Accepted clip lengths, clamped into the hard limits.
    pub fn segment_bounds(&self) -> SegmentBounds {
        SegmentBounds::new(
            self.processing.min_segment_seconds,
            self.processing.max_segment_seconds,
        )
    }

    pub fn worker_idle(&self) -> Duration {
        Duration::from_secs(self.sessions.worker_idle_seconds.max(1))
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.sessions.idle_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sessions.sweep_interval_seconds.max(1))
    }
}
