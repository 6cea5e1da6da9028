//! Pre-flight checks before long-running operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::{Settings, BOT_TOKEN_ENV};
use crate::error::{ClipperError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Running the bot needs a token and both ffmpeg tools.
    Bot,
    /// Splitting a local file needs ffmpeg and ffprobe.
    Split,
    /// Probing needs ffprobe only.
    Probe,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    let processing = &settings.processing;
    match operation {
        Operation::Bot => {
            check_token(settings)?;
            check_tool(&processing.ffmpeg_path)?;
            check_tool(&processing.ffprobe_path)?;
        }
        Operation::Split => {
            check_tool(&processing.ffmpeg_path)?;
            check_tool(&processing.ffprobe_path)?;
        }
        Operation::Probe => {
            check_tool(&processing.ffprobe_path)?;
        }
    }
    Ok(())
}

/// Check that a bot token is configured.
pub fn check_token(settings: &Settings) -> Result<()> {
    match settings.bot_token() {
        Some(_) => Ok(()),
        None => Err(ClipperError::Config(format!(
            "No bot token configured. Set it with: export {}='123456:ABC...'",
            BOT_TOKEN_ENV
        ))),
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(ClipperError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ClipperError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(ClipperError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_reported() {
        let err = check_tool("clipbot-no-such-tool").unwrap_err();
        assert!(matches!(err, ClipperError::ToolNotFound(_)));
    }

    #[test]
    fn test_probe_uses_configured_ffprobe() {
        let mut settings = Settings::default();
        settings.processing.ffprobe_path = "clipbot-missing-ffprobe".to_string();

        let err = check(Operation::Probe, &settings).unwrap_err();
        assert!(err.to_string().contains("clipbot-missing-ffprobe"));
    }
}
