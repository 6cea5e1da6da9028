//! Doctor command - verify system requirements and configuration.

use crate::cli::{format_bytes, Output};
use crate::config::{Settings, SurfaceKind, BOT_TOKEN_ENV};
use crate::error::truncate_message;
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("clipbot doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    let tool_checks = [
        check_tool("ffmpeg", &settings.processing.ffmpeg_path),
        check_tool("ffprobe", &settings.processing.ffprobe_path),
    ];
    for check in &tool_checks {
        check.print();
    }
    checks.extend(tool_checks);

    println!();

    println!("{}", style("Bot Configuration").bold());
    let bot_checks = [check_bot_token(settings), check_surface(settings)];
    for check in &bot_checks {
        check.print();
    }
    checks.extend(bot_checks);

    println!();

    println!("{}", style("Directories").bold());
    let dir_checks = check_directories(settings);
    for check in &dir_checks {
        check.print();
    }
    checks.extend(dir_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before running the bot.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! clipbot is ready to run.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, path: &str) -> CheckResult {
    let hint = install_hint_ffmpeg();
    match Command::new(path).arg("-version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            CheckResult::ok(name, &truncate_message(&version, 50))
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, &format!("{} not found", path), hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check that a bot token is configured, without printing it.
fn check_bot_token(settings: &Settings) -> CheckResult {
    let hint = format!("Set with: export {}='123456:ABC...'", BOT_TOKEN_ENV);
    match settings.bot_token() {
        Some(token) => match token.split_once(':') {
            Some((id, secret)) if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty() => {
                CheckResult::ok("Bot token", &format!("configured (bot {})", id))
            }
            _ => CheckResult::warning(
                "Bot token",
                "set but format looks unusual",
                "Expected format: <bot id>:<secret> as issued by @BotFather",
            ),
        },
        None => CheckResult::error("Bot token", "not set", &hint),
    }
}

/// Describe the delivery surface and its upload limit.
fn check_surface(settings: &Settings) -> CheckResult {
    let surface = settings.surface();
    let limit = if surface.enforces_upload_limit() {
        format!("uploads up to {}", format_bytes(surface.max_upload_bytes()))
    } else {
        "upload size left to the server".to_string()
    };
    let message = format!("{} ({}) via {}", surface.kind(), limit, settings.telegram.api_base_url);

    if surface.kind() == SurfaceKind::Large && settings.telegram.api_base_url.contains("api.telegram.org") {
        CheckResult::warning(
            "Surface",
            &message,
            "The large surface needs a self-hosted Bot API server; set telegram.api_base_url",
        )
    } else {
        CheckResult::ok("Surface", &message)
    }
}

/// Check working directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    [("Temp directory", settings.temp_dir()), ("Clips directory", settings.clips_dir())]
        .into_iter()
        .map(|(name, dir)| {
            if dir.exists() {
                CheckResult::ok(name, &dir.display().to_string())
            } else {
                CheckResult::warning(
                    name,
                    &format!("{} (will be created)", dir.display()),
                    "Directory will be created on first use",
                )
            }
        })
        .collect()
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: clipbot config init",
        )
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}
