//! clipbot CLI entry point.

use anyhow::Result;
use clap::Parser;
use clipbot::cli::{commands, Cli, Commands};
use clipbot::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_ref().map(PathBuf::from);

    // Load configuration
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging: RUST_LOG, then -v flags, then general.log_level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("clipbot={},tower_http={}", log_level, log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Execute command
    match cli.command {
        Commands::Run => {
            commands::run_bot(settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, port, settings).await?;
        }

        Commands::Split {
            input,
            duration,
            output,
        } => {
            commands::run_split(&input, &duration, output, settings).await?;
        }

        Commands::Probe { input, duration } => {
            commands::run_probe(&input, duration.as_deref(), settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, config_path, settings)?;
        }
    }

    Ok(())
}
