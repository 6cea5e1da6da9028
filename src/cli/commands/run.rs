//! Run command - long-poll the Bot API.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use tracing::warn;

/// Run the bot until Ctrl+C, then let queued work finish.
pub async fn run_bot(settings: Settings) -> Result<()> {
    preflight::check(Operation::Bot, &settings)?;

    let orchestrator = Orchestrator::new(settings)?;

    Output::header("clipbot");
    Output::kv("Surface", &orchestrator.settings().surface.kind.to_string());
    Output::kv("Clips", &orchestrator.settings().clips_dir().display().to_string());
    Output::info("Polling for updates. Press Ctrl+C to stop.");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let result = orchestrator.run_polling(shutdown).await;

    Output::info("Finishing in-flight requests...");
    orchestrator.shutdown().await;
    result?;

    Output::success("Stopped.");
    Ok(())
}
