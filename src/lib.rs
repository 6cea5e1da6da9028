//! clipbot - split videos into clips from a chat
//!
//! A Telegram bot that takes an uploaded video, asks for a clip length and
//! sends the video back as fixed-length clips cut by ffmpeg without
//! re-encoding.
//!
//! # Overview
//!
//! A user sends a video, taps "Create Clips" (or sends /clip), then replies
//! with a clip length in seconds. The bot downloads the video, splits it,
//! uploads every clip in order with a caption, and cleans up after itself.
//!
//! Two delivery surfaces share one conversation implementation:
//! - `standard` - the public Bot API, uploads limited to 20 MiB
//! - `large` - a self-hosted Bot API server, uploads up to 2000 MiB
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `segmenter` - ffmpeg-based splitting and clip discovery
//! - `session` - Per-user conversation state
//! - `delivery` - Chat transport abstraction and the Telegram adapter
//! - `conversation` - The state machine and clip pipeline
//! - `dispatcher` - Per-user ordering and cross-user concurrency
//! - `orchestrator` - Runtime wiring
//!
//! # Example
//!
//! ```rust,no_run
//! use clipbot::config::Settings;
//! use clipbot::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     orchestrator
//!         .run_polling(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     orchestrator.shutdown().await;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod conversation;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod segmenter;
pub mod session;

#[cfg(test)]
mod testing;

pub use error::{ClipperError, Result};
