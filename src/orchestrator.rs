//! Runtime wiring for the bot.
//!
//! Builds the transport, segmenter, conversation machine and dispatcher from
//! settings, and feeds Bot API updates into the dispatcher.

use crate::config::Settings;
use crate::conversation::{ConversationMachine, PipelineConfig};
use crate::delivery::updates::Update;
use crate::delivery::{DeliveryAdapter, TelegramAdapter};
use crate::dispatcher::{spawn_sweeper, Dispatcher};
use crate::error::Result;
use crate::segmenter::FfmpegSegmenter;
use crate::session::SessionStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Pause after a failed `getUpdates` call.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// The running bot.
pub struct Orchestrator {
    settings: Settings,
    adapter: Arc<TelegramAdapter>,
    sessions: Arc<SessionStore>,
    dispatcher: Arc<Dispatcher>,
    sweeper: JoinHandle<()>,
}

impl Orchestrator {
    /// Build every component from settings and start the session sweeper.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(settings: Settings) -> Result<Self> {
        let adapter = Arc::new(TelegramAdapter::from_settings(&settings)?);
        let segmenter = Arc::new(FfmpegSegmenter::from_settings(&settings.processing));
        let sessions = Arc::new(SessionStore::new(settings.sessions.max_sessions));

        std::fs::create_dir_all(settings.temp_dir())?;
        std::fs::create_dir_all(settings.clips_dir())?;

        let machine = Arc::new(ConversationMachine::new(
            sessions.clone(),
            adapter.clone(),
            segmenter,
            PipelineConfig::from_settings(&settings),
        ));
        let dispatcher = Arc::new(Dispatcher::new(machine, settings.worker_idle()));
        let sweeper = spawn_sweeper(
            sessions.clone(),
            settings.sweep_interval(),
            settings.idle_ttl(),
        );

        let surface = adapter.surface();
        info!(
            "Bot ready on the {} surface (upload limit {} bytes, enforced: {})",
            surface.kind(),
            surface.max_upload_bytes(),
            surface.enforces_upload_limit()
        );

        Ok(Self {
            settings,
            adapter,
            sessions,
            dispatcher,
            sweeper,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn adapter(&self) -> &Arc<TelegramAdapter> {
        &self.adapter
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Turns an update into an event and queues it. Irrelevant updates are dropped.
    pub fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        match update.into_event() {
            Some(event) => self.dispatcher.dispatch(event),
            None => debug!("Ignoring update {}", update_id),
        }
    }

    /// Verifies the token and logs the bot identity.
    pub async fn verify_token(&self) -> Result<()> {
        let me = self.adapter.get_me().await?;
        info!(
            "Authenticated as @{}",
            me.username.as_deref().unwrap_or(me.first_name.as_str())
        );
        Ok(())
    }

    /// Long-polls for updates until `shutdown` resolves.
    #[instrument(skip(self, shutdown))]
    pub async fn run_polling(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.verify_token().await?;
        // getUpdates is refused while a webhook is registered.
        self.adapter.delete_webhook().await?;

        let poll_timeout = Duration::from_secs(self.settings.telegram.poll_timeout_seconds);
        let mut offset = 0i64;
        tokio::pin!(shutdown);

        info!("Polling for updates");
        loop {
            let updates = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping polling");
                    break;
                }
                result = self.adapter.get_updates(offset, poll_timeout) => result,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(update);
                    }
                }
                Err(e) => {
                    warn!("getUpdates failed: {}", e);
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                    }
                }
            }
        }

        Ok(())
    }

    /// Stops the sweeper and waits for queued events to finish.
    pub async fn shutdown(self) {
        self.sweeper.abort();
        self.dispatcher.shutdown().await;
        info!("Shutdown complete ({} sessions dropped)", self.sessions.len());
    }
}
