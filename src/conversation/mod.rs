//! Conversation state machine.
//!
//! Interprets inbound events against the sender's session and drives the
//! clip pipeline. One implementation serves every delivery surface.

pub mod messages;
mod pipeline;

pub use pipeline::{PipelineConfig, RunReport};

use crate::delivery::{Button, ChatId, DeliveryAdapter};
use crate::segmenter::{DurationError, Segmenter};
use crate::session::{PendingVideo, SessionState, SessionStore, UserId};
use messages::{
    ABOUT_BUTTON_ID, ABOUT_BUTTON_LABEL, CLIP_BUTTON_ID, CLIP_BUTTON_LABEL, SETTINGS_BUTTON_ID,
    SETTINGS_BUTTON_LABEL,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// An event received from a chat transport.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub user: UserId,
    /// Where replies go.
    pub chat: ChatId,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Video(PendingVideo),
    /// A slash command, name lowercased and without the slash.
    Command(String),
    Button {
        id: String,
        /// Transport handle used to acknowledge the press.
        callback_id: Option<String>,
    },
    Text(String),
    /// Anything else (stickers, photos, ...).
    Unsupported,
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Video stored; `replaced_request` when a pending duration request was dropped.
    VideoStored { replaced_request: bool },
    /// Video refused for its size.
    VideoRejected { size_bytes: u64 },
    DurationRequested,
    /// A clip request or duration arrived without a stored video.
    NoVideo,
    InvalidDuration(DurationError),
    /// The pipeline ran to completion.
    Processed(RunReport),
    /// The pipeline hit a fatal error; carries the message shown to the user.
    ProcessingFailed(String),
    /// Informational reply (welcome, about, settings).
    Informed,
    NotUnderstood,
}

/// The per-user conversation logic.
pub struct ConversationMachine {
    sessions: Arc<SessionStore>,
    adapter: Arc<dyn DeliveryAdapter>,
    segmenter: Arc<dyn Segmenter>,
    config: PipelineConfig,
}

impl ConversationMachine {
    pub fn new(
        sessions: Arc<SessionStore>,
        adapter: Arc<dyn DeliveryAdapter>,
        segmenter: Arc<dyn Segmenter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            sessions,
            adapter,
            segmenter,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one event. Never fails: every problem ends in a reply to the user.
    #[instrument(skip(self, event), fields(user = %event.user))]
    pub async fn handle(&self, event: InboundEvent) -> Transition {
        let InboundEvent { user, chat, kind } = event;

        let transition = match kind {
            EventKind::Video(video) => self.on_video(user, chat, video).await,
            EventKind::Command(name) => self.on_command(user, chat, &name).await,
            EventKind::Button { id, callback_id } => {
                if let Some(callback_id) = callback_id {
                    if let Err(e) = self.adapter.answer_button(&callback_id).await {
                        debug!("Failed to answer button press: {}", e);
                    }
                }
                self.on_button(user, chat, &id).await
            }
            EventKind::Text(text) => self.on_text(user, chat, &text).await,
            EventKind::Unsupported => self.reply_not_understood(chat).await,
        };

        debug!("Transition: {:?}", transition);
        transition
    }

    async fn on_video(&self, user: UserId, chat: ChatId, video: PendingVideo) -> Transition {
        let surface = self.adapter.surface();
        match video.size_bytes {
            Some(size_bytes) if !surface.accepts(size_bytes) => {
                info!(
                    "Rejected {} byte upload (limit {})",
                    size_bytes,
                    surface.max_upload_bytes()
                );
                self.reply(chat, &messages::too_large(size_bytes, &surface)).await;
                return Transition::VideoRejected { size_bytes };
            }
            None if surface.enforces_upload_limit() => {
                // The download step fails instead if the transport refuses the file.
                warn!("Upload size not reported, limit could not be checked");
            }
            _ => {}
        }

        let previous = self.sessions.store_video(user, video.clone());
        let replaced_request = previous == SessionState::AwaitingDuration;
        info!(
            "Video stored: {:?} bytes, {}s",
            video.size_bytes, video.duration_seconds
        );

        let text = messages::video_received(&video, replaced_request);
        let buttons = [Button::new(CLIP_BUTTON_LABEL, CLIP_BUTTON_ID)];
        if let Err(e) = self.adapter.send_text_with_buttons(chat, &text, &buttons).await {
            warn!("Failed to confirm video: {}", e);
        }

        Transition::VideoStored { replaced_request }
    }

    async fn on_command(&self, user: UserId, chat: ChatId, name: &str) -> Transition {
        match name {
            "start" | "help" => {
                self.sessions.touch(user);
                let text = messages::welcome(&self.adapter.surface());
                let buttons = [
                    Button::new(ABOUT_BUTTON_LABEL, ABOUT_BUTTON_ID),
                    Button::new(SETTINGS_BUTTON_LABEL, SETTINGS_BUTTON_ID),
                ];
                if let Err(e) = self.adapter.send_text_with_buttons(chat, &text, &buttons).await {
                    warn!("Failed to send welcome: {}", e);
                }
                Transition::Informed
            }
            "clip" => self.on_clip_request(user, chat).await,
            _ => self.reply_not_understood(chat).await,
        }
    }

    async fn on_button(&self, user: UserId, chat: ChatId, id: &str) -> Transition {
        match id {
            CLIP_BUTTON_ID => self.on_clip_request(user, chat).await,
            ABOUT_BUTTON_ID => {
                self.reply(chat, &messages::about(&self.adapter.surface())).await;
                Transition::Informed
            }
            SETTINGS_BUTTON_ID => {
                let text = messages::settings(&self.adapter.surface(), &self.config.segment_bounds);
                self.reply(chat, &text).await;
                Transition::Informed
            }
            _ => self.reply_not_understood(chat).await,
        }
    }

    async fn on_clip_request(&self, user: UserId, chat: ChatId) -> Transition {
        if !self.sessions.request_duration(user) {
            self.reply(chat, messages::SEND_VIDEO_FIRST).await;
            return Transition::NoVideo;
        }
        info!("Waiting for clip duration");
        self.reply(chat, &messages::ask_duration()).await;
        Transition::DurationRequested
    }

    async fn on_text(&self, user: UserId, chat: ChatId, text: &str) -> Transition {
        let Some(session) = self.sessions.snapshot(user) else {
            self.reply(chat, messages::SEND_VIDEO_FIRST).await;
            return Transition::NoVideo;
        };

        if session.state != SessionState::AwaitingDuration {
            self.sessions.touch(user);
            return self.reply_not_understood(chat).await;
        }

        let bounds = self.config.segment_bounds;
        let segment = match bounds.parse(text) {
            Ok(segment) => segment,
            Err(err) => {
                debug!("Rejected duration {:?}: {}", text, err);
                self.sessions.touch(user);
                self.reply(chat, &messages::duration_error(err, &bounds)).await;
                return Transition::InvalidDuration(err);
            }
        };

        let Some(video) = session.pending else {
            // Unreachable through the store API; recover instead of trusting it.
            warn!("Awaiting duration without a stored video, resetting");
            self.sessions.reset(user);
            self.reply(chat, messages::SEND_VIDEO_FIRST).await;
            return Transition::NoVideo;
        };

        self.process_video(user, chat, video, segment).await
    }

    async fn reply(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.adapter.send_text(chat, text).await {
            warn!("Failed to send reply: {}", e);
        }
    }

    async fn reply_not_understood(&self, chat: ChatId) -> Transition {
        self.reply(chat, messages::NOT_UNDERSTOOD).await;
        Transition::NotUnderstood
    }
}
