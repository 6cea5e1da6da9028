//! Telegram Bot API update types and their conversion into inbound events.

use crate::conversation::{EventKind, InboundEvent};
use crate::delivery::ChatId;
use crate::session::{ArtifactRef, PendingVideo, UserId};
use serde::{Deserialize, Serialize};

/// One entry of `getUpdates` or one webhook body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub video: Option<Video>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Video {
    pub file_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// A file sent as a document; videos sent uncompressed arrive this way.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Result of `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Extracts the command name from `/name`, `/name args` or `/name@bot`.
pub fn parse_command(text: &str) -> Option<String> {
    let first = text.trim_start().split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

impl Update {
    /// Converts the update into an event, or `None` for updates the bot ignores.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let chat = query
                .message
                .as_ref()
                .map(|m| ChatId(m.chat.id))
                .unwrap_or(ChatId(query.from.id));
            return Some(InboundEvent {
                user: UserId(query.from.id),
                chat,
                kind: EventKind::Button {
                    id: query.data.unwrap_or_default(),
                    callback_id: Some(query.id),
                },
            });
        }

        let message = self.message?;
        let from = message.from.as_ref()?;
        if from.is_bot {
            return None;
        }
        let user = UserId(from.id);
        let chat = ChatId(message.chat.id);

        let kind = if let Some(video) = message.video {
            EventKind::Video(PendingVideo {
                artifact: ArtifactRef(video.file_id),
                size_bytes: video.file_size,
                duration_seconds: video.duration,
                width: video.width,
                height: video.height,
            })
        } else if let Some(doc) = message.document.filter(is_video_document) {
            EventKind::Video(PendingVideo {
                artifact: ArtifactRef(doc.file_id),
                size_bytes: doc.file_size,
                duration_seconds: 0,
                width: 0,
                height: 0,
            })
        } else if let Some(text) = message.text {
            // Commands win over free text.
            match parse_command(&text) {
                Some(name) => EventKind::Command(name),
                None => EventKind::Text(text),
            }
        } else {
            EventKind::Unsupported
        };

        Some(InboundEvent { user, chat, kind })
    }
}

fn is_video_document(doc: &Document) -> bool {
    doc.mime_type
        .as_deref()
        .is_some_and(|m| m.starts_with("video/"))
}
