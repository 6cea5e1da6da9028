//! Delivery adapter abstraction.
//!
//! The conversation logic talks to chat transports only through
//! [`DeliveryAdapter`]. Surfaces differ in how large an upload they accept.

mod telegram;
pub mod updates;

pub use telegram::TelegramAdapter;

use crate::config::SurfaceKind;
use crate::error::Result;
use crate::session::ArtifactRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upload limit of the public Bot API surface.
pub const STANDARD_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;
/// Upload limit of the self-hosted Bot API surface.
pub const LARGE_MAX_UPLOAD_BYTES: u64 = 2000 * 1024 * 1024;

/// Chat a reply goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sent message that can be edited later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub chat: ChatId,
    pub message_id: i64,
}

/// An inline button shown under a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub id: String,
}

impl Button {
    pub fn new(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: id.into(),
        }
    }
}

/// A delivery surface and its upload acceptance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    kind: SurfaceKind,
    max_upload_bytes: u64,
    enforced: bool,
}

impl Surface {
    /// Public Bot API: uploads above 20 MiB are refused before they are stored.
    pub fn standard() -> Self {
        Self {
            kind: SurfaceKind::Standard,
            max_upload_bytes: STANDARD_MAX_UPLOAD_BYTES,
            enforced: true,
        }
    }

    /// Self-hosted Bot API: size is left to the transport.
    pub fn large() -> Self {
        Self {
            kind: SurfaceKind::Large,
            max_upload_bytes: LARGE_MAX_UPLOAD_BYTES,
            enforced: false,
        }
    }

    /// Enforce an explicit limit on any surface.
    pub fn with_max_upload_bytes(self, limit: u64) -> Self {
        Self {
            max_upload_bytes: limit,
            enforced: true,
            ..self
        }
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn enforces_upload_limit(&self) -> bool {
        self.enforced
    }

    /// Whether an upload of `size_bytes` is accepted.
    pub fn accepts(&self, size_bytes: u64) -> bool {
        !self.enforced || size_bytes <= self.max_upload_bytes
    }
}

/// Outbound operations the conversation needs from a chat transport.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    /// The surface this adapter serves.
    fn surface(&self) -> Surface;

    /// Send a plain text message.
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageHandle>;

    /// Send a text message with one row of inline buttons.
    async fn send_text_with_buttons(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> Result<MessageHandle>;

    /// Replace the text of a previously sent message.
    async fn edit_text(&self, message: &MessageHandle, text: &str) -> Result<()>;

    /// Upload a local video file with a caption.
    async fn send_video(&self, chat: ChatId, path: &Path, caption: &str) -> Result<()>;

    /// Materialize an uploaded file at `dest`.
    async fn download(&self, artifact: &ArtifactRef, dest: &Path) -> Result<()>;

    /// Acknowledge a button press so the client stops waiting.
    async fn answer_button(&self, callback_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_limit_boundary() {
        let surface = Surface::standard();
        assert!(surface.accepts(STANDARD_MAX_UPLOAD_BYTES - 1));
        assert!(surface.accepts(STANDARD_MAX_UPLOAD_BYTES));
        assert!(!surface.accepts(STANDARD_MAX_UPLOAD_BYTES + 1));
    }

    #[test]
    fn test_large_surface_defers_to_transport() {
        let surface = Surface::large();
        assert!(surface.accepts(LARGE_MAX_UPLOAD_BYTES * 4));
        assert!(!surface.with_max_upload_bytes(10).accepts(11));
    }
}
