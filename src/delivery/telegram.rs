//! Telegram Bot API adapter.
//!
//! Works against both the public Bot API (standard surface) and a
//! self-hosted `telegram-bot-api` server in local mode (large surface),
//! which reports absolute file paths instead of download URLs.

use super::updates::{File, Update, User};
use super::{Button, ChatId, DeliveryAdapter, MessageHandle, Surface};
use crate::config::Settings;
use crate::error::{ClipperError, Result};
use crate::session::ArtifactRef;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};
use url::Url;

/// Envelope of every Bot API reply.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
    chat: super::updates::Chat,
}

/// Bot API client implementing [`DeliveryAdapter`].
pub struct TelegramAdapter {
    client: reqwest::Client,
    api_base: Url,
    file_base: Url,
    surface: Surface,
    request_timeout: Duration,
}

impl TelegramAdapter {
    /// Create an adapter for `token` against `base_url`.
    pub fn new(base_url: &str, token: &str, surface: Surface, request_timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))?;
        let api_base = base.join(&format!("/bot{}/", token))?;
        let file_base = base.join(&format!("/file/bot{}/", token))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_base,
            file_base,
            surface,
            request_timeout,
        })
    }

    /// Create an adapter from settings. Fails when no bot token is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let token = settings.bot_token().ok_or_else(|| {
            ClipperError::Config(format!(
                "No bot token configured. Set {} or telegram.bot_token.",
                crate::config::BOT_TOKEN_ENV
            ))
        })?;
        Self::new(
            &settings.telegram.api_base_url,
            &token,
            settings.surface(),
            Duration::from_secs(settings.telegram.request_timeout_seconds),
        )
    }

    fn method_url(&self, method: &str) -> Result<Url> {
        Ok(self.api_base.join(method)?)
    }

    /// Calls a JSON Bot API method.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method)?)
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;
        Self::unwrap_response(method, response).await
    }

    async fn unwrap_response<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let parsed: ApiResponse<T> = response.json().await?;
        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(ClipperError::Api(format!(
                "{} failed ({}): {}",
                method,
                status,
                parsed.description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    /// Identity of the bot; used to verify the token.
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", json!({}), self.request_timeout).await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, poll_timeout: Duration) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": poll_timeout.as_secs(),
                "allowed_updates": ["message", "callback_query"],
            }),
            poll_timeout + self.request_timeout,
        )
        .await
    }

    /// Register a webhook so updates are pushed instead of polled.
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<()> {
        let mut body = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(secret) = secret {
            body["secret_token"] = json!(secret);
        }
        let _: bool = self.call("setWebhook", body, self.request_timeout).await?;
        Ok(())
    }

    /// Remove any webhook; required before `getUpdates` works.
    pub async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self.call("deleteWebhook", json!({}), self.request_timeout).await?;
        Ok(())
    }

    async fn get_file(&self, artifact: &ArtifactRef) -> Result<File> {
        self.call("getFile", json!({ "file_id": artifact.0 }), self.request_timeout)
            .await
            .map_err(|e| ClipperError::Download(e.to_string()))
    }

    fn sent_handle(sent: SentMessage) -> MessageHandle {
        MessageHandle {
            chat: ChatId(sent.chat.id),
            message_id: sent.message_id,
        }
    }
}

#[async_trait]
impl DeliveryAdapter for TelegramAdapter {
    fn surface(&self) -> Surface {
        self.surface
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageHandle> {
        let sent: SentMessage = self
            .call("sendMessage", json!({ "chat_id": chat.0, "text": text }), self.request_timeout)
            .await?;
        Ok(Self::sent_handle(sent))
    }

    async fn send_text_with_buttons(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> Result<MessageHandle> {
        let row: Vec<_> = buttons
            .iter()
            .map(|b| json!({ "text": b.label, "callback_data": b.id }))
            .collect();
        let sent: SentMessage = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat.0,
                    "text": text,
                    "reply_markup": { "inline_keyboard": [row] },
                }),
                self.request_timeout,
            )
            .await?;
        Ok(Self::sent_handle(sent))
    }

    async fn edit_text(&self, message: &MessageHandle, text: &str) -> Result<()> {
        let result: Result<serde_json::Value> = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": message.chat.0,
                    "message_id": message.message_id,
                    "text": text,
                }),
                self.request_timeout,
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            // Re-sending identical text is refused by the API; nothing to do.
            Err(ClipperError::Api(desc)) if desc.contains("message is not modified") => Ok(()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, chat, caption), fields(chat = %chat))]
    async fn send_video(&self, chat: ChatId, path: &Path, caption: &str) -> Result<()> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip.mp4".to_string());

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, len)
            .file_name(file_name)
            .mime_str("video/mp4")?;
        let form = Form::new()
            .text("chat_id", chat.0.to_string())
            .text("caption", caption.to_string())
            .text("supports_streaming", "true")
            .part("video", part);

        debug!("Uploading {:?} ({} bytes)", path, len);
        let response = self
            .client
            .post(self.method_url("sendVideo")?)
            .multipart(form)
            .send()
            .await?;
        let _: SentMessage = Self::unwrap_response("sendVideo", response).await?;
        Ok(())
    }

    #[instrument(skip(self, artifact, dest), fields(artifact = %artifact.0))]
    async fn download(&self, artifact: &ArtifactRef, dest: &Path) -> Result<()> {
        let file = self.get_file(artifact).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| ClipperError::Download("File is not available for download".into()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Local-mode servers hand out paths on their own disk.
        if Path::new(&file_path).is_absolute() {
            debug!("Copying local file {}", file_path);
            tokio::fs::copy(&file_path, dest)
                .await
                .map_err(|e| ClipperError::Download(format!("Cannot copy {}: {}", file_path, e)))?;
            return Ok(());
        }

        let url = self.file_base.join(&file_path)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ClipperError::Download(format!(
                "File server returned {}",
                response.status()
            )));
        }

        let mut out = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;

        debug!("Downloaded {} bytes to {:?}", written, dest);
        Ok(())
    }

    async fn answer_button(&self, callback_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                json!({ "callback_query_id": callback_id }),
                self.request_timeout,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> TelegramAdapter {
        TelegramAdapter::new(
            "https://api.telegram.org/",
            "123:abc",
            Surface::standard(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let adapter = adapter();
        assert_eq!(
            adapter.method_url("getMe").unwrap().as_str(),
            "https://api.telegram.org/bot123:abc/getMe"
        );
        assert_eq!(
            adapter.file_base.join("videos/file_1.mp4").unwrap().as_str(),
            "https://api.telegram.org/file/bot123:abc/videos/file_1.mp4"
        );
    }

    #[test]
    fn test_api_error_envelope() {
        let parsed: ApiResponse<bool> =
            serde_json::from_str(r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#)
                .unwrap();
        assert!(!parsed.ok);
        assert!(parsed.result.is_none());
        assert_eq!(parsed.description.as_deref(), Some("Bad Request: chat not found"));
    }

    #[test]
    fn test_sent_message_envelope() {
        let parsed: ApiResponse<SentMessage> = serde_json::from_str(
            r#"{"ok": true, "result": {"message_id": 77, "date": 0, "chat": {"id": 5, "type": "private"}, "text": "hi"}}"#,
        )
        .unwrap();
        let handle = TelegramAdapter::sent_handle(parsed.result.unwrap());
        assert_eq!(handle, MessageHandle { chat: ChatId(5), message_id: 77 });
    }

    #[test]
    fn test_from_settings_requires_token() {
        if std::env::var(crate::config::BOT_TOKEN_ENV).is_ok() {
            return;
        }
        let settings = Settings::default();
        assert!(matches!(
            TelegramAdapter::from_settings(&settings),
            Err(ClipperError::Config(_))
        ));
    }
}
