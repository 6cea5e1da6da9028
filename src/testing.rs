//! In-process doubles for the delivery adapter and the segmenter.

use crate::delivery::{Button, ChatId, DeliveryAdapter, MessageHandle, Surface};
use crate::error::{ClipperError, Result};
use crate::segmenter::{discover_clips, SegmentDuration, Segmenter, VideoInfo};
use crate::session::ArtifactRef;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One outbound call seen by [`RecordingAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text { chat: ChatId, text: String },
    Buttons { chat: ChatId, text: String, ids: Vec<String> },
    Edit { message_id: i64, text: String },
    Video { chat: ChatId, path: PathBuf, caption: String },
    Answer(String),
}

/// Records everything sent; downloads write a small placeholder file.
pub struct RecordingAdapter {
    surface: Surface,
    log: Mutex<Vec<Outbound>>,
    downloads: Mutex<Vec<PathBuf>>,
    next_message_id: AtomicI64,
    uploads: AtomicUsize,
    failing_uploads: HashSet<usize>,
    fail_download: bool,
    download_delay: Option<Duration>,
}

impl RecordingAdapter {
    pub fn new(surface: Surface) -> Self {
        Self {
            surface,
            log: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1),
            uploads: AtomicUsize::new(0),
            failing_uploads: HashSet::new(),
            fail_download: false,
            download_delay: None,
        }
    }

    /// Uploads with these 1-based attempt numbers fail.
    pub fn failing_uploads(mut self, attempts: &[usize]) -> Self {
        self.failing_uploads = attempts.iter().copied().collect();
        self
    }

    pub fn failing_download(mut self) -> Self {
        self.fail_download = true;
        self
    }

    pub fn slow_download(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.log.lock().unwrap().clone()
    }

    /// Texts of plain messages, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    /// The most recent status edit.
    pub fn last_edit(&self) -> Option<String> {
        self.sent().into_iter().rev().find_map(|o| match o {
            Outbound::Edit { text, .. } => Some(text),
            _ => None,
        })
    }

    pub fn videos(&self) -> Vec<(ChatId, PathBuf, String)> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Video { chat, path, caption } => Some((chat, path, caption)),
                _ => None,
            })
            .collect()
    }

    pub fn downloads(&self) -> Vec<PathBuf> {
        self.downloads.lock().unwrap().clone()
    }

    fn push(&self, outbound: Outbound) {
        self.log.lock().unwrap().push(outbound);
    }

    fn handle(&self, chat: ChatId) -> MessageHandle {
        MessageHandle {
            chat,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl DeliveryAdapter for RecordingAdapter {
    fn surface(&self) -> Surface {
        self.surface
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageHandle> {
        self.push(Outbound::Text {
            chat,
            text: text.to_string(),
        });
        Ok(self.handle(chat))
    }

    async fn send_text_with_buttons(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> Result<MessageHandle> {
        self.push(Outbound::Buttons {
            chat,
            text: text.to_string(),
            ids: buttons.iter().map(|b| b.id.clone()).collect(),
        });
        Ok(self.handle(chat))
    }

    async fn edit_text(&self, message: &MessageHandle, text: &str) -> Result<()> {
        self.push(Outbound::Edit {
            message_id: message.message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_video(&self, chat: ChatId, path: &Path, caption: &str) -> Result<()> {
        let attempt = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_uploads.contains(&attempt) {
            return Err(ClipperError::Api("Request Entity Too Large".into()));
        }
        assert!(path.exists(), "uploaded clip {:?} does not exist", path);
        self.push(Outbound::Video {
            chat,
            path: path.to_path_buf(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn download(&self, _artifact: &ArtifactRef, dest: &Path) -> Result<()> {
        self.downloads.lock().unwrap().push(dest.to_path_buf());
        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_download {
            return Err(ClipperError::Download("file is too big".into()));
        }
        tokio::fs::write(dest, b"fake video").await?;
        Ok(())
    }

    async fn answer_button(&self, callback_id: &str) -> Result<()> {
        self.push(Outbound::Answer(callback_id.to_string()));
        Ok(())
    }
}

/// What [`ScriptedSegmenter::split`] does.
#[derive(Debug, Clone)]
pub enum Script {
    /// Write this many non-empty clips.
    Clips(usize),
    /// Fail like a non-zero ffmpeg exit.
    ToolFailure(String),
    /// Exit cleanly without usable output.
    NoClips,
}

/// A recorded `split` call.
#[derive(Debug, Clone)]
pub struct SplitCall {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub segment: SegmentDuration,
}

/// Segmenter that follows a script instead of running ffmpeg.
pub struct ScriptedSegmenter {
    script: Script,
    delay: Option<Duration>,
    calls: Mutex<Vec<SplitCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSegmenter {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<SplitCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of splits that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Segmenter for ScriptedSegmenter {
    async fn split(
        &self,
        input: &Path,
        output_dir: &Path,
        segment: SegmentDuration,
    ) -> Result<Vec<PathBuf>> {
        self.calls.lock().unwrap().push(SplitCall {
            input: input.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            segment,
        });
        if !input.exists() {
            return Err(ClipperError::ToolFailed(format!("{}: No such file", input.display())));
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        tokio::fs::create_dir_all(output_dir).await?;
        match &self.script {
            Script::Clips(count) => {
                for i in 0..*count {
                    tokio::fs::write(output_dir.join(format!("clip_{:04}.mp4", i)), b"clip").await?;
                }
                discover_clips(output_dir).await
            }
            Script::ToolFailure(diagnostic) => {
                // ffmpeg may leave partial output behind before failing.
                tokio::fs::write(output_dir.join("clip_0000.mp4"), b"partial").await?;
                Err(ClipperError::ToolFailed(diagnostic.clone()))
            }
            Script::NoClips => {
                tokio::fs::write(output_dir.join("clip_0000.mp4"), b"").await?;
                Err(ClipperError::NoClips(
                    "The video might be shorter than the segment duration.".into(),
                ))
            }
        }
    }

    async fn probe(&self, _input: &Path) -> Result<VideoInfo> {
        Ok(VideoInfo {
            duration_seconds: 130.0,
            size_bytes: Some(10),
            bit_rate: None,
            width: 64,
            height: 64,
            fps: Some(10.0),
            codec: "mpeg4".to_string(),
        })
    }
}
