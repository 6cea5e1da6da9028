//! The clip pipeline run once a valid duration arrives.
//!
//! Download and split failures are fatal for the run; a failed clip upload
//! is reported and the remaining clips are still sent. Whatever happens,
//! temporary files are removed and the session returns to `Idle`.

use super::{messages, ConversationMachine, Transition};
use crate::config::Settings;
use crate::delivery::{ChatId, DeliveryAdapter, MessageHandle};
use crate::error::{ClipperError, Result};
use crate::segmenter::{remove_outputs, SegmentBounds, SegmentDuration};
use crate::session::{PendingVideo, UserId};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Paths and deadlines used by the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where downloaded inputs are written.
    pub temp_dir: PathBuf,
    /// Root of the per-user clip directories.
    pub clips_dir: PathBuf,
    pub download_timeout: Duration,
    pub upload_timeout: Duration,
    /// Accepted clip lengths.
    pub segment_bounds: SegmentBounds,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            temp_dir: settings.temp_dir(),
            clips_dir: settings.clips_dir(),
            download_timeout: settings.download_timeout(),
            upload_timeout: settings.upload_timeout(),
            segment_bounds: settings.segment_bounds(),
        }
    }

    /// Clip directory of one user; keeps concurrent users' files apart.
    pub fn user_clips_dir(&self, user: UserId) -> PathBuf {
        self.clips_dir.join(format!("user_{}", user))
    }

    /// A fresh local path for a downloaded input.
    fn input_path(&self, user: UserId) -> PathBuf {
        self.temp_dir
            .join(format!("input_{}_{}.mp4", user, Uuid::new_v4().simple()))
    }
}

/// Outcome of a pipeline run that got as far as uploading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Clips produced by the split.
    pub total: usize,
    /// Clips the user received.
    pub delivered: usize,
    /// Clips whose upload failed.
    pub failed: usize,
}

/// The editable status message of one run.
struct Progress<'a> {
    adapter: &'a dyn DeliveryAdapter,
    chat: ChatId,
    handle: Option<MessageHandle>,
}

impl Progress<'_> {
    async fn update(&mut self, text: &str) {
        match &self.handle {
            Some(handle) => {
                if let Err(e) = self.adapter.edit_text(handle, text).await {
                    debug!("Failed to update status: {}", e);
                }
            }
            // The first status message never arrived; start a new one.
            None => match self.adapter.send_text(self.chat, text).await {
                Ok(handle) => self.handle = Some(handle),
                Err(e) => warn!("Failed to send status: {}", e),
            },
        }
    }
}

impl ConversationMachine {
    /// Runs the pipeline, reports the outcome, cleans up and resets the session.
    #[instrument(skip(self, chat, video))]
    pub(super) async fn process_video(
        &self,
        user: UserId,
        chat: ChatId,
        video: PendingVideo,
        segment: SegmentDuration,
    ) -> Transition {
        let input = self.config.input_path(user);
        let output_dir = self.config.user_clips_dir(user);

        let mut progress = Progress {
            adapter: self.adapter.as_ref(),
            chat,
            handle: None,
        };
        progress.update(&messages::status_downloading()).await;

        let outcome = self
            .run_stages(chat, &video, &input, &output_dir, segment, &mut progress)
            .await;

        let transition = match outcome {
            Ok(report) => {
                info!(
                    "Sent {} of {} clips ({} failed)",
                    report.delivered, report.total, report.failed
                );
                progress.update(&messages::complete(&report)).await;
                Transition::Processed(report)
            }
            Err(e) => {
                error!("Video processing failed: {}", e);
                let reason = e.user_message();
                progress.update(&messages::failed(&reason)).await;
                Transition::ProcessingFailed(reason)
            }
        };

        cleanup(&input, &output_dir).await;
        self.sessions.reset(user);

        transition
    }

    async fn run_stages(
        &self,
        chat: ChatId,
        video: &PendingVideo,
        input: &Path,
        output_dir: &Path,
        segment: SegmentDuration,
        progress: &mut Progress<'_>,
    ) -> Result<RunReport> {
        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        self.download(video, input).await?;

        progress.update(&messages::status_splitting()).await;
        let clips = self.segmenter.split(input, output_dir, segment).await?;

        let total = clips.len();
        progress.update(&messages::status_uploading(0, total)).await;

        let mut report = RunReport {
            total,
            delivered: 0,
            failed: 0,
        };

        for (i, clip) in clips.iter().enumerate() {
            let index = i + 1;
            let caption = messages::clip_caption(index, total, segment);

            match self.upload(chat, clip, &caption).await {
                Ok(()) => {
                    report.delivered += 1;
                    progress.update(&messages::status_uploading(index, total)).await;
                }
                Err(e) => {
                    warn!("Failed to upload clip {}: {}", index, e);
                    report.failed += 1;
                    if let Err(e) = self
                        .adapter
                        .send_text(chat, &messages::clip_failed(index, &e.user_message()))
                        .await
                    {
                        debug!("Failed to report upload failure: {}", e);
                    }
                }
            }
        }

        Ok(report)
    }

    async fn download(&self, video: &PendingVideo, dest: &Path) -> Result<()> {
        let timeout = self.config.download_timeout;
        match tokio::time::timeout(timeout, self.adapter.download(&video.artifact, dest)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ ClipperError::Download(_))) => Err(e),
            Ok(Err(e)) => Err(ClipperError::Download(e.to_string())),
            Err(_) => Err(ClipperError::Timeout {
                operation: "Download",
                seconds: timeout.as_secs(),
            }),
        }
    }

    async fn upload(&self, chat: ChatId, clip: &Path, caption: &str) -> Result<()> {
        let timeout = self.config.upload_timeout;
        tokio::time::timeout(timeout, self.adapter.send_video(chat, clip, caption))
            .await
            .unwrap_or(Err(ClipperError::Timeout {
                operation: "Upload",
                seconds: timeout.as_secs(),
            }))
    }
}

/// Removes the downloaded input and every clip of the run. Never fails.
async fn cleanup(input: &Path, output_dir: &Path) {
    match tokio::fs::remove_file(input).await {
        Ok(()) => debug!("Removed input {:?}", input),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove input {:?}: {}", input, e),
    }
    remove_outputs(output_dir).await;
}
