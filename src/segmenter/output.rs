//! Discovery and removal of clip files produced by a split.

use crate::error::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// File name prefix of every clip.
pub const CLIP_PREFIX: &str = "clip_";
/// Container extension of every clip.
pub const CLIP_EXTENSION: &str = "mp4";
/// Zero-padding width of the clip index in file names.
pub(crate) const INDEX_WIDTH: usize = 4;

fn clip_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^clip_(\d+)\.mp4$").expect("Invalid regex"))
}

/// The ffmpeg output pattern for clips in `dir`.
pub(crate) fn output_pattern(dir: &Path) -> PathBuf {
    dir.join(format!("{}%0{}d.{}", CLIP_PREFIX, INDEX_WIDTH, CLIP_EXTENSION))
}

/// Lists clip files in `dir` with their parsed index, including empty ones.
async fn list_clip_files(dir: &Path) -> Result<Vec<(u64, PathBuf, u64)>> {
    let mut found = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let index = {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            let Some(caps) = clip_name_regex().captures(&name) else {
                continue;
            };
            let Ok(index) = caps[1].parse::<u64>() else {
                continue;
            };
            index
        };
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        found.push((index, entry.path(), meta.len()));
    }

    // Sort numerically; lexical order breaks once an index outgrows the padding.
    found.sort_by_key(|(index, _, _)| *index);
    Ok(found)
}

/// Returns the non-empty clips in `dir`, ordered by segment index.
pub async fn discover_clips(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut clips = Vec::new();

    for (index, path, size) in list_clip_files(dir).await? {
        if size == 0 {
            debug!("Skipping empty clip {} ({:?})", index, path);
            continue;
        }
        clips.push(path);
    }

    if clips.len() >= 10usize.pow(INDEX_WIDTH as u32) {
        warn!(
            "{} clips exceed the {}-digit name padding; relying on numeric ordering",
            clips.len(),
            INDEX_WIDTH
        );
    }

    Ok(clips)
}

/// Deletes every clip file in `dir` so a new split starts from an empty set.
///
/// Returns how many files were removed. A missing directory has nothing to clear.
pub async fn clear_clips(dir: &Path) -> Result<usize> {
    if tokio::fs::metadata(dir).await.is_err() {
        return Ok(0);
    }

    let files = list_clip_files(dir).await?;
    for (_, path, _) in &files {
        tokio::fs::remove_file(path).await?;
    }
    if !files.is_empty() {
        warn!("Removed {} stale clips from {:?}", files.len(), dir);
    }
    Ok(files.len())
}

/// Deletes every clip file (empty or not) in `dir`, then the directory if it is empty.
///
/// Best-effort: failures are logged and otherwise ignored.
pub async fn remove_outputs(dir: &Path) {
    if tokio::fs::metadata(dir).await.is_err() {
        return;
    }

    match list_clip_files(dir).await {
        Ok(files) => {
            for (_, path, _) in files {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("Failed to remove clip {:?}: {}", path, e);
                }
            }
        }
        Err(e) => warn!("Failed to list clips in {:?}: {}", dir, e),
    }

    // Only succeeds when nothing else lives there.
    if tokio::fs::remove_dir(dir).await.is_ok() {
        debug!("Removed output directory {:?}", dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, bytes: &[u8]) {
        std::fs::write(dir.join(name), bytes).unwrap();
    }

    #[tokio::test]
    async fn test_discover_orders_filters_and_ignores_strangers() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "clip_0002.mp4", b"c");
        write(dir.path(), "clip_0000.mp4", b"a");
        write(dir.path(), "clip_0001.mp4", b"");
        write(dir.path(), "clip_0003.mkv", b"x");
        write(dir.path(), "notes.txt", b"x");
        std::fs::create_dir(dir.path().join("clip_0004.mp4")).unwrap();

        let clips = discover_clips(dir.path()).await.unwrap();
        let names: Vec<_> = clips
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["clip_0000.mp4", "clip_0002.mp4"]);
    }

    #[tokio::test]
    async fn test_discover_orders_past_padding_width() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "clip_10000.mp4", b"z");
        write(dir.path(), "clip_9999.mp4", b"y");
        write(dir.path(), "clip_0001.mp4", b"x");

        let clips = discover_clips(dir.path()).await.unwrap();
        let names: Vec<_> = clips
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["clip_0001.mp4", "clip_9999.mp4", "clip_10000.mp4"]);
    }

    #[tokio::test]
    async fn test_remove_outputs_clears_clips_and_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("user_7");
        std::fs::create_dir(&dir).unwrap();
        write(&dir, "clip_0000.mp4", b"a");
        write(&dir, "clip_0001.mp4", b"");

        remove_outputs(&dir).await;

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_remove_outputs_keeps_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "clip_0000.mp4", b"a");
        write(dir.path(), "keep.txt", b"k");

        remove_outputs(dir.path()).await;

        assert!(!dir.path().join("clip_0000.mp4").exists());
        assert!(dir.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_clear_clips_keeps_directory_and_strangers() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "clip_0007.mp4", b"old");
        write(dir.path(), "clip_0008.mp4", b"");
        write(dir.path(), "keep.txt", b"k");

        assert_eq!(clear_clips(dir.path()).await.unwrap(), 2);

        assert!(dir.path().exists());
        assert!(dir.path().join("keep.txt").exists());
        assert!(discover_clips(dir.path()).await.unwrap().is_empty());
        assert_eq!(clear_clips(&dir.path().join("missing")).await.unwrap(), 0);
    }

    #[test]
    fn test_output_pattern() {
        let pattern = output_pattern(Path::new("/tmp/out"));
        assert_eq!(pattern, PathBuf::from("/tmp/out/clip_%04d.mp4"));
    }
}
