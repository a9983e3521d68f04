//! Content-group discovery.

use std::path::{Path, PathBuf};
use tracing::debug;

use reelcycle_media::fs_utils::{list_files, natural_sort_key, AUDIO_EXTS, VIDEO_EXTS};

use crate::error::WorkerResult;
use crate::selector::pick_intro_track;

/// Optional per-folder overlay image name.
pub const OVERLAY_FILE_NAME: &str = "overlay.png";

/// A content group: a subfolder holding at least one recognised video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub name: String,
    pub path: PathBuf,
    /// Clips sorted case-insensitively by file name
    pub clips: Vec<PathBuf>,
    pub overlay: Option<PathBuf>,
}

/// Eligible folders under `root` in natural order ("ep2" before "ep10").
/// Names equal under that order ("Ep1", "ep01") fall back to byte order.
pub async fn scan_folders(root: &Path) -> WorkerResult<Vec<Folder>> {
    let mut subdirs = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            subdirs.push(entry.path());
        }
    }
    subdirs.sort_by_cached_key(|p| {
        let name = dir_name(p);
        (natural_sort_key(&name), name)
    });

    let mut folders = Vec::new();
    for path in subdirs {
        let clips = list_files(&path, VIDEO_EXTS).await?;
        if clips.is_empty() {
            debug!(folder = %path.display(), "No videos, not eligible");
            continue;
        }
        let overlay_path = path.join(OVERLAY_FILE_NAME);
        let overlay = tokio::fs::try_exists(&overlay_path)
            .await
            .unwrap_or(false)
            .then_some(overlay_path);
        folders.push(Folder {
            name: dir_name(&path),
            path,
            clips,
            overlay,
        });
    }
    Ok(folders)
}

/// Narration for `cycle`: a rotating track from `intro_dir` when it has any,
/// otherwise `fallback` if it exists.
pub async fn resolve_narration(intro_dir: &Path, fallback: &Path, cycle: u32) -> WorkerResult<Option<PathBuf>> {
    let tracks = list_files(intro_dir, AUDIO_EXTS).await?;
    if !tracks.is_empty() {
        return Ok(Some(pick_intro_track(&tracks, fallback, cycle)));
    }
    let exists = tokio::fs::try_exists(fallback).await.unwrap_or(false);
    Ok(exists.then(|| fallback.to_path_buf()))
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn test_scan_orders_and_filters() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("ep10/b.mp4"));
        touch(&root.join("ep2/B.mov"));
        touch(&root.join("ep2/a.mp4"));
        touch(&root.join("ep2/overlay.png"));
        touch(&root.join("notes/readme.txt"));
        touch(&root.join("stray.mp4"));

        let folders = scan_folders(root).await.unwrap();
        let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["ep2", "ep10"]);

        let ep2 = &folders[0];
        assert_eq!(ep2.clips, vec![root.join("ep2/a.mp4"), root.join("ep2/B.mov")]);
        assert_eq!(ep2.overlay, Some(root.join("ep2/overlay.png")));
        assert_eq!(folders[1].overlay, None);
    }

    #[tokio::test]
    async fn test_scan_breaks_natural_ties_by_name() {
        let dir = TempDir::new().unwrap();
        for name in ["ep1", "ep2", "Ep1", "ep01"] {
            touch(&dir.path().join(name).join("a.mp4"));
        }

        let folders = scan_folders(dir.path()).await.unwrap();
        let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Ep1", "ep01", "ep1", "ep2"]);
    }

    #[tokio::test]
    async fn test_scan_missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(scan_folders(&dir.path().join("missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_narration() {
        let dir = TempDir::new().unwrap();
        let intro_dir = dir.path().join("intro_voices");
        let fallback = dir.path().join("intro.mp3");

        assert_eq!(resolve_narration(&intro_dir, &fallback, 1).await.unwrap(), None);

        touch(&fallback);
        assert_eq!(resolve_narration(&intro_dir, &fallback, 1).await.unwrap(), Some(fallback.clone()));

        touch(&intro_dir.join("02.wav"));
        touch(&intro_dir.join("01.mp3"));
        touch(&intro_dir.join("cover.jpg"));
        assert_eq!(
            resolve_narration(&intro_dir, &fallback, 1).await.unwrap(),
            Some(intro_dir.join("01.mp3"))
        );
        assert_eq!(
            resolve_narration(&intro_dir, &fallback, 4).await.unwrap(),
            Some(intro_dir.join("02.wav"))
        );
    }
}
