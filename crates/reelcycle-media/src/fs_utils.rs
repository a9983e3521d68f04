//! Filesystem helpers: media listing, ordering, scratch names and atomic writes.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::MediaResult;

/// Recognised video extensions (lowercase, without the dot).
pub const VIDEO_EXTS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi", "m4v"];

/// Recognised audio extensions (lowercase, without the dot).
pub const AUDIO_EXTS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg"];

/// Whether `path` has one of `exts`, compared case-insensitively.
pub fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Regular files in `dir` (not recursive) with a matching extension, sorted
/// case-insensitively by file name, ties broken by the exact name. A missing
/// directory yields an empty list.
pub async fn list_files(dir: &Path, exts: &[&str]) -> MediaResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && has_extension(&path, exts) {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|p| (file_name_lower(p), p.clone()));
    Ok(files)
}

/// Like [`list_files`] but descending into subdirectories. Results are
/// sorted by their path relative to `dir`, case-insensitively.
pub async fn list_files_recursive(dir: &Path, exts: &[&str]) -> MediaResult<Vec<PathBuf>> {
    let mut pending = vec![dir.to_path_buf()];
    let mut files = Vec::new();

    while let Some(current) = pending.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let kind = entry.file_type().await?;
            if kind.is_dir() {
                pending.push(path);
            } else if kind.is_file() && has_extension(&path, exts) {
                files.push(path);
            }
        }
    }

    files.sort_by_cached_key(|p| {
        let relative = p.strip_prefix(dir).unwrap_or(p).to_string_lossy().to_lowercase();
        (relative, p.clone())
    });
    Ok(files)
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NaturalPart {
    Number(u128),
    Text(String),
}

impl PartialOrd for NaturalPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NaturalPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NaturalPart::Number(a), NaturalPart::Number(b)) => a.cmp(b),
            (NaturalPart::Text(a), NaturalPart::Text(b)) => a.cmp(b),
            (NaturalPart::Number(_), NaturalPart::Text(_)) => Ordering::Less,
            (NaturalPart::Text(_), NaturalPart::Number(_)) => Ordering::Greater,
        }
    }
}

/// Sort key that orders embedded digit runs numerically ("ep2" < "ep10").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey(Vec<NaturalPart>);

pub fn natural_sort_key(name: &str) -> NaturalKey {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();

    for c in name.chars() {
        if c.is_ascii_digit() {
            if !text.is_empty() {
                parts.push(NaturalPart::Text(std::mem::take(&mut text)));
            }
            digits.push(c);
        } else {
            if !digits.is_empty() {
                parts.push(number_part(&std::mem::take(&mut digits)));
            }
            text.extend(c.to_lowercase());
        }
    }
    if !digits.is_empty() {
        parts.push(number_part(&digits));
    }
    if !text.is_empty() {
        parts.push(NaturalPart::Text(text));
    }
    NaturalKey(parts)
}

fn number_part(digits: &str) -> NaturalPart {
    // Absurdly long digit runs compare as text
    digits
        .parse()
        .map(NaturalPart::Number)
        .unwrap_or_else(|_| NaturalPart::Text(digits.to_string()))
}

/// Folder name reduced to `[A-Za-z0-9_-]`, everything else replaced by `_`.
pub fn safe_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Remove and recreate a scratch directory.
pub async fn recreate_dir(dir: &Path) -> MediaResult<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(dir).await?;
    Ok(())
}

/// Best-effort removal of a scratch directory.
pub async fn remove_dir_quietly(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove scratch directory {}: {}", dir.display(), e);
        }
    }
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> MediaResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        )
    })?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents).await?;
    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(())
}
