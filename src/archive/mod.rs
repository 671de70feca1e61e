//! Chat export parsing.
//!
//! Telegram Desktop exports a chat either as `messages*.html` pages or as a
//! single `result.json`. Both parsers yield one `VideoData` per message that
//! carries a video attachment present on disk.

pub mod html;
pub mod json;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::video::{is_supported_video, VideoData};

pub use html::HtmlExportParser;
pub use json::JsonExportParser;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No supported export found in {0}")]
    NoExport(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Html,
    Json,
}

/// A parser for one export format rooted at an export folder
pub trait ArchiveParser: Send + Sync {
    fn format(&self) -> ArchiveFormat;

    /// Whether the export folder contains this format
    fn detect(&self) -> bool;

    fn parse(&self) -> Result<Vec<VideoData>, ArchiveError>;
}

/// Pick a parser for an export folder, preferring HTML over JSON
pub fn open_export(root: &Path, supported_extensions: &[String]) -> Option<Box<dyn ArchiveParser>> {
    let candidates: [Box<dyn ArchiveParser>; 2] = [
        Box::new(HtmlExportParser::new(root, supported_extensions)),
        Box::new(JsonExportParser::new(root, supported_extensions)),
    ];

    let parser = candidates.into_iter().find(|parser| parser.detect());
    match &parser {
        Some(parser) => debug!("📦 {} detected as {:?} export", root.display(), parser.format()),
        None => warn!("⚠️ No HTML or JSON export found in {}", root.display()),
    }
    parser
}

/// Parse whatever export format the folder contains
pub fn parse_export(root: &Path, supported_extensions: &[String]) -> Result<Vec<VideoData>, ArchiveError> {
    let parser = open_export(root, supported_extensions)
        .ok_or_else(|| ArchiveError::NoExport(root.to_path_buf()))?;
    let videos = parser.parse()?;
    info!("🎬 Found {} videos in {}", videos.len(), root.display());
    Ok(videos)
}

/// Resolve a media reference from an export to an existing video file.
///
/// References are tried relative to the export root, under `files/`, and by
/// bare file name under `files/`.
pub(crate) fn resolve_media(root: &Path, reference: &str, supported_extensions: &[String]) -> Option<PathBuf> {
    let decoded = urlencoding::decode(reference)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| reference.to_string());
    let relative = decoded
        .trim()
        .trim_start_matches("../")
        .trim_start_matches("./")
        .trim_start_matches('/');

    if relative.is_empty() || !is_supported_video(Path::new(relative), supported_extensions) {
        return None;
    }

    let mut candidates = vec![root.join(relative), root.join("files").join(relative)];
    if let Some(name) = Path::new(relative).file_name() {
        candidates.push(root.join("files").join(name));
    }

    candidates.into_iter().find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        vec!["mp4".to_string(), "webm".to_string()]
    }

    #[test]
    fn test_resolve_media_locations() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("video_files")).unwrap();
        std::fs::create_dir_all(root.join("files")).unwrap();
        std::fs::write(root.join("video_files").join("a b.mp4"), b"a").unwrap();
        std::fs::write(root.join("files").join("c.webm"), b"c").unwrap();

        assert_eq!(
            resolve_media(root, "video_files/a%20b.mp4", &extensions()),
            Some(root.join("video_files").join("a b.mp4"))
        );
        assert_eq!(
            resolve_media(root, "../other/c.webm", &extensions()),
            Some(root.join("files").join("c.webm"))
        );
        assert_eq!(resolve_media(root, "missing.mp4", &extensions()), None);
        assert_eq!(resolve_media(root, "files/c.jpg", &extensions()), None);
    }

    #[test]
    fn test_export_without_format_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let result = parse_export(temp_dir.path(), &extensions());
        assert!(matches!(result, Err(ArchiveError::NoExport(_))));
    }
}
