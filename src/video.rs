use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::titles::Caption;

const HASH_CHUNK_SIZE: usize = 8192;

/// A video attachment found in a chat export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoData {
    /// Resolved path of the video file
    pub file_path: PathBuf,

    /// Caption of the message carrying the video
    pub caption: Caption,

    /// Message date, when the export records one
    pub date: Option<DateTime<Utc>>,

    /// Channel the export belongs to
    pub channel: Option<String>,
}

impl VideoData {
    pub fn new(file_path: PathBuf, caption: Caption, date: Option<DateTime<Utc>>) -> Self {
        Self {
            file_path,
            caption,
            date,
            channel: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Whether a path has one of the supported video extensions (case-insensitive)
pub fn is_supported_video(path: &Path, supported_extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            supported_extensions.iter().any(|supported| supported.eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// MD5 of a file's content, read in fixed-size chunks
pub fn file_hash(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| anyhow!("Cannot open {} for hashing: {}", path.display(), e))?;
    let mut context = md5::Context::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// Hash a file on the blocking pool
pub async fn hash_file(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || file_hash(&path)).await?
}

/// Find chat export folders under a root directory.
///
/// An export folder holds `result.json` or `messages*.html` directly.
pub fn discover_exports(root: &Path) -> Vec<PathBuf> {
    let mut exports: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_export_entry_point(entry.path()))
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect();

    exports.sort();
    exports.dedup();
    debug!("🔍 Found {} export folders under {}", exports.len(), root.display());
    exports
}

fn is_export_entry_point(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    let name = name.to_lowercase();
    name == "result.json" || (name.starts_with("messages") && name.ends_with(".html"))
}
