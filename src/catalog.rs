use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Failed to replace catalog file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Catalog writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Video record not found: {0}")]
    NotFound(u64),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Publication state of a cataloged video
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Unpublished,
    Published,
    Failed,
}

impl PublishStatus {
    /// Unpublished and failed videos are both due for upload
    pub fn is_pending(self) -> bool {
        !matches!(self, PublishStatus::Published)
    }
}

/// A cataloged video, keyed by its unique file path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRecord {
    pub id: u64,

    /// Video file path; unique across the catalog
    pub file_path: PathBuf,

    /// MD5 of the file content, when it could be computed
    pub file_hash: Option<String>,

    /// Generated title
    pub title: String,

    /// Full caption text
    pub caption: String,

    pub channel: Option<String>,

    /// Export folder the video came from
    pub source_folder: Option<String>,

    /// Message date from the export
    pub date: Option<DateTime<Utc>>,

    pub status: PublishStatus,

    /// Set together with `Published`
    pub video_url: Option<String>,

    pub post_url: Option<String>,

    /// Set together with `Failed`
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,

    pub published_at: Option<DateTime<Utc>>,
}

/// Fields written by a scan
#[derive(Debug, Clone)]
pub struct NewVideoRecord {
    pub file_path: PathBuf,
    pub file_hash: Option<String>,
    pub title: String,
    pub caption: String,
    pub channel: Option<String>,
    pub source_folder: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Optional channel / source folder restriction for queries
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub channel: Option<String>,
    pub source_folder: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &VideoRecord) -> bool {
        let channel_ok = self
            .channel
            .as_ref()
            .map_or(true, |channel| record.channel.as_ref() == Some(channel));
        let source_ok = self
            .source_folder
            .as_ref()
            .map_or(true, |source| record.source_folder.as_ref() == Some(source));
        channel_ok && source_ok
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogStats {
    pub total: usize,
    pub published: usize,
    pub pending: usize,
    pub failed: usize,
    pub channels: usize,
    pub source_folders: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogDocument {
    next_id: u64,
    records: BTreeMap<u64, VideoRecord>,
}

/// JSON-file video catalog.
///
/// All records live in one document. Every mutation is staged on a copy,
/// written atomically off the async workers, and only then made visible, so
/// readers never see a change the file does not hold.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    document: Arc<RwLock<CatalogDocument>>,
}

impl Catalog {
    /// Open the catalog at `path`, creating an empty one if it does not exist
    pub async fn open(path: impl Into<PathBuf>) -> CatalogResult<Self> {
        let path = path.into();
        let document = match tokio::fs::read_to_string(&path).await {
            Ok(text) if !text.trim().is_empty() => serde_json::from_str(&text)?,
            Ok(_) => CatalogDocument::default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CatalogDocument::default(),
            Err(e) => return Err(e.into()),
        };

        info!("📊 Catalog {} opened with {} records", path.display(), document.records.len());
        Ok(Self {
            path,
            document: Arc::new(RwLock::new(document)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a new record, or refresh the scan fields of the record with the
    /// same path. Publication fields of an existing record are preserved.
    pub async fn upsert(&self, new: NewVideoRecord) -> CatalogResult<(u64, UpsertOutcome)> {
        self.commit(|document| Ok(document.upsert(new))).await
    }

    /// Upsert a batch of records with a single write of the catalog file.
    /// Either every record is stored or none is.
    pub async fn upsert_many(&self, batch: Vec<NewVideoRecord>) -> CatalogResult<Vec<(u64, UpsertOutcome)>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.commit(|document| Ok(batch.into_iter().map(|new| document.upsert(new)).collect()))
            .await
    }

    pub async fn get(&self, id: u64) -> Option<VideoRecord> {
        self.document.read().await.records.get(&id).cloned()
    }

    pub async fn find_by_path(&self, path: &Path) -> Option<VideoRecord> {
        let document = self.document.read().await;
        document.records.values().find(|record| record.file_path == path).cloned()
    }

    pub async fn find_by_hash(&self, hash: &str) -> Option<VideoRecord> {
        let document = self.document.read().await;
        document
            .records
            .values()
            .find(|record| record.file_hash.as_deref() == Some(hash))
            .cloned()
    }

    /// Lowest-id record still due for upload
    pub async fn next_pending(&self, filter: &RecordFilter) -> Option<VideoRecord> {
        let document = self.document.read().await;
        document
            .records
            .values()
            .find(|record| record.status.is_pending() && filter.matches(record))
            .cloned()
    }

    /// All records due for upload, in id order
    pub async fn pending(&self, filter: &RecordFilter) -> Vec<VideoRecord> {
        let document = self.document.read().await;
        document
            .records
            .values()
            .filter(|record| record.status.is_pending() && filter.matches(record))
            .cloned()
            .collect()
    }

    /// Up to `count` records starting at `start_id`, in id order
    pub async fn range(&self, start_id: u64, count: usize, filter: &RecordFilter) -> Vec<VideoRecord> {
        let document = self.document.read().await;
        document
            .records
            .range(start_id..)
            .map(|(_, record)| record)
            .filter(|record| filter.matches(record))
            .take(count)
            .cloned()
            .collect()
    }

    pub async fn all(&self, filter: &RecordFilter) -> Vec<VideoRecord> {
        self.range(0, usize::MAX, filter).await
    }

    pub async fn set_title(&self, id: u64, title: String) -> CatalogResult<()> {
        self.update(id, |record| record.title = title).await
    }

    /// Mark a record published; status, URL and timestamp change together
    pub async fn mark_published(&self, id: u64, video_url: String, post_url: Option<String>) -> CatalogResult<()> {
        self.update(id, |record| {
            record.status = PublishStatus::Published;
            record.video_url = Some(video_url);
            record.post_url = post_url;
            record.error_message = None;
            record.published_at = Some(Utc::now());
        })
        .await
    }

    /// Mark a failed upload attempt with its error; any earlier URL is kept
    pub async fn mark_failed(&self, id: u64, error: String) -> CatalogResult<()> {
        self.update(id, |record| {
            if record.status != PublishStatus::Published {
                record.status = PublishStatus::Failed;
            }
            record.error_message = Some(error);
            record.published_at = Some(Utc::now());
        })
        .await
    }

    pub async fn statistics(&self) -> CatalogStats {
        let document = self.document.read().await;
        let mut stats = CatalogStats::default();
        let mut channels = BTreeSet::new();
        let mut sources = BTreeSet::new();

        for record in document.records.values() {
            stats.total += 1;
            match record.status {
                PublishStatus::Published => stats.published += 1,
                PublishStatus::Unpublished => stats.pending += 1,
                PublishStatus::Failed => {
                    stats.pending += 1;
                    stats.failed += 1;
                }
            }
            if let Some(channel) = &record.channel {
                channels.insert(channel.clone());
            }
            if let Some(source) = &record.source_folder {
                sources.insert(source.clone());
            }
        }

        stats.channels = channels.len();
        stats.source_folders = sources.len();
        stats
    }

    async fn update<F>(&self, id: u64, apply: F) -> CatalogResult<()>
    where
        F: FnOnce(&mut VideoRecord),
    {
        self.commit(|document| {
            let record = document.records.get_mut(&id).ok_or(CatalogError::NotFound(id))?;
            apply(record);
            Ok(())
        })
        .await
    }

    /// Apply `change` to a copy of the document and swap the copy in only
    /// once it is on disk. The write lock is held throughout, so writers are
    /// serialized and a failed write leaves memory matching the file.
    async fn commit<T, F>(&self, change: F) -> CatalogResult<T>
    where
        F: FnOnce(&mut CatalogDocument) -> CatalogResult<T>,
    {
        let mut document = self.document.write().await;
        let mut staged = document.clone();
        let result = change(&mut staged)?;

        let bytes = serde_json::to_vec_pretty(&staged)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes)).await??;

        *document = staged;
        Ok(result)
    }
}

impl CatalogDocument {
    fn upsert(&mut self, new: NewVideoRecord) -> (u64, UpsertOutcome) {
        let existing = self
            .records
            .values_mut()
            .find(|record| record.file_path == new.file_path);

        if let Some(record) = existing {
            record.file_hash = new.file_hash.or(record.file_hash.take());
            record.title = new.title;
            record.caption = new.caption;
            record.channel = new.channel;
            record.source_folder = new.source_folder;
            record.date = new.date;
            debug!("🔄 Updated record {} ({})", record.id, record.file_path.display());
            return (record.id, UpsertOutcome::Updated);
        }

        self.next_id += 1;
        let id = self.next_id;
        let record = VideoRecord {
            id,
            file_path: new.file_path,
            file_hash: new.file_hash,
            title: new.title,
            caption: new.caption,
            channel: new.channel,
            source_folder: new.source_folder,
            date: new.date,
            status: PublishStatus::Unpublished,
            video_url: None,
            post_url: None,
            error_message: None,
            created_at: Utc::now(),
            published_at: None,
        };
        debug!("➕ Added record {} ({})", id, record.file_path.display());
        self.records.insert(id, record);
        (id, UpsertOutcome::Inserted)
    }
}

/// Write `bytes` to a temp file beside `path` and rename it over `path`
fn write_atomically(path: &Path, bytes: &[u8]) -> CatalogResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut file = tempfile::NamedTempFile::new_in(&dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path)?;
    Ok(())
}
