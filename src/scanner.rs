use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::archive::parse_export;
use crate::catalog::{Catalog, NewVideoRecord, RecordFilter, UpsertOutcome};
use crate::config::ScanConfig;
use crate::titles::{registry, Caption, TitleEngine, TitleRequest};
use crate::video::{hash_file, VideoData};

/// Counters for one scan run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanStats {
    pub added: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl ScanStats {
    pub fn total(&self) -> usize {
        self.added + self.updated + self.duplicates + self.failed
    }
}

/// Walks chat exports into the catalog, titling every video on the way
pub struct Scanner {
    catalog: Catalog,
    engine: TitleEngine,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(catalog: Catalog, engine: TitleEngine, config: ScanConfig) -> Self {
        Self { catalog, engine, config }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Parse each export folder and upsert its videos.
    ///
    /// With `skip_duplicates`, a video whose content hash already belongs to a
    /// different path is counted and left out.
    pub async fn scan_and_add(&self, exports: &[PathBuf], skip_duplicates: bool) -> Result<ScanStats> {
        let start_time = Instant::now();
        let mut stats = ScanStats::default();

        info!("🚀 Scanning {} export folders...", exports.len());

        for export in exports {
            let mut videos = match self.parse(export).await? {
                Some(videos) => videos,
                None => continue,
            };

            let channel = registry().detect_channel(export).map(|profile| profile.id.to_string());
            let source_folder = export
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            info!(
                "📁 {}: {} videos, channel {}",
                export.display(),
                videos.len(),
                channel.as_deref().unwrap_or("unknown")
            );

            for video in &mut videos {
                video.channel = channel.clone();
            }
            let hashes = self.hash_all(&videos).await;

            // Hashes staged for this export, so copies inside one export are caught too
            let mut staged: HashMap<String, PathBuf> = HashMap::new();
            let mut batch = Vec::with_capacity(videos.len());

            for (video, hash) in videos.into_iter().zip(hashes) {
                if skip_duplicates {
                    if let Some(existing) = self.duplicate_of(&video, hash.as_deref(), &staged).await {
                        debug!(
                            "⏭️ {} duplicates {}",
                            video.file_path.display(),
                            existing.display()
                        );
                        stats.duplicates += 1;
                        continue;
                    }
                }
                if let Some(hash) = &hash {
                    staged.entry(hash.clone()).or_insert_with(|| video.file_path.clone());
                }

                let title = self.engine.title(&TitleRequest {
                    caption: &video.caption,
                    file_name: &video.file_name(),
                    channel: video.channel.as_deref(),
                    date: video.date,
                });
                debug!("🏷️ {} -> {}", video.file_name(), title);

                batch.push(NewVideoRecord {
                    file_path: video.file_path,
                    file_hash: hash,
                    title,
                    caption: video.caption.full().to_string(),
                    channel: video.channel,
                    source_folder: source_folder.clone(),
                    date: video.date,
                });
            }

            let batch_len = batch.len();
            match self.catalog.upsert_many(batch).await {
                Ok(outcomes) => {
                    for (_, outcome) in outcomes {
                        match outcome {
                            UpsertOutcome::Inserted => stats.added += 1,
                            UpsertOutcome::Updated => stats.updated += 1,
                        }
                    }
                }
                Err(e) => {
                    warn!("❌ Failed to store {} videos from {}: {}", batch_len, export.display(), e);
                    stats.failed += batch_len;
                }
            }
        }

        info!(
            "✅ Scan finished in {:.2}s: {} added, {} updated, {} duplicates, {} failed",
            start_time.elapsed().as_secs_f64(),
            stats.added,
            stats.updated,
            stats.duplicates,
            stats.failed
        );
        Ok(stats)
    }

    /// Regenerate stored titles from caption, filename and channel.
    /// Returns how many titles changed.
    pub async fn retitle(&self, filter: &RecordFilter) -> Result<usize> {
        let mut changed = 0;
        for record in self.catalog.all(filter).await {
            let file_name = record
                .file_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let title = self.engine.title(&TitleRequest {
                caption: &Caption::new(record.caption.as_str()),
                file_name: &file_name,
                channel: record.channel.as_deref(),
                date: record.date,
            });

            if title != record.title {
                debug!("🔄 #{}: {} -> {}", record.id, record.title, title);
                self.catalog
                    .set_title(record.id, title)
                    .await
                    .with_context(|| format!("Failed to update title of record {}", record.id))?;
                changed += 1;
            }
        }

        info!("🏷️ Retitled {} records", changed);
        Ok(changed)
    }

    async fn parse(&self, export: &Path) -> Result<Option<Vec<VideoData>>> {
        let root = export.to_path_buf();
        let extensions = self.config.supported_extensions.clone();
        let parsed = tokio::task::spawn_blocking(move || parse_export(&root, &extensions))
            .await
            .context("Export parser task panicked")?;

        match parsed {
            Ok(videos) => Ok(Some(videos)),
            Err(e) => {
                warn!("⚠️ Skipping export {}: {}", export.display(), e);
                Ok(None)
            }
        }
    }

    /// Content hashes in input order, at most `workers` files at a time
    async fn hash_all(&self, videos: &[VideoData]) -> Vec<Option<String>> {
        let workers = self.config.workers.max(1);
        stream::iter(videos.iter().map(|video| video.file_path.clone()))
            .map(|path| async move {
                match hash_file(path.clone()).await {
                    Ok(hash) => Some(hash),
                    Err(e) => {
                        warn!("⚠️ Could not hash {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .buffered(workers)
            .collect()
            .await
    }

    /// Path already holding this content, in the catalog or earlier in the batch
    async fn duplicate_of(
        &self,
        video: &VideoData,
        hash: Option<&str>,
        staged: &HashMap<String, PathBuf>,
    ) -> Option<PathBuf> {
        let hash = hash?;
        let existing = match staged.get(hash) {
            Some(path) => path.clone(),
            None => self.catalog.find_by_hash(hash).await?.file_path,
        };
        (existing != video.file_path).then_some(existing)
    }
}
