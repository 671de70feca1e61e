/// VK Video Publisher
///
/// Turns Telegram chat exports of course videos into a catalog of titled
/// videos and uploads them to VK.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod export;
pub mod publisher;
pub mod scanner;
pub mod titles;
pub mod video;

// Re-export main types for easy access
pub use crate::archive::{parse_export, ArchiveError, ArchiveParser};
pub use crate::catalog::{Catalog, CatalogError, CatalogStats, PublishStatus, RecordFilter, VideoRecord};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::export::{export_catalog, ExportFormat};
pub use crate::publisher::{
    publish_batch, publish_pending, publish_with_retry, PublishError, PublishOptions, PublishReport,
    RetryPolicy, VideoPublisher, VkPublisher,
};
pub use crate::scanner::{ScanStats, Scanner};
pub use crate::titles::{generate_title, Caption, ClassificationOutcome, TitleEngine, TitleRequest, TitleStrategy};
pub use crate::video::{discover_exports, VideoData};
