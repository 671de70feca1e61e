use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::catalog::{Catalog, PublishStatus, RecordFilter, VideoRecord};

/// One catalog record as written to an export file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedVideo {
    pub id: u64,
    pub file: PathBuf,
    pub title: String,
    pub channel: Option<String>,
    pub status: PublishStatus,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&VideoRecord> for ExportedVideo {
    fn from(record: &VideoRecord) -> Self {
        Self {
            id: record.id,
            file: record.file_path.clone(),
            title: record.title.clone(),
            channel: record.channel.clone(),
            status: record.status,
            url: record.video_url.clone(),
            published_at: record.published_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogExport {
    pub exported_at: DateTime<Utc>,
    pub total: usize,
    pub videos: Vec<ExportedVideo>,
}

/// Export file format, picked from the output extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Xlsx,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => ExportFormat::Xlsx,
            _ => ExportFormat::Json,
        }
    }
}

/// Spreadsheet columns and their widths
const XLSX_COLUMNS: &[(&str, f64)] = &[
    ("ID", 8.0),
    ("Путь к файлу", 50.0),
    ("Хеш файла", 20.0),
    ("Заголовок", 60.0),
    ("Описание", 50.0),
    ("Канал", 10.0),
    ("Папка источника", 40.0),
    ("Дата видео", 20.0),
    ("Загружено", 10.0),
    ("Дата загрузки", 20.0),
    ("URL видео", 50.0),
    ("URL поста", 50.0),
    ("Ошибка", 50.0),
    ("Создано", 20.0),
];

const XLSX_CAPTION_CHARS: usize = 500;

/// Write matching records to `output` as JSON, or as a spreadsheet when the
/// path ends in `.xlsx`. Returns how many records were written.
pub async fn export_catalog(catalog: &Catalog, filter: &RecordFilter, output: &Path) -> Result<usize> {
    let records = catalog.all(filter).await;

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    match ExportFormat::from_path(output) {
        ExportFormat::Json => write_json(&records, output).await?,
        ExportFormat::Xlsx => {
            let path = output.to_path_buf();
            let rows = records.clone();
            tokio::task::spawn_blocking(move || write_xlsx(&rows, &path))
                .await
                .context("Spreadsheet writer task panicked")??;
        }
    }

    info!("💾 Exported {} videos to: {}", records.len(), output.display());
    Ok(records.len())
}

async fn write_json(records: &[VideoRecord], output: &Path) -> Result<()> {
    let videos: Vec<ExportedVideo> = records.iter().map(ExportedVideo::from).collect();
    let export = CatalogExport {
        exported_at: Utc::now(),
        total: videos.len(),
        videos,
    };

    let json_data = serde_json::to_string_pretty(&export)?;
    tokio::fs::write(output, json_data)
        .await
        .with_context(|| format!("Failed to write export {}", output.display()))
}

fn write_xlsx(records: &[VideoRecord], output: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Видео")?;

    let header = Format::new().set_bold();
    for (col, (name, width)) in XLSX_COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *name, &header)?;
        worksheet.set_column_width(col, *width)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        let caption: String = record.caption.chars().take(XLSX_CAPTION_CHARS).collect();
        let cells = [
            record.file_path.display().to_string(),
            record.file_hash.clone().unwrap_or_default(),
            record.title.clone(),
            caption,
            record.channel.clone().unwrap_or_default(),
            record.source_folder.clone().unwrap_or_default(),
            format_time(record.date),
            if record.status == PublishStatus::Published { "Да" } else { "Нет" }.to_string(),
            format_time(record.published_at),
            record.video_url.clone().unwrap_or_default(),
            record.post_url.clone().unwrap_or_default(),
            record.error_message.clone().unwrap_or_default(),
            format_time(Some(record.created_at)),
        ];

        worksheet.write_number(row, 0, record.id as f64)?;
        for (offset, value) in cells.iter().enumerate() {
            worksheet.write_string(row, offset as u16 + 1, value.as_str())?;
        }
    }

    workbook
        .save(output)
        .with_context(|| format!("Failed to write spreadsheet {}", output.display()))?;
    Ok(())
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
