use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{resolve_media, ArchiveError, ArchiveFormat, ArchiveParser};
use crate::titles::Caption;
use crate::video::VideoData;

/// Parser for Telegram JSON exports (`result.json` and other `*.json` files)
pub struct JsonExportParser {
    root: PathBuf,
    supported_extensions: Vec<String>,
}

impl JsonExportParser {
    pub fn new(root: &Path, supported_extensions: &[String]) -> Self {
        Self {
            root: root.to_path_buf(),
            supported_extensions: supported_extensions.to_vec(),
        }
    }

    fn json_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        files.sort();
        files
    }

    fn parse_file(&self, path: &Path) -> Result<Vec<VideoData>, ArchiveError> {
        let text = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&text).map_err(|source| ArchiveError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(messages(&document)
            .into_iter()
            .filter_map(|message| self.parse_message(message))
            .collect())
    }

    fn parse_message(&self, message: &Value) -> Option<VideoData> {
        let file_path = media_references(message)
            .into_iter()
            .find_map(|reference| resolve_media(&self.root, reference, &self.supported_extensions))?;

        let caption = message
            .get("text")
            .map(Caption::from_value)
            .unwrap_or_default();

        Some(VideoData::new(file_path, caption, message_date(message)))
    }
}

impl ArchiveParser for JsonExportParser {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Json
    }

    fn detect(&self) -> bool {
        !self.json_files().is_empty()
    }

    /// Malformed files are logged and skipped; the rest still parse.
    fn parse(&self) -> Result<Vec<VideoData>, ArchiveError> {
        let mut videos = Vec::new();
        for path in self.json_files() {
            match self.parse_file(&path) {
                Ok(found) => {
                    debug!("📄 {}: {} videos", path.display(), found.len());
                    videos.extend(found);
                }
                Err(e) => warn!("⚠️ Skipping {}: {}", path.display(), e),
            }
        }
        Ok(videos)
    }
}

/// Messages from a bare array, `{"messages": [...]}`, or `{"chats": ...}`.
fn messages(document: &Value) -> Vec<&Value> {
    match document {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("messages") {
                return items.iter().collect();
            }
            let chats = match map.get("chats") {
                Some(Value::Array(chats)) => chats.as_slice(),
                Some(Value::Object(chats)) => match chats.get("list") {
                    Some(Value::Array(list)) => list.as_slice(),
                    _ => &[],
                },
                _ => &[],
            };
            chats
                .iter()
                .filter_map(|chat| chat.get("messages").and_then(Value::as_array))
                .flatten()
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Candidate file references of a message, most specific first.
fn media_references(message: &Value) -> Vec<&str> {
    let media = message.get("media");
    [
        message.get("file"),
        media.and_then(|media| media.get("file")),
        media.and_then(|media| media.get("path")),
        media.and_then(|media| media.get("video")).and_then(|video| video.get("file")),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .collect()
}

fn message_date(message: &Value) -> Option<DateTime<Utc>> {
    let unix = message.get("date_unixtime").and_then(|value| match value {
        Value::String(s) => s.parse::<i64>().ok(),
        other => other.as_i64(),
    });
    if let Some(timestamp) = unix {
        return DateTime::from_timestamp(timestamp, 0);
    }

    match message.get("date")? {
        Value::Number(number) => number
            .as_f64()
            .and_then(|timestamp| DateTime::from_timestamp(timestamp as i64, 0)),
        Value::String(text) => parse_date_text(text),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        vec!["mp4".to_string(), "webm".to_string()]
    }

    #[test]
    fn test_parse_telegram_result_json() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("video_files")).unwrap();
        std::fs::write(root.join("video_files").join("a.mp4"), b"a").unwrap();
        std::fs::write(root.join("video_files").join("b.mp4"), b"b").unwrap();

        let document = json!({
            "name": "Курс ЕГЭ",
            "messages": [
                {"id": 1, "type": "service", "date": "2024-10-16T10:00:00", "text": ""},
                {
                    "id": 2,
                    "date": "2024-10-16T12:30:45",
                    "date_unixtime": "1729081845",
                    "file": "video_files/a.mp4",
                    "media_type": "video_file",
                    "text": ["Задание №25 ", {"type": "bold", "text": "(Решу ЕГЭ)"}]
                },
                {"id": 3, "date": "2024-10-17T08:00:00", "file": "video_files/b.mp4", "text": "Урок 3. Графы"},
                {"id": 4, "file": "(File not included. Change data exporting settings to download.)"}
            ]
        });
        std::fs::write(root.join("result.json"), document.to_string()).unwrap();

        let parser = JsonExportParser::new(root, &extensions());
        assert!(parser.detect());
        let videos = parser.parse().unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].caption.first_line(), "Задание №25  (Решу ЕГЭ)");
        assert_eq!(videos[0].date.unwrap().timestamp(), 1729081845);
        assert_eq!(videos[1].file_name(), "b.mp4");
        assert_eq!(videos[1].date.unwrap().to_rfc3339(), "2024-10-17T08:00:00+00:00");
    }

    #[test]
    fn test_messages_from_all_layouts() {
        let bare = json!([{"id": 1}]);
        let chats = json!({"chats": [{"messages": [{"id": 1}, {"id": 2}]}]});
        let listed = json!({"chats": {"list": [{"messages": [{"id": 1}]}, {"messages": [{"id": 2}]}]}});
        assert_eq!(messages(&bare).len(), 1);
        assert_eq!(messages(&chats).len(), 2);
        assert_eq!(messages(&listed).len(), 2);
        assert!(messages(&json!("nope")).is_empty());
    }

    #[test]
    fn test_media_reference_shapes() {
        let nested = json!({"media": {"video": {"file": "files/v.mp4"}}});
        let path = json!({"media": {"path": "files/p.mp4"}});
        assert_eq!(media_references(&nested), vec!["files/v.mp4"]);
        assert_eq!(media_references(&path), vec!["files/p.mp4"]);
    }

    #[test]
    fn test_numeric_date() {
        let message = json!({"date": 1700000000});
        assert_eq!(message_date(&message).unwrap().timestamp(), 1700000000);
    }

    #[test]
    fn test_malformed_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), b"{not json").unwrap();
        let parser = JsonExportParser::new(temp_dir.path(), &extensions());
        assert!(parser.parse().unwrap().is_empty());
    }
}
