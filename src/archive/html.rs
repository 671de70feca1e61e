use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::{ElementRef, Html, Node, Selector};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::{resolve_media, ArchiveError, ArchiveFormat, ArchiveParser};
use crate::titles::Caption;
use crate::video::VideoData;

static MESSAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.message").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static TEXT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.text").unwrap());
static DATE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.date").unwrap());

/// Parser for Telegram HTML exports (`messages.html`, `messages2.html`, ...)
pub struct HtmlExportParser {
    root: PathBuf,
    supported_extensions: Vec<String>,
}

impl HtmlExportParser {
    pub fn new(root: &Path, supported_extensions: &[String]) -> Self {
        Self {
            root: root.to_path_buf(),
            supported_extensions: supported_extensions.to_vec(),
        }
    }

    fn html_files(&self) -> Vec<PathBuf> {
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
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
            })
            .collect();

        // messages.html, messages2.html, ..., messages10.html
        files.sort_by_key(|path| page_number(path));
        files
    }

    fn parse_page(&self, html: &str) -> Vec<VideoData> {
        let document = Html::parse_document(html);
        document
            .select(&MESSAGE)
            .filter_map(|message| self.parse_message(message))
            .collect()
    }

    fn parse_message(&self, message: ElementRef<'_>) -> Option<VideoData> {
        let file_path = message
            .select(&LINK)
            .filter_map(|link| link.value().attr("href"))
            .find_map(|href| resolve_media(&self.root, href, &self.supported_extensions))?;

        let caption = message
            .select(&TEXT)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let date = message
            .select(&DATE)
            .next()
            .and_then(|date| date.value().attr("title"))
            .and_then(parse_export_date);

        Some(VideoData::new(file_path, Caption::new(caption), date))
    }
}

impl ArchiveParser for HtmlExportParser {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Html
    }

    fn detect(&self) -> bool {
        !self.html_files().is_empty()
    }

    fn parse(&self) -> Result<Vec<VideoData>, ArchiveError> {
        let mut videos = Vec::new();
        for page in self.html_files() {
            let html = match std::fs::read_to_string(&page) {
                Ok(html) => html,
                Err(e) => {
                    warn!("⚠️ Skipping unreadable page {}: {}", page.display(), e);
                    continue;
                }
            };
            let found = self.parse_page(&html);
            debug!("📄 {}: {} videos", page.display(), found.len());
            videos.extend(found);
        }
        Ok(videos)
    }
}

/// Element text with `<br>` turned into newlines.
fn element_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(fragment) => text.push_str(fragment),
            Node::Element(child) if child.name() == "br" => text.push('\n'),
            _ => {}
        }
    }
    text.trim().to_string()
}

/// `16.10.2024 12:30:45 UTC+03:00`, offset optional.
fn parse_export_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_str(value, "%d.%m.%Y %H:%M:%S UTC%:z") {
        return Some(date.with_timezone(&Utc));
    }
    let local = value.get(..19).unwrap_or(value);
    NaiveDateTime::parse_from_str(local, "%d.%m.%Y %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn page_number(path: &Path) -> (u32, String) {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digits: String = stem.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.parse().unwrap_or(1), stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use tempfile::TempDir;

    const PAGE: &str = r#"
<html><body><div class="history">
  <div class="message service" id="message1"><div class="body details">16 October 2024</div></div>
  <div class="message default clearfix" id="message2">
    <div class="body">
      <div class="pull_right date details" title="16.10.2024 12:30:45 UTC+03:00">12:30</div>
      <div class="media_wrap clearfix">
        <a class="video_file_wrap clearfix pull_left" href="video_files/lesson%201.mp4">video</a>
      </div>
      <div class="text">Урок 23_1. Структуры данных<br>Подробности в описании</div>
    </div>
  </div>
  <div class="message default clearfix" id="message3">
    <div class="body">
      <div class="text">Просто текст без видео <a href="https://example.com">ссылка</a></div>
    </div>
  </div>
  <div class="message default clearfix joined" id="message4">
    <div class="body">
      <div class="pull_right date details" title="17.10.2024 08:00:00">08:00</div>
      <a class="video_file_wrap" href="files/42.webm">video</a>
    </div>
  </div>
</div></body></html>
"#;

    fn export_fixture() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("video_files")).unwrap();
        std::fs::create_dir_all(root.join("files")).unwrap();
        std::fs::write(root.join("video_files").join("lesson 1.mp4"), b"one").unwrap();
        std::fs::write(root.join("files").join("42.webm"), b"two").unwrap();
        std::fs::write(root.join("messages.html"), PAGE).unwrap();
        temp_dir
    }

    #[test]
    fn test_parse_html_export() {
        let temp_dir = export_fixture();
        let extensions = vec!["mp4".to_string(), "webm".to_string()];
        let parser = HtmlExportParser::new(temp_dir.path(), &extensions);
        assert!(parser.detect());

        let videos = parser.parse().unwrap();
        assert_eq!(videos.len(), 2);

        let first = &videos[0];
        assert_eq!(first.file_name(), "lesson 1.mp4");
        assert_eq!(first.caption.first_line(), "Урок 23_1. Структуры данных");
        assert_eq!(first.caption.full(), "Урок 23_1. Структуры данных\nПодробности в описании");
        let date = first.date.unwrap();
        assert_eq!((date.day(), date.hour()), (16, 9));

        let second = &videos[1];
        assert_eq!(second.file_name(), "42.webm");
        assert!(second.caption.is_empty());
        assert_eq!(second.date.unwrap().hour(), 8);
    }

    #[test]
    fn test_pages_sorted_numerically() {
        let mut pages = vec![
            PathBuf::from("messages10.html"),
            PathBuf::from("messages2.html"),
            PathBuf::from("messages.html"),
        ];
        pages.sort_by_key(|path| page_number(path));
        assert_eq!(pages[0], PathBuf::from("messages.html"));
        assert_eq!(pages[2], PathBuf::from("messages10.html"));
    }

    #[test]
    fn test_detect_without_pages() {
        let temp_dir = TempDir::new().unwrap();
        let parser = HtmlExportParser::new(temp_dir.path(), &["mp4".to_string()]);
        assert!(!parser.detect());
    }
}
