//! Alternative title strategies.
//!
//! `Channel` is the profile pipeline used by default. The others build plain
//! titles from the filename, message date or caption, and `Composite` joins
//! several of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::caption::Caption;
use super::file_stem;
use super::render::UNTITLED;

/// How a video title is produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TitleStrategy {
    /// Channel profile rules
    #[default]
    Channel,

    /// Filename stem
    Simple,

    /// `<date> - <stem>`; just the stem when the date is unknown
    Date {
        #[serde(default = "default_date_format")]
        format: String,
    },

    /// The caption cut at a word boundary; the stem when there is no caption
    Description {
        #[serde(default = "default_description_chars")]
        max_chars: usize,
    },

    /// Non-empty parts joined by `separator`
    Composite {
        parts: Vec<TitleStrategy>,
        #[serde(default = "default_separator")]
        separator: String,
    },
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_description_chars() -> usize {
    100
}

fn default_separator() -> String {
    " | ".to_string()
}

/// Everything a strategy may look at for one video
#[derive(Debug, Clone, Copy)]
pub struct TitleRequest<'a> {
    pub caption: &'a Caption,
    pub file_name: &'a str,
    pub channel: Option<&'a str>,
    pub date: Option<DateTime<Utc>>,
}

/// Title from the filename stem
pub fn simple_title(file_name: &str) -> String {
    file_stem(file_name)
}

pub fn date_title(request: &TitleRequest<'_>, format: &str) -> String {
    let stem = file_stem(request.file_name);
    match request.date {
        Some(date) => format!("{} - {}", date.format(format), stem),
        None => stem,
    }
}

pub fn description_title(request: &TitleRequest<'_>, max_chars: usize) -> String {
    let description = request.caption.normalize().full;
    let description = description.trim();
    if description.is_empty() {
        return file_stem(request.file_name);
    }
    if description.chars().count() <= max_chars {
        return description.to_string();
    }

    let head: String = description.chars().take(max_chars).collect();
    let cut = head.rfind(' ').map_or(head.as_str(), |idx| &head[..idx]);
    format!("{}...", cut.trim_end())
}

/// Falls back to the stem, then to the untitled label, so the result is never empty
pub(crate) fn non_empty(title: String, file_name: &str) -> String {
    if !title.trim().is_empty() {
        return title;
    }
    let stem = file_stem(file_name);
    if stem.trim().is_empty() {
        UNTITLED.to_string()
    } else {
        stem
    }
}
