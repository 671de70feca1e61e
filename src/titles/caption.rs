use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caption text attached to a video message.
///
/// Exports store captions either as a plain string or as an ordered list of
/// rich-text fragments (plain strings mixed with objects such as
/// `{"type": "link", "text": "..."}`). Both shapes collapse into one plain
/// string here; formatting metadata is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub struct Caption {
    text: String,
}

impl Caption {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Coerce any JSON value into caption text. Never fails.
    pub fn from_value(value: &Value) -> Self {
        Self::new(value_text(value))
    }

    /// Raw caption text as received.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Caption with surrounding whitespace removed.
    pub fn full(&self) -> &str {
        self.text.trim()
    }

    /// The line carrying the classification signal.
    pub fn first_line(&self) -> &str {
        self.full().split('\n').next().unwrap_or("").trim()
    }

    pub fn is_empty(&self) -> bool {
        self.full().is_empty()
    }

    pub fn normalize(&self) -> NormalizedCaption {
        let first_line = self.first_line().to_string();
        let lower = first_line.to_lowercase();
        NormalizedCaption {
            full: self.full().to_string(),
            first_line,
            lower,
        }
    }
}

impl From<Value> for Caption {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

impl From<&str> for Caption {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Caption {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<Caption> for String {
    fn from(caption: Caption) -> Self {
        caption.text
    }
}

/// First line of a caption in original and lowercase form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCaption {
    pub full: String,
    pub first_line: String,
    pub lower: String,
}

impl NormalizedCaption {
    pub fn is_empty(&self) -> bool {
        self.first_line.is_empty()
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(fragments) => fragments
            .iter()
            .map(fragment_text)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map.get("text").map(value_text).unwrap_or_default(),
        other => other.to_string(),
    }
}

fn fragment_text(fragment: &Value) -> String {
    match fragment {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(nested) => value_text(nested),
            None => String::new(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_caption_first_line() {
        let caption = Caption::new("  Урок 5. Циклы\nПодробное описание\n");
        assert_eq!(caption.first_line(), "Урок 5. Циклы");
        assert_eq!(caption.full(), "Урок 5. Циклы\nПодробное описание");
    }

    #[test]
    fn test_fragments_joined_with_spaces() {
        let value = json!([
            "Разбор задания 5.",
            {"type": "link", "text": "https://example.com"},
            {"type": "bold", "text": "важно"}
        ]);
        let caption = Caption::from_value(&value);
        assert_eq!(caption.as_str(), "Разбор задания 5. https://example.com важно");
    }

    #[test]
    fn test_malformed_fragments_are_coerced() {
        let value = json!([42, null, {"type": "bold"}, true, {"text": ["a", "b"]}]);
        let caption = Caption::from_value(&value);
        assert_eq!(caption.as_str(), "42   true a b");
    }

    #[test]
    fn test_missing_caption_is_empty() {
        let caption = Caption::from_value(&Value::Null);
        assert!(caption.is_empty());
        assert_eq!(caption.first_line(), "");
        assert!(caption.normalize().is_empty());
    }

    #[test]
    fn test_deserialize_from_either_shape() {
        let plain: Caption = serde_json::from_str("\"Задание 7\"").unwrap();
        let rich: Caption = serde_json::from_str(r#"["Задание", {"text": "7"}]"#).unwrap();
        assert_eq!(plain.first_line(), "Задание 7");
        assert_eq!(rich.first_line(), "Задание 7");
    }

    #[test]
    fn test_normalized_lowercase() {
        let normalized = Caption::new("ВИДЕОРАЗБОР Задания 3").normalize();
        assert_eq!(normalized.lower, "видеоразбор задания 3");
    }
}
