//! Field extractors over a caption's first line.
//!
//! Every extractor is a pure function returning `None` when nothing matches;
//! a miss is never an error.

use regex::Regex;
use std::sync::LazyLock;

use super::profiles::{ChannelProfile, ResourcePattern, TopicPattern};

/// Adjacent numbers must differ by more than this to count as a subtype tag.
const SUBTYPE_MIN_GAP: u64 = 5;

static RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)задани[ий]\s+(\d+)[-_](\d+)").unwrap());
static DASH_PAIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*-\s*(\d+)").unwrap());
static UNDERSCORE_PAIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)_(\d+)").unwrap());
static LANGUAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:в|на)\s+python\s*$").unwrap());
static PLATFORM_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+под\s+\w+\s*$").unwrap());
static TASK_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"задани[ея]\s+\d+").unwrap());

/// Short course topics accepted even below the usual length gate.
const KNOWN_SHORT_TOPICS: &[&str] = &["циклы", "ооп", "числа", "строки", "списки"];

/// Fields pulled out of a caption line for a task title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub number: Option<u64>,
    pub range: Option<(u64, u64)>,
    pub subtype: Option<String>,
    pub resource: Option<String>,
    pub topic: Option<String>,
}

/// A topic phrase, optionally tied to a lesson number such as `23_1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPhrase {
    pub phrase: String,
    pub lesson: Option<String>,
}

/// Character count, not byte length.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Text before the first period, trimmed.
pub fn first_sentence(line: &str) -> &str {
    line.split('.').next().unwrap_or("").trim()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cap a topic at `max_chars`.
///
/// Cuts at the last space inside the cap when that leaves more than
/// `min_cut_chars`; otherwise hard-cuts and appends `...`.
pub fn truncate_topic(topic: &str, max_chars: usize, min_cut_chars: usize) -> String {
    if char_len(topic) <= max_chars {
        return topic.to_string();
    }

    let head: String = topic.chars().take(max_chars).collect();
    let cut = head.rfind(' ').map_or(head.as_str(), |idx| &head[..idx]);
    if char_len(cut) > min_cut_chars {
        return cut.to_string();
    }

    let hard: String = topic.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", hard)
}

/// `задания N-M` / `заданий N_M`.
pub fn extract_range(line: &str) -> Option<(u64, u64)> {
    let caps = RANGE.captures(line)?;
    let start = caps[1].parse().ok()?;
    let end = caps[2].parse().ok()?;
    Some((start, end))
}

/// First hit across `patterns`, tried strictly in order. A zero is no number;
/// a capture too large for `u64` moves on to the next pattern.
pub fn extract_task_number(line: &str, patterns: &[Regex]) -> Option<u64> {
    patterns
        .iter()
        .filter_map(|pattern| pattern.captures(line))
        .find_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
        .filter(|number| *number > 0)
}

/// `N - M` or `N_M` where `N` is the task number and `M` is far from it.
///
/// Rendered as `N_M`. A detected range consumes the pair first.
pub fn extract_subtype(line: &str, number: u64, has_range: bool) -> Option<String> {
    if has_range {
        return None;
    }

    [&*DASH_PAIR, &*UNDERSCORE_PAIR].into_iter().find_map(|pattern| {
        let caps = pattern.captures(line)?;
        let first: u64 = caps[1].parse().ok()?;
        let second: u64 = caps[2].parse().ok()?;
        (first == number && first.abs_diff(second) > SUBTYPE_MIN_GAP)
            .then(|| format!("{}_{}", &caps[1], &caps[2]))
    })
}

/// First vocabulary entry found in the line, as its canonical name.
pub fn extract_resource(line: &str, vocabulary: &[ResourcePattern]) -> Option<String> {
    vocabulary.iter().find_map(|resource| {
        let found = resource.pattern.find(line)?;
        let name = match resource.canonical {
            Some(name) => name.to_string(),
            None => found
                .as_str()
                .trim()
                .trim_matches(|c| c == '(' || c == ')')
                .to_string(),
        };
        Some(name)
    })
}

/// Apply ordered phrase patterns; the first phrase passing its length gate wins.
pub fn extract_topic(line: &str, patterns: &[TopicPattern]) -> Option<TopicPhrase> {
    patterns.iter().find_map(|topic| {
        let caps = topic.pattern.captures(line)?;
        let (lesson, phrase) = if topic.lesson {
            (Some(caps.get(1)?.as_str().replace('.', "_")), caps.get(2)?)
        } else {
            (None, caps.get(1)?)
        };

        let mut phrase = phrase.as_str().trim().to_string();
        if topic.strip_language_suffix {
            phrase = LANGUAGE_SUFFIX.replace(&phrase, "").trim().to_string();
        }

        (char_len(&phrase) > topic.min_chars).then_some(TopicPhrase { phrase, lesson })
    })
}

/// Course-style topic from the first sentence, for captions without a task number.
pub fn extract_sentence_topic(line: &str) -> Option<String> {
    if TASK_MENTION.is_match(&line.to_lowercase()) {
        return None;
    }

    let sentence = first_sentence(line);
    let sentence = LANGUAGE_SUFFIX.replace(sentence, "");
    let sentence = PLATFORM_SUFFIX.replace(&sentence, "");
    let topic = sentence.trim();

    let known = KNOWN_SHORT_TOPICS.contains(&topic.to_lowercase().as_str());
    (known || char_len(topic) > 3).then(|| topic.to_string())
}

/// Topic attached to a course task: an explicit `тема "..."` phrase, then keywords.
pub fn extract_task_topic(
    line: &str,
    patterns: &[Regex],
    keyword_topics: &[(Regex, &'static str)],
) -> Option<String> {
    let explicit = patterns.iter().find_map(|pattern| {
        let caps = pattern.captures(line)?;
        let topic = caps
            .get(1)?
            .as_str()
            .trim()
            .trim_matches(|c| c == '"' || c == '\'');
        (char_len(topic) > 2).then(|| topic.to_string())
    });

    explicit.or_else(|| {
        keyword_topics
            .iter()
            .find(|(pattern, _)| pattern.is_match(line))
            .map(|(_, topic)| topic.to_string())
    })
}

/// Everything a task title needs, per the channel's extraction settings.
pub fn extract_fields(line: &str, profile: &ChannelProfile) -> ExtractionResult {
    let range = if profile.ranges { extract_range(line) } else { None };
    let number = match range {
        Some((start, _)) => Some(start).filter(|n| *n > 0),
        None => extract_task_number(line, &profile.task_patterns),
    };

    let Some(number) = number else {
        return ExtractionResult::default();
    };

    let subtype = if profile.subtypes {
        extract_subtype(line, number, range.is_some())
    } else {
        None
    };

    ExtractionResult {
        number: Some(number),
        range,
        subtype,
        resource: extract_resource(line, &profile.resources),
        topic: extract_task_topic(line, &profile.task_topic_patterns, &profile.keyword_topics),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::titles::profiles::registry;

    fn ege() -> &'static ChannelProfile {
        registry().lookup("ЕГЭ")
    }

    #[test]
    fn test_range_takes_priority() {
        let fields = extract_fields("Разбор заданий 19-21", ege());
        assert_eq!(fields.number, Some(19));
        assert_eq!(fields.range, Some((19, 21)));
        assert_eq!(fields.subtype, None);
    }

    #[test]
    fn test_subtype_with_spaced_dash() {
        assert_eq!(extract_subtype("9 - 58517", 9, false), Some("9_58517".to_string()));
    }

    #[test]
    fn test_subtype_requires_matching_number_and_gap() {
        assert_eq!(extract_subtype("22_4708k", 22, false), Some("22_4708".to_string()));
        assert_eq!(extract_subtype("22_4708", 23, false), None);
        assert_eq!(extract_subtype("5_8", 5, false), None);
        assert_eq!(extract_subtype("9 - 58517", 9, true), None);
    }

    #[test]
    fn test_task_number_patterns_in_order() {
        let patterns = &ege().task_patterns;
        assert_eq!(extract_task_number("Тип 15_2 из сборника", patterns), Some(15));
        assert_eq!(extract_task_number("Задание №25 (Решу ЕГЭ)", patterns), Some(25));
        assert_eq!(extract_task_number("Решение нескольких задач из блока 8", patterns), Some(8));
        assert_eq!(extract_task_number("Просто текст", patterns), None);
    }

    #[test]
    fn test_oversized_number_falls_through_to_later_patterns() {
        let patterns = &ege().task_patterns;
        assert_eq!(
            extract_task_number("Тип 99999999999999999999999_1, задача 12", patterns),
            Some(12)
        );
        assert_eq!(extract_task_number("Задание 99999999999999999999999", patterns), None);
    }

    #[test]
    fn test_oversized_range_falls_back_to_single_number() {
        let fields = extract_fields("Разбор заданий 99999999999999999999999-3, задача 5", ege());
        assert_eq!(fields.range, None);
        assert_eq!(fields.number, Some(5));
    }

    #[test]
    fn test_zero_is_not_a_task_number() {
        assert_eq!(extract_task_number("Задание 0", &ege().task_patterns), None);
    }

    #[test]
    fn test_resource_canonical_names() {
        let vocabulary = &ege().resources;
        assert_eq!(
            extract_resource("Задание 3 (РешуЕГЭ)", vocabulary),
            Some("Решу ЕГЭ".to_string())
        );
        assert_eq!(
            extract_resource("Задание 3 (решу   егэ)", vocabulary),
            Some("Решу ЕГЭ".to_string())
        );
        assert_eq!(
            extract_resource("Задание 3 (КЕГЭ.abc)", vocabulary),
            Some("КЕГЭ.abc".to_string())
        );
        assert_eq!(
            extract_resource("Задание 3 Поляков", vocabulary),
            Some("Поляков".to_string())
        );
        assert_eq!(
            extract_resource("задание 3 решуегэ", vocabulary),
            Some("Решу ЕГЭ".to_string())
        );
        assert_eq!(extract_resource("Задание 3", vocabulary), None);
    }

    #[test]
    fn test_topic_with_lesson_number() {
        let topic = extract_topic("Урок 23.1. Структуры данных", &ege().topic_patterns).unwrap();
        assert_eq!(topic.lesson.as_deref(), Some("23_1"));
        assert_eq!(topic.phrase, "Структуры данных");
    }

    #[test]
    fn test_truncate_at_word_boundary() {
        let topic = "Как ".to_string() + &"слово ".repeat(20);
        let truncated = truncate_topic(topic.trim(), 80, 50);
        assert!(char_len(&truncated) <= 80);
        assert!(!truncated.ends_with("..."));
        assert!(!truncated.ends_with(' '));
    }

    #[test]
    fn test_truncate_without_spaces_keeps_full_cap() {
        let topic = "к".repeat(100);
        let truncated = truncate_topic(&topic, 80, 50);
        assert_eq!(truncated, "к".repeat(80));
    }

    #[test]
    fn test_truncate_hard_cut_with_ellipsis() {
        // The only space inside the cap leaves too short a head
        let topic = format!("ab {}", "к".repeat(100));
        let truncated = truncate_topic(&topic, 80, 50);
        assert_eq!(char_len(&truncated), 80);
        assert!(truncated.starts_with("ab к"));
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_sentence_topic_strips_language_suffix() {
        assert_eq!(
            extract_sentence_topic("Работа со словарями в Python. Подробности"),
            Some("Работа со словарями".to_string())
        );
        assert_eq!(extract_sentence_topic("ООП"), Some("ООП".to_string()));
        assert_eq!(extract_sentence_topic("Решаем задание 4"), None);
    }

    #[test]
    fn test_course_task_topic() {
        let python = registry().lookup("python");
        let topic = extract_task_topic(
            "Задание 4 (тема \"Срезы\")",
            &python.task_topic_patterns,
            &python.keyword_topics,
        );
        assert_eq!(topic.as_deref(), Some("Срезы"));

        let topic = extract_task_topic(
            "Задание 7 на вложенные циклы",
            &python.task_topic_patterns,
            &python.keyword_topics,
        );
        assert_eq!(topic.as_deref(), Some("Циклы"));
    }
}
