//! Ordered-rule caption classifier.
//!
//! A profile lists the rules to run; the first rule that produces an outcome
//! wins. Rules that hand over to topic or task extraction always produce an
//! outcome, which may be a fallback.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::caption::NormalizedCaption;
use super::extract::{
    char_len, collapse_whitespace, extract_fields, extract_sentence_topic, extract_topic,
    first_sentence, truncate_topic, TopicPhrase,
};
use super::profiles::{is_numbered_video, ChannelProfile, DefaultAction};
use crate::config::TitlesConfig;

static VIDEO_SOLUTION: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)видео\s+решения?\s+задани[ея]\s+(\d+)").unwrap(),
        Regex::new(r"(?i)видеоразбор\s+задани[яе]\s+(\d+)").unwrap(),
    ]
});
static VIDEO_SOLUTION_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"видео\s+решения?\s+задани[яе]|видеоразбор\s+задани[яе]").unwrap());
static LESSON_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"урок\s+\d+[._]\d+\.|урок\s+\d+\.").unwrap());
static BREAKDOWN_WITH_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)разбор\s+задани[ий]\s+(\d+)\.\s+(.+?)(?:\.|$)").unwrap());
static TOPIC_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)разбор\s+задани[ий]\s+по\s+теме\s+\d+\.\s*(.+?)(?:\.|$)").unwrap()
});
static TOPIC_BLOCK_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"разбор\s+задани[ий]\s+по\s+теме\s+\d+").unwrap());
static TASK_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)задани[ея]\s+\d+\.\s+[а-яё]").unwrap());
static SOLVING_WORDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"разбор|решение").unwrap());
static TERMINOLOGY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)термин[ы]?\s+и\s+теори[ия]\s+задани[яе]\s+\d+\.\s*(.+?)(?:\.|$)").unwrap()
});
static USAGE_FOR_TASKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"использование\s+.+?\s+для\s+решения\s+\d+\s+задач").unwrap()
});
static LEADING_DISCOURSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:как|еще|немного|некоторые)").unwrap());
static OPENING_SENTENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+?)(?:\.|$)").unwrap());
static BARE_TASK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:разбор|решение)\s+задани[яе]\s+\d+\s*\.?\s*$").unwrap()
});
static TECHNIQUE_BREAKDOWN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:разбор\s+решения|решение\s+усложненных)\s+задани[ий]\s+\d+\s+с\s+помощью")
        .unwrap()
});
static COURSE_OPENERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:урок\.|видеоурок\.|мини-урок|как\s+|понятие\s+|работа\s+с\s+|методы\s+",
        r"|первая\s+программа|знакомство\s+|самые\s+главные|\d+\.\s+как\s+|\d+\.\s+что\s+",
        r"|циклы|ооп|числа)"
    ))
    .unwrap()
});
static COURSE_TASK_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"задание\s+\d+").unwrap());
static COURSE_TASK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"задание\s+[№#]?\s*\d+|задани[ея]\s+\d+").unwrap());
static NUMERIC_PREFIX_STEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)[_\d]").unwrap());
static PARENTHESIZED_STEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\s*\(").unwrap());

const DEFAULT_RECORDING_LABEL: &str = "Запись встречи";

/// Result of classifying one caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationOutcome {
    Topic(TopicPhrase),
    Task(TaskFields),
    Fallback { reason: FallbackReason, stem: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub number: u64,
    pub range: Option<(u64, u64)>,
    pub subtype: Option<String>,
    pub resource: Option<String>,
    pub topic: Option<String>,
}

impl TaskFields {
    pub fn number(number: u64) -> Self {
        Self { number, range: None, subtype: None, resource: None, topic: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No caption and a filename without a recognizable pattern.
    EmptyCaption,
    /// A meeting or lesson recording; rendered with this fixed label.
    Recording(&'static str),
    NoTopicPhrase,
    NoTaskNumber,
    /// Channel without a profile.
    Unconfigured,
}

/// Caption rules, in the vocabulary profiles use to order them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Filename marks a meeting recording even though a caption exists.
    RecordingStem,
    /// `video12345` filename: the caption's first sentence is the topic.
    NumberedVideoStem,
    /// Short capitalised one-liner that is not a bare task reference.
    ShortPhrase,
    /// "Разбор решения заданий N с помощью ...".
    TechniqueBreakdown,
    /// "Видео решения задания N" / "Видеоразбор задания N".
    VideoSolution,
    /// "Пример N в файле X задания M" / "Пример N для задания M".
    ExampleForTask,
    Lesson,
    /// "Разбор заданий N. <text>".
    BreakdownWithText,
    /// "Разбор заданий по теме N. <text>".
    TopicBlock,
    /// "Задание N. <text>" without solving words.
    TaskHeading,
    InstructionalKeywords,
    Terminology,
    /// "Использование X для решения N задач".
    UsageForTasks,
    LeadingDiscourse,
    /// "Задание N. <text>" even with solving words.
    TaskHeadingLoose,
    /// "Разбор заданий по теме N" without a phrase.
    TopicBlockBare,
    TaskReference,
    CourseTopic,
    CourseTask,
}

struct Context<'a> {
    line: &'a str,
    lower: &'a str,
    stem: &'a str,
    profile: &'a ChannelProfile,
    settings: &'a TitlesConfig,
}

impl Context<'_> {
    fn fallback(&self, reason: FallbackReason) -> ClassificationOutcome {
        ClassificationOutcome::Fallback { reason, stem: self.stem.to_string() }
    }

    /// Topics are capped on every rule path
    fn truncate(&self, phrase: &str) -> String {
        truncate_topic(phrase, self.settings.topic_max_chars, self.settings.topic_min_cut_chars)
    }

    fn topic(&self, phrase: impl AsRef<str>) -> ClassificationOutcome {
        ClassificationOutcome::Topic(TopicPhrase { phrase: self.truncate(phrase.as_ref()), lesson: None })
    }

    fn is_example_in_file(&self) -> bool {
        self.lower.starts_with("пример") && self.lower.contains("в файле")
    }

    fn topic_outcome(&self) -> ClassificationOutcome {
        if let Some(topic) = extract_topic(self.line, &self.profile.topic_patterns) {
            return ClassificationOutcome::Topic(TopicPhrase {
                phrase: self.truncate(&topic.phrase),
                lesson: topic.lesson,
            });
        }
        if self.profile.sentence_topics {
            if let Some(phrase) = extract_sentence_topic(self.line) {
                return self.topic(phrase);
            }
        }
        self.fallback(FallbackReason::NoTopicPhrase)
    }

    fn task_outcome(&self) -> ClassificationOutcome {
        let fields = extract_fields(self.line, self.profile);
        match fields.number {
            Some(number) => ClassificationOutcome::Task(TaskFields {
                number,
                range: fields.range,
                subtype: fields.subtype,
                resource: fields.resource,
                topic: fields.topic.map(|topic| self.truncate(&topic)),
            }),
            None => self.fallback(FallbackReason::NoTaskNumber),
        }
    }

    /// First sentence, or the whole line when the sentence is empty.
    fn sentence_or_line(&self) -> String {
        let sentence = first_sentence(self.line);
        collapse_whitespace(if sentence.is_empty() { self.line } else { sentence })
    }

    fn sentence_topic(&self, min_chars: usize) -> Option<ClassificationOutcome> {
        let sentence = first_sentence(self.line);
        (char_len(sentence) > min_chars).then(|| self.topic(sentence))
    }
}

impl Rule {
    fn apply(self, ctx: &Context<'_>) -> Option<ClassificationOutcome> {
        match self {
            Rule::RecordingStem => {
                let stem = ctx.stem.to_lowercase();
                (stem.contains("встреча") && stem.contains("телемост")).then(|| {
                    let label = ctx.profile.recording.map_or(DEFAULT_RECORDING_LABEL, |r| r.label);
                    ctx.fallback(FallbackReason::Recording(label))
                })
            }
            Rule::NumberedVideoStem => {
                if !is_numbered_video(ctx.stem) {
                    return None;
                }
                let topic = ctx.sentence_or_line();
                (char_len(&topic) > 3).then(|| ctx.topic(topic))
            }
            Rule::ShortPhrase => {
                let starts_upper = ctx.line.chars().next().is_some_and(char::is_uppercase);
                if char_len(ctx.line) >= 90 || !starts_upper {
                    return None;
                }
                let topic = ctx.line.strip_suffix('.').unwrap_or(ctx.line).trim();
                let len = char_len(topic);
                (len > 5 && len < 85 && !BARE_TASK_LINE.is_match(ctx.lower)).then(|| ctx.topic(topic))
            }
            Rule::TechniqueBreakdown => {
                if !TECHNIQUE_BREAKDOWN.is_match(ctx.lower) {
                    return None;
                }
                let topic = ctx.sentence_or_line();
                (char_len(&topic) > 10).then(|| ctx.topic(topic))
            }
            Rule::VideoSolution => {
                if !(ctx.lower.contains("видео") && ctx.lower.contains("задани")) {
                    return None;
                }
                VIDEO_SOLUTION.iter().find_map(|pattern| {
                    let number = pattern.captures(ctx.line)?[1].parse().ok()?;
                    Some(ClassificationOutcome::Task(TaskFields::number(number)))
                })
            }
            Rule::ExampleForTask => {
                let lower = ctx.lower;
                let applies = lower.contains("пример")
                    && lower.contains("задани")
                    && (lower.contains("в файле") || lower.contains("для задани"));
                if !applies {
                    return None;
                }
                ctx.sentence_topic(5)
            }
            Rule::Lesson => LESSON_MARKER.is_match(ctx.lower).then(|| ctx.topic_outcome()),
            Rule::BreakdownWithText => {
                if VIDEO_SOLUTION_ANY.is_match(ctx.lower) {
                    return None;
                }
                let caps = BREAKDOWN_WITH_TEXT.captures(ctx.line)?;
                (char_len(caps[2].trim()) > 5).then(|| ctx.topic_outcome())
            }
            Rule::TopicBlock => {
                let caps = TOPIC_BLOCK.captures(ctx.line)?;
                let topic = caps[1].trim();
                (char_len(topic) > 3).then(|| ctx.topic(topic))
            }
            Rule::TaskHeading => {
                let applies = TASK_HEADING.is_match(ctx.line) && !SOLVING_WORDS.is_match(ctx.lower);
                applies.then(|| ctx.topic_outcome())
            }
            Rule::InstructionalKeywords => {
                let keywords = ctx.profile.instructional_keywords.as_ref()?;
                if !keywords.is_match(ctx.lower) {
                    return None;
                }
                ctx.sentence_topic(5)
            }
            Rule::Terminology => {
                let lower = ctx.lower;
                if !(lower.contains("термин") && lower.contains("теори") && lower.contains("задани")) {
                    return None;
                }
                if let Some(caps) = TERMINOLOGY.captures(ctx.line) {
                    let topic = caps[1].trim();
                    if char_len(topic) > 5 {
                        return Some(ctx.topic(topic));
                    }
                }
                let topic = collapse_whitespace(first_sentence(ctx.line));
                (char_len(&topic) > 5).then(|| ctx.topic(topic))
            }
            Rule::UsageForTasks => {
                if !USAGE_FOR_TASKS.is_match(ctx.lower) {
                    return None;
                }
                ctx.sentence_topic(5)
            }
            Rule::LeadingDiscourse => {
                if !LEADING_DISCOURSE.is_match(ctx.lower) {
                    return None;
                }
                let caps = OPENING_SENTENCE.captures(ctx.line)?;
                let topic = ctx.truncate(caps[1].trim());
                (char_len(&topic) > 10).then(|| ctx.topic(topic))
            }
            Rule::TaskHeadingLoose => {
                let applies = TASK_HEADING.is_match(ctx.line) && !ctx.is_example_in_file();
                applies.then(|| ctx.topic_outcome())
            }
            Rule::TopicBlockBare => TOPIC_BLOCK_BARE.is_match(ctx.lower).then(|| ctx.topic_outcome()),
            Rule::TaskReference => {
                let reference = ctx.profile.task_reference.as_ref()?;
                let applies = reference.is_match(ctx.lower) && !ctx.is_example_in_file();
                applies.then(|| ctx.task_outcome())
            }
            Rule::CourseTopic => {
                let applies =
                    COURSE_OPENERS.is_match(ctx.lower) && !COURSE_TASK_NUMBER.is_match(ctx.lower);
                applies.then(|| ctx.topic_outcome())
            }
            Rule::CourseTask => COURSE_TASK.is_match(ctx.lower).then(|| ctx.task_outcome()),
        }
    }
}

/// Classify a caption for a channel. Total: every input yields an outcome.
pub fn classify(
    caption: &NormalizedCaption,
    stem: &str,
    profile: &ChannelProfile,
    settings: &TitlesConfig,
) -> ClassificationOutcome {
    let ctx = Context {
        line: &caption.first_line,
        lower: &caption.lower,
        stem,
        profile,
        settings,
    };

    if profile.is_simple() {
        return ctx.fallback(FallbackReason::Unconfigured);
    }

    if caption.is_empty() {
        return classify_filename(&ctx);
    }

    for rule in &profile.rules {
        if let Some(outcome) = rule.apply(&ctx) {
            debug!("🏷️ {:?} matched for {} ({})", rule, stem, profile.id);
            return outcome;
        }
    }

    debug!("🏷️ No rule matched for {} ({}), using {:?}", stem, profile.id, profile.default_action);
    match profile.default_action {
        DefaultAction::Task => ctx.task_outcome(),
        DefaultAction::Topic => ctx.topic_outcome(),
        DefaultAction::TaskThenTopic => {
            let outcome = ctx.task_outcome();
            if matches!(outcome, ClassificationOutcome::Fallback { .. }) {
                fallback_topic(&ctx).unwrap_or(outcome)
            } else {
                outcome
            }
        }
    }
}

/// Topic from the first sentence, or from an underscore-separated filename.
fn fallback_topic(ctx: &Context<'_>) -> Option<ClassificationOutcome> {
    let sentence = ctx.sentence_or_line();
    let len = char_len(&sentence);
    if len > 5 && len <= 100 {
        return Some(ctx.topic(sentence));
    }

    if ctx.stem.contains('_') {
        let topic = ctx.stem.replace('_', " ").trim().to_string();
        if char_len(&topic) > 3 {
            return Some(ctx.topic(topic));
        }
    }
    None
}

/// Titles for videos without a caption come from the filename alone.
fn classify_filename(ctx: &Context<'_>) -> ClassificationOutcome {
    let stem = ctx.stem;
    let profile = ctx.profile;

    if let Some(recording) = profile.recording {
        if recording.matches(stem) {
            return ctx.fallback(FallbackReason::Recording(recording.label));
        }
    }

    if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()) {
        if let Some(number) = stem.parse().ok().filter(|n| *n > 0) {
            let mut fields = TaskFields::number(number);
            fields.resource = profile.default_resource.map(str::to_string);
            return ClassificationOutcome::Task(fields);
        }
        return ctx.fallback(FallbackReason::EmptyCaption);
    }

    let prefixed = profile
        .numeric_prefix_stems
        .then(|| NUMERIC_PREFIX_STEM.captures(stem))
        .flatten();
    let leading = [prefixed, PARENTHESIZED_STEM.captures(stem)]
        .into_iter()
        .flatten()
        .find_map(|caps| caps[1].parse::<u64>().ok());
    if let Some(number) = leading.filter(|n| *n > 0) {
        return ClassificationOutcome::Task(TaskFields::number(number));
    }

    ctx.fallback(FallbackReason::EmptyCaption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::titles::caption::Caption;
    use crate::titles::profiles::registry;

    fn run(caption: &str, stem: &str, channel: &str) -> ClassificationOutcome {
        let normalized = Caption::new(caption).normalize();
        classify(&normalized, stem, registry().lookup(channel), &TitlesConfig::default())
    }

    fn topic(phrase: &str) -> ClassificationOutcome {
        ClassificationOutcome::Topic(TopicPhrase { phrase: phrase.to_string(), lesson: None })
    }

    #[test]
    fn test_video_solution_is_bare_task() {
        let outcome = run("Видео решения задания 7 (Решу ЕГЭ)", "a", "ЕГЭ");
        assert_eq!(outcome, ClassificationOutcome::Task(TaskFields::number(7)));
    }

    #[test]
    fn test_example_in_file_is_topic() {
        let outcome = run("Пример 2 в файле B задания 27.", "a", "ЕГЭ");
        assert_eq!(outcome, topic("Пример 2 в файле B задания 27"));
    }

    #[test]
    fn test_lesson_keeps_lesson_number() {
        let outcome = run("Урок 23_1. Структуры данных", "a", "ЕГЭ");
        assert_eq!(
            outcome,
            ClassificationOutcome::Topic(TopicPhrase {
                phrase: "Структуры данных".to_string(),
                lesson: Some("23_1".to_string()),
            })
        );
    }

    #[test]
    fn test_breakdown_with_text_beats_task_number() {
        let outcome = run("Разбор заданий 2. Таблицы истинности", "a", "ЕГЭ");
        assert_eq!(outcome, topic("Таблицы истинности"));
    }

    #[test]
    fn test_breakdown_without_text_is_task() {
        let outcome = run("Разбор задания 14.", "a", "ЕГЭ");
        assert!(matches!(outcome, ClassificationOutcome::Task(TaskFields { number: 14, .. })));
    }

    #[test]
    fn test_topic_block() {
        let outcome = run("Разбор заданий по теме 3. Базы данных. Часть 1", "a", "ЕГЭ");
        assert_eq!(outcome, topic("Базы данных"));
    }

    #[test]
    fn test_task_heading_is_topic() {
        let outcome = run("Задание 5. Кодирование информации", "a", "ЕГЭ");
        assert_eq!(outcome, topic("Кодирование информации"));
    }

    #[test]
    fn test_instructional_keywords() {
        let outcome = run("Лайфхак для быстрого перевода. Смотрите до конца", "a", "ЕГЭ");
        assert_eq!(outcome, topic("Лайфхак для быстрого перевода"));
    }

    #[test]
    fn test_terminology_phrase_after_prefix() {
        let outcome = run("Термины и теория задания 4. Кодирование Фано", "a", "ЕГЭ");
        assert_eq!(outcome, topic("Кодирование Фано"));
    }

    #[test]
    fn test_terminology_without_phrase_uses_sentence() {
        let outcome = run("Термины  и теория   задания 4", "a", "ЕГЭ");
        assert_eq!(outcome, topic("Термины и теория задания 4"));
    }

    #[test]
    fn test_leading_discourse_is_length_gated() {
        assert_eq!(
            run("Как решать задачи на графы. Подробно", "a", "ЕГЭ"),
            topic("Как решать задачи на графы")
        );
        assert!(matches!(
            run("Как так", "stem", "ЕГЭ"),
            ClassificationOutcome::Fallback { reason: FallbackReason::NoTaskNumber, .. }
        ));
    }

    #[test]
    fn test_block_reference_is_task() {
        let outcome = run("Решение нескольких задач из блока 8", "a", "ЕГЭ");
        assert!(matches!(outcome, ClassificationOutcome::Task(TaskFields { number: 8, .. })));
    }

    #[test]
    fn test_unrecognized_caption_falls_back() {
        let outcome = run("Всем привет", "clip_01", "ЕГЭ");
        assert_eq!(
            outcome,
            ClassificationOutcome::Fallback {
                reason: FallbackReason::NoTaskNumber,
                stem: "clip_01".to_string()
            }
        );
    }

    #[test]
    fn test_empty_caption_filename_rules() {
        assert_eq!(
            run("", "Встреча_в_Телемосте_12", "ЕГЭ"),
            ClassificationOutcome::Fallback {
                reason: FallbackReason::Recording("Запись встречи"),
                stem: "Встреча_в_Телемосте_12".to_string()
            }
        );
        assert!(matches!(
            run("", "12_3", "ЕГЭ"),
            ClassificationOutcome::Task(TaskFields { number: 12, resource: None, .. })
        ));
        assert!(matches!(
            run("", "7 (2)", "ЕГЭ"),
            ClassificationOutcome::Task(TaskFields { number: 7, .. })
        ));
        assert!(matches!(
            run("", "12_3", "Python"),
            ClassificationOutcome::Fallback { reason: FallbackReason::EmptyCaption, .. }
        ));
    }

    #[test]
    fn test_oge_short_phrase_is_topic() {
        assert_eq!(run("Системы счисления.", "a", "ОГЭ"), topic("Системы счисления"));
        assert!(matches!(
            run("Разбор задания 6", "a", "ОГЭ"),
            ClassificationOutcome::Task(TaskFields { number: 6, .. })
        ));
    }

    #[test]
    fn test_oge_recording_stem_with_caption() {
        assert!(matches!(
            run("Обсуждение", "Встреча в телемосте", "ОГЭ"),
            ClassificationOutcome::Fallback { reason: FallbackReason::Recording(_), .. }
        ));
    }

    #[test]
    fn test_oge_falls_back_to_filename_topic() {
        let long = "ы".repeat(120);
        assert_eq!(run(&long, "двоичный_поиск", "ОГЭ"), topic("двоичный поиск"));
    }

    #[test]
    fn test_python_topic_and_task() {
        assert_eq!(
            run("Мини-урок по срезам в Python", "a", "Python"),
            topic("срезам")
        );
        let outcome = run("Задание 3 на циклы", "a", "Python");
        assert_eq!(
            outcome,
            ClassificationOutcome::Task(TaskFields {
                number: 3,
                range: None,
                subtype: None,
                resource: None,
                topic: Some("Циклы".to_string()),
            })
        );
    }

    #[test]
    fn test_simple_profile_is_unconfigured() {
        assert!(matches!(
            run("Задание 5", "report", "Кулинария"),
            ClassificationOutcome::Fallback { reason: FallbackReason::Unconfigured, .. }
        ));
    }
}
