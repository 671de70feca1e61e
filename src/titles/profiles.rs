//! Channel profiles: everything that differs between course channels.
//!
//! The registry is built once per process and never mutated, so any number of
//! classification calls may read it concurrently.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::classifier::Rule;

static REGISTRY: LazyLock<ProfileRegistry> = LazyLock::new(ProfileRegistry::builtin);

/// Process-wide profile registry.
pub fn registry() -> &'static ProfileRegistry {
    &REGISTRY
}

/// How task titles are phrased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStyle {
    /// `Разбираем задание №N`, with optional subtype and resource tags.
    Numbered,
    /// `Разбираем задание номер N`, optionally `по теме "T"`.
    Course,
}

/// What to do when no caption rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Task,
    /// Task extraction, then a first-sentence or filename topic.
    TaskThenTopic,
    Topic,
}

/// Filename stems that mark meeting or lesson recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingMarker {
    /// Case-insensitive substring of the stem.
    Contains(&'static str),
    /// `video` followed by digits only.
    NumberedVideo,
}

#[derive(Debug, Clone, Copy)]
pub struct RecordingRule {
    pub marker: RecordingMarker,
    pub label: &'static str,
}

impl RecordingRule {
    pub fn matches(&self, stem: &str) -> bool {
        match self.marker {
            RecordingMarker::Contains(needle) => stem.to_lowercase().contains(needle),
            RecordingMarker::NumberedVideo => is_numbered_video(stem),
        }
    }
}

/// `video12345` style stems produced by some exporters.
pub fn is_numbered_video(stem: &str) -> bool {
    stem.strip_prefix("video")
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

/// A resource tag pattern with its canonical display name.
///
/// Without a canonical name the matched text itself (parentheses stripped)
/// is used.
#[derive(Debug, Clone)]
pub struct ResourcePattern {
    pub pattern: Regex,
    pub canonical: Option<&'static str>,
}

/// One topic phrase pattern.
///
/// Lesson patterns capture the lesson number in group 1 and the phrase in
/// group 2; the rest capture the phrase in group 1.
#[derive(Debug, Clone)]
pub struct TopicPattern {
    pub pattern: Regex,
    pub lesson: bool,
    /// The phrase must be longer than this many characters.
    pub min_chars: usize,
    pub strip_language_suffix: bool,
}

#[derive(Debug, Clone)]
pub struct ChannelProfile {
    pub id: &'static str,
    pub aliases: &'static [&'static str],
    /// `None` only for the simple profile, which titles videos by filename.
    pub prefix: Option<&'static str>,
    /// Case-insensitive export path fragments that select this channel.
    pub path_markers: &'static [&'static str],
    pub task_style: TaskStyle,
    /// Resource tag for videos named by a bare task number.
    pub default_resource: Option<&'static str>,
    pub recording: Option<RecordingRule>,
    /// Treat `12_3.mp4` and `12 (1).mp4` stems as task 12.
    pub numeric_prefix_stems: bool,
    pub rules: Vec<Rule>,
    pub default_action: DefaultAction,
    pub ranges: bool,
    pub subtypes: bool,
    pub task_patterns: Vec<Regex>,
    /// Bare task reference, matched against the lowercase line.
    pub task_reference: Option<Regex>,
    pub resources: Vec<ResourcePattern>,
    pub topic_patterns: Vec<TopicPattern>,
    pub sentence_topics: bool,
    pub instructional_keywords: Option<Regex>,
    pub task_topic_patterns: Vec<Regex>,
    pub keyword_topics: Vec<(Regex, &'static str)>,
}

impl ChannelProfile {
    pub fn is_simple(&self) -> bool {
        self.prefix.is_none()
    }

    fn matches_name(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.id.to_lowercase() == name || self.aliases.iter().any(|alias| *alias == name)
    }
}

pub struct ProfileRegistry {
    channels: Vec<ChannelProfile>,
    simple: ChannelProfile,
}

impl ProfileRegistry {
    fn builtin() -> Self {
        Self {
            channels: vec![ege_profile(), oge_profile(), python_profile()],
            simple: simple_profile(),
        }
    }

    /// Profile for a channel id or alias; unknown channels get the simple profile.
    pub fn lookup(&self, channel: &str) -> &ChannelProfile {
        self.get(channel).unwrap_or(&self.simple)
    }

    pub fn get(&self, channel: &str) -> Option<&ChannelProfile> {
        self.channels.iter().find(|profile| profile.matches_name(channel))
    }

    pub fn simple(&self) -> &ChannelProfile {
        &self.simple
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelProfile> {
        self.channels.iter()
    }

    /// Infer the channel from an export folder path.
    pub fn detect_channel(&self, path: &Path) -> Option<&ChannelProfile> {
        let path = path.to_string_lossy().to_lowercase();
        self.channels
            .iter()
            .find(|profile| profile.path_markers.iter().any(|marker| path.contains(marker)))
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid built-in pattern {pattern}: {err}"))
}

fn ci(pattern: &str) -> Regex {
    re(&format!("(?i){pattern}"))
}

fn resource(pattern: &str, canonical: Option<&'static str>) -> ResourcePattern {
    ResourcePattern { pattern: ci(pattern), canonical }
}

fn topic(pattern: &str, min_chars: usize) -> TopicPattern {
    TopicPattern { pattern: ci(pattern), lesson: false, min_chars, strip_language_suffix: false }
}

fn lesson_topic(pattern: &str) -> TopicPattern {
    TopicPattern { pattern: ci(pattern), lesson: true, min_chars: 3, strip_language_suffix: false }
}

fn course_topic(pattern: &str, min_chars: usize) -> TopicPattern {
    TopicPattern { pattern: ci(pattern), lesson: false, min_chars, strip_language_suffix: true }
}

const EXAM_TASK_PATTERNS_HEAD: &[&str] = &[
    r"тип\s+(\d+)[_\d]",
    r"разбор\s+(\d+)[_\d]",
    r"решение\s+(\d+)[_\d]",
    r"^(\d+)[_\d]",
];

const EGE_TASK_PATTERNS: &[&str] = &[
    r"вспомогательные\s+примеры\s+для\s+решения\s+(\d+)",
    r"разбор\s+задани[ий]\s+(\d+)$",
    r"разбор\s+задани[ий]\s+(\d+)\s*\.",
    r"вспомогательного\s+задани[яе]\s*[№#]?\s*(\d+)",
    r"в\s+задани[ии]\s+(\d+)",
    r"тонкости\s+решений\s+задани[ий]\s+(\d+)",
    r"теори[ия]\s+по\s+задани[ям]\s+(\d+)",
    r"задани[яе]\s*[№#]?\s*(\d+)",
    r"задани[ея]\s+(\d+)",
    r"задач[аи]\s+(\d+)",
    r"разбор\s+решений\s+задани[ий]\s+(\d+)",
    r"разбор\s+некоторых\s+задани[ий]\s+(\d+)",
    r"разбор\s+задани[ея]\s+(\d+)",
    r"разбор\s+задач[иа]\s+(\d+)",
    r"разбор\s+задани[ий]\s+по\s+теме\s+(\d+)",
    r"разбор\s+задани[ий]\s+(\d+)[,\s]",
    r"разбор\s+задани[ий]\s+(\d+)\s+егэ",
    r"решение\s+задани[яе]\s*[№#]?\s*(\d+)",
    r"решение\s+задани[ий]\s+егэ\s+(\d+)",
    r"решение\s+(\d+)\s+задани[ий]",
    r"решения\s+задани[ий]\s+(\d+)",
    r"решение\s+задани[ий]\s+(\d+)",
    r"решение\s+нескольких\s+задач\s+из\s+блока\s+(\d+)",
    r"при\s+решении\s+задани[ий]\s+(\d+)",
    r"для\s+задани[ий]\s+(\d+)",
    r"задани[яе]\s+номер\s+(\d+)",
    r"разбор\s+задани[ий]\s+номер\s+(\d+)",
    r"в\s+файле\s+\w+\s+задани[яе]\s+(\d+)",
    r"видео\s+решения?\s+задани[ея]\s+(\d+)",
    r"видеоразбор\s+задани[яе]\s+(\d+)",
    r"для\s+решения\s+\d+%\s+задани[ий]\s+(\d+)",
    r"при\s+решении\s+(\d+)\s+задани[ий]",
];

const OGE_TASK_PATTERNS: &[&str] = &[
    r"разбор\s+задани[ий]\s+(\d+)$",
    r"разбор\s+задани[ий]\s+(\d+)\s*\.",
    r"задани[яе]\s*[№#]?\s*(\d+)",
    r"задани[ея]\s+(\d+)",
    r"задач[аи]\s+(\d+)",
    r"решение\s+задани[яе]\s*[№#]?\s*(\d+)",
    r"решение\s+задани[ий]\s+(\d+)",
    r"видео\s+решения?\s+задани[ея]\s+(\d+)",
    r"видеоразбор\s+задани[яе]\s+(\d+)",
];

const INSTRUCTIONAL_KEYWORDS: &str = r"инструкция|способ[овы]|ответы\s+на\s+вопросы|карта\s+егэ|агрегатные\s+функции|лайфхак|несколько\s+приемов|особенности\s+и\s+тонкости|регулярные\s+выражения|заполняем\s+карту|теория\s+сетей|группы\s+в\s+регулярных|опережающие\s+проверки|переводим\s+число";

fn exam_task_patterns(tail: &[&str]) -> Vec<Regex> {
    EXAM_TASK_PATTERNS_HEAD.iter().chain(tail).map(|p| ci(p)).collect()
}

fn exam_topic_patterns() -> Vec<TopicPattern> {
    vec![
        lesson_topic(r"урок\s+(\d+[._]\d+)\.\s*(.+?)(?:\.|$)"),
        lesson_topic(r"урок\s+(\d+)\.\s*(.+?)(?:\.|$)"),
        topic(r"разбор\s+задани[ий]\s+\d+\.\s*(.+?)(?:\.|$)", 3),
        topic(r"задание\s+\d+\.\s*(.+?)(?:\.|$)", 3),
        topic(r"термин[ы]?\s+и\s+теори[ия]\s+задани[яе]\s+\d+\.\s*(.+?)(?:\.|$)", 3),
    ]
}

/// Resource names for one exam.
struct ExamVocabulary {
    exam: &'static str,
    bank: &'static str,
    kim: &'static str,
    computer: &'static str,
    glued: &'static str,
}

const EGE_VOCABULARY: ExamVocabulary = ExamVocabulary {
    exam: "ЕГЭ",
    bank: "Решу ЕГЭ",
    kim: "КЕГЭ",
    computer: "Комп ЕГЭ",
    glued: "решуегэ",
};

const OGE_VOCABULARY: ExamVocabulary = ExamVocabulary {
    exam: "ОГЭ",
    bank: "Решу ОГЭ",
    kim: "КОГЭ",
    computer: "Комп ОГЭ",
    glued: "решуогэ",
};

fn exam_resources(vocabulary: &ExamVocabulary, extra: Vec<ResourcePattern>) -> Vec<ResourcePattern> {
    let ExamVocabulary { exam, bank, kim, computer, glued } = *vocabulary;
    let mut resources = vec![
        resource(&format!(r"\(Решу\s+{exam}\)"), Some(bank)),
        resource(&format!(r"\(Решу{exam}\)"), Some(bank)),
        resource(&format!(r"\({kim}\)"), Some(kim)),
        resource(r"\(Поляков\)", Some("Поляков")),
        resource(&format!(r"\(Комп\s+{exam}\)"), Some(computer)),
    ];
    resources.extend(extra);
    resources.push(resource(r"\s+Поляков\s*$", Some("Поляков")));
    resources.push(resource(glued, Some(bank)));
    resources
}

fn ege_profile() -> ChannelProfile {
    ChannelProfile {
        id: "ЕГЭ",
        aliases: &["ege"],
        prefix: Some("Курс ЕГЭ по информатике"),
        path_markers: &["егэ"],
        task_style: TaskStyle::Numbered,
        default_resource: Some("Решу ЕГЭ"),
        recording: Some(RecordingRule {
            marker: RecordingMarker::Contains("встреча_в_телемосте"),
            label: "Запись встречи",
        }),
        numeric_prefix_stems: true,
        rules: vec![
            Rule::VideoSolution,
            Rule::ExampleForTask,
            Rule::Lesson,
            Rule::BreakdownWithText,
            Rule::TopicBlock,
            Rule::TaskHeading,
            Rule::InstructionalKeywords,
            Rule::Terminology,
            Rule::UsageForTasks,
            Rule::LeadingDiscourse,
            Rule::TaskHeadingLoose,
            Rule::TopicBlockBare,
            Rule::TaskReference,
        ],
        default_action: DefaultAction::Task,
        ranges: true,
        subtypes: true,
        task_patterns: exam_task_patterns(EGE_TASK_PATTERNS),
        task_reference: Some(re(r"задани[ея]\s+\d+|задач[аи]\s+\d+|блока\s+\d+")),
        resources: exam_resources(&EGE_VOCABULARY, vec![resource(r"\(КЕГЭ\.\w+\)", None)]),
        topic_patterns: exam_topic_patterns(),
        sentence_topics: false,
        instructional_keywords: Some(re(INSTRUCTIONAL_KEYWORDS)),
        task_topic_patterns: Vec::new(),
        keyword_topics: Vec::new(),
    }
}

fn oge_profile() -> ChannelProfile {
    ChannelProfile {
        id: "ОГЭ",
        aliases: &["oge"],
        prefix: Some("Курс ОГЭ по информатике"),
        path_markers: &["огэ"],
        task_style: TaskStyle::Numbered,
        default_resource: Some("Решу ОГЭ"),
        recording: Some(RecordingRule {
            marker: RecordingMarker::Contains("встреча"),
            label: "Запись встречи",
        }),
        numeric_prefix_stems: true,
        rules: vec![
            Rule::RecordingStem,
            Rule::NumberedVideoStem,
            Rule::ShortPhrase,
            Rule::TechniqueBreakdown,
            Rule::VideoSolution,
            Rule::ExampleForTask,
            Rule::Lesson,
            Rule::BreakdownWithText,
            Rule::TopicBlock,
            Rule::TaskHeading,
            Rule::Terminology,
            Rule::LeadingDiscourse,
            Rule::TopicBlockBare,
            Rule::TaskReference,
        ],
        default_action: DefaultAction::TaskThenTopic,
        ranges: true,
        subtypes: true,
        task_patterns: exam_task_patterns(OGE_TASK_PATTERNS),
        task_reference: Some(re(r"задани[ея]\s+\d+|задач[аи]\s+\d+")),
        resources: exam_resources(&OGE_VOCABULARY, Vec::new()),
        topic_patterns: exam_topic_patterns(),
        sentence_topics: false,
        instructional_keywords: None,
        task_topic_patterns: Vec::new(),
        keyword_topics: Vec::new(),
    }
}

fn python_profile() -> ChannelProfile {
    ChannelProfile {
        id: "Python",
        aliases: &["python", "питон"],
        prefix: Some("Курс по Python базовый"),
        path_markers: &["python"],
        task_style: TaskStyle::Course,
        default_resource: None,
        recording: Some(RecordingRule {
            marker: RecordingMarker::NumberedVideo,
            label: "Запись урока",
        }),
        numeric_prefix_stems: false,
        rules: vec![Rule::CourseTopic, Rule::CourseTask],
        default_action: DefaultAction::Topic,
        ranges: false,
        subtypes: false,
        task_patterns: vec![ci(r"задание\s+[№#]?\s*(\d+)"), ci(r"задани[ея]\s+(\d+)")],
        task_reference: None,
        resources: Vec::new(),
        topic_patterns: vec![
            topic(r"мини-урок\s+по\s+(.+?)(?:\s+в\s+python|\.|$)", 2),
            course_topic(r"урок\.\s*(.+?)(?:\.|$)", 2),
            course_topic(r"видеоурок\.\s*(.+?)(?:\.|$)", 2),
            course_topic(r#"\bтема\s+["'](.+?)["']"#, 2),
            course_topic(r"\bтема\s+(.+?)(?:\.|$)", 2),
            course_topic(r"^\d+\.\s+(как\s+работает\s+.+?|что\s+делает\s+.+?)(?:\.|$)", 5),
        ],
        sentence_topics: true,
        instructional_keywords: None,
        task_topic_patterns: vec![
            ci(r#"по\s+теме\s+["'](.+?)["']"#),
            ci(r#"\bтема\s+["'](.+?)["']"#),
            ci(r"\bтема\s+(.+?)(?:\.|$)"),
            ci(r#"\(тема\s+["'](.+?)["']\)"#),
            ci(r"\(тема\s+(.+?)\)"),
        ],
        keyword_topics: vec![
            (ci(r"цикл"), "Циклы"),
            (ci(r"списк"), "Списки"),
            (ci(r"строк"), "Строки"),
            (ci(r"функци"), "Функции"),
            (ci(r"рекурси"), "Рекурсия"),
            (ci(r"словар"), "Словари"),
            (ci(r"множеств"), "Множества"),
        ],
    }
}

fn simple_profile() -> ChannelProfile {
    ChannelProfile {
        id: "simple",
        aliases: &[],
        prefix: None,
        path_markers: &[],
        task_style: TaskStyle::Numbered,
        default_resource: None,
        recording: None,
        numeric_prefix_stems: false,
        rules: Vec::new(),
        default_action: DefaultAction::Task,
        ranges: false,
        subtypes: false,
        task_patterns: Vec::new(),
        task_reference: None,
        resources: Vec::new(),
        topic_patterns: Vec::new(),
        sentence_topics: false,
        instructional_keywords: None,
        task_topic_patterns: Vec::new(),
        keyword_topics: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_id_and_alias() {
        let registry = registry();
        assert_eq!(registry.lookup("ЕГЭ").id, "ЕГЭ");
        assert_eq!(registry.lookup("егэ").id, "ЕГЭ");
        assert_eq!(registry.lookup("EGE").id, "ЕГЭ");
        assert_eq!(registry.lookup(" python ").id, "Python");
        assert_eq!(registry.lookup("ОГЭ").id, "ОГЭ");
    }

    #[test]
    fn test_unknown_channel_is_simple() {
        let profile = registry().lookup("Кулинария");
        assert!(profile.is_simple());
        assert!(registry().get("Кулинария").is_none());
    }

    #[test]
    fn test_detect_channel_from_path() {
        let registry = registry();
        let detect = |p: &str| registry.detect_channel(Path::new(p)).map(|profile| profile.id);
        assert_eq!(detect("/exports/ЕГЭ информатика/ChatExport_2024"), Some("ЕГЭ"));
        assert_eq!(detect("/exports/огэ/ChatExport"), Some("ОГЭ"));
        assert_eq!(detect("/exports/Python base/ChatExport"), Some("Python"));
        assert_eq!(detect("/exports/misc"), None);
    }

    #[test]
    fn test_numbered_video_stems() {
        assert!(is_numbered_video("video12345"));
        assert!(!is_numbered_video("video"));
        assert!(!is_numbered_video("video_1"));
        assert!(!is_numbered_video("myvideo1"));
    }

    #[test]
    fn test_every_channel_has_prefix_and_rules() {
        for profile in registry().channels() {
            assert!(profile.prefix.is_some(), "{} has no prefix", profile.id);
            assert!(!profile.rules.is_empty(), "{} has no rules", profile.id);
        }
    }
}
