use vk_video_publisher::config::TitlesConfig;
use vk_video_publisher::titles::{generate_title, Caption, ClassificationOutcome, TitleEngine};

const EGE: &str = "Курс ЕГЭ по информатике";

#[test]
fn lesson_caption_keeps_lesson_label() {
    assert_eq!(
        generate_title("Урок 23_1. Структуры данных", "a.mp4", Some("ЕГЭ")),
        format!("{}. Урок 23_1. Разбираем тему \"Структуры данных\"", EGE)
    );
}

#[test]
fn task_caption_with_resource() {
    assert_eq!(
        generate_title("Задание №25 (Решу ЕГЭ)", "a.mp4", Some("ЕГЭ")),
        format!("{}. Разбираем задание №25 (Решу ЕГЭ)", EGE)
    );
}

#[test]
fn numeric_filename_without_caption() {
    assert_eq!(
        generate_title("", "42.mp4", Some("ЕГЭ")),
        format!("{}. Разбираем задание №42 (Решу ЕГЭ)", EGE)
    );
    assert_eq!(
        generate_title("   ", "7.mp4", Some("ОГЭ")),
        "Курс ОГЭ по информатике. Разбираем задание №7 (Решу ОГЭ)"
    );
}

#[test]
fn unknown_channel_uses_filename_stem() {
    assert_eq!(generate_title("", "report.mp4", Some("Кулинария")), "report");
    assert_eq!(generate_title("Задание 5", "report.mp4", None), "report");
}

#[test]
fn example_for_task_is_topic_not_task() {
    assert_eq!(
        generate_title("Пример 2 в файле B задания 27.", "a.mp4", Some("ЕГЭ")),
        format!("{}. Разбираем тему \"Пример 2 в файле B задания 27\"", EGE)
    );
}

#[test]
fn range_wins_over_single_number() {
    assert_eq!(
        generate_title("Разбор заданий 19-21", "a.mp4", Some("ЕГЭ")),
        format!("{}. Разбираем задание №19-21", EGE)
    );
}

#[test]
fn subtype_follows_task_number() {
    assert_eq!(
        generate_title("Задание 9 - 58517", "a.mp4", Some("ЕГЭ")),
        format!("{}. Разбираем задание №9 (9_58517)", EGE)
    );
}

#[test]
fn channel_aliases_resolve_to_the_same_profile() {
    let caption = "Задание №25 (Решу ЕГЭ)";
    assert_eq!(
        generate_title(caption, "a.mp4", Some("ege")),
        generate_title(caption, "a.mp4", Some("ЕГЭ"))
    );
}

#[test]
fn generation_is_idempotent() {
    let engine = TitleEngine::default();
    let captions = [
        "Урок 4. Графы",
        "Лайфхак для быстрого перевода",
        "Всем привет",
        "Задание 3 на циклы",
        "",
    ];
    for channel in ["ЕГЭ", "ОГЭ", "Python", "другой"] {
        for caption in captions {
            let caption = Caption::new(caption);
            let first = engine.generate(&caption, "clip_1.mp4", Some(channel));
            let second = engine.generate(&caption, "clip_1.mp4", Some(channel));
            assert_eq!(first, second);
        }
    }
}

#[test]
fn titles_are_never_empty() {
    let engine = TitleEngine::default();
    let long = "я".repeat(500);
    let captions = ["", " \n ", ".", "…", "Задание", "🎥🎥", "Урок 1.", "a\u{0}b", long.as_str()];
    let files = ["", ".mp4", "x.mp4", "0.mp4", "видео.webm"];
    for channel in [Some("ЕГЭ"), Some("ОГЭ"), Some("Python"), Some("x"), None] {
        for caption in captions {
            for file in files {
                let title = engine.generate(&Caption::new(caption), file, channel);
                assert!(!title.trim().is_empty(), "{:?} / {:?} / {:?}", caption, file, channel);
            }
        }
    }
}

#[test]
fn empty_stem_on_course_channel_is_untitled() {
    assert_eq!(generate_title("", "", Some("Python")), "Курс по Python базовый. Без названия");
    assert_eq!(generate_title("", "", None), "Без названия");
}

#[test]
fn long_topics_are_capped() {
    let caption = format!("Как {}", "очень ".repeat(40));
    let title = generate_title(&caption, "a.mp4", Some("ЕГЭ"));
    let topic = title
        .split('"')
        .nth(1)
        .expect("topic title");
    assert!(topic.chars().count() <= 80, "{}", topic);
}

#[test]
fn truncation_limits_are_configurable() {
    let engine = TitleEngine::new(TitlesConfig {
        topic_max_chars: 30,
        topic_min_cut_chars: 10,
        ..Default::default()
    });
    let outcome = engine.classify(
        &Caption::new("Как работает сортировка пузырьком на практике"),
        "a.mp4",
        Some("ЕГЭ"),
    );
    match outcome {
        ClassificationOutcome::Topic(topic) => assert!(topic.phrase.chars().count() <= 30),
        other => panic!("expected a topic, got {:?}", other),
    }
}

#[test]
fn sentence_and_keyword_topics_are_capped() {
    let engine = TitleEngine::default();
    let cases = [
        (
            "Лайфхак для быстрого перевода чисел между системами счисления без калькулятора и без ошибок на экзамене по информатике",
            "ЕГЭ",
        ),
        (
            "Знакомство со словарями и множествами, их методами, генераторами и типичными ошибками новичков при работе с ними в Python",
            "Python",
        ),
    ];

    for (caption, channel) in cases {
        match engine.classify(&Caption::new(caption), "a.mp4", Some(channel)) {
            ClassificationOutcome::Topic(topic) => {
                assert!(topic.phrase.chars().count() <= 80, "{}: {}", channel, topic.phrase)
            }
            other => panic!("expected a topic for {}, got {:?}", channel, other),
        }
    }
}
