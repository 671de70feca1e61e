use super::classifier::{ClassificationOutcome, FallbackReason, TaskFields};
use super::profiles::{ChannelProfile, TaskStyle};

/// Title used when even the filename stem is empty.
pub const UNTITLED: &str = "Без названия";

/// Assemble the final title. Always returns a non-empty string.
pub fn render(outcome: &ClassificationOutcome, profile: &ChannelProfile) -> String {
    let Some(prefix) = profile.prefix else {
        return match outcome {
            ClassificationOutcome::Fallback { stem, .. } if !stem.trim().is_empty() => stem.clone(),
            _ => UNTITLED.to_string(),
        };
    };

    match outcome {
        ClassificationOutcome::Topic(topic) => match &topic.lesson {
            Some(lesson) => format!("{}. Урок {}. Разбираем тему \"{}\"", prefix, lesson, topic.phrase),
            None => format!("{}. Разбираем тему \"{}\"", prefix, topic.phrase),
        },
        ClassificationOutcome::Task(fields) => match profile.task_style {
            TaskStyle::Numbered => render_numbered_task(prefix, fields),
            TaskStyle::Course => render_course_task(prefix, fields),
        },
        ClassificationOutcome::Fallback { reason: FallbackReason::Recording(label), .. } => {
            format!("{}. {}", prefix, label)
        }
        ClassificationOutcome::Fallback { stem, .. } => {
            let stem = stem.trim();
            format!("{}. {}", prefix, if stem.is_empty() { UNTITLED } else { stem })
        }
    }
}

fn render_numbered_task(prefix: &str, fields: &TaskFields) -> String {
    let number = match fields.range {
        Some((start, end)) => format!("{}-{}", start, end),
        None => fields.number.to_string(),
    };

    let mut title = format!("{}. Разбираем задание №{}", prefix, number);
    for tag in [&fields.subtype, &fields.resource].into_iter().flatten() {
        if !tag.is_empty() {
            title.push_str(&format!(" ({})", tag));
        }
    }
    title
}

fn render_course_task(prefix: &str, fields: &TaskFields) -> String {
    match fields.topic.as_deref().filter(|topic| !topic.is_empty()) {
        Some(topic) => format!(
            "{}. Разбираем задание по теме \"{}\" номер {}",
            prefix, topic, fields.number
        ),
        None => format!("{}. Разбираем задание номер {}", prefix, fields.number),
    }
}
