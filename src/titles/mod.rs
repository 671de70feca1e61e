//! Video title generation.
//!
//! Caption + filename + channel go through the normalizer, the ordered-rule
//! classifier and the renderer to produce one canonical title. The pipeline is
//! pure: the same input always yields the same title, and calls share no
//! mutable state.

pub mod caption;
pub mod classifier;
pub mod extract;
pub mod generators;
pub mod profiles;
pub mod render;

use std::path::Path;

use crate::config::TitlesConfig;

pub use caption::{Caption, NormalizedCaption};
pub use classifier::{ClassificationOutcome, FallbackReason, Rule, TaskFields};
pub use extract::{ExtractionResult, TopicPhrase};
pub use generators::{TitleRequest, TitleStrategy};
pub use profiles::{registry, ChannelProfile, ProfileRegistry};

/// Title generator bound to a set of title settings.
#[derive(Debug, Clone, Default)]
pub struct TitleEngine {
    settings: TitlesConfig,
}

impl TitleEngine {
    pub fn new(settings: TitlesConfig) -> Self {
        Self { settings }
    }

    /// Classify without rendering.
    pub fn classify(&self, caption: &Caption, file_name: &str, channel: Option<&str>) -> ClassificationOutcome {
        let profile = profile_for(channel);
        classifier::classify(&caption.normalize(), &file_stem(file_name), profile, &self.settings)
    }

    /// Canonical title for one video.
    pub fn generate(&self, caption: &Caption, file_name: &str, channel: Option<&str>) -> String {
        let outcome = self.classify(caption, file_name, channel);
        render::render(&outcome, profile_for(channel))
    }

    /// Title under the configured strategy.
    pub fn title(&self, request: &TitleRequest<'_>) -> String {
        self.title_with(&self.settings.strategy, request)
    }

    fn title_with(&self, strategy: &TitleStrategy, request: &TitleRequest<'_>) -> String {
        let title = match strategy {
            TitleStrategy::Channel => {
                return self.generate(request.caption, request.file_name, request.channel)
            }
            TitleStrategy::Simple => generators::simple_title(request.file_name),
            TitleStrategy::Date { format } => generators::date_title(request, format),
            TitleStrategy::Description { max_chars } => {
                generators::description_title(request, *max_chars)
            }
            TitleStrategy::Composite { parts, separator } => parts
                .iter()
                .map(|part| self.title_with(part, request))
                .filter(|part| !part.trim().is_empty())
                .collect::<Vec<_>>()
                .join(separator.as_str()),
        };
        generators::non_empty(title, request.file_name)
    }
}

/// One-off title generation with default settings.
pub fn generate_title(caption: &str, file_name: &str, channel: Option<&str>) -> String {
    TitleEngine::default().generate(&Caption::new(caption), file_name, channel)
}

fn profile_for(channel: Option<&str>) -> &'static ChannelProfile {
    match channel {
        Some(channel) => registry().lookup(channel),
        None => registry().simple(),
    }
}

/// Filename without directories or extension.
pub fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
