use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::titles::TitleStrategy;

/// Configuration for the VK video publisher
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Export scanning settings
    pub scan: ScanConfig,

    /// Video catalog storage
    pub catalog: CatalogConfig,

    /// Title generation settings
    pub titles: TitlesConfig,

    /// VK upload settings
    pub publisher: PublisherConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Video attachment extensions picked up from exports
    pub supported_extensions: Vec<String>,

    /// Skip videos whose content hash is already cataloged under another path
    pub skip_duplicates: bool,

    /// Number of files hashed concurrently
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path of the JSON catalog file
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitlesConfig {
    /// Maximum topic length before truncation (characters)
    pub topic_max_chars: usize,

    /// A word-boundary cut must keep more than this many characters,
    /// otherwise the topic is hard-cut with an ellipsis
    pub topic_min_cut_chars: usize,

    /// Title strategy; channel profile rules unless configured otherwise
    pub strategy: TitleStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// VK API access token
    pub access_token: Option<String>,

    /// Community to upload into; the token owner's page when unset
    pub group_id: Option<u64>,

    /// VK API version
    pub api_version: String,

    /// VK API base URL
    pub api_base: String,

    /// Maximum upload attempts per video
    pub max_retries: u32,

    /// Base delay between attempts (seconds), doubled per attempt
    pub retry_base_delay_secs: u64,

    /// Request timeout (seconds)
    pub timeout_secs: u64,

    /// Also publish a wall post for each video
    pub wallpost: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is not set
    pub level: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            supported_extensions: vec!["mp4".to_string(), "webm".to_string()],
            skip_duplicates: true,
            workers: num_cpus::get().min(8), // Use available cores, max 8
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("videos.json"),
        }
    }
}

impl Default for TitlesConfig {
    fn default() -> Self {
        Self {
            topic_max_chars: 80,
            topic_min_cut_chars: 50,
            strategy: TitleStrategy::Channel,
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            group_id: None,
            api_version: "5.199".to_string(),
            api_base: "https://api.vk.com/method".to_string(),
            max_retries: 3,
            retry_base_delay_secs: 1,
            timeout_secs: 600, // large uploads
            wallpost: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the first readable config file, then apply
    /// `.env` and environment overrides
    pub fn load() -> Result<Self> {
        let config_paths = [
            Path::new("vk-publisher.toml"),
            Path::new("config/vk-publisher.toml"),
            Path::new("config/config.toml"),
        ];

        let mut config = Self::first_readable(&config_paths).unwrap_or_default();
        config.apply_env();
        Ok(config)
    }

    /// First config in `paths` that reads and parses; broken files are skipped
    fn first_readable(paths: &[&Path]) -> Option<Config> {
        for path in paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(parsed) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        return Some(parsed);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }
        None
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config {}: {}", path.display(), e))?;
        let mut config: Config = toml::from_str(&config_str)
            .map_err(|e| anyhow!("Invalid config {}: {}", path.display(), e))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override settings from `.env` and the process environment
    pub fn apply_env(&mut self) {
        // Variables already set in the environment win over .env entries
        dotenvy::dotenv().ok();

        if let Ok(token) = std::env::var("VK_ACCESS_TOKEN") {
            if !token.trim().is_empty() {
                self.publisher.access_token = Some(token.trim().to_string());
            }
        }

        if let Ok(group_id) = std::env::var("VK_GROUP_ID") {
            match group_id.trim().trim_start_matches('-').parse() {
                Ok(id) => self.publisher.group_id = Some(id),
                Err(_) => tracing::warn!("Ignoring invalid VK_GROUP_ID: {}", group_id),
            }
        }

        if let Ok(path) = std::env::var("VK_PUBLISHER_CATALOG") {
            self.catalog.path = PathBuf::from(path);
        }

        if let Ok(workers) = std::env::var("VK_PUBLISHER_WORKERS") {
            self.scan.workers = workers.parse().unwrap_or(self.scan.workers);
        }

        if let Ok(log_level) = std::env::var("VK_PUBLISHER_LOG_LEVEL") {
            self.logging.level = log_level;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.scan.workers == 0 {
            return Err(anyhow!("scan.workers must be greater than 0"));
        }

        if self.scan.supported_extensions.is_empty() {
            return Err(anyhow!("scan.supported_extensions must not be empty"));
        }

        if self.titles.topic_max_chars < 10 {
            return Err(anyhow!("titles.topic_max_chars must be at least 10"));
        }

        if self.titles.topic_min_cut_chars >= self.titles.topic_max_chars {
            return Err(anyhow!("titles.topic_min_cut_chars must be below topic_max_chars"));
        }

        if self.publisher.max_retries == 0 {
            return Err(anyhow!("publisher.max_retries must be greater than 0"));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "VK Publisher Configuration:\n\
            - Catalog: {}\n\
            - Workers: {}\n\
            - Supported Extensions: {}\n\
            - Skip Duplicates: {}\n\
            - Group: {}\n\
            - Token Configured: {}",
            self.catalog.path.display(),
            self.scan.workers,
            self.scan.supported_extensions.join(", "),
            self.scan.skip_duplicates,
            self.publisher
                .group_id
                .map_or_else(|| "personal page".to_string(), |id| id.to_string()),
            self.publisher.access_token.is_some(),
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.scan.workers = workers;
        self
    }

    pub fn with_catalog_path(mut self, path: PathBuf) -> Self {
        self.config.catalog.path = path;
        self
    }

    pub fn with_access_token(mut self, token: String) -> Self {
        self.config.publisher.access_token = Some(token);
        self
    }

    pub fn with_group_id(mut self, group_id: u64) -> Self {
        self.config.publisher.group_id = Some(group_id);
        self
    }

    pub fn with_topic_max_chars(mut self, max_chars: usize) -> Self {
        self.config.titles.topic_max_chars = max_chars;
        self
    }

    pub fn skip_duplicates(mut self, skip: bool) -> Self {
        self.config.scan.skip_duplicates = skip;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.titles.topic_max_chars, 80);
        assert_eq!(config.titles.topic_min_cut_chars, 50);
        assert_eq!(config.scan.supported_extensions, vec!["mp4", "webm"]);
        assert!(config.scan.skip_duplicates);
        assert!(config.scan.workers >= 1);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_workers(2)
            .with_group_id(12345)
            .skip_duplicates(false)
            .build();

        assert_eq!(config.scan.workers, 2);
        assert_eq!(config.publisher.group_id, Some(12345));
        assert!(!config.scan.skip_duplicates);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());
        assert!(ConfigBuilder::new().with_workers(0).build().validate().is_err());
        assert!(ConfigBuilder::new().with_topic_max_chars(5).build().validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [titles]
            topic_max_chars = 100

            [publisher]
            group_id = 42
            "#,
        )
        .unwrap();

        assert_eq!(config.titles.topic_max_chars, 100);
        assert_eq!(config.titles.topic_min_cut_chars, 50);
        assert_eq!(config.publisher.group_id, Some(42));
        assert_eq!(config.publisher.api_version, "5.199");
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vk-publisher.toml");
        let config = ConfigBuilder::new().with_workers(3).build();
        config.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let reloaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(reloaded.scan.workers, 3);
    }

    #[test]
    fn test_first_readable_skips_broken_files() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        let broken = temp_dir.path().join("broken.toml");
        let good = temp_dir.path().join("good.toml");
        std::fs::write(&broken, "[titles\ntopic_max_chars = ").unwrap();
        std::fs::write(&good, "[scan]\nworkers = 5\n").unwrap();

        let config = Config::first_readable(&[missing.as_path(), broken.as_path(), good.as_path()]).unwrap();
        assert_eq!(config.scan.workers, 5);
        assert!(Config::first_readable(&[missing.as_path(), broken.as_path()]).is_none());
    }
}
