use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const APP_DIR: &str = "presspaper";
const GOV_WALES: &str = "https://www.gov.wales";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// RSS or Atom document
    Feed,
    /// HTML listing page paginated with `?page=N`
    Listing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Shown as the record's category
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    #[serde(default = "default_pages")]
    pub pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Pages whose extracted text is shorter than this are skipped
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,

    /// Shorter fragments (menu items, captions) are dropped
    #[serde(default = "default_min_fragment_chars")]
    pub min_fragment_chars: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    OpenAi,
}

impl Provider {
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-3-5-haiku-20241022",
            Provider::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_api_url(&self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com/v1/messages",
            Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,

    pub api_key: Option<String>,

    /// Falls back to the provider's default model
    pub model: Option<String>,

    /// Falls back to the provider's public endpoint
    pub api_url: Option<String>,

    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Extra attempts after the first failure
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Stored records without a summary retried per run
    #[serde(default = "default_backfill_limit")]
    pub backfill_limit: usize,
}

impl SummarizerConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_url())
    }
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("publications.db").to_string_lossy().to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_user_agent() -> String {
    concat!("PressPaper/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout() -> u64 {
    35
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_pages() -> u32 {
    2
}

fn default_min_text_chars() -> usize {
    250
}

fn default_min_fragment_chars() -> usize {
    25
}

fn default_provider() -> Provider {
    Provider::Anthropic
}

fn default_max_input_chars() -> usize {
    9000
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_backfill_limit() -> usize {
    20
}

fn default_sources() -> Vec<SourceConfig> {
    [
        ("Announcements", "announcements"),
        ("Consultations", "consultations"),
        ("Publications", "publications"),
        ("Statistics and Research", "statistics-and-research"),
    ]
    .into_iter()
    .map(|(name, slug)| SourceConfig {
        name: name.to_string(),
        kind: SourceKind::Listing,
        url: format!("{GOV_WALES}/{slug}"),
        pages: default_pages(),
    })
    .collect()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text_chars(),
            min_fragment_chars: default_min_fragment_chars(),
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            model: None,
            api_url: None,
            max_input_chars: default_max_input_chars(),
            max_tokens: default_max_tokens(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backfill_limit: default_backfill_limit(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            fetch_concurrency: default_fetch_concurrency(),
            extraction: ExtractionConfig::default(),
            summarizer: SummarizerConfig::default(),
            sources: default_sources(),
        }
    }
}

impl Config {
    /// Load from `path` or the default location, writing defaults when the file is missing.
    /// The provider's API key environment variable wins over the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            config
        };

        if let Ok(key) = std::env::var(config.summarizer.provider.api_key_env()) {
            if !key.trim().is_empty() {
                config.summarizer.api_key = Some(key);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(AppError::Config("no sources configured".to_string()));
        }
        for source in &self.sources {
            url::Url::parse(&source.url).map_err(|e| {
                AppError::Config(format!("source '{}' has invalid url: {}", source.name, e))
            })?;
        }
        if self.extraction.min_text_chars == 0 {
            return Err(AppError::Config(
                "extraction.min_text_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
