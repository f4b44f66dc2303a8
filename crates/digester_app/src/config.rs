//! TOML configuration for one digest run.
//!
//! Everything is checked at load time: a [`Config`] that made it out of
//! [`Config::from_file`] or [`Config::parse`] builds its sources, processors
//! and sort order without further validation errors.

use std::path::{Path, PathBuf};
use std::time::Duration;

use digester_core::SortField;
use digester_engine::render::OutputFormat;
use digester_engine::source::{
    HackerNewsConfig, HackerNewsPage, HackerNewsSource, RssConfig, RssSource,
};
use digester_engine::{
    processors_from_names, FetchSettings, ProcessOptions, SourceEntry, DEFAULT_MAX_BYTES,
};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub digest: DigestSection,
    #[serde(default)]
    pub fetcher: FetcherSection,
    #[serde(default)]
    pub processing: ProcessingSection,
    #[serde(default)]
    pub formatting: FormattingSection,
    #[serde(default)]
    pub sources: Vec<SourceSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FormatSetting {
    #[default]
    Markdown,
    Epub,
}

impl From<FormatSetting> for OutputFormat {
    fn from(value: FormatSetting) -> Self {
        match value {
            FormatSetting::Markdown => OutputFormat::Markdown,
            FormatSetting::Epub => OutputFormat::Epub,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DigestSection {
    pub title: String,
    #[serde(default)]
    pub format: FormatSetting,
    pub output_path: PathBuf,
    /// `Field[:asc|desc]` entries, most significant first.
    #[serde(default)]
    pub sort: Vec<String>,
}

/// Upper bound for `fetcher.rate_limit_secs`.
pub const MAX_RATE_LIMIT_SECS: f64 = 3600.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetcherSection {
    pub user_agent: Option<String>,
    pub timeout_secs: u64,
    pub redirect_limit: usize,
    /// Minimum spacing between requests to one host; 0 disables.
    pub rate_limit_secs: f64,
    pub max_bytes: u64,
}

impl Default for FetcherSection {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: 10,
            redirect_limit: 5,
            rate_limit_secs: 1.0,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingSection {
    pub processors: Vec<String>,
    pub min_content_length: usize,
    pub max_content_length: usize,
    pub include_images: bool,
    pub include_tables: bool,
    pub include_videos: bool,
    pub classes_to_preserve: Vec<String>,
}

impl Default for ProcessingSection {
    fn default() -> Self {
        let options = ProcessOptions::default();
        Self {
            processors: vec!["readability".to_string(), "sanitizer".to_string()],
            min_content_length: options.min_content_length,
            max_content_length: options.max_content_length,
            include_images: options.include_images,
            include_tables: options.include_tables,
            include_videos: options.include_videos,
            classes_to_preserve: options.classes_to_preserve,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormattingSection {
    pub include_summary: bool,
    pub include_metadata: bool,
    pub store_images: bool,
}

impl Default for FormattingSection {
    fn default() -> Self {
        Self {
            include_summary: true,
            include_metadata: false,
            store_images: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub word_denylist: Vec<String>,
    #[serde(flatten)]
    pub kind: SourceKind,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceKind {
    Rss(RssOptions),
    Hackernews(HackerNewsOptions),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RssOptions {
    pub name: Option<String>,
    pub url: Option<String>,
    pub max_articles: Option<usize>,
    pub fetch_full_articles: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HackerNewsOptions {
    pub name: Option<String>,
    pub page: Option<String>,
    pub max_articles: Option<usize>,
    pub min_score: Option<i64>,
    pub show_dead: Option<bool>,
    pub show_deleted: Option<bool>,
}

impl RssOptions {
    fn to_config(&self) -> RssConfig {
        let defaults = RssConfig::default();
        RssConfig {
            name: self.name.clone().unwrap_or(defaults.name),
            url: self.url.clone().unwrap_or_default(),
            max_articles: self.max_articles.unwrap_or(defaults.max_articles),
            fetch_full_articles: self
                .fetch_full_articles
                .unwrap_or(defaults.fetch_full_articles),
        }
    }
}

impl HackerNewsOptions {
    fn to_config(&self) -> Result<HackerNewsConfig, ConfigError> {
        let defaults = HackerNewsConfig::default();
        let page = match &self.page {
            Some(page) => page.parse::<HackerNewsPage>().map_err(invalid)?,
            None => defaults.page,
        };
        Ok(HackerNewsConfig {
            name: self.name.clone().unwrap_or(defaults.name.clone()),
            page,
            max_articles: self.max_articles.unwrap_or(defaults.max_articles),
            min_score: self.min_score.unwrap_or(defaults.min_score),
            show_dead: self.show_dead.unwrap_or(defaults.show_dead),
            show_deleted: self.show_deleted.unwrap_or(defaults.show_deleted),
            ..defaults
        })
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.digest.title.trim().is_empty() {
            return Err(invalid("digest.title must not be empty"));
        }
        if self.digest.output_path.as_os_str().is_empty() {
            return Err(invalid("digest.output_path must not be empty"));
        }
        self.sort_fields()?;

        if self.fetcher.timeout_secs == 0 {
            return Err(invalid("fetcher.timeout_secs must be positive"));
        }
        let rate = self.fetcher.rate_limit_secs;
        if !(0.0..=MAX_RATE_LIMIT_SECS).contains(&rate) {
            return Err(invalid(format!(
                "fetcher.rate_limit_secs must be between 0 and {MAX_RATE_LIMIT_SECS}"
            )));
        }

        processors_from_names(&self.processing.processors)
            .map_err(|err| invalid(format!("processing.processors: {err}")))?;

        if !self.sources.iter().any(|s| s.enabled) {
            return Err(invalid("at least one source must be enabled"));
        }
        self.build_sources()?;
        Ok(())
    }

    pub fn output_format(&self) -> OutputFormat {
        self.digest.format.into()
    }

    pub fn sort_fields(&self) -> Result<Vec<SortField>, ConfigError> {
        self.digest
            .sort
            .iter()
            .map(|field| {
                field
                    .parse::<SortField>()
                    .map_err(|err| invalid(format!("digest.sort: {err}")))
            })
            .collect()
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        let timeout = Duration::from_secs(self.fetcher.timeout_secs);
        FetchSettings {
            user_agent: self
                .fetcher
                .user_agent
                .clone()
                .unwrap_or(defaults.user_agent),
            connect_timeout: timeout,
            request_timeout: timeout,
            redirect_limit: self.fetcher.redirect_limit,
            max_bytes: self.fetcher.max_bytes,
        }
    }

    pub fn rate_limit(&self) -> Duration {
        let secs = self.fetcher.rate_limit_secs.clamp(0.0, MAX_RATE_LIMIT_SECS);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    pub fn process_options(&self) -> ProcessOptions {
        let p = &self.processing;
        ProcessOptions {
            min_content_length: p.min_content_length,
            max_content_length: p.max_content_length,
            include_images: p.include_images,
            include_tables: p.include_tables,
            include_videos: p.include_videos,
            classes_to_preserve: p.classes_to_preserve.clone(),
        }
    }

    /// Enabled sources in configuration order.
    pub fn build_sources(&self) -> Result<Vec<SourceEntry>, ConfigError> {
        let mut entries = Vec::new();
        for (i, section) in self.sources.iter().enumerate() {
            if !section.enabled {
                continue;
            }
            let context = |err: digester_engine::source::SourceError| {
                invalid(format!("sources[{i}]: {err}"))
            };
            let entry = match &section.kind {
                SourceKind::Rss(options) => {
                    SourceEntry::new(Box::new(RssSource::new(options.to_config()).map_err(context)?))
                }
                SourceKind::Hackernews(options) => SourceEntry::new(Box::new(
                    HackerNewsSource::new(options.to_config()?).map_err(context)?,
                )),
            };
            entries.push(entry.with_denylist(section.word_denylist.clone()));
        }
        Ok(entries)
    }
}
