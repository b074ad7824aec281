//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use time::UtcOffset;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{
    CliArgs, Command, CommentsArgs, EntriesArgs, GlobalOverrides, ShowArgs, VisibilityArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "almanac";
const ENV_PREFIX: &str = "ALMANAC";
const DEFAULT_CONTENT_DIR: &str = "content";
const DEFAULT_ROOT_URL: &str = "http://localhost/";
const DEFAULT_BLOG_NAME: &str = "almanac";
const DEFAULT_TRACKBACK_TIMEOUT_SECS: u64 = 10;
const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
    pub comments: CommentSettings,
    pub site: SiteSettings,
    pub workers: WorkerSettings,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub content_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CommentSettings {
    /// Site-wide switch; when off every new comment is refused.
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    /// Base for permalinks; always ends with `/`.
    pub root_url: Url,
    pub blog_name: String,
    /// Offset used for local calendar views (month pages, day lists).
    pub utc_offset: UtcOffset,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub trackback_timeout: Duration,
    pub user_agent: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    storage: RawStorageSettings,
    logging: RawLoggingSettings,
    comments: RawCommentSettings,
    site: RawSiteSettings,
    workers: RawWorkerSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(dir) = overrides.content_dir.as_ref() {
            self.storage.content_dir = Some(dir.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.site_root_url.as_ref() {
            self.site.root_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            storage,
            logging,
            comments,
            site,
            workers,
        } = raw;

        Ok(Self {
            storage: build_storage_settings(storage)?,
            logging: build_logging_settings(logging)?,
            comments: CommentSettings {
                enabled: comments.enabled.unwrap_or(true),
            },
            site: build_site_settings(site)?,
            workers: build_worker_settings(workers)?,
        })
    }
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let content_dir = storage
        .content_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR));
    if content_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.content_dir",
            "path must not be empty",
        ));
    }
    Ok(StorageSettings { content_dir })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let raw_url = site
        .root_url
        .unwrap_or_else(|| DEFAULT_ROOT_URL.to_string());
    let mut root_url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("site.root_url", format!("invalid url: {err}")))?;
    if root_url.cannot_be_a_base() {
        return Err(LoadError::invalid(
            "site.root_url",
            "url cannot be used as a base",
        ));
    }
    if !root_url.path().ends_with('/') {
        let path = format!("{}/", root_url.path());
        root_url.set_path(&path);
    }

    let blog_name = site
        .blog_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_BLOG_NAME.to_string());

    let minutes = site.utc_offset_minutes.unwrap_or(0);
    if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        return Err(LoadError::invalid(
            "site.utc_offset_minutes",
            "must be within ±18 hours",
        ));
    }
    let utc_offset = UtcOffset::from_whole_seconds(minutes * 60)
        .map_err(|err| LoadError::invalid("site.utc_offset_minutes", err.to_string()))?;

    Ok(SiteSettings {
        root_url,
        blog_name,
        utc_offset,
    })
}

fn build_worker_settings(workers: RawWorkerSettings) -> Result<WorkerSettings, LoadError> {
    let timeout_secs = workers
        .trackback_timeout_seconds
        .unwrap_or(DEFAULT_TRACKBACK_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "workers.trackback_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let user_agent = workers
        .user_agent
        .map(|agent| agent.trim().to_string())
        .filter(|agent| !agent.is_empty())
        .unwrap_or_else(default_user_agent);

    Ok(WorkerSettings {
        trackback_timeout: Duration::from_secs(timeout_secs),
        user_agent,
    })
}

fn default_user_agent() -> String {
    format!("almanac/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    content_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommentSettings {
    enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    root_url: Option<String>,
    blog_name: Option<String>,
    utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWorkerSettings {
    trackback_timeout_seconds: Option<u64>,
    user_agent: Option<String>,
}
