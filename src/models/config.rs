//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ListingSelectors;

/// Environment variable overriding `auth.username`.
pub const ENV_USERNAME: &str = "FORUM_MONITOR_USERNAME";
/// Environment variable overriding `auth.password`.
pub const ENV_PASSWORD: &str = "FORUM_MONITOR_PASSWORD";
/// Environment variable overriding `notifier.webhook_url`.
pub const ENV_WEBHOOK_URL: &str = "FORUM_MONITOR_WEBHOOK_URL";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Forum location
    #[serde(default)]
    pub site: SiteConfig,

    /// HTTP behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// How the listing page is obtained
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Login form settings for session retrieval
    #[serde(default)]
    pub auth: AuthConfig,

    /// Listing markup selectors
    #[serde(default)]
    pub selectors: ListingSelectors,

    /// Novelty detection policy
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Webhook notification settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Poll timing
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// History store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Debugging aids
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply the `FORUM_MONITOR_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Blank values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(username) = lookup(ENV_USERNAME) {
            self.auth.username = Some(username);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.auth.password = Some(password);
        }
        if let Some(webhook) = lookup(ENV_WEBHOOK_URL) {
            self.notifier.webhook_url = Some(webhook);
        }
    }

    /// Resolved login credentials, if both parts are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.auth.username.as_deref()?.trim();
        let password = self.auth.password.as_deref()?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Validate configuration values for basic sanity.
    ///
    /// Missing credentials in session mode are reported here so the process
    /// can refuse to start.
    pub fn validate(&self) -> Result<()> {
        let origin = url::Url::parse(&self.site.origin)?;
        if !origin.has_host() {
            return Err(AppError::validation("site.origin must be an absolute URL"));
        }
        url::Url::parse(&self.site.listing_url)?;

        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.detection.max_records == 0 {
            return Err(AppError::validation("detection.max_records must be > 0"));
        }
        if self.notifier.batch_limit == 0 {
            return Err(AppError::validation("notifier.batch_limit must be > 0"));
        }
        if self.schedule.interval_secs == 0 {
            return Err(AppError::validation("schedule.interval_secs must be > 0"));
        }
        if self.schedule.cycle_timeout_secs == Some(0) {
            return Err(AppError::validation(
                "schedule.cycle_timeout_secs must be > 0",
            ));
        }
        if self.selectors.row_selector.trim().is_empty() {
            return Err(AppError::validation("selectors.row_selector is empty"));
        }

        if self.retrieval.mode == RetrievalMode::Session {
            url::Url::parse(&self.auth.login_url)?;
            if self.credentials().is_none() {
                return Err(AppError::config(format!(
                    "session retrieval requires auth.username and auth.password (or {ENV_USERNAME} / {ENV_PASSWORD})"
                )));
            }
        }
        Ok(())
    }

    /// Resolved webhook URL, required before any notification is sent.
    ///
    /// Kept out of [`Config::validate`] so read-only commands work without one.
    pub fn require_webhook(&self) -> Result<&str> {
        self.notifier
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                AppError::config(format!(
                    "notifier.webhook_url is not set (or {ENV_WEBHOOK_URL})"
                ))
            })
    }

    /// Overall deadline for one poll cycle.
    pub fn cycle_timeout(&self) -> Duration {
        let secs = self
            .schedule
            .cycle_timeout_secs
            .unwrap_or(match self.retrieval.mode {
                RetrievalMode::Http => defaults::http_cycle_timeout(),
                RetrievalMode::Session => defaults::session_cycle_timeout(),
            });
        Duration::from_secs(secs)
    }

    /// Delay between the start of consecutive poll cycles.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }
}

/// Forum location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteConfig {
    /// Origin prefixed to site-relative hrefs
    #[serde(default = "defaults::origin")]
    pub origin: String,

    /// Article listing page
    #[serde(default = "defaults::listing_url")]
    pub listing_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: defaults::origin(),
            listing_url: defaults::listing_url(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header for HTTP requests
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Listing retrieval mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Anonymous GET of the listing page
    #[default]
    Http,
    /// Log in first, then GET the listing page with the session cookies
    Session,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub mode: RetrievalMode,
}

/// Login form settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    /// Form endpoint the credentials are posted to
    #[serde(default = "defaults::login_url")]
    pub login_url: String,

    #[serde(default = "defaults::username_field")]
    pub username_field: String,

    #[serde(default = "defaults::password_field")]
    pub password_field: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_url: defaults::login_url(),
            username_field: defaults::username_field(),
            password_field: defaults::password_field(),
            username: None,
            password: None,
        }
    }
}

/// Resolved login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How many listing entries are considered per cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Every non-pinned entry up to `max_records`
    #[default]
    All,
    /// Only the first non-pinned entry
    Latest,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectionConfig {
    #[serde(default)]
    pub mode: DetectionMode,

    /// Cap on non-pinned entries extracted per cycle
    #[serde(default = "defaults::max_records")]
    pub max_records: usize,
}

impl DetectionConfig {
    /// Effective extraction cap for the configured mode.
    pub fn cap(&self) -> usize {
        match self.mode {
            DetectionMode::All => self.max_records,
            DetectionMode::Latest => 1,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::default(),
            max_records: defaults::max_records(),
        }
    }
}

/// Webhook notification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Message template; supports `{title}` and `{url}`
    #[serde(default = "defaults::template")]
    pub template: String,

    /// Minimum spacing between consecutive webhook calls
    #[serde(default = "defaults::min_interval")]
    pub min_interval_ms: u64,

    /// Maximum unnotified articles handed to the dispatcher per cycle
    #[serde(default = "defaults::batch_limit")]
    pub batch_limit: usize,
}

impl NotifierConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            template: defaults::template(),
            min_interval_ms: defaults::min_interval(),
            batch_limit: defaults::batch_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Seconds between poll cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Per-cycle deadline; defaults depend on the retrieval mode
    #[serde(default)]
    pub cycle_timeout_secs: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            cycle_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "defaults::database")]
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: defaults::database(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    /// Save the raw markup when a cycle extracts nothing
    #[serde(default = "defaults::dump_on_empty")]
    pub dump_on_empty: bool,

    #[serde(default = "defaults::dump_dir")]
    pub dump_dir: PathBuf,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dump_on_empty: defaults::dump_on_empty(),
            dump_dir: defaults::dump_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Site defaults
    pub fn origin() -> String {
        "https://bbs.robomaster.com".into()
    }
    pub fn listing_url() -> String {
        "https://bbs.robomaster.com/article".into()
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0 Safari/537.36".into()
    }
    pub fn accept_language() -> String {
        "zh-CN,zh;q=0.9".into()
    }
    pub fn timeout() -> u64 {
        20
    }

    // Auth defaults
    pub fn login_url() -> String {
        "https://bbs.robomaster.com/login".into()
    }
    pub fn username_field() -> String {
        "username".into()
    }
    pub fn password_field() -> String {
        "password".into()
    }

    // Detection defaults
    pub fn max_records() -> usize {
        10
    }

    // Notifier defaults
    pub fn template() -> String {
        "New forum article: {title}\n{url}".into()
    }
    pub fn min_interval() -> u64 {
        1000
    }
    pub fn batch_limit() -> usize {
        10
    }

    // Schedule defaults
    pub fn interval() -> u64 {
        300
    }
    pub fn http_cycle_timeout() -> u64 {
        180
    }
    pub fn session_cycle_timeout() -> u64 {
        600
    }

    // Storage and diagnostics defaults
    pub fn database() -> PathBuf {
        PathBuf::from("data/articles.db")
    }
    pub fn dump_on_empty() -> bool {
        true
    }
    pub fn dump_dir() -> PathBuf {
        PathBuf::from("data/dumps")
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_config() -> Config {
        let mut config = Config::default();
        config.retrieval.mode = RetrievalMode::Session;
        config
    }

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_cap() {
        let mut config = Config::default();
        config.detection.max_records = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_origin() {
        let mut config = Config::default();
        config.site.origin = "/article".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_session_requires_credentials() {
        let mut config = session_config();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.auth.username = Some("pilot".into());
        config.auth.password = Some("hunter2".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_fill_credentials_and_webhook() {
        let mut config = session_config();
        config.apply_overrides_from(|key| match key {
            ENV_USERNAME => Some("pilot".into()),
            ENV_PASSWORD => Some("hunter2".into()),
            ENV_WEBHOOK_URL => Some("https://hooks.example.com/x".into()),
            _ => None,
        });

        let creds = config.credentials().unwrap();
        assert_eq!(creds.username, "pilot");
        assert_eq!(config.require_webhook().unwrap(), "https://hooks.example.com/x");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_ignore_blank_values() {
        let mut config = Config::default();
        config.notifier.webhook_url = Some("https://hooks.example.com/file".into());
        config.apply_overrides_from(|_| Some("   ".into()));
        assert_eq!(
            config.require_webhook().unwrap(),
            "https://hooks.example.com/file"
        );
        assert!(config.auth.username.is_none());
    }

    #[test]
    fn require_webhook_missing() {
        let config = Config::default();
        // Read-only commands run without a webhook.
        assert!(config.validate().is_ok());
        assert!(matches!(config.require_webhook(), Err(AppError::Config(_))));

        let mut config = config;
        config.notifier.webhook_url = Some("   ".into());
        assert!(config.require_webhook().is_err());
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "pilot".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("pilot"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn cycle_timeout_depends_on_mode() {
        assert_eq!(Config::default().cycle_timeout(), Duration::from_secs(180));
        assert_eq!(session_config().cycle_timeout(), Duration::from_secs(600));

        let mut config = Config::default();
        config.schedule.cycle_timeout_secs = Some(42);
        assert_eq!(config.cycle_timeout(), Duration::from_secs(42));
    }

    #[test]
    fn latest_mode_caps_at_one() {
        let mut detection = DetectionConfig::default();
        assert_eq!(detection.cap(), 10);
        detection.mode = DetectionMode::Latest;
        assert_eq!(detection.cap(), 1);
    }

    #[test]
    fn parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [retrieval]
            mode = "session"

            [detection]
            mode = "latest"

            [notifier]
            webhook_url = "https://hooks.example.com/abc"
            min_interval_ms = 250

            [selectors]
            row_selector = "li.post"
            "#,
        )
        .unwrap();

        assert_eq!(config.retrieval.mode, RetrievalMode::Session);
        assert_eq!(config.detection.mode, DetectionMode::Latest);
        assert_eq!(config.notifier.min_interval(), Duration::from_millis(250));
        assert_eq!(config.notifier.batch_limit, 10);
        assert_eq!(config.selectors.row_selector, "li.post");
        assert_eq!(config.selectors.article_path_prefix, "/article/");
        assert_eq!(config.schedule.interval_secs, 300);
    }
}
