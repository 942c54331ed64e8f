//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/todaytasks/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/todaytasks/` (~/.config/todaytasks/)
//! - Data: `$XDG_DATA_HOME/todaytasks/` (~/.local/share/todaytasks/)
//! - State/Logs: `$XDG_STATE_HOME/todaytasks/` (~/.local/state/todaytasks/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Translation table code (`en` and `fi` ship built in)
    #[serde(default = "default_language")]
    pub language: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where the work store and issue cache live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Code review system (pull request status)
    #[serde(default)]
    pub stash: StashConfig,

    /// Issue tracker
    #[serde(default)]
    pub jira: JiraConfig,

    /// Background worker cadence
    #[serde(default)]
    pub polling: PollingConfig,

    /// Event reminders and desktop integration
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: default_language(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            stash: StashConfig::default(),
            jira: JiraConfig::default(),
            polling: PollingConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// File locations; unset entries resolve to the XDG data directory.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Work store JSON file
    pub data_file: Option<PathBuf>,
    /// Issue cache JSON file
    pub issue_cache_file: Option<PathBuf>,
}

impl StorageConfig {
    pub fn data_file(&self) -> PathBuf {
        self.data_file
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("tasks.json"))
    }

    pub fn issue_cache_file(&self) -> PathBuf {
        self.issue_cache_file
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("issue_cache.json"))
    }
}

/// Code review system configuration
///
/// Pull request tracking is enabled only when `url` is set.
#[derive(Debug, Deserialize, Clone)]
pub struct StashConfig {
    /// Base URL, e.g. `http://stash.example.com:7990`
    pub url: Option<String>,

    /// Bearer token for the REST API
    pub api_token: Option<String>,

    /// Numeric id of the current user, for reply detection
    pub user_id: Option<u64>,

    /// Dashboard endpoint listing pull requests awaiting my review
    pub review_url: Option<String>,

    /// Distinct approvals needed before a pull request counts as approved
    #[serde(default = "default_approval_quorum")]
    pub approval_quorum: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_stash_timeout")]
    pub timeout_secs: u64,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_token: None,
            user_id: None,
            review_url: None,
            approval_quorum: default_approval_quorum(),
            timeout_secs: default_stash_timeout(),
        }
    }
}

impl StashConfig {
    /// Check if pull request tracking is configured
    pub fn is_ready(&self) -> bool {
        self.url.is_some() && self.token().is_some()
    }

    /// The API token, ignoring blank and placeholder values
    pub fn token(&self) -> Option<&str> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.contains("PASTE"))
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.url.is_some() && self.token().is_none() {
            return Err(Error::Config(
                "stash.api_token is required when stash.url is set".to_string(),
            ));
        }
        if self.review_url.is_some() && self.token().is_none() {
            return Err(Error::Config(
                "stash.api_token is required when stash.review_url is set".to_string(),
            ));
        }
        if self.approval_quorum == 0 {
            return Err(Error::Config(
                "stash.approval_quorum must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_approval_quorum() -> usize {
    2
}

fn default_stash_timeout() -> u64 {
    10
}

/// Issue tracker configuration
#[derive(Debug, Deserialize, Clone)]
pub struct JiraConfig {
    /// Base URL, e.g. `https://example.atlassian.net`
    pub url: Option<String>,

    /// Stored browser session (cookies)
    pub session_file: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_jira_timeout")]
    pub timeout_secs: u64,

    /// Cache entries younger than this are not refetched
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            url: None,
            session_file: None,
            timeout_secs: default_jira_timeout(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl JiraConfig {
    pub fn is_ready(&self) -> bool {
        self.url.is_some()
    }

    pub fn session_file(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("jira_session.json"))
    }
}

fn default_jira_timeout() -> u64 {
    15
}

fn default_cache_ttl() -> u64 {
    300
}

/// Background worker intervals
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_five_minutes")]
    pub pr_interval_secs: u64,

    #[serde(default = "default_five_minutes")]
    pub issue_interval_secs: u64,

    #[serde(default = "default_five_minutes")]
    pub review_interval_secs: u64,

    #[serde(default = "default_event_check")]
    pub event_check_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            pr_interval_secs: default_five_minutes(),
            issue_interval_secs: default_five_minutes(),
            review_interval_secs: default_five_minutes(),
            event_check_secs: default_event_check(),
        }
    }
}

fn default_five_minutes() -> u64 {
    300
}

fn default_event_check() -> u64 {
    60
}

/// Event reminders and desktop integration
#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Minutes before an event at which a reminder fires
    #[serde(default = "default_thresholds")]
    pub thresholds_minutes: Vec<u32>,

    /// Reminder at which a meeting link is opened in the browser
    #[serde(default = "default_open_link_at")]
    pub open_link_at_minutes: u32,

    /// Window raised when a reminder fires
    #[serde(default = "default_window_title")]
    pub window_title: String,

    /// Browser invocation; the URL is appended. Empty means `xdg-open`.
    #[serde(default)]
    pub browser_command: Vec<String>,

    /// Desktop notification program
    #[serde(default = "default_notify_command")]
    pub notify_command: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            thresholds_minutes: default_thresholds(),
            open_link_at_minutes: default_open_link_at(),
            window_title: default_window_title(),
            browser_command: vec![],
            notify_command: default_notify_command(),
        }
    }
}

fn default_thresholds() -> Vec<u32> {
    vec![10, 5]
}

fn default_open_link_at() -> u32 {
    5
}

fn default_window_title() -> String {
    "TODAYTASKS".to_string()
}

fn default_notify_command() -> String {
    "notify-send".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Reject combinations that would leave a worker unable to run.
    pub fn validate(&self) -> Result<()> {
        self.stash.validate()?;
        if self.notifications.thresholds_minutes.is_empty() {
            return Err(Error::Config(
                "notifications.thresholds_minutes must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/todaytasks/config.toml` (~/.config/todaytasks/config.toml)
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// `$XDG_CONFIG_HOME/todaytasks/`
    pub fn config_dir() -> PathBuf {
        xdg_config_home().join("todaytasks")
    }

    /// Directory searched for translation overrides
    pub fn lang_dir() -> PathBuf {
        Self::config_dir().join("lang")
    }

    /// Returns the data directory path (work store, issue cache, session)
    ///
    /// `$XDG_DATA_HOME/todaytasks/` (~/.local/share/todaytasks/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("todaytasks")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/todaytasks/` (~/.local/state/todaytasks/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("todaytasks")
    }
}
