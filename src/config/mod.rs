use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::errors::{AppError, AppResult};

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

/// Prefix for environment variable overrides, e.g.
/// `HARVESTER_RESOLVER__ATTEMPT_TIMEOUT=25s`
pub const ENV_PREFIX: &str = "HARVESTER_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub http: HttpIdentityConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Target site layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Landing page; channel pages live at `<base_url>/<id>-online`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Maximum number of channels considered per run
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,
    /// Navigation timeout for the landing page
    #[serde(default = "default_discovery_timeout", with = "duration")]
    pub discovery_timeout: Duration,
    /// Quiescence delay after DOMContentLoaded before links are collected
    #[serde(default = "default_settle_delay", with = "duration")]
    pub settle_delay: Duration,
}

/// Global wall-clock budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_max_runtime", with = "duration")]
    pub max_runtime: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Attempts per channel; values below 1 are treated as 1
    #[serde(default = "default_max_retries_per_channel")]
    pub max_retries_per_channel: u32,
    /// Per-attempt bound for both navigation and the request watch
    #[serde(default = "default_attempt_timeout", with = "duration")]
    pub attempt_timeout: Duration,
    /// Pause between failed attempts
    #[serde(default = "default_retry_cooldown", with = "duration")]
    pub retry_cooldown: Duration,
    /// Random extra cooldown as a percentage of `retry_cooldown`
    #[serde(default = "default_retry_jitter_percent")]
    pub retry_jitter_percent: u8,
    /// Substring identifying the stream manifest request
    #[serde(default = "default_manifest_marker")]
    pub manifest_marker: String,
}

/// Which checks a candidate stream must pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStrategy {
    /// Status code of a header-only HTTP probe
    Http,
    /// ffprobe must be able to read the manifest
    Ffprobe,
    /// HTTP probe first, then ffprobe
    Combined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    Get,
    Head,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_validation_strategy")]
    pub strategy: ValidationStrategy,
    #[serde(default = "default_probe_method")]
    pub method: ProbeMethod,
    /// Status patterns accepted by the HTTP probe ("2xx", "200", ...)
    #[serde(default = "default_acceptable_status_codes")]
    pub acceptable_status_codes: Vec<String>,
    #[serde(default = "default_http_timeout", with = "duration")]
    pub http_timeout: Duration,
    #[serde(default = "default_probe_timeout", with = "duration")]
    pub probe_timeout: Duration,
    /// Can be a full path (/usr/bin/ffprobe) or a command name searched in $PATH
    #[serde(default = "default_ffprobe_command")]
    pub ffprobe_command: String,
}

/// Identity presented to the site, the validation probe and playback clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpIdentityConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_referer")]
    pub referer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Chrome/Chromium binary; auto-detected when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default = "default_sandbox")]
    pub sandbox: bool,
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// CDP resource types aborted in every browsing context
    #[serde(default = "default_blocked_resource_types")]
    pub blocked_resource_types: Vec<String>,
}

// Site defaults
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_channels() -> usize {
    DEFAULT_MAX_CHANNELS
}

fn default_discovery_timeout() -> Duration {
    Duration::from_secs(DEFAULT_DISCOVERY_TIMEOUT_SECS)
}

fn default_settle_delay() -> Duration {
    Duration::from_millis(DEFAULT_SETTLE_DELAY_MS)
}

fn default_max_runtime() -> Duration {
    Duration::from_secs(DEFAULT_MAX_RUNTIME_SECS)
}

// Resolver defaults
fn default_max_retries_per_channel() -> u32 {
    DEFAULT_MAX_RETRIES_PER_CHANNEL
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS)
}

fn default_retry_cooldown() -> Duration {
    Duration::from_millis(DEFAULT_RETRY_COOLDOWN_MS)
}

fn default_retry_jitter_percent() -> u8 {
    DEFAULT_RETRY_JITTER_PERCENT
}

fn default_manifest_marker() -> String {
    DEFAULT_MANIFEST_MARKER.to_string()
}

// Validator defaults
fn default_validation_strategy() -> ValidationStrategy {
    ValidationStrategy::Combined
}

fn default_probe_method() -> ProbeMethod {
    ProbeMethod::Get
}

fn default_acceptable_status_codes() -> Vec<String> {
    vec!["2xx".to_string()]
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(DEFAULT_HTTP_PROBE_TIMEOUT_SECS)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(DEFAULT_FFPROBE_TIMEOUT_SECS)
}

fn default_ffprobe_command() -> String {
    DEFAULT_FFPROBE_COMMAND.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_referer() -> String {
    DEFAULT_REFERER.to_string()
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

// Browser defaults
fn default_headless() -> bool {
    DEFAULT_HEADLESS
}

fn default_sandbox() -> bool {
    DEFAULT_SANDBOX
}

fn default_blocked_resource_types() -> Vec<String> {
    DEFAULT_BLOCKED_RESOURCE_TYPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_channels: default_max_channels(),
            discovery_timeout: default_discovery_timeout(),
            settle_delay: default_settle_delay(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_runtime: default_max_runtime(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_retries_per_channel: default_max_retries_per_channel(),
            attempt_timeout: default_attempt_timeout(),
            retry_cooldown: default_retry_cooldown(),
            retry_jitter_percent: default_retry_jitter_percent(),
            manifest_marker: default_manifest_marker(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            strategy: default_validation_strategy(),
            method: default_probe_method(),
            acceptable_status_codes: default_acceptable_status_codes(),
            http_timeout: default_http_timeout(),
            probe_timeout: default_probe_timeout(),
            ffprobe_command: default_ffprobe_command(),
        }
    }
}

impl Default for HttpIdentityConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            referer: default_referer(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            executable: None,
            sandbox: default_sandbox(),
            extra_args: Vec::new(),
            blocked_resource_types: default_blocked_resource_types(),
        }
    }
}

impl ResolverConfig {
    /// Number of attempts actually made per channel (never below 1)
    pub fn effective_attempts(&self) -> u32 {
        self.max_retries_per_channel.max(1)
    }
}

impl Config {
    /// Load configuration from `CONFIG_FILE` (or `harvester.toml`)
    pub fn load() -> AppResult<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "harvester.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Layered load: built-in defaults, then the TOML file when it exists,
    /// then `HARVESTER_*` environment variables.
    ///
    /// A missing file is not an error and nothing is written to disk.
    pub fn load_from_file(config_file: &str) -> AppResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if Path::new(config_file).exists() {
            info!("Loading configuration from: {}", config_file);
            figment = figment.merge(Toml::file(config_file));
        } else {
            debug!("Config file {} not found, using built-in defaults", config_file);
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string on top of the defaults
    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(contents))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        let base = Url::parse(&self.site.base_url).map_err(|e| {
            AppError::configuration(format!("site.base_url '{}' is invalid: {e}", self.site.base_url))
        })?;
        if base.host_str().is_none() {
            return Err(AppError::configuration(format!(
                "site.base_url '{}' has no host",
                self.site.base_url
            )));
        }
        if self.site.max_channels == 0 {
            return Err(AppError::configuration("site.max_channels must be at least 1"));
        }
        if self.resolver.manifest_marker.trim().is_empty() {
            return Err(AppError::configuration("resolver.manifest_marker must not be empty"));
        }
        if self.resolver.attempt_timeout.is_zero() {
            return Err(AppError::configuration("resolver.attempt_timeout must be positive"));
        }
        if self.validator.acceptable_status_codes.is_empty()
            && self.validator.strategy != ValidationStrategy::Ffprobe
        {
            return Err(AppError::configuration(
                "validator.acceptable_status_codes must not be empty for HTTP validation",
            ));
        }
        Ok(())
    }
}
