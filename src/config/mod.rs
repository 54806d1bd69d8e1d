//! Configuration
//!
//! Built-in defaults, then an optional JSON5 file, then environment
//! variables. The result is an explicit [`Config`] value handed to the
//! components that talk to the remote service; nothing reads the
//! environment after startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::ai::RetryPolicy;
use crate::logging::LoggingConfig;
use crate::media::readiness::PollPolicy;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";
pub const CONFIG_PATH_ENV: &str = "GENAI_STUDIO_CONFIG";
pub const BIND_ENV: &str = "GENAI_STUDIO_BIND";
pub const PORT_ENV: &str = "GENAI_STUDIO_PORT";
pub const LOG_FORMAT_ENV: &str = "GENAI_STUDIO_LOG_FORMAT";
pub const LOG_LEVEL_ENV: &str = "RUST_LOG";

/// Optional file of `KEY=value` lines loaded into the environment at startup.
pub const DOTENV_FILE: &str = ".env";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_PORT: u16 = 8501;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing credential: set the {0} environment variable")]
    MissingCredential(&'static str),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to load {path}: {message}")]
    Dotenv { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// API key, wiped from memory on drop and redacted from all output.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            f.write_str("ApiKey(<unset>)")
        } else {
            f.write_str("ApiKey(<redacted>)")
        }
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_empty() {
            serializer.serialize_none()
        } else {
            serializer.serialize_str("<redacted>")
        }
    }
}

/// Model names per use
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelsConfig {
    /// Text conversation
    pub chat: String,
    /// Image and audio analysis
    pub analysis: String,
    /// Video analysis
    pub video: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat: "gemini-2.5-flash".to_string(),
            analysis: "gemini-2.5-flash".to_string(),
            video: "gemini-2.5-pro".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: 200 * 1024 * 1024,
        }
    }
}

/// Asset readiness polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    /// Status queries before giving up
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_attempts: 60,
        }
    }
}

impl PollingConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.interval_secs),
            max_attempts: self.max_attempts,
        }
    }
}

/// Outbound request behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestsConfig {
    pub timeout_secs: u64,
    /// Timeout for video inference requests
    pub video_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            video_timeout_secs: 600,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl RequestsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(self.video_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

/// Chat session limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionsConfig {
    pub max_sessions: usize,
    pub idle_ttl_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions: 256,
            idle_ttl_secs: 3600,
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Only ever taken from the environment.
    #[serde(skip_deserializing)]
    pub api_key: ApiKey,
    pub base_url: String,
    pub models: ModelsConfig,
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub requests: RequestsConfig,
    pub sessions: SessionsConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: ModelsConfig::default(),
            server: ServerConfig::default(),
            polling: PollingConfig::default(),
            requests: RequestsConfig::default(),
            sessions: SessionsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load from file and process environment, then validate.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::resolve(explicit_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Layer defaults, file and environment without validating.
    pub fn resolve(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let base = match resolve_config_path(explicit_path, env_path) {
            Some(path) => Self::read_file(&path)?,
            None => Self::default(),
        };
        base.apply_env(|key| std::env::var(key).ok())
    }

    /// Parse a JSON5 config file.
    pub fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        json5::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.api_key = ApiKey::new(key);
        }
        if let Some(url) = non_empty(BASE_URL_ENV) {
            self.base_url = url;
        }
        if let Some(bind) = non_empty(BIND_ENV) {
            self.server.bind = bind;
        }
        if let Some(port) = non_empty(PORT_ENV) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV} is not a port: {port}")))?;
        }
        if let Some(level) = non_empty(LOG_LEVEL_ENV) {
            self.logging.level = level;
        }
        if let Some(format) = non_empty(LOG_FORMAT_ENV) {
            self.logging.format = format.parse().map_err(ConfigError::Invalid)?;
        }
        Ok(self)
    }

    /// Check invariants. The credential is checked first so a missing key is
    /// reported as such rather than as a later remote auth failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingCredential(API_KEY_ENV));
        }
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("baseUrl '{}': {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "baseUrl must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.polling.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "polling.intervalSecs must be at least 1".into(),
            ));
        }
        if self.polling.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "polling.maxAttempts must be at least 1".into(),
            ));
        }
        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "sessions.maxSessions must be at least 1".into(),
            ));
        }
        for (field, model) in [
            ("models.chat", &self.models.chat),
            ("models.analysis", &self.models.analysis),
            ("models.video", &self.models.video),
        ] {
            if model.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// `bind:port` for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

/// Explicit path, then `GENAI_STUDIO_CONFIG`, then the per-user config file
/// if it exists.
fn resolve_config_path(explicit: Option<&Path>, from_env: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = from_env.filter(|p| !p.as_os_str().is_empty()) {
        return Some(path);
    }
    default_config_path().filter(|p| p.is_file())
}

/// Nearest `.env` in `start` or one of its ancestors.
pub fn find_dotenv(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(DOTENV_FILE))
        .find(|path| path.is_file())
}

/// Load a `.env` file into the process environment.
///
/// Variables already set win. A missing file is not an error; a malformed
/// one is, since the lines after the bad one are never loaded.
pub fn load_dotenv(path: &Path) -> Result<(), ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ConfigError::Dotenv {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

/// `<config dir>/genai-studio/config.json5`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("genai-studio").join("config.json5"))
}
