//! Solver configuration from the environment or a TOML file.
//!
//! # Environment Variables
//! - `WML_DEPLOYMENT_UID`: default deployment id (`local` or absent runs in-process)
//! - `WML_API_KEY`: optimization service API key
//! - `WML_INSTANCE_ID`: optimization service instance id
//! - `WML_URL`: optimization service base URL
//! - `WML_TOKEN_URL`: token exchange endpoint (default: `https://iam.cloud.ibm.com/identity/token`)
//! - `WML_API_VERSION`: API version query parameter (default: `2020-09-01`)
//! - `WML_REQUEST_TIMEOUT_SEC`: per-request timeout in seconds (default: 30)
//! - `SITE_POLL_INTERVAL_MS`: delay between job status checks (default: 3000)
//! - `SITE_POLL_MAX_ATTEMPTS`: maximum status checks, `0` for unbounded (default: 600)
//! - `SITE_POLL_TIMEOUT_SEC`: maximum wait in seconds, `0` for unbounded (default: 1800)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";
pub const DEFAULT_API_VERSION: &str = "2020-09-01";

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No site-finder.toml found in standard locations")]
    NotFound,
}

/// Bounds on the remote job status loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status checks
    pub interval: Duration,
    /// Maximum number of status checks after submission (`None` = unbounded)
    pub max_attempts: Option<u32>,
    /// Maximum total wait (`None` = unbounded)
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: Some(600),
            timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

impl PollPolicy {
    /// Poll every `interval` with no attempt or time bound.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            timeout: None,
        }
    }
}

/// Credentials for the remote optimization service.
///
/// Fields are optional so a partially configured environment still produces a
/// config; the remote backend reports missing values when it needs them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCredentials {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl std::fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("instance_id", &self.instance_id)
            .field("url", &self.url)
            .finish()
    }
}

impl ServiceCredentials {
    /// Names of the required values that are missing or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.api_key) {
            missing.push("api_key");
        }
        if is_blank(&self.url) {
            missing.push("url");
        }
        missing
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Configuration for a [`SiteFinder`](crate::services::SiteFinder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderConfig {
    /// Deployment used when a call does not name one
    pub deployment_id: Option<String>,
    pub credentials: ServiceCredentials,
    pub token_url: String,
    pub api_version: String,
    pub request_timeout: Duration,
    pub polling: PollPolicy,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            deployment_id: None,
            credentials: ServiceCredentials::default(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(30),
            polling: PollPolicy::default(),
        }
    }
}

impl FinderConfig {
    /// Create configuration from environment variables.
    ///
    /// Unset or unparsable optional values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let env_string = |key: &str| std::env::var(key).ok();
        let env_u64 = |key: &str| std::env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok());

        let max_attempts = match env_u64("SITE_POLL_MAX_ATTEMPTS") {
            Some(0) => None,
            Some(n) => Some(u32::try_from(n).unwrap_or(u32::MAX)),
            None => defaults.polling.max_attempts,
        };

        let timeout = match env_u64("SITE_POLL_TIMEOUT_SEC") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.polling.timeout,
        };

        let interval = env_u64("SITE_POLL_INTERVAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.polling.interval);

        Self {
            deployment_id: env_string("WML_DEPLOYMENT_UID"),
            credentials: ServiceCredentials {
                api_key: env_string("WML_API_KEY"),
                instance_id: env_string("WML_INSTANCE_ID"),
                url: env_string("WML_URL"),
            },
            token_url: env_string("WML_TOKEN_URL").unwrap_or(defaults.token_url),
            api_version: env_string("WML_API_VERSION").unwrap_or(defaults.api_version),
            request_timeout: env_u64("WML_REQUEST_TIMEOUT_SEC")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            polling: PollPolicy {
                interval,
                max_attempts,
                timeout,
            },
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(file.into())
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `site-finder.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> Result<Self, ConfigError> {
        let search_paths = [
            PathBuf::from("site-finder.toml"),
            PathBuf::from("backend/site-finder.toml"),
            PathBuf::from("../site-finder.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(ConfigError::NotFound)
    }

    /// Set the default deployment.
    pub fn with_deployment(mut self, deployment_id: impl Into<String>) -> Self {
        self.deployment_id = Some(deployment_id.into());
        self
    }

    pub fn with_polling(mut self, polling: PollPolicy) -> Self {
        self.polling = polling;
        self
    }
}

/// On-disk layout of `site-finder.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub deployment: DeploymentSettings,
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub polling: PollingSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentSettings {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(flatten)]
    pub credentials: ServiceCredentials,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            credentials: ServiceCredentials::default(),
            token_url: default_token_url(),
            api_version: default_api_version(),
            request_timeout_sec: default_request_timeout_sec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// `0` disables the attempt bound
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// `0` disables the time bound
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
            timeout_sec: default_timeout_sec(),
        }
    }
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_request_timeout_sec() -> u64 {
    30
}

fn default_interval_ms() -> u64 {
    3000
}

fn default_max_attempts() -> u32 {
    600
}

fn default_timeout_sec() -> u64 {
    1800
}

impl From<ConfigFile> for FinderConfig {
    fn from(file: ConfigFile) -> Self {
        let polling = PollPolicy {
            interval: Duration::from_millis(file.polling.interval_ms),
            max_attempts: (file.polling.max_attempts > 0).then_some(file.polling.max_attempts),
            timeout: (file.polling.timeout_sec > 0)
                .then(|| Duration::from_secs(file.polling.timeout_sec)),
        };

        Self {
            deployment_id: file.deployment.id,
            credentials: file.service.credentials,
            token_url: file.service.token_url,
            api_version: file.service.api_version,
            request_timeout: Duration::from_secs(file.service.request_timeout_sec),
            polling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[deployment]
id = "local"
"#;

        let file: ConfigFile = toml::from_str(toml).unwrap();
        let config = FinderConfig::from(file);
        assert_eq!(config.deployment_id.as_deref(), Some("local"));
        assert_eq!(config.polling, PollPolicy::default());
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.credentials.missing(), vec!["api_key", "url"]);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[deployment]
id = "d-123"

[service]
api_key = "secret"
instance_id = "inst"
url = "https://example.test"
api_version = "2021-01-01"
request_timeout_sec = 5

[polling]
interval_ms = 250
max_attempts = 0
timeout_sec = 60
"#;

        let file: ConfigFile = toml::from_str(toml).unwrap();
        let config = FinderConfig::from(file);
        assert_eq!(config.credentials.api_key.as_deref(), Some("secret"));
        assert_eq!(config.credentials.instance_id.as_deref(), Some("inst"));
        assert!(config.credentials.missing().is_empty());
        assert_eq!(config.api_version, "2021-01-01");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.polling.interval, Duration::from_millis(250));
        assert_eq!(config.polling.max_attempts, None);
        assert_eq!(config.polling.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_credentials_debug_hides_api_key() {
        let creds = ServiceCredentials {
            api_key: Some("top-secret".to_string()),
            instance_id: None,
            url: Some("https://example.test".to_string()),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let creds = ServiceCredentials {
            api_key: Some("  ".to_string()),
            instance_id: None,
            url: Some("https://example.test".to_string()),
        };
        assert_eq!(creds.missing(), vec!["api_key"]);
    }
}
