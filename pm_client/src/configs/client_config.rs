use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notifications::ConnectorConfig;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 5000;
const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_HEARTBEAT_MS: u64 = 10_000;
const DEFAULT_READ_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Client settings. Every field is optional so that the layers can be merged
/// field by field; the accessors fill in defaults.
#[derive(Args, Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[clap(long, env = "PM_API_BASE_URL", help = "Base URL of the Personal Manager backend.")]
    pub api_base_url: Option<String>,

    #[clap(long, env = "PM_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "PM_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "PM_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "PM_FIREBASE_API_KEY", help = "Web API key of the Firebase project.")]
    pub firebase_api_key: Option<String>,

    #[clap(long, env = "PM_IDENTITY_URL", help = "Identity Toolkit base URL (Auth emulator).")]
    pub identity_url: Option<String>,

    #[clap(long, env = "PM_SECURE_TOKEN_URL", help = "Secure Token base URL (Auth emulator).")]
    pub secure_token_url: Option<String>,

    #[clap(long, env = "PM_EMAIL", help = "Account email used to sign in.")]
    pub email: Option<String>,

    #[clap(long, env = "PM_PASSWORD", hide_env_values = true, help = "Account password used to sign in.")]
    #[serde(skip_serializing)]
    pub password: Option<String>,

    #[clap(long, env = "PM_RECONNECT_BASE_DELAY_MS", help = "Base delay in milliseconds between notification reconnect attempts.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[clap(long, env = "PM_RECONNECT_MAX_ATTEMPTS", help = "Reconnect attempts before the notification channel gives up.")]
    pub reconnect_max_attempts: Option<u32>,

    #[clap(long, env = "PM_HEARTBEAT_MS", help = "STOMP heart-beat interval in milliseconds.")]
    pub heartbeat_ms: Option<u64>,

    #[clap(long, env = "PM_READ_RETRIES", help = "Retries for failed GET requests.")]
    pub read_retries: Option<u32>,

    #[clap(long, env = "PM_MODULES_PATH", help = "File holding the dashboard module settings.")]
    pub modules_path: Option<PathBuf>,
}

/// `<config dir>/personal-manager/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("personal-manager").join("config.json"))
}

impl ClientConfig {
    /// Built-in defaults, the bottom layer.
    pub fn defaults() -> Self {
        ClientConfig {
            api_base_url: Some(DEFAULT_API_BASE_URL.to_string()),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
            reconnect_base_delay_ms: Some(DEFAULT_RECONNECT_BASE_DELAY_MS),
            reconnect_max_attempts: Some(DEFAULT_RECONNECT_MAX_ATTEMPTS),
            heartbeat_ms: Some(DEFAULT_HEARTBEAT_MS),
            read_retries: Some(DEFAULT_READ_RETRIES),
            ..Default::default()
        }
    }

    // `other` wins wherever it has a value.
    pub fn merge(self, other: ClientConfig) -> ClientConfig {
        ClientConfig {
            api_base_url: other.api_base_url.or(self.api_base_url),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            firebase_api_key: other.firebase_api_key.or(self.firebase_api_key),
            identity_url: other.identity_url.or(self.identity_url),
            secure_token_url: other.secure_token_url.or(self.secure_token_url),
            email: other.email.or(self.email),
            password: other.password.or(self.password),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_attempts: other.reconnect_max_attempts.or(self.reconnect_max_attempts),
            heartbeat_ms: other.heartbeat_ms.or(self.heartbeat_ms),
            read_retries: other.read_retries.or(self.read_retries),
            modules_path: other.modules_path.or(self.modules_path),
        }
    }

    /// Reads a JSON config file.
    pub fn from_file(path: &Path) -> Result<ClientConfig, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layers defaults, the config file and `self` (the parsed env/CLI values).
    ///
    /// The file is `config_path` when given, otherwise [`default_config_path`].
    /// A missing default file is skipped; a missing explicit file is an error.
    pub fn resolve(self) -> Result<ClientConfig, ConfigError> {
        let mut config = ClientConfig::defaults();

        let explicit = self.config_path.is_some();
        match self.config_path.clone().or_else(default_config_path) {
            Some(path) if path.exists() || explicit => {
                config = config.merge(ClientConfig::from_file(&path)?);
                log::debug!("Loaded config file {}", path.display());
            }
            Some(path) => {
                log::info!(
                    "Config file not found at {}. Using defaults and environment/CLI variables.",
                    path.display()
                );
            }
            None => log::warn!("Could not determine the config directory."),
        }

        let config = config.merge(self);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(self.api_base_url())
            .map_err(|e| ConfigError::Invalid(format!("apiBaseUrl {}: {}", self.api_base_url(), e)))?;
        if self.reconnect_max_attempts == Some(0) {
            return Err(ConfigError::Invalid("reconnectMaxAttempts must be at least 1".into()));
        }
        if self.heartbeat_ms == Some(0) {
            return Err(ConfigError::Invalid("heartbeatMs must be positive".into()));
        }
        Ok(())
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn read_retries(&self) -> u32 {
        self.read_retries.unwrap_or(DEFAULT_READ_RETRIES)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms.unwrap_or(DEFAULT_HEARTBEAT_MS))
    }

    pub fn connector(&self) -> ConnectorConfig {
        ConnectorConfig {
            base_delay: Duration::from_millis(
                self.reconnect_base_delay_ms
                    .unwrap_or(DEFAULT_RECONNECT_BASE_DELAY_MS),
            ),
            max_attempts: self
                .reconnect_max_attempts
                .unwrap_or(DEFAULT_RECONNECT_MAX_ATTEMPTS),
        }
    }

    /// Module settings file, falling back to the user's data directory.
    pub fn modules_path(&self) -> Option<PathBuf> {
        self.modules_path
            .clone()
            .or_else(crate::stores::ModulePreferences::default_path)
    }

    /// Email and password, or an error naming what is missing.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) => Ok((email, password)),
            (None, _) => Err(ConfigError::Invalid("no email configured (PM_EMAIL)".into())),
            (_, None) => Err(ConfigError::Invalid("no password configured (PM_PASSWORD)".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn later_layers_win_field_by_field() {
        let file = ClientConfig {
            api_base_url: Some("http://file:1".into()),
            heartbeat_ms: Some(2000),
            ..Default::default()
        };
        let cli = ClientConfig {
            api_base_url: Some("http://cli:2".into()),
            ..Default::default()
        };
        let merged = ClientConfig::defaults().merge(file).merge(cli);
        assert_eq!(merged.api_base_url(), "http://cli:2");
        assert_eq!(merged.heartbeat(), Duration::from_millis(2000));
        assert_eq!(merged.log_level(), "info");
        assert_eq!(merged.read_retries(), 3);
    }

    #[test]
    fn resolve_reads_the_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pm.json");
        fs::write(
            &path,
            r#"{ "apiBaseUrl": "https://pm.example.com", "reconnectBaseDelayMs": 250, "email": "me@example.com" }"#,
        )
        .unwrap();

        let cli = ClientConfig {
            config_path: Some(path),
            reconnect_max_attempts: Some(2),
            ..Default::default()
        };
        let config = cli.resolve().unwrap();
        assert_eq!(config.api_base_url(), "https://pm.example.com");
        assert_eq!(config.email.as_deref(), Some("me@example.com"));
        let connector = config.connector();
        assert_eq!(connector.base_delay, Duration::from_millis(250));
        assert_eq!(connector.max_attempts, 2);
    }

    #[test]
    fn missing_or_broken_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = ClientConfig {
            config_path: Some(dir.path().join("absent.json")),
            ..Default::default()
        };
        assert!(matches!(missing.resolve(), Err(ConfigError::Read { .. })));

        let broken_path = dir.path().join("broken.json");
        fs::write(&broken_path, "{").unwrap();
        let broken = ClientConfig {
            config_path: Some(broken_path),
            ..Default::default()
        };
        assert!(matches!(broken.resolve(), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pm.json");
        fs::write(&path, "{}").unwrap();

        let bad_url = ClientConfig {
            config_path: Some(path.clone()),
            api_base_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(matches!(bad_url.resolve(), Err(ConfigError::Invalid(_))));

        let zero_attempts = ClientConfig {
            config_path: Some(path),
            reconnect_max_attempts: Some(0),
            ..Default::default()
        };
        assert!(matches!(zero_attempts.resolve(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn password_is_never_written_back() {
        let config = ClientConfig {
            email: Some("me@example.com".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert_eq!(config.credentials().unwrap(), ("me@example.com", "hunter2"));
        assert!(ClientConfig::default().credentials().is_err());
    }
}
