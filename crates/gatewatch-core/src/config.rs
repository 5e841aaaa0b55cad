//! Gatewatch configuration system.
//!
//! TOML file (default `~/.gatewatch/config.toml`) with per-field defaults,
//! then environment overrides for deployment secrets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{GatewatchError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewatchConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub poll: PollConfig,
    /// Location code → human label used in alerts.
    #[serde(default = "default_locations")]
    pub locations: BTreeMap<String, String>,
}

fn default_locations() -> BTreeMap<String, String> {
    [
        ("102", "Espacio Urbano"),
        ("104", "Calama"),
        ("105", "Pacífico"),
        ("106", "Arauco"),
        ("107", "Iquique"),
        ("108", "Angamos"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub const UNKNOWN_LOCATION: &str = "Unknown Location";

impl Default for GatewatchConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            access: AccessConfig::default(),
            notification: NotificationConfig::default(),
            directory: DirectoryConfig::default(),
            poll: PollConfig::default(),
            locations: default_locations(),
        }
    }
}

impl GatewatchConfig {
    /// Load config from the default path (~/.gatewatch/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewatchError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| GatewatchError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Gatewatch home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gatewatch")
    }

    /// Apply process environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            match port.trim().parse() {
                Ok(p) => self.gateway.port = p,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid PORT override: {port}"),
            }
        }
        if let Some(v) = get("AUTH_STRING") {
            self.gateway.auth_token = v;
        }
        if let Some(v) = get("DATABASE_PATH") {
            self.database.path = v;
        }
        if let Some(v) = get("ACCESS_SERVICE_BASE_URL") {
            self.access.base_url = v;
        }
        if let Some(v) = get("ACCESS_SERVICE_AUTH_TOKEN") {
            self.access.auth_token = v;
        }
        if let Some(v) = get("NOTIFICATION_BASE_URL") {
            self.notification.base_url = v;
        }
        if let Some(v) = get("NOTIFICATION_USERNAME") {
            self.notification.username = v;
        }
        if let Some(v) = get("NOTIFICATION_PASSWORD") {
            self.notification.password = v;
        }
        if let Some(v) = get("SOURCE_BASE_URL") {
            self.directory.base_url = v;
        }
        if let Some(v) = get("SOURCE_AUTH_STRING") {
            self.directory.auth_token = v;
        }
        if let Some(v) = get("TIME_ZONE") {
            self.poll.time_zone = v;
        }
    }

    /// Check that everything the service needs to talk to its collaborators
    /// is present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.gateway.auth_token.is_empty() {
            missing.push("gateway.auth_token");
        }
        if self.access.base_url.is_empty() {
            missing.push("access.base_url");
        }
        if self.notification.base_url.is_empty() {
            missing.push("notification.base_url");
        }
        if self.directory.base_url.is_empty() {
            missing.push("directory.base_url");
        }
        if !missing.is_empty() {
            return Err(GatewatchError::config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if self.poll.interval_secs == 0 {
            return Err(GatewatchError::config("poll.interval_secs must be > 0"));
        }
        Ok(())
    }

    /// Human label for a location code.
    pub fn location_label(&self, code: &str) -> String {
        self.locations
            .get(code.trim())
            .cloned()
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
    }

    /// Sanitized view for startup logs, without secrets.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "gateway": {
                "host": self.gateway.host,
                "port": self.gateway.port,
                "auth_token_set": !self.gateway.auth_token.is_empty(),
            },
            "database": self.database.path,
            "access": {
                "base_url": self.access.base_url,
                "auth_token_set": !self.access.auth_token.is_empty(),
            },
            "notification": {
                "base_url": self.notification.base_url,
                "username": self.notification.username,
            },
            "directory": self.directory.base_url,
            "poll": self.poll,
            "locations": self.locations.len(),
        })
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Shared secret expected in the `X-Auth-Token` header.
    #[serde(default)]
    pub auth_token: String,
}

fn default_port() -> u16 { 4001 }
fn default_host() -> String { "0.0.0.0".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            auth_token: String::new(),
        }
    }
}

/// SQLite location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String { "~/.gatewatch/gatewatch.db".into() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

impl DatabaseConfig {
    /// Path with `~` expanded. `:memory:` is passed through.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

fn default_timeout_secs() -> u64 { 10 }

/// Access-control API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Notification webhook client (basic auth).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// User directory client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_directory_timeout")]
    pub timeout_secs: u64,
}

fn default_directory_timeout() -> u64 { 30 }

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: String::new(),
            timeout_secs: default_directory_timeout(),
        }
    }
}

/// Poll loop pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Fixed UTC offset, e.g. `GMT-3`, `UTC+05:30`, `+02:00`.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Start of the quiet window (`HH:MM`, local to `time_zone`).
    #[serde(default = "default_quiet_start")]
    pub quiet_start: String,
    /// End of the quiet window (exclusive). Equal to `quiet_start` disables it.
    #[serde(default = "default_quiet_end")]
    pub quiet_end: String,
}

fn default_interval_secs() -> u64 { 5 }
fn default_time_zone() -> String { "GMT-3".into() }
fn default_quiet_start() -> String { "23:00".into() }
fn default_quiet_end() -> String { "05:30".into() }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            time_zone: default_time_zone(),
            quiet_start: default_quiet_start(),
            quiet_end: default_quiet_end(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = GatewatchConfig::default();
        assert_eq!(config.gateway.port, 4001);
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.poll.time_zone, "GMT-3");
        assert_eq!(config.locations.len(), 6);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [gateway]
            port = 8080
            auth_token = "s3cret"

            [access]
            base_url = "https://access.example.com"

            [poll]
            time_zone = "UTC"
            quiet_start = "00:00"
            quiet_end = "00:00"

            [locations]
            "200" = "Downtown"
        "#;

        let config: GatewatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.access.timeout_secs, 10);
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.location_label("200"), "Downtown");
        // An explicit table replaces the defaults.
        assert_eq!(config.location_label("104"), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: GatewatchConfig = toml::from_str("").unwrap();
        assert_eq!(config.gateway.port, 4001);
        assert_eq!(config.location_label("104"), "Calama");
        assert_eq!(config.location_label(" 108 "), "Angamos");
        assert_eq!(config.location_label("999"), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[database]\npath = \"/tmp/gw.db\"\n").unwrap();
        let config = GatewatchConfig::load_from(&path).unwrap();
        assert_eq!(config.database.resolved_path(), PathBuf::from("/tmp/gw.db"));
    }

    #[test]
    fn test_load_from_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\nport = ").unwrap();
        let err = GatewatchConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, GatewatchError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "9000"),
            ("AUTH_STRING", "token"),
            ("ACCESS_SERVICE_BASE_URL", "http://access"),
            ("NOTIFICATION_PASSWORD", "pw"),
            ("TIME_ZONE", "GMT-4"),
            ("SOURCE_BASE_URL", "   "),
        ]
        .into_iter()
        .collect();

        let mut config = GatewatchConfig::default();
        config.directory.base_url = "http://directory".into();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.auth_token, "token");
        assert_eq!(config.access.base_url, "http://access");
        assert_eq!(config.notification.password, "pw");
        assert_eq!(config.poll.time_zone, "GMT-4");
        // Blank values do not clobber existing settings.
        assert_eq!(config.directory.base_url, "http://directory");
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let mut config = GatewatchConfig::default();
        config.apply_overrides(|k| (k == "PORT").then(|| "abc".to_string()));
        assert_eq!(config.gateway.port, 4001);
    }

    #[test]
    fn test_validate() {
        let mut config = GatewatchConfig::default();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("gateway.auth_token"));
        assert!(err.contains("access.base_url"));

        config.gateway.auth_token = "t".into();
        config.access.base_url = "http://a".into();
        config.notification.base_url = "http://n".into();
        config.directory.base_url = "http://d".into();
        assert!(config.validate().is_ok());

        config.poll.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_hides_secrets() {
        let mut config = GatewatchConfig::default();
        config.gateway.auth_token = "super-secret".into();
        config.notification.password = "hunter2".into();
        let rendered = config.summary().to_string();
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("auth_token_set"));
    }

    #[test]
    fn test_home_dir() {
        let home = GatewatchConfig::home_dir();
        assert!(home.to_string_lossy().contains("gatewatch"));
    }
}
