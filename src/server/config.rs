use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use crate::services::icon_resolver::DEFAULT_ICON_SOURCES;

pub const DEFAULT_CONFIG_PATH: &str = "config/settings.toml";
pub const DEFAULT_API_TOKEN: &str = "supersecrettoken";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Serialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(skip_serializing)]
    pub api_token: String,
    #[serde(skip_serializing)]
    pub database_url: String,
    pub listen_addr: String,
    pub image_dir: String,
    pub log_dir: String,
    pub backup_path: String,
    pub backup_retention_days: i64,
    /// UTC hour of the nightly backup.
    pub backup_hour: u32,
    /// Seconds between health check passes.
    pub health_check_interval: u64,
    /// Per-probe timeout in seconds.
    pub health_check_timeout: u64,
    /// Seconds between widget refresh cycles.
    pub widget_refresh_interval: u64,
    pub icon_retry_minutes: i64,
    /// Minutes. Reported to clients, not enforced here.
    pub session_length: u64,
    pub icon_sources: Vec<String>,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    api_token: Option<String>,
    database_url: Option<String>,
    listen_addr: Option<String>,
    image_dir: Option<String>,
    log_dir: Option<String>,
    backup_path: Option<String>,
    backup_retention_days: Option<i64>,
    backup_hour: Option<u32>,
    health_check_interval: Option<u64>,
    health_check_timeout: Option<u64>,
    widget_refresh_interval: Option<u64>,
    icon_retry_minutes: Option<i64>,
    session_length: Option<u64>,
    icon_sources: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_token: DEFAULT_API_TOKEN.to_string(),
            database_url: "sqlite://config/services.db?mode=rwc".to_string(),
            listen_addr: "0.0.0.0:8815".to_string(),
            image_dir: "static/images".to_string(),
            log_dir: "logs".to_string(),
            backup_path: "config/backups".to_string(),
            backup_retention_days: 7,
            backup_hour: 2,
            health_check_interval: 60,
            health_check_timeout: 5,
            widget_refresh_interval: 600,
            icon_retry_minutes: 60,
            session_length: 1440,
            icon_sources: DEFAULT_ICON_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ServerConfig {
    /// Loads `.env`, then layers environment over the optional TOML file over
    /// the defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load_from(
            config_path.unwrap_or(DEFAULT_CONFIG_PATH),
            std::env::vars(),
        )
    }

    pub fn load_from<I>(config_path: &str, env_vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // 1. Load from file (optional)
        let path = Path::new(config_path);
        let file_config: PartialServerConfig = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: config_path.to_string(),
                source,
            })?;
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: config_path.to_string(),
                source,
            })?
        } else {
            PartialServerConfig::default()
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_iter(env_vars)?;

        // 3. Merge: environment overrides file overrides defaults
        let defaults = ServerConfig::default();
        let config = ServerConfig {
            api_token: env_config
                .api_token
                .or(file_config.api_token)
                .unwrap_or(defaults.api_token),
            database_url: env_config
                .database_url
                .or(file_config.database_url)
                .unwrap_or(defaults.database_url),
            listen_addr: env_config
                .listen_addr
                .or(file_config.listen_addr)
                .unwrap_or(defaults.listen_addr),
            image_dir: env_config
                .image_dir
                .or(file_config.image_dir)
                .unwrap_or(defaults.image_dir),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or(defaults.log_dir),
            backup_path: env_config
                .backup_path
                .or(file_config.backup_path)
                .unwrap_or(defaults.backup_path),
            backup_retention_days: env_config
                .backup_retention_days
                .or(file_config.backup_retention_days)
                .unwrap_or(defaults.backup_retention_days),
            backup_hour: env_config
                .backup_hour
                .or(file_config.backup_hour)
                .unwrap_or(defaults.backup_hour),
            health_check_interval: env_config
                .health_check_interval
                .or(file_config.health_check_interval)
                .unwrap_or(defaults.health_check_interval),
            health_check_timeout: env_config
                .health_check_timeout
                .or(file_config.health_check_timeout)
                .unwrap_or(defaults.health_check_timeout),
            widget_refresh_interval: env_config
                .widget_refresh_interval
                .or(file_config.widget_refresh_interval)
                .unwrap_or(defaults.widget_refresh_interval),
            icon_retry_minutes: env_config
                .icon_retry_minutes
                .or(file_config.icon_retry_minutes)
                .unwrap_or(defaults.icon_retry_minutes),
            session_length: env_config
                .session_length
                .or(file_config.session_length)
                .unwrap_or(defaults.session_length),
            icon_sources: env_config
                .icon_sources
                .or(file_config.icon_sources)
                .unwrap_or(defaults.icon_sources),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_token.trim().is_empty() {
            return Err(invalid("api_token", "must not be empty"));
        }
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| invalid("listen_addr", e.to_string()))?;
        if self.backup_hour > 23 {
            return Err(invalid("backup_hour", "must be between 0 and 23"));
        }
        if self.backup_retention_days < 1 {
            return Err(invalid("backup_retention_days", "must be at least 1"));
        }
        for (key, value) in [
            ("health_check_interval", self.health_check_interval),
            ("health_check_timeout", self.health_check_timeout),
            ("widget_refresh_interval", self.widget_refresh_interval),
        ] {
            if value == 0 {
                return Err(invalid(key, "must be greater than zero"));
            }
        }
        if self.icon_retry_minutes < 0 {
            return Err(invalid("icon_retry_minutes", "must not be negative"));
        }
        if self.icon_sources.iter().all(|s| s.trim().is_empty()) {
            return Err(invalid("icon_sources", "at least one source is required"));
        }
        Ok(())
    }

    pub fn uses_default_token(&self) -> bool {
        self.api_token == DEFAULT_API_TOKEN
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = ServerConfig::load_from("/nonexistent/settings.toml", Vec::new()).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8815");
        assert_eq!(config.health_check_interval, 60);
        assert_eq!(config.widget_refresh_interval, 600);
        assert_eq!(config.backup_retention_days, 7);
        assert_eq!(config.icon_sources.len(), 2);
        assert!(config.uses_default_token());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "api_token = \"from-file\"\nbackup_hour = 4\nicon_sources = [\"http://icons.local/svg\"]\n",
        )
        .unwrap();

        let config = ServerConfig::load_from(
            path.to_str().unwrap(),
            vars(&[("API_TOKEN", "from-env"), ("HEALTH_CHECK_INTERVAL", "30")]),
        )
        .unwrap();

        assert_eq!(config.api_token, "from-env");
        assert_eq!(config.backup_hour, 4);
        assert_eq!(config.health_check_interval, 30);
        assert_eq!(config.icon_sources, vec!["http://icons.local/svg"]);
        assert!(!config.uses_default_token());
    }

    #[test]
    fn test_icon_sources_from_env_are_comma_separated() {
        let config = ServerConfig::load_from(
            "/nonexistent/settings.toml",
            vars(&[("ICON_SOURCES", "http://a/svg,http://b/svg")]),
        )
        .unwrap();
        assert_eq!(config.icon_sources, vec!["http://a/svg", "http://b/svg"]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            ServerConfig::load_from("/nonexistent", vars(&[("BACKUP_HOUR", "25")])),
            Err(ConfigError::Invalid { key: "backup_hour", .. })
        ));
        assert!(matches!(
            ServerConfig::load_from("/nonexistent", vars(&[("HEALTH_CHECK_INTERVAL", "soon")])),
            Err(ConfigError::Env(_))
        ));
        assert!(matches!(
            ServerConfig::load_from("/nonexistent", vars(&[("LISTEN_ADDR", "nowhere")])),
            Err(ConfigError::Invalid { key: "listen_addr", .. })
        ));
    }

    #[test]
    fn test_settings_view_hides_secrets() {
        let json = serde_json::to_value(ServerConfig::default()).unwrap();
        assert!(json.get("api_token").is_none());
        assert!(json.get("database_url").is_none());
        assert_eq!(json["session_length"], 1440);
    }
}
