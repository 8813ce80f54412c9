//! Wikiflow configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WikiflowError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WikiflowConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// SMTP settings. When absent, email "each" deliveries are only logged.
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

impl WikiflowConfig {
    /// Load config from the default path (~/.wikiflow/config.toml).
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
            .map_err(|e| WikiflowError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| WikiflowError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the given path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| WikiflowError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Wikiflow home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wikiflow")
    }

    /// Apply environment overrides (WIKIFLOW_SERVICE_KEY).
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("WIKIFLOW_SERVICE_KEY")
            && !key.is_empty()
        {
            self.gateway.service_key = Some(key);
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Trusted service credential. `None` trusts every caller.
    #[serde(default)]
    pub service_key: Option<String>,
}

fn default_port() -> u16 { 8787 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            service_key: None,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String { "~/.wikiflow/wikiflow.db".into() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

/// Notification delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Local hour at which batched notifications become due.
    #[serde(default = "default_batch_hour")]
    pub batch_hour: u32,
    /// Offset of "local" time from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Link attached to task_assigned notifications.
    #[serde(default = "default_task_link")]
    pub task_link: String,
}

fn default_batch_hour() -> u32 { 9 }
fn default_task_link() -> String { "/admin/tasks".into() }

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            batch_hour: default_batch_hour(),
            utc_offset_minutes: 0,
            task_link: default_task_link(),
        }
    }
}

/// SMTP configuration for the email channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Sender address, e.g. "Wiki <noreply@example.org>".
    pub from: String,
}

fn default_smtp_port() -> u16 { 587 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WikiflowConfig::default();
        assert_eq!(config.gateway.port, 8787);
        assert_eq!(config.notifications.batch_hour, 9);
        assert_eq!(config.notifications.task_link, "/admin/tasks");
        assert!(config.email.is_none());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [gateway]
            port = 9000
            service_key = "secret"

            [notifications]
            batch_hour = 8
            utc_offset_minutes = -180

            [email]
            smtp_host = "smtp.example.org"
            from = "Wiki <noreply@example.org>"
        "#;

        let config: WikiflowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.service_key.as_deref(), Some("secret"));
        assert_eq!(config.notifications.batch_hour, 8);
        assert_eq!(config.notifications.utc_offset_minutes, -180);
        let email = config.email.unwrap();
        assert_eq!(email.smtp_port, 587);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: WikiflowConfig = toml::from_str("").unwrap();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.database.path, "~/.wikiflow/wikiflow.db");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = std::env::temp_dir().join("wikiflow-config-test");
        let path = dir.join("config.toml");
        let mut config = WikiflowConfig::default();
        config.gateway.port = 4321;
        config.save_to(&path).unwrap();

        let loaded = WikiflowConfig::load_from(&path).unwrap();
        assert_eq!(loaded.gateway.port, 4321);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_default_config_written_to_fresh_dir() {
        let dir = std::env::temp_dir().join("wikiflow-init-config-test");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("nested").join("config.toml");
        WikiflowConfig::default().save_to(&path).unwrap();

        let loaded = WikiflowConfig::load_from(&path).unwrap();
        let defaults = WikiflowConfig::default();
        assert_eq!(loaded.gateway.port, defaults.gateway.port);
        assert_eq!(loaded.notifications.batch_hour, defaults.notifications.batch_hour);
        assert_eq!(loaded.notifications.task_link, "/admin/tasks");
        assert!(loaded.email.is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_home_dir() {
        let home = WikiflowConfig::home_dir();
        assert!(home.to_string_lossy().contains("wikiflow"));
    }
}
