//! Configuration loading for the gatesync CLI.

use anyhow::{Context, Result};
use gs_connectors::{
    ConfirmOptions, ListenConfig, ProfileConfig, RegistryAuth, RegistryConfig, SecureString,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Registry connection settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Baseline run options; command-line flags override them per invocation.
    #[serde(default)]
    pub defaults: SyncDefaults,

    /// Provider profiles by name.
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,

    /// Queue transport for listen mode; absent disables `listen`.
    #[serde(default)]
    pub listen: Option<ListenConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            defaults: SyncDefaults::default(),
            profiles: BTreeMap::new(),
            listen: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Creates a copy with secrets redacted.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();

        config.registry.auth = match &config.registry.auth {
            RegistryAuth::Token { .. } => RegistryAuth::Token {
                token: SecureString::from("***REDACTED***"),
            },
            RegistryAuth::Password { username, .. } => RegistryAuth::Password {
                username: username.clone(),
                password: SecureString::from("***REDACTED***"),
            },
        };

        config
    }
}

/// Baseline options for sync and clean runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncDefaults {
    /// Total seconds to wait for each task confirmation.
    #[serde(default = "default_check_timeout")]
    pub check_timeout: u64,

    /// Seconds between task-log fetches.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Retry budget for push-checks.
    #[serde(default = "default_push_max_tries")]
    pub push_max_tries: u32,

    /// Trigger credential pushes for each synced asset.
    #[serde(default)]
    pub push: bool,

    /// Verify pushed credentials after each run.
    #[serde(default)]
    pub push_check: bool,

    /// Push unconditionally on the first push-check round.
    #[serde(default)]
    pub force_push: bool,

    /// Probe liveness of each synced asset after the run.
    #[serde(default)]
    pub test_asset: bool,

    /// Stream each fetched task-log snapshot at info level.
    #[serde(default)]
    pub show_task_log: bool,

    /// Comma-separated system users to push; unset pushes all of them.
    #[serde(default)]
    pub push_system_users: Option<String>,
}

fn default_check_timeout() -> u64 {
    30
}

fn default_check_interval() -> u64 {
    3
}

fn default_push_max_tries() -> u32 {
    3
}

impl Default for SyncDefaults {
    fn default() -> Self {
        Self {
            check_timeout: default_check_timeout(),
            check_interval: default_check_interval(),
            push_max_tries: default_push_max_tries(),
            push: false,
            push_check: false,
            force_push: false,
            test_asset: false,
            show_task_log: false,
            push_system_users: None,
        }
    }
}

impl SyncDefaults {
    /// Poll budget assembled from the timing fields.
    pub fn confirm_options(&self) -> ConfirmOptions {
        ConfirmOptions {
            timeout_secs: self.check_timeout,
            interval_secs: self.check_interval,
            show_task_log: self.show_task_log,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.defaults.check_timeout, 30);
        assert_eq!(config.defaults.check_interval, 3);
        assert_eq!(config.defaults.push_max_tries, 3);
        assert!(config.profiles.is_empty());
        assert!(config.listen.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_redact_secrets() {
        let mut config = AppConfig::default();
        config.registry.auth = RegistryAuth::Password {
            username: "admin".to_string(),
            password: SecureString::from("hunter2"),
        };

        let redacted = config.redact_secrets();
        match redacted.registry.auth {
            RegistryAuth::Password { username, password } => {
                assert_eq!(username, "admin");
                assert_eq!(password.expose_secret(), "***REDACTED***");
            }
            RegistryAuth::Token { .. } => panic!("auth variant changed"),
        }
    }

    #[test]
    fn test_confirm_options_from_defaults() {
        let defaults = SyncDefaults {
            check_timeout: 10,
            check_interval: 5,
            show_task_log: true,
            ..SyncDefaults::default()
        };

        let confirm = defaults.confirm_options();
        assert_eq!(confirm.timeout_secs, 10);
        assert_eq!(confirm.interval_secs, 5);
        assert!(confirm.show_task_log);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
registry:
  base_url: https://gate.example.com
  auth:
    type: password
    username: admin
    password: ${GATESYNC_PASSWORD}

defaults:
  push: true
  check_timeout: 60

profiles:
  prod:
    type: aws
    region: us-east-1
    selectors:
      - tags:
          env: "prod.*"
        attrs:
          platform: Linux

listen:
  queue_url: https://sqs.us-east-1.amazonaws.com/123/gatesync
  profiles: [prod]
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.registry.base_url, "https://gate.example.com");
        assert!(config.defaults.push);
        assert_eq!(config.defaults.check_timeout, 60);
        assert_eq!(config.defaults.check_interval, 3);
        assert!(config.profiles.contains_key("prod"));

        let listen = config.listen.unwrap();
        assert_eq!(listen.profiles, Some(vec!["prod".to_string()]));
        assert_eq!(listen.wait_secs, 10);
    }
}
