//! Configuration types for the domain tracker service

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Prefix marking an access token that should be read from the environment
const ENV_SECRET_PREFIX: &str = "env:";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trackers: Vec<TrackerConfig>,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// One Pi-hole endpoint plus the client/domain pair it watches
#[derive(Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub name: String,
    pub address: String,
    pub access_token: String,
    pub client: String,
    pub domain: String,
    #[serde(default = "default_polling_interval")]
    pub polling_interval_seconds: u64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_debounce")]
    pub debounce_seconds: i64,
}

impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("client", &self.client)
            .field("domain", &self.domain)
            .field("polling_interval_seconds", &self.polling_interval_seconds)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("debounce_seconds", &self.debounce_seconds)
            .finish_non_exhaustive()
    }
}

impl TrackerConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// An HTTP endpoint that receives every detected query as a JSON POST
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
        }
    }
}

fn default_polling_interval() -> u64 {
    5
}

fn default_timeout() -> u64 {
    10
}

fn default_debounce() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_dashboard_port() -> u16 {
    11120
}

impl Config {
    /// Replace `env:NAME` access tokens with the value of the named variable
    pub fn resolve_secrets(&mut self) -> crate::Result<()> {
        for tracker in &mut self.trackers {
            if let Some(var) = tracker
                .access_token
                .strip_prefix(ENV_SECRET_PREFIX)
                .map(str::to_string)
            {
                tracker.access_token = std::env::var(&var).map_err(|_| {
                    crate::TrackerError::Config(format!(
                        "Tracker '{}': environment variable {} is not set",
                        tracker.name, var
                    ))
                })?;
                tracing::debug!("Resolved access token for '{}' from {}", tracker.name, var);
            }
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run
    pub fn validate(&self) -> crate::Result<()> {
        let mut names = HashSet::new();
        for tracker in &self.trackers {
            let fail = |what: &str| {
                Err(crate::TrackerError::Config(format!(
                    "Tracker '{}': {}",
                    tracker.name, what
                )))
            };
            if tracker.name.is_empty() {
                return Err(crate::TrackerError::Config(
                    "Tracker name must not be empty".to_string(),
                ));
            }
            if !names.insert(tracker.name.as_str()) {
                return fail("duplicate tracker name");
            }
            if tracker.address.trim().is_empty() {
                return fail("address must not be empty");
            }
            if tracker.client.trim().is_empty() {
                return fail("client must not be empty");
            }
            if tracker.domain.trim().is_empty() {
                return fail("domain must not be empty");
            }
            if tracker.polling_interval_seconds == 0 {
                return fail("polling_interval_seconds must be greater than zero");
            }
            if tracker.timeout_seconds == 0 {
                return fail("timeout_seconds must be greater than zero");
            }
            if tracker.debounce_seconds < 0 {
                return fail("debounce_seconds must not be negative");
            }
        }
        Ok(())
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::TrackerError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content).map_err(|e| {
        crate::TrackerError::Config(format!("Failed to parse config file {:?}: {}", path, e))
    })?;
    Ok(config)
}
