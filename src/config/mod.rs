//! Configuration
//!
//! Settings come from a TOML file with environment-variable overrides for
//! the connection and credential fields, validated into a [`RuntimeConfig`].

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Raw configuration as found on disk. Every field is optional so that a
/// deployment can supply everything through the environment.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dataverse: DataverseSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub events: EventFilterCodes,
}

#[derive(Debug, Default, Deserialize)]
pub struct DataverseSection {
    pub url: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:7071".to_string()
}

/// Fixed business codes the list query filters on. Defaults match the
/// production calendar configuration; overridable per environment.
#[derive(Debug, Clone, Deserialize)]
pub struct EventFilterCodes {
    /// Calendar entry type for venue-mapped events
    #[serde(default = "default_entry_type")]
    pub entry_type: i64,
    /// Active state of the calendar entry
    #[serde(default = "default_state")]
    pub state: i64,
    /// Status of the linked event (published/on sale)
    #[serde(default = "default_event_status")]
    pub event_status: i64,
}

impl Default for EventFilterCodes {
    fn default() -> Self {
        Self {
            entry_type: default_entry_type(),
            state: default_state(),
            event_status: default_event_status(),
        }
    }
}

fn default_entry_type() -> i64 {
    100000001
}

fn default_state() -> i64 {
    0
}

fn default_event_status() -> i64 {
    4
}

/// Validated configuration used by the running service
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Organization root URL, e.g. "https://org.crm.dynamics.com"
    pub dataverse_url: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub listen: String,
    pub event_filters: EventFilterCodes,
}

impl RuntimeConfig {
    /// Web API service root, e.g. "https://org.crm.dynamics.com/api/data/v9.2/"
    pub fn api_endpoint(&self) -> String {
        format!("{}/api/data/v9.2/", self.dataverse_url.trim_end_matches('/'))
    }
}

impl Config {
    /// Load from `config.toml` (or `$D365_GATEWAY_CONFIG`), falling back to
    /// an empty config when no file exists.
    pub fn load_default() -> Result<Config, ConfigError> {
        let path =
            std::env::var("D365_GATEWAY_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        if Path::new(&path).exists() {
            Self::load(&path)
        } else {
            tracing::debug!("No config file at {}, using environment only", path);
            Ok(Config::default())
        }
    }

    pub fn load(path: &str) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Apply environment overrides and validate into a [`RuntimeConfig`].
    pub fn to_runtime(self) -> Result<RuntimeConfig, ConfigError> {
        let dataverse_url = std::env::var("DATAVERSE_URL")
            .ok()
            .or(self.dataverse.url)
            .ok_or(ConfigError::Missing("dataverse.url"))?;
        let tenant_id = std::env::var("AZURE_TENANT_ID")
            .ok()
            .or(self.dataverse.tenant_id)
            .ok_or(ConfigError::Missing("dataverse.tenant_id"))?;
        let client_id = std::env::var("AZURE_CLIENT_ID")
            .ok()
            .or(self.dataverse.client_id)
            .ok_or(ConfigError::Missing("dataverse.client_id"))?;
        let client_secret = std::env::var("AZURE_CLIENT_SECRET")
            .ok()
            .or(self.dataverse.client_secret)
            .ok_or(ConfigError::Missing("dataverse.client_secret"))?;

        Ok(RuntimeConfig {
            dataverse_url: dataverse_url.trim_end_matches('/').to_string(),
            tenant_id,
            client_id,
            client_secret,
            listen: self.server.listen,
            event_filters: self.events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [dataverse]
            url = "https://org.crm.dynamics.com"
            tenant_id = "tenant"
            client_id = "client"
            client_secret = "secret"

            [server]
            listen = "127.0.0.1:8080"

            [events]
            entry_type = 100000002
            state = 0
            event_status = 2
            "#,
        )
        .unwrap();

        assert_eq!(
            config.dataverse.url.as_deref(),
            Some("https://org.crm.dynamics.com")
        );
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(config.events.entry_type, 100000002);
        assert_eq!(config.events.event_status, 2);
    }

    #[test]
    fn test_filter_code_defaults() {
        let config: Config = toml::from_str(
            r#"
            [dataverse]
            url = "https://org.crm.dynamics.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.events.entry_type, 100000001);
        assert_eq!(config.events.state, 0);
        assert_eq!(config.events.event_status, 4);
        assert_eq!(config.server.listen, "0.0.0.0:7071");
    }

    #[test]
    fn test_api_endpoint_trims_trailing_slash() {
        let runtime = RuntimeConfig {
            dataverse_url: "https://org.crm.dynamics.com".to_string(),
            tenant_id: "t".to_string(),
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
            listen: default_listen(),
            event_filters: EventFilterCodes::default(),
        };
        assert_eq!(
            runtime.api_endpoint(),
            "https://org.crm.dynamics.com/api/data/v9.2/"
        );
    }
}
