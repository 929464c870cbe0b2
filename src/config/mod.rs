//! Configuration loading and management
//!
//! Configuration comes from an optional YAML file; every field has a
//! default. `WASTEWISE_*` environment variables override the file.
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 8080
//! store:
//!   backend: postgrest
//!   url: https://project.example.co
//!   api_key: service-role-key
//!   timeout_secs: 10
//! query:
//!   default_page_size: 20
//!   max_page_size: 1000
//! payments:
//!   schema: auto
//!   reference_prefix: PAY
//! retention:
//!   notification_days: 90
//!   audit_log_days: 365
//! ```

use crate::core::query::PageLimits;
use crate::query::schema::SchemaGeneration;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

/// Which store backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    InMemory,
    Postgrest,
}

/// Hosted store connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Transport timeout applied to every request
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::InMemory,
            url: None,
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    /// Reference column generation of the payments table
    pub schema: SchemaGeneration,
    /// Prefix of generated payment references
    pub reference_prefix: String,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            schema: SchemaGeneration::Auto,
            reference_prefix: "PAY".to_string(),
        }
    }
}

/// Longest accepted retention period, in days
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Maintenance sweep ages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub notification_days: i64,
    pub audit_log_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            notification_days: 90,
            audit_log_days: 365,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub query: PageLimits,
    pub payments: PaymentsConfig,
    pub retention: RetentionConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// File (if any), then process environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        let config = config.with_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `WASTEWISE_*` overrides; unrelated variables are ignored
    pub fn with_overrides(
        mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix("WASTEWISE_") else {
                continue;
            };
            match name {
                "HOST" => self.server.host = value,
                "PORT" => self.server.port = parse(&key, &value)?,
                "STORE_BACKEND" => self.store.backend = parse_yaml(&key, &value)?,
                "STORE_URL" => self.store.url = Some(value),
                "STORE_API_KEY" => self.store.api_key = Some(value),
                "STORE_TIMEOUT_SECS" => self.store.timeout_secs = parse(&key, &value)?,
                "DEFAULT_PAGE_SIZE" => self.query.default_page_size = parse(&key, &value)?,
                "MAX_PAGE_SIZE" => self.query.max_page_size = parse(&key, &value)?,
                "PAYMENTS_SCHEMA" => self.payments.schema = parse_yaml(&key, &value)?,
                "REFERENCE_PREFIX" => self.payments.reference_prefix = value,
                "NOTIFICATION_RETENTION_DAYS" => {
                    self.retention.notification_days = parse(&key, &value)?
                }
                "AUDIT_RETENTION_DAYS" => self.retention.audit_log_days = parse(&key, &value)?,
                _ => tracing::debug!(key, "ignoring unknown configuration variable"),
            }
        }
        Ok(self)
    }

    /// Reject configurations that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.query.max_page_size == 0 {
            bail!("query.max_page_size must be at least 1");
        }
        if self.query.default_page_size == 0
            || self.query.default_page_size > self.query.max_page_size
        {
            bail!(
                "query.default_page_size must be between 1 and {}",
                self.query.max_page_size
            );
        }
        if self.store.backend == StoreBackend::Postgrest
            && (self.store.url.is_none() || self.store.api_key.is_none())
        {
            bail!("store.url and store.api_key are required for the postgrest backend");
        }
        if self.payments.reference_prefix.trim().is_empty() {
            bail!("payments.reference_prefix must not be empty");
        }
        for (name, days) in [
            ("retention.notification_days", self.retention.notification_days),
            ("retention.audit_log_days", self.retention.audit_log_days),
        ] {
            if !(1..=MAX_RETENTION_DAYS).contains(&days) {
                bail!("{} must be between 1 and {}, got {}", name, MAX_RETENTION_DAYS, days);
            }
        }
        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value '{}' for {}", value, key))
}

fn parse_yaml<T: serde::de::DeserializeOwned>(key: &str, value: &str) -> Result<T> {
    serde_yaml::from_str(value.trim()).with_context(|| format!("invalid value '{}' for {}", value, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.store.backend, StoreBackend::InMemory);
        assert_eq!(config.query.max_page_size, 1000);
        assert_eq!(config.payments.schema, SchemaGeneration::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            "query:\n  max_page_size: 200\npayments:\n  schema: legacy\n",
        )
        .unwrap();
        assert_eq!(config.query.max_page_size, 200);
        assert_eq!(config.query.default_page_size, 20);
        assert_eq!(config.payments.schema, SchemaGeneration::Legacy);
        assert_eq!(config.payments.reference_prefix, "PAY");
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 9090\nstore:\n  timeout_secs: 3").unwrap();

        let config = AppConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.store.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AppConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::default()
            .with_overrides(vars(&[
                ("WASTEWISE_PORT", "8081"),
                ("WASTEWISE_STORE_BACKEND", "postgrest"),
                ("WASTEWISE_STORE_URL", "https://db.example.co"),
                ("WASTEWISE_STORE_API_KEY", "key"),
                ("WASTEWISE_PAYMENTS_SCHEMA", "current"),
                ("HOME", "/root"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.store.backend, StoreBackend::Postgrest);
        assert_eq!(config.payments.schema, SchemaGeneration::Current);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let err = AppConfig::default()
            .with_overrides(vars(&[("WASTEWISE_PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("WASTEWISE_PORT"));
    }

    #[test]
    fn test_postgrest_requires_credentials() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Postgrest;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = AppConfig::default();
        config.query.default_page_size = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retention_bounds() {
        let config = AppConfig::from_yaml_str("retention:\n  notification_days: -30\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retention.notification_days"));

        let mut config = AppConfig::default();
        config.retention.audit_log_days = i64::MAX / 2;
        assert!(config.validate().is_err());

        config.retention.audit_log_days = MAX_RETENTION_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr().unwrap().port(), 3000);
    }
}
