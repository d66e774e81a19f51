//! Service configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use orders::{MatchPolicy, OrchestratorConfig};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid value {value:?} for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Configuration for the whole service.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `ACCOUNT_URL`, `PRODUCT_URL`: account and catalog service base URLs
/// - `KAFKA_BOOTSTRAP_SERVERS`: event broker
/// - `DATABASE_URL`: PostgreSQL DSN
/// - `WEBHOOK_SECRET`: payment provider signing secret
/// - `RPC_TIMEOUT_MS` (5000), `PAYMENT_TIMEOUT_MS` (10000)
/// - `ORDER_MATCH_POLICY`: `strict` or `lenient` (default)
/// - `EVENT_QUEUE_CAPACITY` (1024)
///
/// Unset endpoints select in-memory stand-ins for local development.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub account_endpoint: Option<String>,
    pub catalog_endpoint: Option<String>,
    pub broker_endpoint: Option<String>,
    pub database_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub rpc_timeout: Duration,
    pub payment_timeout: Duration,
    pub match_policy: MatchPolicy,
    pub publisher_capacity: usize,
}

impl ServiceConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(&get, "PORT")?.unwrap_or(defaults.port),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            account_endpoint: get("ACCOUNT_URL"),
            catalog_endpoint: get("PRODUCT_URL"),
            broker_endpoint: get("KAFKA_BOOTSTRAP_SERVERS"),
            database_url: get("DATABASE_URL"),
            webhook_secret: get("WEBHOOK_SECRET"),
            rpc_timeout: parse(&get, "RPC_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.rpc_timeout),
            payment_timeout: parse(&get, "PAYMENT_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.payment_timeout),
            match_policy: parse(&get, "ORDER_MATCH_POLICY")?.unwrap_or(defaults.match_policy),
            publisher_capacity: parse(&get, "EVENT_QUEUE_CAPACITY")?
                .unwrap_or(defaults.publisher_capacity),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            rpc_timeout: self.rpc_timeout,
            match_policy: self.match_policy,
        }
    }
}

fn parse<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(var)
        .map(|value| {
            value.trim().parse().map_err(|e: T::Err| ConfigError {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            account_endpoint: None,
            catalog_endpoint: None,
            broker_endpoint: None,
            database_url: None,
            webhook_secret: None,
            rpc_timeout: Duration::from_secs(5),
            payment_timeout: Duration::from_secs(10),
            match_policy: MatchPolicy::Lenient,
            publisher_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.rpc_timeout, Duration::from_secs(5));
        assert_eq!(config.publisher_capacity, 1024);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_reads_every_option() {
        let config = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("ACCOUNT_URL", "http://accounts:8080"),
            ("PRODUCT_URL", "http://catalog:8080"),
            ("KAFKA_BOOTSTRAP_SERVERS", "kafka:9092"),
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("WEBHOOK_SECRET", "whsec_abc"),
            ("RPC_TIMEOUT_MS", "250"),
            ("PAYMENT_TIMEOUT_MS", "3000"),
            ("ORDER_MATCH_POLICY", "strict"),
            ("EVENT_QUEUE_CAPACITY", "16"),
        ])
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.account_endpoint.as_deref(), Some("http://accounts:8080"));
        assert_eq!(config.broker_endpoint.as_deref(), Some("kafka:9092"));
        assert_eq!(config.rpc_timeout, Duration::from_millis(250));
        assert_eq!(config.payment_timeout, Duration::from_secs(3));
        assert_eq!(config.orchestrator().match_policy, MatchPolicy::Strict);
        assert_eq!(config.publisher_capacity, 16);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = load(&[("DATABASE_URL", "  "), ("PORT", "")]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.var, "PORT");

        let err = load(&[("ORDER_MATCH_POLICY", "sloppy")]).unwrap_err();
        assert_eq!(err.var, "ORDER_MATCH_POLICY");
    }
}
