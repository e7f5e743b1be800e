//! Process configuration, read from the environment (and `.env` via dotenvy in `main`).

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub payment_api_key: Option<String>,
    pub payment_api_base: Option<String>,
    pub currency: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Ok(Self {
            port: number(&var, "PORT", 8083)?,
            database_url: var("DATABASE_URL"),
            database_max_connections: number(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: var("NATS_URL"),
            payment_api_key: var("PAYMENT_API_KEY"),
            payment_api_base: var("PAYMENT_API_BASE"),
            currency: var("STORE_CURRENCY").map(|c| c.to_lowercase()).unwrap_or_else(|| "gbp".into()),
        })
    }
}

fn number<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8083);
        assert_eq!(c.database_max_connections, 10);
        assert_eq!(c.currency, "gbp");
        assert!(c.database_url.is_none());
        assert!(c.payment_api_key.is_none());
    }

    #[test]
    fn overrides_and_blank_values() {
        let c = config(&[("PORT", "9000"), ("DATABASE_URL", "postgres://db/clinic"), ("STORE_CURRENCY", "EUR"), ("NATS_URL", "  ")]).unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.database_url.as_deref(), Some("postgres://db/clinic"));
        assert_eq!(c.currency, "eur");
        assert!(c.nats_url.is_none());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert_eq!(
            config(&[("PORT", "eighty")]),
            Err(ConfigError::InvalidNumber { name: "PORT", value: "eighty".into() })
        );
    }
}
