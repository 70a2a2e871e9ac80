//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::{PurgePolicy, PurgeSettings};

const DEFAULT_COOLDOWN_SECS: u64 = 24 * 60 * 60;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `CANCELLATION_COOLDOWN_SECS`: delay before a cancelled appointment is purged (default one day)
/// - `PURGE_POLICY`: `require-cancelled` or `unconditional`
/// - `DATABASE_URL`: when set, events and stock live in PostgreSQL
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub cancellation_cooldown: Duration,
    pub purge_policy: PurgePolicy,
    pub database_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults
    /// for anything missing or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let cancellation_cooldown = lookup("CANCELLATION_COOLDOWN_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cancellation_cooldown);

        let purge_policy = lookup("PURGE_POLICY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.purge_policy);

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            cancellation_cooldown,
            purge_policy,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn purge_settings(&self) -> PurgeSettings {
        PurgeSettings {
            cooldown: self.cancellation_cooldown,
            policy: self.purge_policy,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            cancellation_cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            purge_policy: PurgePolicy::RequireCancelled,
            database_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.cancellation_cooldown, Duration::from_secs(86_400));
        assert_eq!(config.purge_policy, PurgePolicy::RequireCancelled);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reads_overrides() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("CANCELLATION_COOLDOWN_SECS", "30"),
            ("PURGE_POLICY", "unconditional"),
            ("DATABASE_URL", "postgres://localhost/clinic"),
        ]);

        assert_eq!(config.port, 8081);
        assert_eq!(
            config.purge_settings(),
            PurgeSettings {
                cooldown: Duration::from_secs(30),
                policy: PurgePolicy::Unconditional,
            }
        );
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/clinic")
        );
    }

    #[test]
    fn test_bad_values_fall_back_to_defaults() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("CANCELLATION_COOLDOWN_SECS", "-5"),
            ("PURGE_POLICY", "sometimes"),
            ("DATABASE_URL", ""),
        ]);

        assert_eq!(config.port, 3000);
        assert_eq!(config.cancellation_cooldown, Duration::from_secs(86_400));
        assert_eq!(config.purge_policy, PurgePolicy::RequireCancelled);
        assert!(config.database_url.is_none());
    }
}
