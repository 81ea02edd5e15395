//! Tuning parameters for the lookup service.
//!
//! Every threshold, delay and TTL is configuration. Defaults are conservative
//! values for free-tier upstreams; deployments override them through
//! `CICLIK_*` environment variables (see [`LookupConfig::from_env`]).

use std::str::FromStr;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_NAMESPACE;

pub const DEFAULT_COSMOS_BASE_URL: &str = "https://api.cosmos.bluesoft.com.br";
pub const DEFAULT_OPEN_FOOD_FACTS_BASE_URL: &str = "https://world.openfoodfacts.org";
pub const DEFAULT_UPCITEMDB_BASE_URL: &str = "https://api.upcitemdb.com";
pub const DEFAULT_USER_AGENT: &str = "Ciclik App";

/// Configuration for [`ProductLookupService`](crate::ProductLookupService).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Consecutive chain failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial lookup.
    pub cooldown: Duration,
    /// How long a cached result stays fresh.
    pub cache_ttl: Duration,
    /// Calls per source before giving up on it (first call included).
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles per attempt.
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay.
    pub max_delay: Duration,
    /// Timeout for a single source call.
    pub request_timeout: Duration,
    /// Prefix for cache keys.
    pub cache_namespace: String,
    pub cosmos_base_url: String,
    /// Optional Cosmos API token (sent as `X-Cosmos-Token`).
    pub cosmos_token: Option<String>,
    pub open_food_facts_base_url: String,
    pub upcitemdb_base_url: String,
    pub user_agent: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            cooldown: Duration::from_secs(120),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            cache_namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
            cosmos_base_url: DEFAULT_COSMOS_BASE_URL.to_string(),
            cosmos_token: None,
            open_food_facts_base_url: DEFAULT_OPEN_FOOD_FACTS_BASE_URL.to_string(),
            upcitemdb_base_url: DEFAULT_UPCITEMDB_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// A configuration value that cannot work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid configuration: {field} {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl LookupConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Recognised variables:
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `CICLIK_LOOKUP_FAILURE_THRESHOLD` | `failure_threshold` |
    /// | `CICLIK_LOOKUP_COOLDOWN_SECS` | `cooldown` |
    /// | `CICLIK_LOOKUP_CACHE_TTL_SECS` | `cache_ttl` |
    /// | `CICLIK_LOOKUP_MAX_ATTEMPTS` | `max_attempts` |
    /// | `CICLIK_LOOKUP_BASE_DELAY_MS` | `base_delay` |
    /// | `CICLIK_LOOKUP_MAX_DELAY_MS` | `max_delay` |
    /// | `CICLIK_LOOKUP_TIMEOUT_SECS` | `request_timeout` |
    /// | `CICLIK_LOOKUP_CACHE_NAMESPACE` | `cache_namespace` |
    /// | `CICLIK_COSMOS_URL` | `cosmos_base_url` |
    /// | `CICLIK_COSMOS_TOKEN` | `cosmos_token` |
    /// | `CICLIK_OPEN_FOOD_FACTS_URL` | `open_food_facts_base_url` |
    /// | `CICLIK_UPCITEMDB_URL` | `upcitemdb_base_url` |
    /// | `CICLIK_USER_AGENT` | `user_agent` |
    ///
    /// Unparsable numbers are logged and replaced by the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let number = |name: &str, default: u64| -> u64 { parse_or(name, var(name), default) };
        let text = |name: &str, default: String| -> String {
            var(name).filter(|v| !v.trim().is_empty()).unwrap_or(default)
        };

        Self {
            failure_threshold: parse_or(
                "CICLIK_LOOKUP_FAILURE_THRESHOLD",
                var("CICLIK_LOOKUP_FAILURE_THRESHOLD"),
                defaults.failure_threshold,
            ),
            cooldown: Duration::from_secs(number(
                "CICLIK_LOOKUP_COOLDOWN_SECS",
                defaults.cooldown.as_secs(),
            )),
            cache_ttl: Duration::from_secs(number(
                "CICLIK_LOOKUP_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),
            max_attempts: parse_or(
                "CICLIK_LOOKUP_MAX_ATTEMPTS",
                var("CICLIK_LOOKUP_MAX_ATTEMPTS"),
                defaults.max_attempts,
            ),
            base_delay: Duration::from_millis(number(
                "CICLIK_LOOKUP_BASE_DELAY_MS",
                defaults.base_delay.as_millis() as u64,
            )),
            max_delay: Duration::from_millis(number(
                "CICLIK_LOOKUP_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )),
            request_timeout: Duration::from_secs(number(
                "CICLIK_LOOKUP_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            cache_namespace: text("CICLIK_LOOKUP_CACHE_NAMESPACE", defaults.cache_namespace),
            cosmos_base_url: text("CICLIK_COSMOS_URL", defaults.cosmos_base_url),
            cosmos_token: var("CICLIK_COSMOS_TOKEN").filter(|v| !v.trim().is_empty()),
            open_food_facts_base_url: text(
                "CICLIK_OPEN_FOOD_FACTS_URL",
                defaults.open_food_facts_base_url,
            ),
            upcitemdb_base_url: text("CICLIK_UPCITEMDB_URL", defaults.upcitemdb_base_url),
            user_agent: text("CICLIK_USER_AGENT", defaults.user_agent),
        }
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError {
                field: "failure_threshold",
                reason: "must be at least 1",
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError {
                field: "max_attempts",
                reason: "must be at least 1",
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError {
                field: "request_timeout",
                reason: "must be non-zero",
            });
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError {
                field: "max_delay",
                reason: "must not be below base_delay",
            });
        }
        Ok(())
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "Ignoring invalid value '{}' for {}, using default {}",
                    raw, name, default
                );
                default
            }
        },
    }
}
