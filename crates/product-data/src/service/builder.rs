use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{Inner, ProductLookupService};
use crate::cache::{CacheStore, MemoryCacheStore};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, LookupConfig};
use crate::provider::ProductSource;
use crate::registry::{CircuitBreaker, CircuitBreakerConfig, RateLimiter, RetryPolicy, SourceChain};

/// Builder for [`ProductLookupService`].
///
/// Anything not provided falls back to the in-memory cache and the system
/// clock. Sources are consulted by ascending priority; sources with equal
/// priority keep the order they were added in.
pub struct ProductLookupServiceBuilder {
    config: LookupConfig,
    sources: Vec<Arc<dyn ProductSource>>,
    cache: Option<Arc<dyn CacheStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ProductLookupServiceBuilder {
    pub(crate) fn new(config: LookupConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            cache: None,
            clock: None,
        }
    }

    /// Register a product source.
    pub fn source(mut self, source: Arc<dyn ProductSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Use `cache` instead of a fresh in-memory cache.
    pub fn cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use `clock` for TTLs, cooldowns, backoff and rate limiting.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<ProductLookupService, ConfigError> {
        self.config.validate()?;

        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(MemoryCacheStore::new(
                config.cache_namespace.clone(),
                config.cache_ttl,
                clock.clone(),
            ))
        });

        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig {
                failure_threshold: config.failure_threshold,
                cooldown: config.cooldown,
            },
            clock.clone(),
        );
        let rate_limiter = Arc::new(RateLimiter::new(clock.clone()));
        let chain = SourceChain::new(
            self.sources,
            RetryPolicy::from_config(&config),
            rate_limiter.clone(),
            clock,
        );

        Ok(ProductLookupService {
            inner: Arc::new(Inner {
                config,
                cache,
                breaker,
                rate_limiter,
                chain,
                in_flight: Mutex::new(HashMap::new()),
            }),
        })
    }
}
