//! Product lookup orchestration.
//!
//! [`ProductLookupService`] ties the pieces together for one GTIN:
//!
//! 1. Normalize the input; invalid input fails without side effects
//! 2. Serve a live cache entry if there is one
//! 3. Join a lookup already in flight for the same GTIN, if any
//! 4. Fail fast while the circuit breaker is open
//! 5. Walk the source chain in a spawned task, so the result is cached even
//!    if every caller stops waiting
//! 6. Feed the outcome back into the breaker and the cache

mod builder;
mod stats;

pub use builder::ProductLookupServiceBuilder;
pub use crate::registry::RateLimiterStats;
pub use stats::{BreakerStats, CacheReport, ServiceStats};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};

use crate::cache::{CacheStore, CachedPayload};
use crate::config::{ConfigError, LookupConfig};
use crate::errors::LookupError;
use crate::models::{Gtin, LookupResult, OutcomeKind};
use crate::provider::cosmos::CosmosSource;
use crate::provider::open_food_facts::OpenFoodFactsSource;
use crate::provider::upcitemdb::UpcItemDbSource;
use crate::registry::{ChainOutcome, CircuitBreaker, Permit, RateLimiter, SourceChain};

/// Message attached to negative results every source agreed on.
pub const NOT_FOUND_MESSAGE: &str = "Product not found in any source";

/// Message for a miss where some sources could not be asked.
fn partial_not_found_message(unavailable: usize) -> String {
    format!("Product not found; {} source(s) unavailable", unavailable)
}

type LookupOutput = Result<LookupResult, LookupError>;
type SharedLookup = Shared<BoxFuture<'static, LookupOutput>>;

/// Resilient GTIN lookup over an ordered set of product sources.
///
/// Cheap to clone; clones share cache, breaker, rate limiter and in-flight
/// lookups.
#[derive(Clone)]
pub struct ProductLookupService {
    inner: Arc<Inner>,
}

struct Inner {
    config: LookupConfig,
    cache: Arc<dyn CacheStore>,
    breaker: CircuitBreaker,
    rate_limiter: Arc<RateLimiter>,
    chain: SourceChain,
    /// Lookups currently walking the chain, by normalized GTIN.
    in_flight: Mutex<HashMap<String, SharedLookup>>,
}

impl ProductLookupService {
    pub fn builder(config: LookupConfig) -> ProductLookupServiceBuilder {
        ProductLookupServiceBuilder::new(config)
    }

    /// Create a service over the Cosmos, Open Food Facts and UPCitemdb
    /// sources, in that order.
    pub fn from_config(config: LookupConfig) -> Result<Self, ConfigError> {
        let cosmos = Arc::new(CosmosSource::from_config(&config));
        let open_food_facts = Arc::new(OpenFoodFactsSource::from_config(&config));
        let upcitemdb = Arc::new(UpcItemDbSource::from_config(&config));

        Self::builder(config)
            .source(cosmos)
            .source(open_food_facts)
            .source(upcitemdb)
            .build()
    }

    pub fn config(&self) -> &LookupConfig {
        &self.inner.config
    }

    /// Look up a product by GTIN.
    ///
    /// A product no source knows is `Ok` with `found == false`. Errors mean
    /// the input was rejected or the sources could not be asked.
    pub async fn lookup(&self, gtin: &str) -> LookupOutput {
        let gtin = Gtin::parse(gtin)?;

        if let Some(hit) = self.inner.cached(&gtin) {
            return Ok(hit);
        }

        let flight = {
            let mut in_flight = self.inner.lock_in_flight();

            if let Some(flight) = in_flight.get(gtin.as_str()).cloned() {
                debug!("Joining lookup already in flight for {}", gtin);
                flight
            } else {
                // A lookup may have finished between the first check and the lock
                if let Some(hit) = self.inner.cached(&gtin) {
                    return Ok(hit);
                }

                let Some(permit) = self.inner.breaker.allow() else {
                    let retry_after = self.inner.breaker.retry_after().unwrap_or_default();
                    warn!(
                        "Circuit open, rejecting lookup for {} (retry in {:?})",
                        gtin, retry_after
                    );
                    return Err(LookupError::CircuitOpen { retry_after });
                };

                let flight = self.start_flight(gtin.clone(), permit);
                in_flight.insert(gtin.to_string(), flight.clone());
                flight
            }
        };

        flight.await
    }

    /// Look up many GTINs with at most `concurrency` lookups at a time.
    ///
    /// Results are returned in input order, paired with the raw input.
    pub async fn lookup_batch<I, S>(
        &self,
        gtins: I,
        concurrency: usize,
    ) -> Vec<(String, LookupOutput)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        stream::iter(gtins.into_iter().map(Into::into))
            .map(|raw: String| {
                let service = self.clone();
                async move {
                    let result = service.lookup(&raw).await;
                    (raw, result)
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats::new(
            self.inner.breaker.snapshot(),
            self.inner.cache.stats(),
            self.inner.rate_limiter.stats(),
        )
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    pub fn reset_circuit_breaker(&self) {
        self.inner.breaker.reset();
    }

    pub fn reset_rate_limiter(&self) {
        self.inner.rate_limiter.reset();
    }

    fn start_flight(&self, gtin: Gtin, permit: Permit) -> SharedLookup {
        let key = gtin.to_string();
        let task_inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { task_inner.resolve(gtin, permit).await });

        let inner = Arc::clone(&self.inner);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Lookup task for {} stopped: {}", key, e);
                    inner.breaker.record_failure(permit);
                    inner.lock_in_flight().remove(&key);
                    Err(LookupError::Internal(e.to_string()))
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    /// Lock the in-flight map, recovering from poison if necessary.
    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, SharedLookup>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| {
            warn!("In-flight lookups mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn cached(&self, gtin: &Gtin) -> Option<LookupResult> {
        let entry = self.cache.get(gtin.as_str())?;
        debug!("Cache hit for {} (stored {})", gtin, entry.fetched_at);
        Some(entry.payload.into_result(gtin.as_str()).cached())
    }

    /// Walk the chain and record the outcome.
    async fn resolve(&self, gtin: Gtin, permit: Permit) -> LookupOutput {
        let outcome = self.chain.execute(&gtin).await;

        let result = match outcome {
            ChainOutcome::Found {
                product, source, ..
            } => {
                self.breaker.record_success(permit);
                let result = LookupResult::found(gtin.as_str(), product, source);
                self.cache
                    .put(gtin.as_str(), CachedPayload::from_result(&result));
                Ok(result)
            }
            ChainOutcome::NotFound { .. } => {
                self.breaker.record_success(permit);
                let result = LookupResult::not_found(gtin.as_str(), NOT_FOUND_MESSAGE);
                self.cache
                    .put(gtin.as_str(), CachedPayload::from_result(&result));
                Ok(result)
            }
            ChainOutcome::PartialNotFound { attempts } => {
                self.breaker.record_success(permit);
                let unavailable = attempts
                    .iter()
                    .filter(|a| a.outcome == OutcomeKind::TransientError)
                    .count();
                info!(
                    "{} not found, but {} of {} sources were unavailable; not caching",
                    gtin,
                    unavailable,
                    attempts.len()
                );
                Ok(LookupResult::not_found(
                    gtin.as_str(),
                    partial_not_found_message(unavailable),
                ))
            }
            ChainOutcome::Exhausted { attempts } => {
                self.breaker.record_failure(permit);
                Err(LookupError::SourcesUnavailable {
                    attempted: attempts.len(),
                })
            }
        };

        self.lock_in_flight().remove(gtin.as_str());
        result
    }
}
