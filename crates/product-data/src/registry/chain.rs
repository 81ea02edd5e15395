//! Ordered source chain with per-source retries and rate limiting.
//!
//! The chain walks its sources in priority order until one of them knows the
//! product:
//! - `Found` stops the walk
//! - `NotFound` moves on to the next source
//! - `TransientError` is retried by the [`RetryPolicy`]; once retries are
//!   spent the chain moves on as well
//!
//! The chain never touches the cache or the circuit breaker. It only reports
//! what happened, and the caller decides what to remember.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use super::{RateLimiter, RetryPolicy};
use crate::clock::Clock;
use crate::models::{AdapterOutcome, Gtin, OutcomeKind, ProductData, SourceId};
use crate::provider::ProductSource;

/// Diagnostics for one source consulted during a chain execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceAttempt {
    pub source: SourceId,
    /// Calls made, retries included.
    pub calls: u32,
    /// Final outcome after retries.
    pub outcome: OutcomeKind,
}

/// Result of walking the chain for one GTIN.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainOutcome {
    /// A source knows the product.
    Found {
        product: ProductData,
        source: SourceId,
        attempts: Vec<SourceAttempt>,
    },
    /// Every source answered that it does not know the product.
    NotFound { attempts: Vec<SourceAttempt> },
    /// No source knows the product, but some could not be reached.
    PartialNotFound { attempts: Vec<SourceAttempt> },
    /// No source could answer at all.
    Exhausted { attempts: Vec<SourceAttempt> },
}

impl ChainOutcome {
    pub fn attempts(&self) -> &[SourceAttempt] {
        match self {
            Self::Found { attempts, .. }
            | Self::NotFound { attempts }
            | Self::PartialNotFound { attempts }
            | Self::Exhausted { attempts } => attempts,
        }
    }

    /// Whether the outcome counts against the circuit breaker.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    fn from_misses(attempts: Vec<SourceAttempt>) -> Self {
        let unreachable = attempts
            .iter()
            .filter(|a| a.outcome == OutcomeKind::TransientError)
            .count();

        if unreachable == attempts.len() {
            Self::Exhausted { attempts }
        } else if unreachable > 0 {
            Self::PartialNotFound { attempts }
        } else {
            Self::NotFound { attempts }
        }
    }
}

/// Product sources ordered by priority.
pub struct SourceChain {
    sources: Vec<Arc<dyn ProductSource>>,
    policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl SourceChain {
    /// Create a chain over `sources`.
    ///
    /// Sources are ordered by ascending priority; ties keep registration
    /// order. Each source's declared rate limit is installed in
    /// `rate_limiter`.
    pub fn new(
        mut sources: Vec<Arc<dyn ProductSource>>,
        policy: RetryPolicy,
        rate_limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        sources.sort_by_key(|s| s.priority());

        for source in &sources {
            rate_limiter.configure(source.id(), source.rate_limit());
        }

        Self {
            sources,
            policy,
            rate_limiter,
            clock,
        }
    }

    /// Source ids in the order they are consulted.
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Walk the chain for `gtin`.
    pub async fn execute(&self, gtin: &Gtin) -> ChainOutcome {
        if self.sources.is_empty() {
            warn!("No product sources registered, cannot look up {}", gtin);
            return ChainOutcome::Exhausted {
                attempts: Vec::new(),
            };
        }

        let mut attempts = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let source_id = source.id();
            let source = source.as_ref();
            let policy = &self.policy;
            let rate_limiter = self.rate_limiter.as_ref();

            debug!("Looking up {} in '{}'", gtin, source_id);

            let result = policy
                .run(self.clock.as_ref(), source_id, move || async move {
                    let _permit = rate_limiter.acquire(source_id).await;
                    policy.bounded(source.lookup(gtin)).await
                })
                .await;

            attempts.push(SourceAttempt {
                source: source_id,
                calls: result.attempts,
                outcome: result.outcome.kind(),
            });

            match result.outcome {
                AdapterOutcome::Found(product) => {
                    info!("Found {} in '{}'", gtin, source_id);
                    return ChainOutcome::Found {
                        product,
                        source: source_id,
                        attempts,
                    };
                }
                AdapterOutcome::NotFound => {
                    debug!("'{}' does not know {}, trying next source", source_id, gtin);
                }
                AdapterOutcome::TransientError(message) => {
                    warn!(
                        "'{}' unavailable for {} ({}), trying next source",
                        source_id, gtin, message
                    );
                }
            }
        }

        let outcome = ChainOutcome::from_misses(attempts);
        info!(
            "No source knows {} ({} consulted, failure: {})",
            gtin,
            outcome.attempts().len(),
            outcome.is_failure()
        );
        outcome
    }
}
