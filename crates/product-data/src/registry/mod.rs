//! Source orchestration module.
//!
//! This module provides the resilience layer around product sources:
//! - Priority-ordered source chain with fallback
//! - Retries with exponential backoff per source
//! - Rate limiting per source
//! - A circuit breaker guarding the chain as a whole

mod chain;
mod circuit_breaker;
mod rate_limiter;
mod retry_policy;

pub use chain::{ChainOutcome, SourceAttempt, SourceChain};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState, Permit,
};
pub use rate_limiter::{RateLimiter, RateLimiterStats, SourcePermit};
pub use retry_policy::{RetryOutcome, RetryPolicy};
