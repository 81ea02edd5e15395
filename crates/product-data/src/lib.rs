//! Ciclik Product Data Crate
//!
//! This crate resolves a product barcode (GTIN) to catalog metadata by asking
//! a chain of third-party product databases, while staying responsive when
//! those databases are slow, rate limited or down.
//!
//! # Overview
//!
//! The product data crate supports:
//! - GTIN-8/12/13/14 normalization (UPC-A is widened to EAN-13)
//! - Multiple sources: Bluesoft Cosmos, Open Food Facts, UPCitemdb
//! - A TTL cache of positive and definitive negative results
//! - Retries with exponential backoff and per-source rate limiting
//! - A circuit breaker guarding the source chain
//! - Single-flight: concurrent lookups for one GTIN share one chain walk
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |     Caller       | --> |      Gtin        |  (normalization)
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |   CacheStore     |  (hit: return)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          | CircuitBreaker   |  (open: fail fast)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |   SourceChain    |  (rate limit + retry per source)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  LookupResult    |  (cached, breaker updated)
//!                          +------------------+
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ciclik_product_data::{LookupConfig, ProductLookupService};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ProductLookupService::from_config(LookupConfig::from_env())?;
//! let result = service.lookup("7891000100103").await?;
//! if result.found {
//!     println!("{:?}", result.product);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod service;

pub use models::{AdapterOutcome, Gtin, LookupResult, OutcomeKind, ProductData, SourceId};

pub use cache::{CacheEntry, CacheStats, CacheStore, CachedPayload, MemoryCacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, LookupConfig};
pub use errors::{LookupError, RetryClass, SourceError};

// Re-export provider types
pub use provider::cosmos::CosmosSource;
pub use provider::open_food_facts::OpenFoodFactsSource;
pub use provider::upcitemdb::UpcItemDbSource;
pub use provider::{ProductSource, RateLimit};

// Re-export registry types
pub use registry::{
    ChainOutcome, CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState, Permit,
    RateLimiter, RateLimiterStats, RetryPolicy, SourceAttempt, SourceChain, SourcePermit,
};

pub use service::{ProductLookupService, ProductLookupServiceBuilder, ServiceStats};
