//! Product source abstractions and implementations.
//!
//! This module contains:
//! - The `ProductSource` trait that all sources implement
//! - Per-source rate limiting configuration
//! - Concrete HTTP sources (Cosmos, Open Food Facts, UPCitemdb)
//!
//! Sources never surface transport errors. Each call ends in an
//! [`AdapterOutcome`](crate::AdapterOutcome): found, a definitive not-found, or
//! a transient error the retry policy may retry.

mod capabilities;
mod http;
mod traits;

pub mod cosmos;
pub mod open_food_facts;
pub mod upcitemdb;

// Re-exports
pub use capabilities::RateLimit;
pub use traits::ProductSource;
