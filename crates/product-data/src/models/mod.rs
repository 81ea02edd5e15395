//! Data types shared across the product lookup crate.
//!
//! - [`Gtin`] - normalized barcode identifier
//! - [`ProductData`] - catalog metadata returned by a source
//! - [`LookupResult`] - what callers receive
//! - [`AdapterOutcome`] - per-call classification used by the source chain

mod gtin;
mod outcome;
mod product;

pub use gtin::{Gtin, MAX_GTIN_LEN, MIN_GTIN_LEN};
pub use outcome::{AdapterOutcome, OutcomeKind};
pub use product::{LookupResult, ProductData};

/// Source identifier (e.g., "COSMOS", "OPEN_FOOD_FACTS").
pub type SourceId = &'static str;
