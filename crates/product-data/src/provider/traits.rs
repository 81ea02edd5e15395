//! Product source trait definition.

use async_trait::async_trait;

use crate::models::{AdapterOutcome, Gtin};

use super::capabilities::RateLimit;

/// A product-data source consulted by the source chain.
///
/// Implementations translate one upstream API into an [`AdapterOutcome`].
/// They must not let transport errors escape: every failure is classified as
/// either a definitive [`AdapterOutcome::NotFound`] or a retryable
/// [`AdapterOutcome::TransientError`].
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use ciclik_product_data::provider::ProductSource;
/// use ciclik_product_data::{AdapterOutcome, Gtin};
///
/// struct InHouseCatalog;
///
/// #[async_trait]
/// impl ProductSource for InHouseCatalog {
///     fn id(&self) -> &'static str {
///         "IN_HOUSE"
///     }
///
///     async fn lookup(&self, gtin: &Gtin) -> AdapterOutcome {
///         // ... query the catalog
///         AdapterOutcome::NotFound
///     }
/// }
/// ```
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Unique identifier for this source.
    ///
    /// Used for logging, rate limiting, and as the `source` of a positive
    /// lookup result.
    fn id(&self) -> &'static str;

    /// Source priority for ordering.
    ///
    /// Lower values are consulted first. Sources with equal priority keep
    /// their registration order. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Rate limit to apply when calling this source.
    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    /// Look up a product by GTIN.
    async fn lookup(&self, gtin: &Gtin) -> AdapterOutcome;
}
