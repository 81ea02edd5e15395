//! Error types and retry classification for the product lookup crate.
//!
//! This module provides:
//! - [`LookupError`]: Errors surfaced to callers of the lookup service
//! - [`SourceError`]: Errors raised inside a source adapter, never surfaced
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use thiserror::Error;

use crate::models::{AdapterOutcome, ProductData};

/// Errors surfaced to callers of the lookup service.
///
/// A clean "no source has this product" is not an error; it is a
/// [`LookupResult`](crate::LookupResult) with `found == false`.
///
/// The type is `Clone` because concurrent callers waiting on the same lookup
/// all receive the same outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The caller passed no barcode, or a "no barcode" placeholder.
    #[error("Missing GTIN")]
    MissingGtin,

    /// The input is not a structurally valid GTIN.
    #[error("Invalid GTIN '{input}': {reason}")]
    InvalidGtin {
        /// The raw input as received
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Too many consecutive failures; upstream calls are suspended.
    #[error("Circuit open: lookups suspended, retry in {}s", .retry_after.as_secs())]
    CircuitOpen {
        /// Time left before a trial lookup is let through
        retry_after: Duration,
    },

    /// Every source failed transiently; no source could answer.
    #[error("All {attempted} product sources unavailable")]
    SourcesUnavailable {
        /// Number of sources consulted
        attempted: usize,
    },

    /// The lookup task stopped without producing a result.
    #[error("Lookup task failed: {0}")]
    Internal(String),
}

impl LookupError {
    /// Whether this error means "service degraded, try again later" rather
    /// than "bad input".
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            Self::CircuitOpen { .. } | Self::SourcesUnavailable { .. } | Self::Internal(_)
        )
    }

    /// Whether the input was rejected before any lookup happened.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingGtin | Self::InvalidGtin { .. })
    }
}

/// Errors raised by a single source adapter.
///
/// Each variant is classified into a [`RetryClass`] via
/// [`retry_class`](Self::retry_class) and folded into an [`AdapterOutcome`] at
/// the adapter boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source definitively does not know the product.
    #[error("Product not found: {source_id}")]
    NotFound {
        /// The source that answered
        source_id: String,
    },

    /// The source rate limited the request (HTTP 429).
    #[error("Rate limited: {source_id}")]
    RateLimited {
        /// The source that rate limited the request
        source_id: String,
    },

    /// The request timed out.
    #[error("Timeout: {source_id}")]
    Timeout {
        /// The source that timed out
        source_id: String,
    },

    /// The source answered with a server error status.
    #[error("HTTP {status} from {source_id}")]
    Http {
        /// The source that answered
        source_id: String,
        /// HTTP status code
        status: u16,
    },

    /// The request could not be sent or the connection broke.
    #[error("Network error: {source_id} - {message}")]
    Network {
        /// The source being contacted
        source_id: String,
        /// Error message from the HTTP client
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {source_id} - {message}")]
    Decode {
        /// The source that answered
        source_id: String,
        /// Decoder message
        message: String,
    },
}

impl SourceError {
    /// Returns the retry classification for this error.
    ///
    /// ```
    /// use ciclik_product_data::errors::{RetryClass, SourceError};
    ///
    /// let error = SourceError::Timeout { source_id: "COSMOS".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = SourceError::NotFound { source_id: "COSMOS".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::NotFound { .. } => RetryClass::Never,

            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::Http { .. }
            | Self::Network { .. }
            | Self::Decode { .. } => RetryClass::WithBackoff,
        }
    }

    /// Classify a transport error from the HTTP client.
    pub fn from_reqwest(source_id: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                source_id: source_id.to_string(),
            }
        } else if err.is_decode() {
            Self::Decode {
                source_id: source_id.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Network {
                source_id: source_id.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl From<Result<ProductData, SourceError>> for AdapterOutcome {
    fn from(result: Result<ProductData, SourceError>) -> Self {
        match result {
            Ok(product) => AdapterOutcome::Found(product),
            Err(e) => match e.retry_class() {
                RetryClass::Never => AdapterOutcome::NotFound,
                RetryClass::WithBackoff => AdapterOutcome::TransientError(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> String {
        "COSMOS".to_string()
    }

    #[test]
    fn test_not_found_never_retries() {
        let error = SourceError::NotFound { source_id: src() };
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_transient_errors_retry_with_backoff() {
        let errors = [
            SourceError::RateLimited { source_id: src() },
            SourceError::Timeout { source_id: src() },
            SourceError::Http {
                source_id: src(),
                status: 503,
            },
            SourceError::Network {
                source_id: src(),
                message: "connection reset".to_string(),
            },
            SourceError::Decode {
                source_id: src(),
                message: "expected value".to_string(),
            },
        ];

        for error in errors {
            assert_eq!(error.retry_class(), RetryClass::WithBackoff, "{}", error);
        }
    }

    #[test]
    fn test_outcome_from_result() {
        let found: AdapterOutcome = Ok(ProductData::default()).into();
        assert!(matches!(found, AdapterOutcome::Found(_)));

        let missing: AdapterOutcome = Err(SourceError::NotFound { source_id: src() }).into();
        assert_eq!(missing, AdapterOutcome::NotFound);

        let down: AdapterOutcome = Err(SourceError::Timeout { source_id: src() }).into();
        assert_eq!(down, AdapterOutcome::TransientError("Timeout: COSMOS".to_string()));
    }

    #[test]
    fn test_lookup_error_classes() {
        assert!(LookupError::MissingGtin.is_validation());
        assert!(!LookupError::MissingGtin.is_degraded());

        let open = LookupError::CircuitOpen {
            retry_after: Duration::from_secs(42),
        };
        assert!(open.is_degraded());
        assert_eq!(
            open.to_string(),
            "Circuit open: lookups suspended, retry in 42s"
        );

        let exhausted = LookupError::SourcesUnavailable { attempted: 3 };
        assert!(exhausted.is_degraded());
        assert_eq!(exhausted.to_string(), "All 3 product sources unavailable");
    }
}
