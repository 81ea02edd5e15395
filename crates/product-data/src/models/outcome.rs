use serde::Serialize;

use super::ProductData;

/// Result of a single source call.
///
/// The split between `NotFound` and `TransientError` decides whether a call is
/// retried: only transient errors are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdapterOutcome {
    /// The source knows the product.
    Found(ProductData),
    /// The source answered definitively that it does not know the product.
    NotFound,
    /// The source could not be reached or did not answer usefully.
    TransientError(String),
}

impl AdapterOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Found(_) => OutcomeKind::Found,
            Self::NotFound => OutcomeKind::NotFound,
            Self::TransientError(_) => OutcomeKind::TransientError,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientError(_))
    }
}

/// Data-free discriminant of [`AdapterOutcome`], used in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Found,
    NotFound,
    TransientError,
}
