//! GTIN normalization and validation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::LookupError;

/// Shortest accepted GTIN (EAN-8).
pub const MIN_GTIN_LEN: usize = 8;

/// Longest accepted GTIN (GTIN-14).
pub const MAX_GTIN_LEN: usize = 14;

/// Length of a UPC-A code, which is widened to EAN-13.
const UPC_A_LEN: usize = 12;

/// Markers the receipt importer writes when an item carries no barcode.
const MISSING_GTIN_MARKERS: &[&str] = &["SEM_GTIN", "SEM GTIN"];

/// A normalized Global Trade Item Number.
///
/// Holds digits only, 8 to 14 characters long. UPC-A codes are stored in their
/// EAN-13 form so both spellings of a product share a cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gtin(String);

impl Gtin {
    /// Normalize raw caller input into a GTIN.
    ///
    /// Every non-digit character is stripped before the length check, so
    /// `"789-6629 642331"` and `"7896629642331"` are the same GTIN.
    pub fn parse(input: &str) -> Result<Self, LookupError> {
        let trimmed = input.trim();
        if trimmed.is_empty()
            || MISSING_GTIN_MARKERS
                .iter()
                .any(|marker| trimmed.to_ascii_uppercase().starts_with(marker))
        {
            return Err(LookupError::MissingGtin);
        }

        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.is_empty() {
            return Err(LookupError::InvalidGtin {
                input: input.to_string(),
                reason: "no digits".to_string(),
            });
        }

        if !(MIN_GTIN_LEN..=MAX_GTIN_LEN).contains(&digits.len()) {
            return Err(LookupError::InvalidGtin {
                input: input.to_string(),
                reason: format!(
                    "{} digits (expected {} to {})",
                    digits.len(),
                    MIN_GTIN_LEN,
                    MAX_GTIN_LEN
                ),
            });
        }

        if digits.len() == UPC_A_LEN {
            return Ok(Self(format!("0{}", digits)));
        }

        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Gtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Gtin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
