//! Product data and lookup results returned to callers.

use serde::{Deserialize, Serialize};

/// Catalog metadata for a product, as reported by one of the sources.
///
/// Field names on the wire follow the application's existing product schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductData {
    /// GTIN as echoed by the source (falls back to the requested one).
    pub gtin: String,

    /// Product description.
    #[serde(rename = "descricao")]
    pub description: String,

    /// Brand name.
    #[serde(rename = "marca", default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    /// Mercosur tariff code (NCM).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ncm: Option<String>,

    /// Category or tariff description.
    #[serde(rename = "categoria", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Product image or thumbnail URL.
    #[serde(rename = "imagem_url", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Outcome of a product lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    /// Normalized GTIN the lookup was performed for.
    #[serde(rename = "ean_gtin")]
    pub gtin: String,

    /// Whether any source returned a positive match.
    #[serde(rename = "encontrado")]
    pub found: bool,

    /// Human-readable outcome summary.
    #[serde(rename = "mensagem")]
    pub message: String,

    /// Product data when `found` is true.
    #[serde(rename = "produto", default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductData>,

    /// Id of the source that produced the match.
    #[serde(default)]
    pub source: Option<String>,

    /// Whether this result was served from the cache.
    #[serde(rename = "usouCache", default)]
    pub from_cache: bool,
}

impl LookupResult {
    /// A positive result attributed to `source`.
    pub fn found(gtin: impl Into<String>, product: ProductData, source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            gtin: gtin.into(),
            found: true,
            message: format!("Product found in {}", source),
            product: Some(product),
            source: Some(source),
            from_cache: false,
        }
    }

    /// A negative result carrying the reason no product was returned.
    pub fn not_found(gtin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            gtin: gtin.into(),
            found: false,
            message: message.into(),
            product: None,
            source: None,
            from_cache: false,
        }
    }

    /// Mark the result as served from the cache.
    pub fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }
}
