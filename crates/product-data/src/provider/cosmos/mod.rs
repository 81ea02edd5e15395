//! Bluesoft Cosmos product catalog source.
//!
//! Cosmos is the primary catalog: it has the widest coverage of products sold
//! in Brazil and is the only source that reports NCM tariff codes.
//!
//! Endpoint: `GET /gtins/{gtin}.json`, authenticated with an optional
//! `X-Cosmos-Token` header. The base URL is configurable so the client can be
//! pointed at a token-rotating proxy instead of Cosmos itself.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::LookupConfig;
use crate::errors::SourceError;
use crate::models::{AdapterOutcome, Gtin, ProductData};
use crate::provider::http::{build_client, get_json, non_empty};
use crate::provider::{ProductSource, RateLimit};

const PROVIDER_ID: &str = "COSMOS";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /gtins/{gtin}.json
#[derive(Debug, Deserialize)]
struct GtinResponse {
    /// GTIN as a JSON number or string
    gtin: Option<serde_json::Value>,
    description: Option<String>,
    brand: Option<Brand>,
    ncm: Option<Ncm>,
    thumbnail: Option<String>,
    // Note: price, gpc, width/height/weight fields exist but are not mapped
}

#[derive(Debug, Deserialize)]
struct Brand {
    name: Option<String>,
}

/// Mercosur tariff classification
#[derive(Debug, Deserialize)]
struct Ncm {
    code: Option<String>,
    description: Option<String>,
}

// ============================================================================
// CosmosSource
// ============================================================================

/// Bluesoft Cosmos source.
pub struct CosmosSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl CosmosSource {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Self {
        Self {
            client: build_client(timeout, user_agent),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_config(config: &LookupConfig) -> Self {
        Self::new(
            config.cosmos_base_url.clone(),
            config.cosmos_token.clone(),
            config.request_timeout,
            &config.user_agent,
        )
    }

    fn product_url(&self, gtin: &Gtin) -> String {
        format!("{}/gtins/{}.json", self.base_url, gtin)
    }

    async fn fetch(&self, gtin: &Gtin) -> Result<ProductData, SourceError> {
        let url = self.product_url(gtin);
        debug!("Cosmos request: {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.header("X-Cosmos-Token", token);
        }

        let response: GtinResponse = get_json(PROVIDER_ID, request).await?;
        Ok(parse_product(gtin, response))
    }
}

/// Map a Cosmos response onto product data.
///
/// The description falls back to the brand name; the NCM description is used
/// as category.
fn parse_product(gtin: &Gtin, response: GtinResponse) -> ProductData {
    let brand = non_empty(response.brand.and_then(|b| b.name));
    let (ncm, category) = match response.ncm {
        Some(ncm) => (non_empty(ncm.code), non_empty(ncm.description)),
        None => (None, None),
    };

    let echoed_gtin = match response.gtin {
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::String(s)) => non_empty(Some(s)),
        _ => None,
    };

    ProductData {
        gtin: echoed_gtin.unwrap_or_else(|| gtin.to_string()),
        description: non_empty(response.description)
            .or_else(|| brand.clone())
            .unwrap_or_default(),
        brand,
        ncm,
        category,
        image_url: non_empty(response.thumbnail),
    }
}

#[async_trait]
impl ProductSource for CosmosSource {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 30,
            burst_capacity: 2,
            max_concurrency: 2,
        }
    }

    async fn lookup(&self, gtin: &Gtin) -> AdapterOutcome {
        self.fetch(gtin).await.into()
    }
}
