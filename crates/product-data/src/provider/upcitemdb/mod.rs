//! UPCitemdb source.
//!
//! Generic barcode database used as the last resort. The free trial endpoint
//! is heavily throttled, hence the low rate limit.
//!
//! Endpoint: `GET /prod/trial/lookup?upc={gtin}`. Unknown codes come back
//! with an empty `items` array; malformed codes with HTTP 400.

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

const PROVIDER_ID: &str = "UPCITEMDB";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    ean: Option<String>,
    upc: Option<String>,
    title: Option<String>,
    brand: Option<String>,
    category: Option<String>,
    #[serde(default)]
    images: Vec<String>,
}

/// UPCitemdb source.
pub struct UpcItemDbSource {
    client: Client,
    base_url: String,
}

impl UpcItemDbSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Self {
        Self {
            client: build_client(timeout, user_agent),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &LookupConfig) -> Self {
        Self::new(
            config.upcitemdb_base_url.clone(),
            config.request_timeout,
            &config.user_agent,
        )
    }

    async fn fetch(&self, gtin: &Gtin) -> Result<ProductData, SourceError> {
        let url = format!("{}/prod/trial/lookup", self.base_url);
        debug!("UPCitemdb request: {} upc={}", url, gtin);

        let request = self.client.get(&url).query(&[("upc", gtin.as_str())]);
        let response: LookupResponse = get_json(PROVIDER_ID, request).await?;
        parse_response(gtin, response)
    }
}

fn parse_response(gtin: &Gtin, response: LookupResponse) -> Result<ProductData, SourceError> {
    let Some(item) = response.items.into_iter().next() else {
        return Err(SourceError::NotFound {
            source_id: PROVIDER_ID.to_string(),
        });
    };

    Ok(ProductData {
        gtin: non_empty(item.ean)
            .or_else(|| non_empty(item.upc))
            .unwrap_or_else(|| gtin.to_string()),
        description: non_empty(item.title).unwrap_or_default(),
        brand: non_empty(item.brand),
        ncm: None,
        category: non_empty(item.category),
        image_url: non_empty(item.images.into_iter().next()),
    })
}

#[async_trait]
impl ProductSource for UpcItemDbSource {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        3
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 6,
            burst_capacity: 2,
            max_concurrency: 1,
        }
    }

    async fn lookup(&self, gtin: &Gtin) -> AdapterOutcome {
        self.fetch(gtin).await.into()
    }
}
