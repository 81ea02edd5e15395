//! Open Food Facts source.
//!
//! Open, crowd-sourced database of food products. Good coverage for groceries
//! the primary catalog lacks.
//!
//! Endpoint: `GET /api/v0/product/{gtin}.json`. Unknown products come back
//! as HTTP 200 with `status: 0`.

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

const PROVIDER_ID: &str = "OPEN_FOOD_FACTS";

#[derive(Debug, Deserialize)]
struct ProductResponse {
    /// 1 when the product exists, 0 otherwise
    #[serde(default)]
    status: i64,
    product: Option<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    code: Option<String>,
    product_name: Option<String>,
    generic_name: Option<String>,
    brands: Option<String>,
    categories: Option<String>,
    image_url: Option<String>,
}

/// Open Food Facts source.
pub struct OpenFoodFactsSource {
    client: Client,
    base_url: String,
}

impl OpenFoodFactsSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Self {
        Self {
            client: build_client(timeout, user_agent),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &LookupConfig) -> Self {
        Self::new(
            config.open_food_facts_base_url.clone(),
            config.request_timeout,
            &config.user_agent,
        )
    }

    fn product_url(&self, gtin: &Gtin) -> String {
        format!("{}/api/v0/product/{}.json", self.base_url, gtin)
    }

    async fn fetch(&self, gtin: &Gtin) -> Result<ProductData, SourceError> {
        let url = self.product_url(gtin);
        debug!("Open Food Facts request: {}", url);

        let response: ProductResponse = get_json(PROVIDER_ID, self.client.get(&url)).await?;
        parse_response(gtin, response)
    }
}

fn parse_response(gtin: &Gtin, response: ProductResponse) -> Result<ProductData, SourceError> {
    let product = match (response.status, response.product) {
        (0, _) | (_, None) => {
            return Err(SourceError::NotFound {
                source_id: PROVIDER_ID.to_string(),
            })
        }
        (_, Some(product)) => product,
    };

    Ok(ProductData {
        gtin: non_empty(product.code).unwrap_or_else(|| gtin.to_string()),
        description: non_empty(product.product_name)
            .or_else(|| non_empty(product.generic_name))
            .unwrap_or_default(),
        brand: non_empty(product.brands),
        ncm: None,
        category: non_empty(product.categories),
        image_url: non_empty(product.image_url),
    })
}

#[async_trait]
impl ProductSource for OpenFoodFactsSource {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn rate_limit(&self) -> RateLimit {
        // Product reads are limited to 100 per minute
        RateLimit {
            requests_per_minute: 100,
            burst_capacity: 10,
            max_concurrency: 4,
        }
    }

    async fn lookup(&self, gtin: &Gtin) -> AdapterOutcome {
        self.fetch(gtin).await.into()
    }
}
