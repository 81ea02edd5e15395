//! HTTP plumbing shared by the source adapters.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::SourceError;

/// Build an HTTP client with a bounded per-request timeout.
pub(crate) fn build_client(timeout: Duration, user_agent: &str) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to build HTTP client ({}), using defaults", e);
            Client::new()
        })
}

/// Map a response status onto the source error taxonomy.
///
/// - 2xx: success
/// - 429: rate limited (transient)
/// - other 4xx: the source does not know the product
/// - 5xx and anything else: transient server error
pub(crate) fn classify_status(source_id: &str, status: StatusCode) -> Result<(), SourceError> {
    if status.is_success() {
        return Ok(());
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::RateLimited {
            source_id: source_id.to_string(),
        });
    }

    if status.is_client_error() {
        return Err(SourceError::NotFound {
            source_id: source_id.to_string(),
        });
    }

    Err(SourceError::Http {
        source_id: source_id.to_string(),
        status: status.as_u16(),
    })
}

/// Send a request and decode its JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    source_id: &str,
    request: RequestBuilder,
) -> Result<T, SourceError> {
    let response = request
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| SourceError::from_reqwest(source_id, &e))?;

    let status = response.status();
    debug!("{} responded with {}", source_id, status);
    classify_status(source_id, status)?;

    let body = response
        .text()
        .await
        .map_err(|e| SourceError::from_reqwest(source_id, &e))?;

    serde_json::from_str(&body).map_err(|e| SourceError::Decode {
        source_id: source_id.to_string(),
        message: e.to_string(),
    })
}

/// Trimmed, non-empty text or `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
