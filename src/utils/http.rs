//! Shared HTTP helpers for balance and price sources.
//!
//! Sources compose their own requests (auth headers, bodies) and hand the
//! builder to [`send_rate_limited`], which replays it whenever the server
//! answers 429, honoring the `Retry-After` hint.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// Fallback wait when a rate-limited response carries no usable hint.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

/// Sends a request, retrying as long as the server answers 429.
pub async fn send_rate_limited(
    context: &str,
    mut request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, Error> {
    loop {
        let retry = request.try_clone();
        let response = request.send().await?;
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }
        // A streaming body cannot be replayed; surface the 429 as-is.
        let Some(next) = retry else {
            return Ok(response);
        };
        let wait = retry_after_hint(&response).unwrap_or(RATE_LIMIT_BACKOFF);
        log::warn!(
            "{} rate limited, retrying in {}s",
            context,
            wait.as_secs()
        );
        tokio::time::sleep(wait).await;
        request = next;
    }
}

/// Reads the `Retry-After` header as a whole number of seconds.
fn retry_after_hint(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Rejects non-success statuses, keeping the body text for context.
pub async fn expect_success(
    context: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Http {
            context: context.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Decodes a successful response body as JSON.
pub async fn read_json<T: DeserializeOwned>(
    context: &str,
    response: reqwest::Response,
) -> Result<T, Error> {
    let response = expect_success(context, response).await?;
    response.json::<T>().await.map_err(|err| Error::Decode {
        context: context.to_string(),
        detail: err.to_string(),
    })
}

/// Sends a request with rate-limit retries and decodes the JSON body.
pub async fn fetch_json<T: DeserializeOwned>(
    context: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, Error> {
    let response = send_rate_limited(context, request).await?;
    read_json(context, response).await
}
