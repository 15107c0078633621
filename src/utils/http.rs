// src/utils/http.rs

//! HTTP client utilities for source fetching.

use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::CollectorConfig;

/// Fallback when the configured pool is empty.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0";

/// Create a configured asynchronous HTTP client with browser-like default headers.
///
/// The User-Agent is not fixed here; it is rotated per request.
pub fn create_async_client(config: &CollectorConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("it-IT,it;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Pick a User-Agent at random from the pool.
pub fn pick_user_agent(pool: &[String]) -> &str {
    pool.choose(&mut rand::thread_rng())
        .map(String::as_str)
        .unwrap_or(DEFAULT_USER_AGENT)
}

/// Uniform random delay in `[min_ms, max_ms]`.
pub fn jitter_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

/// Fetch a page body.
///
/// Returns `Ok(None)` for a non-success status so callers can treat it as an
/// empty page; transport failures and timeouts are errors.
pub async fn fetch_html(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
) -> Result<Option<String>> {
    let response = client
        .get(url)
        .header(header::USER_AGENT, user_agent)
        .send()
        .await
        .map_err(|e| AppError::fetch(url, e))?;

    let status = response.status();
    if !status.is_success() {
        log::warn!("{} answered {}; treating as empty", url, status);
        return Ok(None);
    }

    let body = response.text().await.map_err(|e| AppError::fetch(url, e))?;
    Ok(Some(body))
}
